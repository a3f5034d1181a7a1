use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use tracing::{error, info, warn};

use crate::api::ApiServer;
use crate::backend::{ChangeFeed, MeetingStore, MemoryBackend, RealtimeFeed, RestBackend};
use crate::config::{Config, ViewerConfig};
use crate::model::{self, Meeting, Participant};
use crate::sync::MeetingSession;

pub async fn run_service(meeting_arg: Option<String>) -> Result<()> {
    info!("Starting Meetsync service");

    let config = Config::load()?;

    let meeting_id = meeting_arg.context(
        "No meeting given. Run `meetsync serve <MEETING>` with the 10-character meeting code.",
    )?;
    if !model::is_meeting_code(&meeting_id) {
        warn!(
            "'{}' does not look like a meeting code (expected 10 chars, A-Z0-9)",
            meeting_id
        );
    }
    if config.viewer.id.is_empty() {
        bail!(
            "Viewer identity is not configured. Set [viewer] id and email in {:?}.",
            crate::global::config_file()?
        );
    }

    let (store, feed) = build_backend(&config, &meeting_id).await?;

    let meeting = store
        .meeting(&meeting_id)
        .await
        .with_context(|| format!("Failed to load meeting {meeting_id}"))?;

    let session = Arc::new(
        MeetingSession::start(store, feed, meeting, &config.viewer.id).await?,
    );

    let api_server = ApiServer::new(session.clone(), config.api.port);
    tokio::spawn(async move {
        if let Err(e) = api_server.start().await {
            error!("API server failed: {}", e);
        }
    });

    info!("Meetsync is ready!");
    info!(
        "Watch the meeting: curl http://127.0.0.1:{}/state",
        config.api.port
    );
    info!(
        "Ask a question:    curl -X POST http://127.0.0.1:{}/questions -H 'content-type: application/json' -d '{{\"question\":\"...\"}}'",
        config.api.port
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutting down");
    session.shutdown().await;

    Ok(())
}

async fn build_backend(
    config: &Config,
    meeting_id: &str,
) -> Result<(Arc<dyn MeetingStore>, Arc<dyn ChangeFeed>)> {
    match config.backend.mode.as_str() {
        "rest" => {
            let store: Arc<dyn MeetingStore> = Arc::new(RestBackend::new(
                &config.backend.rest_url,
                config.backend.api_key.clone(),
            ));
            let feed: Arc<dyn ChangeFeed> = Arc::new(
                RealtimeFeed::connect(&config.backend.realtime_url)
                    .await
                    .context("Failed to connect the realtime feed")?,
            );
            Ok((store, feed))
        }
        "memory" => {
            // Local demo: everything lives in this process, seeded with an
            // empty meeting under the requested code.
            let backend = Arc::new(MemoryBackend::new());
            backend
                .create_meeting(&demo_meeting(meeting_id, &config.viewer))
                .await?;
            info!("Using in-process backend (demo mode)");
            let store: Arc<dyn MeetingStore> = backend.clone();
            let feed: Arc<dyn ChangeFeed> = backend;
            Ok((store, feed))
        }
        other => bail!("Unknown backend mode '{}'. Supported modes: rest, memory", other),
    }
}

fn demo_meeting(meeting_id: &str, viewer: &ViewerConfig) -> Meeting {
    let now = Utc::now();
    Meeting {
        id: meeting_id.to_string(),
        created_by: viewer.id.clone(),
        title: "Local demo meeting".to_string(),
        start_date: now,
        end_date: now + Duration::hours(1),
        location: None,
        description: None,
        agenda: Vec::new(),
        participants: vec![Participant {
            id: viewer.id.clone(),
            email: viewer.email.clone(),
            name: viewer.name.clone(),
            color: None,
        }],
        completed: false,
    }
}

//! Control API for a running meeting session.
//!
//! Loopback-only HTTP surface a UI (or curl) drives the session through:
//! live state reads, note edits, question actions, meeting completion.

pub mod error;
pub mod routes;

use std::sync::Arc;

use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tracing::info;

use crate::sync::MeetingSession;

use routes::meeting::MeetingRoutesState;

pub struct ApiServer {
    port: u16,
    state: MeetingRoutesState,
}

impl ApiServer {
    pub fn new(session: Arc<MeetingSession>, port: u16) -> Self {
        Self {
            port,
            state: MeetingRoutesState { session },
        }
    }

    pub async fn start(self) -> Result<()> {
        let app = Router::new()
            .route("/", get(service_info))
            .route("/version", get(version))
            .merge(routes::meeting::router(self.state))
            .layer(ServiceBuilder::new());

        let listener =
            tokio::net::TcpListener::bind(&format!("127.0.0.1:{}", self.port)).await?;

        info!("Control API listening on http://127.0.0.1:{}", self.port);
        info!("Endpoints:");
        info!("  GET  /                        - Service info");
        info!("  GET  /version                 - Version info");
        info!("  GET  /state                   - Live meeting state");
        info!("  PUT  /note                    - Update your note");
        info!("  PUT  /shared-note             - Update the shared note");
        info!("  GET  /questions               - List questions");
        info!("  POST /questions               - Ask a question");
        info!("  POST /questions/:id/upvote    - Toggle your upvote");
        info!("  POST /questions/:id/answered  - Toggle answered flag");
        info!("  POST /complete                - End the meeting");

        axum::serve(listener, app).await?;
        Ok(())
    }
}

async fn service_info() -> Json<Value> {
    Json(json!({
        "service": "meetsync",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn version() -> Json<Value> {
    Json(json!({ "version": env!("CARGO_PKG_VERSION") }))
}

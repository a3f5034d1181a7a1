//! CLI handlers for meeting management.
//!
//! Create talks straight to the row store; anything not given as a flag is
//! asked interactively. List and show are read-only lookups.

use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use dialoguer::{theme::ColorfulTheme, Confirm, Input};

use crate::backend::{MeetingStore, RestBackend};
use crate::cli::args::{CreateMeetingArgs, MeetingCliArgs, MeetingCommand};
use crate::config::Config;
use crate::model::{self, AgendaItem, Meeting, Participant};
use crate::sync::roster::resolve_participants;

pub async fn handle_meeting_command(args: MeetingCliArgs) -> Result<()> {
    let config = Config::load()?;
    let store = build_store(&config)?;

    match args.command {
        MeetingCommand::Create(create) => create_meeting(store.as_ref(), &config, create).await,
        MeetingCommand::List { limit } => list_meetings(store.as_ref(), limit).await,
        MeetingCommand::Show { id } => show_meeting(store.as_ref(), &id).await,
    }
}

fn build_store(config: &Config) -> Result<Arc<dyn MeetingStore>> {
    match config.backend.mode.as_str() {
        "rest" => Ok(Arc::new(RestBackend::new(
            &config.backend.rest_url,
            config.backend.api_key.clone(),
        ))),
        "memory" => bail!(
            "The memory backend lives inside a running service process; \
             meeting commands need backend.mode = \"rest\""
        ),
        other => bail!("Unknown backend mode '{}'", other),
    }
}

async fn create_meeting(
    store: &dyn MeetingStore,
    config: &Config,
    args: CreateMeetingArgs,
) -> Result<()> {
    if config.viewer.id.is_empty() {
        bail!(
            "Viewer identity is not configured. Set [viewer] id and email in {:?}.",
            crate::global::config_file()?
        );
    }

    let interactive = io::stdin().is_terminal();
    let needs_prompt = args.title.is_none() || args.start.is_none() || args.end.is_none();
    if needs_prompt && !interactive {
        bail!("Non-interactive session. Pass --title, --start and --end.");
    }

    let theme = ColorfulTheme::default();

    let title = match args.title {
        Some(title) => title,
        None => Input::with_theme(&theme)
            .with_prompt("Meeting title")
            .interact_text()?,
    };

    let start_date = match args.start {
        Some(start) => parse_datetime(&start)?,
        None => prompt_datetime(&theme, "Start (YYYY-MM-DD HH:MM, UTC)")?,
    };
    let end_date = match args.end {
        Some(end) => parse_datetime(&end)?,
        None => prompt_datetime(&theme, "End (YYYY-MM-DD HH:MM, UTC)")?,
    };

    let location = match args.location {
        Some(location) => Some(location),
        None if interactive => optional_input(&theme, "Location (optional)")?,
        None => None,
    };
    let description = match args.description {
        Some(description) => Some(description),
        None if interactive => optional_input(&theme, "Description (optional)")?,
        None => None,
    };

    let mut emails = args.participants;
    if emails.is_empty() && interactive {
        loop {
            let email: String = Input::with_theme(&theme)
                .with_prompt("Participant email (empty to finish)")
                .allow_empty(true)
                .interact_text()?;
            let email = email.trim().to_string();
            if email.is_empty() {
                break;
            }
            emails.push(email);
        }
    }

    let mut participants = vec![Participant {
        id: config.viewer.id.clone(),
        email: config.viewer.email.clone(),
        name: config.viewer.name.clone(),
        color: None,
    }];
    for email in emails {
        if email != config.viewer.email {
            participants.push(Participant::new(email));
        }
    }

    let mut agenda = Vec::new();
    if interactive {
        while Confirm::with_theme(&theme)
            .with_prompt("Add an agenda item?")
            .default(false)
            .interact()?
        {
            let item_title: String = Input::with_theme(&theme)
                .with_prompt("Agenda item title")
                .interact_text()?;
            let item_description = optional_input(&theme, "Item description (optional)")?;
            let duration = optional_input(&theme, "Duration in minutes (optional)")?
                .map(|text| {
                    text.parse::<u32>()
                        .context("Duration must be a whole number of minutes")
                })
                .transpose()?;
            agenda.push(AgendaItem {
                id: model::new_id(),
                title: item_title,
                description: item_description,
                duration,
            });
        }
    }

    let meeting = Meeting {
        id: model::new_meeting_code(),
        created_by: config.viewer.id.clone(),
        title,
        start_date,
        end_date,
        location,
        description,
        agenda,
        participants,
        completed: false,
    };

    store
        .create_meeting(&meeting)
        .await
        .context("Failed to create meeting")?;

    println!("Created meeting {} — {}", meeting.id, meeting.title);
    println!("Share the code with participants, then run: meetsync serve {}", meeting.id);
    Ok(())
}

async fn list_meetings(store: &dyn MeetingStore, limit: usize) -> Result<()> {
    let meetings = store
        .open_meetings()
        .await
        .context("Failed to list meetings")?;

    if meetings.is_empty() {
        println!("No open meetings.");
        return Ok(());
    }

    println!("Found {} open meeting(s):\n", meetings.len());
    for meeting in meetings.iter().take(limit) {
        println!("Code: {}", meeting.id);
        println!("Title: {}", meeting.title);
        println!(
            "Starts: {}",
            meeting.start_date.format("%Y-%m-%d %H:%M UTC")
        );
        println!("Participants: {}", meeting.participants.len());
        println!("---");
    }

    println!("\nTo inspect one, use: meetsync meeting show <CODE>");
    Ok(())
}

async fn show_meeting(store: &dyn MeetingStore, id: &str) -> Result<()> {
    let meeting = store
        .meeting(id)
        .await
        .with_context(|| format!("Failed to load meeting {id}"))?;
    let questions = store
        .questions(id)
        .await
        .with_context(|| format!("Failed to load questions for {id}"))?;
    let participants = resolve_participants(store, &meeting.participants).await;

    println!("{} ({})", meeting.title, meeting.id);
    println!(
        "{} — {}",
        meeting.start_date.format("%Y-%m-%d %H:%M"),
        meeting.end_date.format("%Y-%m-%d %H:%M UTC")
    );
    if let Some(location) = &meeting.location {
        println!("Location: {}", location);
    }
    if let Some(description) = &meeting.description {
        println!("{}", description);
    }
    if meeting.completed {
        println!("Status: completed");
    } else if !meeting.has_started() {
        let wait = model::time_between(Utc::now(), meeting.start_date);
        println!(
            "Status: starts in {}d {}h {}m",
            wait.days, wait.hours, wait.minutes
        );
    } else {
        println!("Status: in progress");
    }

    if !meeting.agenda.is_empty() {
        println!("\nAgenda:");
        for (index, item) in meeting.agenda.iter().enumerate() {
            match item.duration {
                Some(minutes) => {
                    println!("  {}. {} ({} min)", index + 1, item.title, minutes)
                }
                None => println!("  {}. {}", index + 1, item.title),
            }
        }
    }

    if !participants.is_empty() {
        println!("\nParticipants:");
        for participant in &participants {
            match &participant.name {
                Some(name) => println!(
                    "  [{}] {} <{}>",
                    model::name_initials(name),
                    name,
                    participant.email
                ),
                None => println!("  {}", participant.email),
            }
        }
    }

    if !questions.is_empty() {
        println!("\nQuestions:");
        for question in &questions {
            let marker = if question.answered { "answered" } else { "open" };
            println!(
                "  [{}] {} ({} upvotes)",
                marker,
                question.question,
                question.upvotes.len()
            );
        }
    }

    Ok(())
}

fn parse_datetime(text: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(text.trim(), "%Y-%m-%d %H:%M")
        .context("Expected \"YYYY-MM-DD HH:MM\" (UTC)")?;
    Ok(Utc.from_utc_datetime(&naive))
}

fn prompt_datetime(theme: &ColorfulTheme, prompt: &str) -> Result<DateTime<Utc>> {
    let text: String = Input::with_theme(theme)
        .with_prompt(prompt)
        .validate_with(|input: &String| {
            parse_datetime(input).map(|_| ()).map_err(|e| e.to_string())
        })
        .interact_text()?;
    parse_datetime(&text)
}

fn optional_input(theme: &ColorfulTheme, prompt: &str) -> Result<Option<String>> {
    let text: String = Input::with_theme(theme)
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;
    let text = text.trim().to_string();
    Ok(if text.is_empty() { None } else { Some(text) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime() {
        let parsed = parse_datetime("2026-03-01 14:30").unwrap();
        assert_eq!(parsed.format("%Y-%m-%d %H:%M").to_string(), "2026-03-01 14:30");
        assert!(parse_datetime("tomorrow-ish").is_err());
        assert!(parse_datetime("2026-03-01").is_err());
    }
}

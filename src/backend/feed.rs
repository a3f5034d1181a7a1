//! Change-feed seam: subscriptions to row-level change notifications.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::model::{Meeting, Note};

use super::store::StoreError;

/// The three tables a session watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Meetings,
    Notes,
    Questions,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Meetings => "meetings",
            Self::Notes => "meeting_notes",
            Self::Questions => "meeting_questions",
        }
    }

    pub fn from_str(name: &str) -> Option<Self> {
        match name {
            "meetings" => Some(Self::Meetings),
            "meeting_notes" => Some(Self::Notes),
            "meeting_questions" => Some(Self::Questions),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Which event kinds a subscription receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    All,
    Only(ChangeKind),
}

impl EventFilter {
    pub fn matches(&self, kind: ChangeKind) -> bool {
        match self {
            Self::All => true,
            Self::Only(only) => *only == kind,
        }
    }
}

/// Row payload of a change event.
///
/// Meeting and note events carry the full new row. Question events carry
/// only the meeting scope: the feed's payload does not reliably describe
/// every mutation kind, so consumers re-fetch the question list instead.
#[derive(Debug, Clone)]
pub enum ChangePayload {
    Meeting(Meeting),
    Note(Note),
    Questions { meeting_id: String },
}

impl ChangePayload {
    pub fn meeting_id(&self) -> &str {
        match self {
            Self::Meeting(meeting) => &meeting.id,
            Self::Note(note) => &note.meeting_id,
            Self::Questions { meeting_id } => meeting_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub payload: ChangePayload,
}

/// A live subscription. Dropping it (or calling [`unsubscribe`]) stops
/// delivery and releases the feed-side resources.
///
/// [`unsubscribe`]: Subscription::unsubscribe
pub struct Subscription {
    rx: mpsc::Receiver<ChangeEvent>,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        rx: mpsc::Receiver<ChangeEvent>,
        cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            rx,
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Next event, or `None` once the feed side has gone away.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// Subscribe to change events for one table, scoped to one meeting.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(
        &self,
        table: Table,
        meeting_id: &str,
        filter: EventFilter,
    ) -> Result<Subscription, StoreError>;
}

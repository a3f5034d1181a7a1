//! Row-store seam and its error taxonomy.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{Meeting, Note, Participant, Question, RegisteredUser};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A single-row lookup matched nothing. Callers treat this as an
    /// expected case only for the note fetch-or-create path.
    #[error("no matching row")]
    NotFound,

    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("failed to decode backend row: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("change feed unavailable: {0}")]
    Feed(String),
}

/// Typed reads and writes against the hosted row store.
///
/// Partial updates are expressed as dedicated methods rather than a generic
/// patch, so every caller states exactly which columns it touches.
#[async_trait]
pub trait MeetingStore: Send + Sync {
    async fn meeting(&self, id: &str) -> Result<Meeting, StoreError>;

    /// Meetings not yet completed, earliest start first.
    async fn open_meetings(&self) -> Result<Vec<Meeting>, StoreError>;

    async fn create_meeting(&self, meeting: &Meeting) -> Result<(), StoreError>;

    /// Replace the participant list on the meeting row. Only id and email
    /// are persisted; resolution fields are looked up again at read time.
    async fn update_participants(
        &self,
        meeting_id: &str,
        participants: &[Participant],
    ) -> Result<(), StoreError>;

    async fn set_meeting_ended(
        &self,
        meeting_id: &str,
        ended_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn set_meeting_completed(&self, meeting_id: &str) -> Result<(), StoreError>;

    /// Fetch the note for (meeting, author). `author` is a participant id
    /// or [`crate::model::SHARED_NOTE_AUTHOR`]. Absence is `NotFound`.
    async fn note(&self, meeting_id: &str, author: &str) -> Result<Note, StoreError>;

    /// Insert a note row and return the stored record.
    async fn create_note(&self, note: &Note) -> Result<Note, StoreError>;

    async fn update_note(&self, note_id: &str, content: &str) -> Result<(), StoreError>;

    /// All questions for a meeting, newest first.
    async fn questions(&self, meeting_id: &str) -> Result<Vec<Question>, StoreError>;

    async fn create_question(&self, question: &Question) -> Result<(), StoreError>;

    async fn set_question_upvotes(
        &self,
        question_id: &str,
        upvotes: &[String],
    ) -> Result<(), StoreError>;

    async fn set_question_answered(
        &self,
        question_id: &str,
        answered: bool,
    ) -> Result<(), StoreError>;

    /// Look up whether an account is registered for the email. `Ok(None)`
    /// means "not registered" and is distinct from a lookup failure.
    async fn registered_user(&self, email: &str)
        -> Result<Option<RegisteredUser>, StoreError>;
}

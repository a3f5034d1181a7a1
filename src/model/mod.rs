//! Domain types shared by the backend boundary, sync engine, API and CLI.
//!
//! Fields serialize in camelCase to match the hosted backend's column names,
//! so every type here can be sent over the row API unchanged.

use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Author sentinel for the per-meeting shared note.
pub const SHARED_NOTE_AUTHOR: &str = "shared";

const MEETING_CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const MEETING_CODE_LEN: usize = 10;

/// A single item on a meeting's agenda. Order within the agenda list is
/// presentation order; identity is the id, not the position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaItem {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Planned duration in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
}

/// A meeting participant. The email is the stable natural key; name and
/// color are only present once the entry has been resolved against a
/// registered account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Participant {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            email: email.into(),
            name: None,
            color: None,
        }
    }

    /// Strip down to the fields the meeting row actually stores. Name and
    /// color are looked up again at read time, never persisted.
    pub fn to_stored(&self) -> StoredParticipant {
        StoredParticipant {
            id: self.id.clone(),
            email: self.email.clone(),
        }
    }
}

/// The persisted shape of a participant entry on the meeting row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredParticipant {
    pub id: String,
    pub email: String,
}

/// A registered account a participant email can resolve to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub color: String,
}

impl RegisteredUser {
    pub fn into_participant(self) -> Participant {
        Participant {
            id: self.id,
            email: self.email,
            name: Some(self.name),
            color: Some(self.color),
        }
    }
}

/// A meeting row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: String,
    pub created_by: String,
    pub title: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub agenda: Vec<AgendaItem>,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub completed: bool,
}

impl Meeting {
    pub fn has_started(&self) -> bool {
        Utc::now() >= self.start_date
    }
}

/// A personal or shared note. `created_by` is a participant id, or
/// [`SHARED_NOTE_AUTHOR`] for the meeting-wide shared note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub meeting_id: String,
    pub created_by: String,
    pub content: String,
}

impl Note {
    /// An empty note for lazy first-access creation.
    pub fn empty(meeting_id: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            meeting_id: meeting_id.into(),
            created_by: created_by.into(),
            content: String::new(),
        }
    }

    pub fn is_shared(&self) -> bool {
        self.created_by == SHARED_NOTE_AUTHOR
    }
}

/// An audience question with upvotes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub meeting_id: String,
    pub question: String,
    #[serde(default)]
    pub upvotes: Vec<String>,
    #[serde(default)]
    pub answered: bool,
    pub created_at: DateTime<Utc>,
}

impl Question {
    pub fn new(meeting_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            meeting_id: meeting_id.into(),
            question: question.into(),
            upvotes: Vec::new(),
            answered: false,
            created_at: Utc::now(),
        }
    }

    pub fn upvoted_by(&self, participant_id: &str) -> bool {
        self.upvotes.iter().any(|id| id == participant_id)
    }

    /// The upvote set after the given participant toggles their vote:
    /// present → removed, absent → appended. Never produces duplicates.
    pub fn toggled_upvotes(&self, participant_id: &str) -> Vec<String> {
        if self.upvoted_by(participant_id) {
            self.upvotes
                .iter()
                .filter(|id| id.as_str() != participant_id)
                .cloned()
                .collect()
        } else {
            let mut upvotes = self.upvotes.clone();
            upvotes.push(participant_id.to_string());
            upvotes
        }
    }
}

/// Random UUID for note/question/agenda/participant rows.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Short human-shareable meeting code, 10 chars from A-Z0-9.
pub fn new_meeting_code() -> String {
    let mut rng = rand::rng();
    (0..MEETING_CODE_LEN)
        .map(|_| MEETING_CODE_ALPHABET[rng.random_range(0..MEETING_CODE_ALPHABET.len())] as char)
        .collect()
}

pub fn is_meeting_code(text: &str) -> bool {
    Regex::new(r"^[A-Z0-9]{10}$")
        .expect("meeting code pattern is valid")
        .is_match(text)
}

/// First letters of the first and last name part, upper-cased.
pub fn name_initials(name: &str) -> String {
    let parts: Vec<&str> = name.split_whitespace().collect();
    let mut initials = String::new();
    if let Some(first) = parts.first() {
        initials.extend(first.chars().next().map(|c| c.to_ascii_uppercase()));
    }
    if parts.len() > 1 {
        if let Some(last) = parts.last() {
            initials.extend(last.chars().next().map(|c| c.to_ascii_uppercase()));
        }
    }
    initials
}

/// A time difference split into display units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeSplit {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

/// Time between two instants, clamped at zero, split for countdown display.
pub fn time_between(from: DateTime<Utc>, until: DateTime<Utc>) -> TimeSplit {
    let total = (until - from).num_seconds().max(0);
    TimeSplit {
        days: total / 86_400,
        hours: (total % 86_400) / 3_600,
        minutes: (total % 3_600) / 60,
        seconds: total % 60,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_meeting_code_shape() {
        let code = new_meeting_code();
        assert_eq!(code.len(), 10);
        assert!(code
            .bytes()
            .all(|b| MEETING_CODE_ALPHABET.contains(&b)));
        assert!(is_meeting_code(&code));
    }

    #[test]
    fn test_meeting_code_validation() {
        assert!(is_meeting_code("ABC123XYZ0"));
        assert!(!is_meeting_code("abc123xyz0"));
        assert!(!is_meeting_code("SHORT"));
        assert!(!is_meeting_code("TOOLONGCODE1"));
        assert!(!is_meeting_code(""));
    }

    #[test]
    fn test_toggle_upvote_adds_then_removes() {
        let mut question = Question::new("M1", "Why?");
        assert!(question.upvotes.is_empty());

        let upvoted = question.toggled_upvotes("u1");
        assert_eq!(upvoted, vec!["u1".to_string()]);

        question.upvotes = upvoted;
        let removed = question.toggled_upvotes("u1");
        assert!(removed.is_empty());
    }

    #[test]
    fn test_toggle_upvote_keeps_other_voters() {
        let mut question = Question::new("M1", "Why?");
        question.upvotes = vec!["u1".to_string(), "u2".to_string()];

        let after = question.toggled_upvotes("u1");
        assert_eq!(after, vec!["u2".to_string()]);
    }

    #[test]
    fn test_toggle_upvote_never_duplicates() {
        let mut question = Question::new("M1", "Why?");
        question.upvotes = vec!["u1".to_string()];

        question.upvotes = question.toggled_upvotes("u2");
        assert_eq!(
            question.upvotes,
            vec!["u1".to_string(), "u2".to_string()]
        );
        question.upvotes = question.toggled_upvotes("u2");
        question.upvotes = question.toggled_upvotes("u2");
        assert_eq!(
            question.upvotes,
            vec!["u1".to_string(), "u2".to_string()]
        );
    }

    #[test]
    fn test_question_serializes_camel_case() {
        let question = Question::new("M1", "What about scope?");
        let json = serde_json::to_value(&question).unwrap();
        assert!(json.get("meetingId").is_some());
        assert!(json.get("createdAt").is_some());
        assert_eq!(json.get("answered"), Some(&serde_json::Value::Bool(false)));
    }

    #[test]
    fn test_meeting_deserializes_with_missing_optionals() {
        let json = r#"{
            "id": "ABC123XYZ0",
            "createdBy": "u1",
            "title": "Weekly",
            "startDate": "2026-01-05T09:00:00Z",
            "endDate": "2026-01-05T10:00:00Z"
        }"#;
        let meeting: Meeting = serde_json::from_str(json).unwrap();
        assert!(meeting.agenda.is_empty());
        assert!(meeting.participants.is_empty());
        assert!(!meeting.completed);
        assert!(meeting.location.is_none());
    }

    #[test]
    fn test_stored_participant_drops_resolution_fields() {
        let participant = Participant {
            id: "u1".to_string(),
            email: "a@x.com".to_string(),
            name: Some("Ada".to_string()),
            color: Some("#ff0000".to_string()),
        };
        let stored = serde_json::to_value(participant.to_stored()).unwrap();
        assert_eq!(stored.get("email").unwrap(), "a@x.com");
        assert!(stored.get("name").is_none());
        assert!(stored.get("color").is_none());
    }

    #[test]
    fn test_note_empty_and_shared_sentinel() {
        let note = Note::empty("M1", SHARED_NOTE_AUTHOR);
        assert_eq!(note.content, "");
        assert!(note.is_shared());
        assert!(!Note::empty("M1", "u1").is_shared());
    }

    #[test]
    fn test_name_initials() {
        assert_eq!(name_initials("Ada Lovelace"), "AL");
        assert_eq!(name_initials("Ada Augusta Lovelace"), "AL");
        assert_eq!(name_initials("ada"), "A");
        assert_eq!(name_initials(""), "");
    }

    #[test]
    fn test_time_between_splits_and_clamps() {
        let from = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2026, 1, 6, 10, 30, 45).unwrap();
        let split = time_between(from, until);
        assert_eq!(split.days, 1);
        assert_eq!(split.hours, 1);
        assert_eq!(split.minutes, 30);
        assert_eq!(split.seconds, 45);

        let negative = time_between(until, from);
        assert_eq!(negative.days, 0);
        assert_eq!(negative.seconds, 0);
    }
}

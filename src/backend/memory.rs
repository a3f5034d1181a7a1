//! In-process backend implementing both seams.
//!
//! Rows live in maps behind a mutex; change events fan out over a tokio
//! broadcast channel the same way the hosted feed does over the wire.
//! Used by the test suite and by `backend.mode = "memory"` demo runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, Mutex};

use crate::model::{Meeting, Note, Participant, Question, RegisteredUser};

use super::feed::{
    ChangeEvent, ChangeFeed, ChangeKind, ChangePayload, EventFilter, Subscription, Table,
};
use super::store::{MeetingStore, StoreError};

#[derive(Default)]
struct TableData {
    meetings: HashMap<String, Meeting>,
    notes: Vec<Note>,
    questions: Vec<Question>,
    users: Vec<RegisteredUser>,
}

#[derive(Clone)]
pub struct MemoryBackend {
    tables: Arc<Mutex<TableData>>,
    events: broadcast::Sender<(Table, ChangeEvent)>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            tables: Arc::new(Mutex::new(TableData::default())),
            events,
        }
    }

    /// Register an account so email resolution can find it.
    pub async fn add_user(&self, user: RegisteredUser) {
        self.tables.lock().await.users.push(user);
    }

    /// Number of note rows for (meeting, author). Test helper.
    pub async fn note_count(&self, meeting_id: &str, author: &str) -> usize {
        self.tables
            .lock()
            .await
            .notes
            .iter()
            .filter(|n| n.meeting_id == meeting_id && n.created_by == author)
            .count()
    }

    fn publish(&self, table: Table, kind: ChangeKind, payload: ChangePayload) {
        // No receivers is fine; events are fire-and-forget.
        let _ = self.events.send((table, ChangeEvent { kind, payload }));
    }
}

#[async_trait]
impl MeetingStore for MemoryBackend {
    async fn meeting(&self, id: &str) -> Result<Meeting, StoreError> {
        self.tables
            .lock()
            .await
            .meetings
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn open_meetings(&self) -> Result<Vec<Meeting>, StoreError> {
        let tables = self.tables.lock().await;
        let mut meetings: Vec<Meeting> = tables
            .meetings
            .values()
            .filter(|m| !m.completed)
            .cloned()
            .collect();
        meetings.sort_by_key(|m| m.start_date);
        Ok(meetings)
    }

    async fn create_meeting(&self, meeting: &Meeting) -> Result<(), StoreError> {
        self.tables
            .lock()
            .await
            .meetings
            .insert(meeting.id.clone(), meeting.clone());
        self.publish(
            Table::Meetings,
            ChangeKind::Insert,
            ChangePayload::Meeting(meeting.clone()),
        );
        Ok(())
    }

    async fn update_participants(
        &self,
        meeting_id: &str,
        participants: &[Participant],
    ) -> Result<(), StoreError> {
        let updated = {
            let mut tables = self.tables.lock().await;
            let meeting = tables
                .meetings
                .get_mut(meeting_id)
                .ok_or(StoreError::NotFound)?;
            meeting.participants = participants
                .iter()
                .map(|p| {
                    let stored = p.to_stored();
                    Participant {
                        id: stored.id,
                        email: stored.email,
                        name: None,
                        color: None,
                    }
                })
                .collect();
            meeting.clone()
        };
        self.publish(
            Table::Meetings,
            ChangeKind::Update,
            ChangePayload::Meeting(updated),
        );
        Ok(())
    }

    async fn set_meeting_ended(
        &self,
        meeting_id: &str,
        ended_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let updated = {
            let mut tables = self.tables.lock().await;
            let meeting = tables
                .meetings
                .get_mut(meeting_id)
                .ok_or(StoreError::NotFound)?;
            meeting.end_date = ended_at;
            meeting.clone()
        };
        self.publish(
            Table::Meetings,
            ChangeKind::Update,
            ChangePayload::Meeting(updated),
        );
        Ok(())
    }

    async fn set_meeting_completed(&self, meeting_id: &str) -> Result<(), StoreError> {
        let updated = {
            let mut tables = self.tables.lock().await;
            let meeting = tables
                .meetings
                .get_mut(meeting_id)
                .ok_or(StoreError::NotFound)?;
            meeting.completed = true;
            meeting.clone()
        };
        self.publish(
            Table::Meetings,
            ChangeKind::Update,
            ChangePayload::Meeting(updated),
        );
        Ok(())
    }

    async fn note(&self, meeting_id: &str, author: &str) -> Result<Note, StoreError> {
        self.tables
            .lock()
            .await
            .notes
            .iter()
            .find(|n| n.meeting_id == meeting_id && n.created_by == author)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn create_note(&self, note: &Note) -> Result<Note, StoreError> {
        self.tables.lock().await.notes.push(note.clone());
        self.publish(
            Table::Notes,
            ChangeKind::Insert,
            ChangePayload::Note(note.clone()),
        );
        Ok(note.clone())
    }

    async fn update_note(&self, note_id: &str, content: &str) -> Result<(), StoreError> {
        let updated = {
            let mut tables = self.tables.lock().await;
            let note = tables
                .notes
                .iter_mut()
                .find(|n| n.id == note_id)
                .ok_or(StoreError::NotFound)?;
            note.content = content.to_string();
            note.clone()
        };
        self.publish(
            Table::Notes,
            ChangeKind::Update,
            ChangePayload::Note(updated),
        );
        Ok(())
    }

    async fn questions(&self, meeting_id: &str) -> Result<Vec<Question>, StoreError> {
        let tables = self.tables.lock().await;
        let mut questions: Vec<Question> = tables
            .questions
            .iter()
            .filter(|q| q.meeting_id == meeting_id)
            .cloned()
            .collect();
        questions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(questions)
    }

    async fn create_question(&self, question: &Question) -> Result<(), StoreError> {
        self.tables.lock().await.questions.push(question.clone());
        self.publish(
            Table::Questions,
            ChangeKind::Insert,
            ChangePayload::Questions {
                meeting_id: question.meeting_id.clone(),
            },
        );
        Ok(())
    }

    async fn set_question_upvotes(
        &self,
        question_id: &str,
        upvotes: &[String],
    ) -> Result<(), StoreError> {
        let meeting_id = {
            let mut tables = self.tables.lock().await;
            let question = tables
                .questions
                .iter_mut()
                .find(|q| q.id == question_id)
                .ok_or(StoreError::NotFound)?;
            question.upvotes = upvotes.to_vec();
            question.meeting_id.clone()
        };
        self.publish(
            Table::Questions,
            ChangeKind::Update,
            ChangePayload::Questions { meeting_id },
        );
        Ok(())
    }

    async fn set_question_answered(
        &self,
        question_id: &str,
        answered: bool,
    ) -> Result<(), StoreError> {
        let meeting_id = {
            let mut tables = self.tables.lock().await;
            let question = tables
                .questions
                .iter_mut()
                .find(|q| q.id == question_id)
                .ok_or(StoreError::NotFound)?;
            question.answered = answered;
            question.meeting_id.clone()
        };
        self.publish(
            Table::Questions,
            ChangeKind::Update,
            ChangePayload::Questions { meeting_id },
        );
        Ok(())
    }

    async fn registered_user(
        &self,
        email: &str,
    ) -> Result<Option<RegisteredUser>, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }
}

#[async_trait]
impl ChangeFeed for MemoryBackend {
    async fn subscribe(
        &self,
        table: Table,
        meeting_id: &str,
        filter: EventFilter,
    ) -> Result<Subscription, StoreError> {
        let mut events = self.events.subscribe();
        let (tx, rx) = mpsc::channel(64);
        let meeting_id = meeting_id.to_string();

        let bridge = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok((event_table, event)) => {
                        if event_table != table
                            || event.payload.meeting_id() != meeting_id
                            || !filter.matches(event.kind)
                        {
                            continue;
                        }
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(Subscription::new(rx, move || bridge.abort()))
    }
}

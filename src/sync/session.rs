//! Live meeting session.
//!
//! Seeds [`LiveState`] from a meeting snapshot, adopts or lazily creates
//! the viewer's personal note and the meeting's shared note, loads the
//! question list, resolves participants, then keeps everything current
//! from three change feeds. Mutations write to the store only; local
//! state changes arrive back through the feeds, never optimistically.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backend::{
    ChangeFeed, ChangeKind, ChangePayload, EventFilter, MeetingStore, StoreError, Table,
};
use crate::model::{Meeting, Note, Question, SHARED_NOTE_AUTHOR};
use crate::sync::roster::resolve_participants;
use crate::sync::state::{LiveState, LiveStateHandle};

/// One-shot guard for lazy note creation. `begin()` atomically checks and
/// sets: the first caller wins, every later caller sees `false`.
#[derive(Default)]
struct CreateOnce(AtomicBool);

impl CreateOnce {
    fn begin(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }
}

pub struct MeetingSession {
    meeting_id: String,
    viewer_id: String,
    store: Arc<dyn MeetingStore>,
    state: LiveStateHandle,
    personal_note_guard: CreateOnce,
    shared_note_guard: CreateOnce,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MeetingSession {
    /// Initialize from a meeting snapshot and start the three feed tasks.
    ///
    /// Fails on any read error other than a missing note row; a missing
    /// note is created empty, exactly once, and adopted.
    pub async fn start(
        store: Arc<dyn MeetingStore>,
        feed: Arc<dyn ChangeFeed>,
        meeting: Meeting,
        viewer_id: &str,
    ) -> Result<Self> {
        let session = Self {
            meeting_id: meeting.id.clone(),
            viewer_id: viewer_id.to_string(),
            store: store.clone(),
            state: LiveStateHandle::new(LiveState::from_snapshot(&meeting)),
            personal_note_guard: CreateOnce::default(),
            shared_note_guard: CreateOnce::default(),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        };

        if let Some(note) = session
            .fetch_or_create_note(viewer_id, &session.personal_note_guard)
            .await
            .context("Failed to load personal note")?
        {
            session.state.apply_note(note).await;
        }

        if let Some(note) = session
            .fetch_or_create_note(SHARED_NOTE_AUTHOR, &session.shared_note_guard)
            .await
            .context("Failed to load shared note")?
        {
            session.state.apply_note(note).await;
        }

        let questions = store
            .questions(&session.meeting_id)
            .await
            .context("Failed to load meeting questions")?;
        session.state.apply_questions(questions).await;

        let resolved = resolve_participants(store.as_ref(), &meeting.participants).await;
        session.state.apply_participants(resolved).await;

        session.spawn_feed_tasks(feed).await?;

        info!(
            "Meeting session started for {} (viewer {})",
            session.meeting_id, session.viewer_id
        );
        Ok(session)
    }

    pub fn meeting_id(&self) -> &str {
        &self.meeting_id
    }

    pub fn viewer_id(&self) -> &str {
        &self.viewer_id
    }

    /// The observable live state.
    pub fn state(&self) -> &LiveStateHandle {
        &self.state
    }

    /// Fetch the note for `author`, falling back to guarded creation when
    /// the row does not exist yet. Returns `None` when another caller is
    /// already creating the row (the feed will deliver it).
    async fn fetch_or_create_note(
        &self,
        author: &str,
        guard: &CreateOnce,
    ) -> Result<Option<Note>, StoreError> {
        match self.store.note(&self.meeting_id, author).await {
            Ok(note) => Ok(Some(note)),
            Err(StoreError::NotFound) => {
                if guard.begin() {
                    let created = self
                        .store
                        .create_note(&Note::empty(&self.meeting_id, author))
                        .await?;
                    Ok(Some(created))
                } else {
                    Ok(None)
                }
            }
            Err(err) => Err(err),
        }
    }

    async fn spawn_feed_tasks(&self, feed: Arc<dyn ChangeFeed>) -> Result<()> {
        let mut meeting_sub = feed
            .subscribe(Table::Meetings, &self.meeting_id, EventFilter::All)
            .await
            .context("Failed to subscribe to meeting changes")?;
        let mut note_sub = feed
            .subscribe(
                Table::Notes,
                &self.meeting_id,
                EventFilter::Only(ChangeKind::Update),
            )
            .await
            .context("Failed to subscribe to note changes")?;
        let mut question_sub = feed
            .subscribe(Table::Questions, &self.meeting_id, EventFilter::All)
            .await
            .context("Failed to subscribe to question changes")?;

        let mut tasks = self.tasks.lock().await;

        // Meeting row: replace agenda + participants (re-resolved) and
        // fold in the completion flag.
        let state = self.state.clone();
        let store = self.store.clone();
        let cancel = self.cancel.clone();
        tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = meeting_sub.next() => {
                        let Some(event) = event else { break };
                        if let ChangePayload::Meeting(meeting) = event.payload {
                            let participants =
                                resolve_participants(store.as_ref(), &meeting.participants).await;
                            state
                                .apply_meeting(meeting.agenda, participants, meeting.completed)
                                .await;
                        }
                    }
                }
            }
            meeting_sub.unsubscribe();
        }));

        // Notes: full replacement of whichever slot the author maps to.
        let state = self.state.clone();
        let cancel = self.cancel.clone();
        tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = note_sub.next() => {
                        let Some(event) = event else { break };
                        if let ChangePayload::Note(note) = event.payload {
                            state.apply_note(note).await;
                        }
                    }
                }
            }
            note_sub.unsubscribe();
        }));

        // Questions: any event invalidates the list; re-fetch wholesale.
        let state = self.state.clone();
        let store = self.store.clone();
        let cancel = self.cancel.clone();
        let meeting_id = self.meeting_id.clone();
        tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = question_sub.next() => {
                        if event.is_none() { break };
                        match store.questions(&meeting_id).await {
                            Ok(questions) => state.apply_questions(questions).await,
                            Err(err) => {
                                warn!("Failed to refresh questions for {}: {}", meeting_id, err);
                            }
                        }
                    }
                }
            }
            question_sub.unsubscribe();
        }));

        Ok(())
    }

    pub async fn update_personal_note(&self, content: &str) -> Result<()> {
        let note = self
            .state
            .get()
            .await
            .personal_note
            .context("Personal note is not loaded yet")?;
        self.store
            .update_note(&note.id, content)
            .await
            .context("Failed to update personal note")?;
        Ok(())
    }

    pub async fn update_shared_note(&self, content: &str) -> Result<()> {
        let note = self
            .state
            .get()
            .await
            .shared_note
            .context("Shared note is not loaded yet")?;
        self.store
            .update_note(&note.id, content)
            .await
            .context("Failed to update shared note")?;
        Ok(())
    }

    /// Toggle the viewer's upvote on a question and write the full
    /// resulting set. Last writer wins.
    pub async fn toggle_upvote(&self, question_id: &str) -> Result<()> {
        let state = self.state.get().await;
        let question = state
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .with_context(|| format!("Unknown question: {question_id}"))?;
        let upvotes = question.toggled_upvotes(&self.viewer_id);
        self.store
            .set_question_upvotes(question_id, &upvotes)
            .await
            .context("Failed to update upvotes")?;
        Ok(())
    }

    pub async fn toggle_answered(&self, question_id: &str) -> Result<()> {
        let state = self.state.get().await;
        let question = state
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .with_context(|| format!("Unknown question: {question_id}"))?;
        self.store
            .set_question_answered(question_id, !question.answered)
            .await
            .context("Failed to update answered flag")?;
        Ok(())
    }

    pub async fn add_question(&self, text: &str) -> Result<Question> {
        let question = Question::new(&self.meeting_id, text);
        self.store
            .create_question(&question)
            .await
            .context("Failed to create question")?;
        Ok(question)
    }

    /// Record the end timestamp, then the completion flag. The completion
    /// write is only attempted once the end timestamp is stored.
    pub async fn mark_completed(&self) -> Result<()> {
        self.store
            .set_meeting_ended(&self.meeting_id, Utc::now())
            .await
            .context("Failed to record meeting end time")?;
        self.store
            .set_meeting_completed(&self.meeting_id)
            .await
            .context("Failed to mark meeting completed")?;
        Ok(())
    }

    /// Cancel the feed tasks, unsubscribe, and close the state handle so
    /// anything still in flight lands in a no-op.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.state.close();
        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            if let Err(err) = task.await {
                if !err.is_cancelled() {
                    warn!("Feed task ended abnormally: {}", err);
                }
            }
        }
        info!("Meeting session for {} shut down", self.meeting_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_once_first_caller_wins() {
        let guard = CreateOnce::default();
        assert!(guard.begin());
        assert!(!guard.begin());
        assert!(!guard.begin());
    }

    #[test]
    fn test_create_once_race_free_across_threads() {
        let guard = Arc::new(CreateOnce::default());
        let winners: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let guard = guard.clone();
                    scope.spawn(move || usize::from(guard.begin()))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });
        assert_eq!(winners, 1);
    }
}

//! End-to-end session behavior over the in-process backend: note
//! adoption and lazy creation, feed reconciliation, mutation round trips,
//! completion ordering, and teardown.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use meetsync::backend::{ChangeFeed, MeetingStore, MemoryBackend, StoreError};
use meetsync::model::{
    Meeting, Note, Participant, Question, RegisteredUser, SHARED_NOTE_AUTHOR,
};
use meetsync::sync::{LiveState, LiveStateHandle, MeetingSession};

fn meeting(id: &str, participants: Vec<Participant>) -> Meeting {
    let now = Utc::now();
    Meeting {
        id: id.to_string(),
        created_by: "u1".to_string(),
        title: "Planning".to_string(),
        start_date: now,
        end_date: now + chrono::Duration::hours(1),
        location: None,
        description: None,
        agenda: Vec::new(),
        participants,
        completed: false,
    }
}

async fn start_session(
    backend: &MemoryBackend,
    meeting: Meeting,
    viewer_id: &str,
) -> MeetingSession {
    backend.create_meeting(&meeting).await.unwrap();
    let store: Arc<dyn MeetingStore> = Arc::new(backend.clone());
    let feed: Arc<dyn ChangeFeed> = Arc::new(backend.clone());
    MeetingSession::start(store, feed, meeting, viewer_id)
        .await
        .unwrap()
}

/// Poll the live state until the predicate holds. Feed delivery is
/// asynchronous, so assertions on synced state go through here.
async fn wait_for(handle: &LiveStateHandle, predicate: impl Fn(&LiveState) -> bool) -> LiveState {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let state = handle.get().await;
        if predicate(&state) {
            return state;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time: {state:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn initialization_creates_missing_notes_exactly_once() {
    let backend = MemoryBackend::new();
    let session = start_session(&backend, meeting("MTG0000001", Vec::new()), "u1").await;

    let state = session.state().get().await;
    let personal = state.personal_note.expect("personal note adopted");
    assert_eq!(personal.content, "");
    assert_eq!(personal.created_by, "u1");
    let shared = state.shared_note.expect("shared note adopted");
    assert_eq!(shared.content, "");
    assert_eq!(shared.created_by, SHARED_NOTE_AUTHOR);

    assert_eq!(backend.note_count("MTG0000001", "u1").await, 1);
    assert_eq!(backend.note_count("MTG0000001", SHARED_NOTE_AUTHOR).await, 1);

    session.shutdown().await;
}

#[tokio::test]
async fn initialization_adopts_existing_notes() {
    let backend = MemoryBackend::new();
    let mut existing = Note::empty("MTG0000002", "u1");
    existing.content = "carried over".to_string();
    backend.create_note(&existing).await.unwrap();

    let session = start_session(&backend, meeting("MTG0000002", Vec::new()), "u1").await;

    let state = session.state().get().await;
    assert_eq!(state.personal_note.unwrap().content, "carried over");
    assert_eq!(backend.note_count("MTG0000002", "u1").await, 1);

    session.shutdown().await;
}

#[tokio::test]
async fn unregistered_participants_stay_unchanged() {
    let backend = MemoryBackend::new();
    let input = vec![Participant::new("a@x.com")];
    let session =
        start_session(&backend, meeting("MTG0000003", input.clone()), "u1").await;

    let state = session.state().get().await;
    assert_eq!(state.participants, input);

    session.shutdown().await;
}

#[tokio::test]
async fn meeting_feed_replaces_roster_and_keeps_completion_monotonic() {
    let backend = MemoryBackend::new();
    backend
        .add_user(RegisteredUser {
            id: "acct-9".to_string(),
            email: "b@x.com".to_string(),
            name: "Grace".to_string(),
            color: "#123456".to_string(),
        })
        .await;

    let session = start_session(&backend, meeting("MTG0000004", Vec::new()), "u1").await;

    // Another client replaces the participant list; the feed event
    // re-resolves it.
    backend
        .update_participants("MTG0000004", &[Participant::new("b@x.com")])
        .await
        .unwrap();
    let state = wait_for(session.state(), |s| !s.participants.is_empty()).await;
    assert_eq!(state.participants[0].id, "acct-9");
    assert_eq!(state.participants[0].name.as_deref(), Some("Grace"));

    backend.set_meeting_completed("MTG0000004").await.unwrap();
    wait_for(session.state(), |s| s.completed).await;

    // A later row update without the flag must not clear it.
    backend
        .update_participants("MTG0000004", &[Participant::new("b@x.com")])
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(session.state().get().await.completed);

    session.shutdown().await;
}

#[tokio::test]
async fn note_feed_routes_shared_and_personal_updates() {
    let backend = MemoryBackend::new();
    let session = start_session(&backend, meeting("MTG0000005", Vec::new()), "u1").await;

    let state = session.state().get().await;
    let shared_id = state.shared_note.unwrap().id;
    let personal_id = state.personal_note.unwrap().id;

    // A collaborator writes the shared note directly.
    backend.update_note(&shared_id, "shared text").await.unwrap();
    wait_for(session.state(), |s| {
        s.shared_note.as_ref().is_some_and(|n| n.content == "shared text")
    })
    .await;

    // The viewer's own write comes back through the feed as well.
    session.update_personal_note("my text").await.unwrap();
    let state = wait_for(session.state(), |s| {
        s.personal_note.as_ref().is_some_and(|n| n.content == "my text")
    })
    .await;
    assert_eq!(state.personal_note.unwrap().id, personal_id);

    session.shutdown().await;
}

#[tokio::test]
async fn question_round_trip_upvote_and_answered() {
    let backend = MemoryBackend::new();
    let session = start_session(&backend, meeting("MTG0000006", Vec::new()), "u1").await;

    let question = session.add_question("Will this ship?").await.unwrap();
    wait_for(session.state(), |s| s.questions.len() == 1).await;

    session.toggle_upvote(&question.id).await.unwrap();
    wait_for(session.state(), |s| {
        s.questions[0].upvotes == vec!["u1".to_string()]
    })
    .await;

    session.toggle_upvote(&question.id).await.unwrap();
    wait_for(session.state(), |s| s.questions[0].upvotes.is_empty()).await;

    session.toggle_answered(&question.id).await.unwrap();
    wait_for(session.state(), |s| s.questions[0].answered).await;
    session.toggle_answered(&question.id).await.unwrap();
    wait_for(session.state(), |s| !s.questions[0].answered).await;

    session.shutdown().await;
}

#[tokio::test]
async fn questions_arrive_newest_first() {
    let backend = MemoryBackend::new();
    let session = start_session(&backend, meeting("MTG0000007", Vec::new()), "u1").await;

    let mut earlier = Question::new("MTG0000007", "first");
    earlier.created_at = Utc::now() - chrono::Duration::minutes(10);
    backend.create_question(&earlier).await.unwrap();
    backend
        .create_question(&Question::new("MTG0000007", "second"))
        .await
        .unwrap();

    let state = wait_for(session.state(), |s| s.questions.len() == 2).await;
    assert_eq!(state.questions[0].question, "second");
    assert_eq!(state.questions[1].question, "first");

    session.shutdown().await;
}

#[tokio::test]
async fn mark_completed_writes_end_timestamp_then_flag() {
    let backend = MemoryBackend::new();
    let session = start_session(&backend, meeting("MTG0000008", Vec::new()), "u1").await;

    let before = backend.meeting("MTG0000008").await.unwrap().end_date;
    session.mark_completed().await.unwrap();

    let stored = backend.meeting("MTG0000008").await.unwrap();
    assert!(stored.completed);
    assert_ne!(stored.end_date, before);

    wait_for(session.state(), |s| s.completed).await;
    session.shutdown().await;
}

#[tokio::test]
async fn completion_flag_not_written_when_end_write_fails() {
    let backend = MemoryBackend::new();
    backend
        .create_meeting(&meeting("MTG0000009", Vec::new()))
        .await
        .unwrap();

    let store: Arc<dyn MeetingStore> = Arc::new(EndWriteFails {
        inner: backend.clone(),
    });
    let feed: Arc<dyn ChangeFeed> = Arc::new(backend.clone());
    let session = MeetingSession::start(
        store,
        feed,
        meeting("MTG0000009", Vec::new()),
        "u1",
    )
    .await
    .unwrap();

    assert!(session.mark_completed().await.is_err());

    let stored = backend.meeting("MTG0000009").await.unwrap();
    assert!(!stored.completed);
    assert!(!session.state().get().await.completed);

    session.shutdown().await;
}

#[tokio::test]
async fn no_state_updates_after_shutdown() {
    let backend = MemoryBackend::new();
    let session = start_session(&backend, meeting("MTG0000010", Vec::new()), "u1").await;
    let handle = session.state().clone();

    session.shutdown().await;

    backend
        .create_question(&Question::new("MTG0000010", "anyone there?"))
        .await
        .unwrap();
    backend.set_meeting_completed("MTG0000010").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let state = handle.get().await;
    assert!(state.questions.is_empty());
    assert!(!state.completed);
}

/// Store double whose end-timestamp write always fails; everything else
/// passes through to the in-process backend.
struct EndWriteFails {
    inner: MemoryBackend,
}

#[async_trait]
impl MeetingStore for EndWriteFails {
    async fn meeting(&self, id: &str) -> Result<Meeting, StoreError> {
        self.inner.meeting(id).await
    }

    async fn open_meetings(&self) -> Result<Vec<Meeting>, StoreError> {
        self.inner.open_meetings().await
    }

    async fn create_meeting(&self, meeting: &Meeting) -> Result<(), StoreError> {
        self.inner.create_meeting(meeting).await
    }

    async fn update_participants(
        &self,
        meeting_id: &str,
        participants: &[Participant],
    ) -> Result<(), StoreError> {
        self.inner.update_participants(meeting_id, participants).await
    }

    async fn set_meeting_ended(
        &self,
        _meeting_id: &str,
        _ended_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        Err(StoreError::Rejected {
            status: 503,
            message: "maintenance window".to_string(),
        })
    }

    async fn set_meeting_completed(&self, meeting_id: &str) -> Result<(), StoreError> {
        self.inner.set_meeting_completed(meeting_id).await
    }

    async fn note(&self, meeting_id: &str, author: &str) -> Result<Note, StoreError> {
        self.inner.note(meeting_id, author).await
    }

    async fn create_note(&self, note: &Note) -> Result<Note, StoreError> {
        self.inner.create_note(note).await
    }

    async fn update_note(&self, note_id: &str, content: &str) -> Result<(), StoreError> {
        self.inner.update_note(note_id, content).await
    }

    async fn questions(&self, meeting_id: &str) -> Result<Vec<Question>, StoreError> {
        self.inner.questions(meeting_id).await
    }

    async fn create_question(&self, question: &Question) -> Result<(), StoreError> {
        self.inner.create_question(question).await
    }

    async fn set_question_upvotes(
        &self,
        question_id: &str,
        upvotes: &[String],
    ) -> Result<(), StoreError> {
        self.inner.set_question_upvotes(question_id, upvotes).await
    }

    async fn set_question_answered(
        &self,
        question_id: &str,
        answered: bool,
    ) -> Result<(), StoreError> {
        self.inner.set_question_answered(question_id, answered).await
    }

    async fn registered_user(
        &self,
        email: &str,
    ) -> Result<Option<RegisteredUser>, StoreError> {
        self.inner.registered_user(email).await
    }
}

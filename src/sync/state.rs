//! Locally-observable meeting state and its shared handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::debug;

use crate::model::{AgendaItem, Meeting, Note, Participant, Question};

/// The live mirror of one meeting's mutable sub-resources.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveState {
    pub participants: Vec<Participant>,
    pub agenda: Vec<AgendaItem>,
    pub personal_note: Option<Note>,
    pub shared_note: Option<Note>,
    pub questions: Vec<Question>,
    pub completed: bool,
}

impl LiveState {
    pub fn from_snapshot(meeting: &Meeting) -> Self {
        Self {
            participants: meeting.participants.clone(),
            agenda: meeting.agenda.clone(),
            personal_note: None,
            shared_note: None,
            questions: Vec::new(),
            completed: meeting.completed,
        }
    }
}

/// Cloneable handle sharing [`LiveState`] between the session's feed tasks
/// and its observers. Each apply method replaces exactly one slice of the
/// state and bumps a revision observers can await. After [`close`], every
/// apply becomes a no-op so late deliveries cannot touch torn-down state.
///
/// [`close`]: LiveStateHandle::close
#[derive(Clone)]
pub struct LiveStateHandle {
    inner: Arc<Mutex<LiveState>>,
    revision: Arc<watch::Sender<u64>>,
    closed: Arc<AtomicBool>,
}

impl LiveStateHandle {
    pub fn new(initial: LiveState) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(initial)),
            revision: Arc::new(revision),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn get(&self) -> LiveState {
        self.inner.lock().await.clone()
    }

    /// Revision counter, bumped on every applied change.
    pub fn watch_revision(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Replace agenda + participants and fold in the completion flag.
    /// Completion is monotonic: a `false` in the incoming row never
    /// clears a locally-known `true`.
    pub async fn apply_meeting(
        &self,
        agenda: Vec<AgendaItem>,
        participants: Vec<Participant>,
        completed: bool,
    ) {
        if self.is_closed() {
            debug!("Dropping meeting update after close");
            return;
        }
        {
            let mut state = self.inner.lock().await;
            state.agenda = agenda;
            state.participants = participants;
            state.completed = state.completed || completed;
        }
        self.bump();
    }

    pub async fn apply_participants(&self, participants: Vec<Participant>) {
        if self.is_closed() {
            return;
        }
        self.inner.lock().await.participants = participants;
        self.bump();
    }

    /// Route a note into its slot: shared-sentinel author → shared note,
    /// anything else → personal note.
    pub async fn apply_note(&self, note: Note) {
        if self.is_closed() {
            debug!("Dropping note update after close");
            return;
        }
        {
            let mut state = self.inner.lock().await;
            if note.is_shared() {
                state.shared_note = Some(note);
            } else {
                state.personal_note = Some(note);
            }
        }
        self.bump();
    }

    pub async fn apply_questions(&self, questions: Vec<Question>) {
        if self.is_closed() {
            debug!("Dropping question update after close");
            return;
        }
        self.inner.lock().await.questions = questions;
        self.bump();
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }
}

//! Meeting session endpoints.
//!
//! Everything a UI needs while a meeting is live:
//! - Reading the synced state (GET /state)
//! - Editing the viewer's note and the shared note (PUT /note, /shared-note)
//! - Asking, upvoting and answering questions (POST /questions...)
//! - Ending the meeting (POST /complete)

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::sync::MeetingSession;

/// Shared state for meeting routes.
#[derive(Clone)]
pub struct MeetingRoutesState {
    pub session: Arc<MeetingSession>,
}

#[derive(Debug, Deserialize)]
pub struct NoteUpdateRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct NewQuestionRequest {
    pub question: String,
}

pub fn router(state: MeetingRoutesState) -> Router {
    Router::new()
        .route("/state", get(live_state))
        .route("/note", put(update_note))
        .route("/shared-note", put(update_shared_note))
        .route("/questions", get(list_questions).post(add_question))
        .route("/questions/:id/upvote", post(toggle_upvote))
        .route("/questions/:id/answered", post(toggle_answered))
        .route("/complete", post(mark_completed))
        .with_state(state)
}

async fn live_state(State(state): State<MeetingRoutesState>) -> Json<Value> {
    let live = state.session.state().get().await;
    Json(json!({
        "meetingId": state.session.meeting_id(),
        "state": live,
    }))
}

async fn update_note(
    State(state): State<MeetingRoutesState>,
    Json(req): Json<NoteUpdateRequest>,
) -> ApiResult<Json<Value>> {
    state.session.update_personal_note(&req.content).await?;
    Ok(Json(json!({ "success": true })))
}

async fn update_shared_note(
    State(state): State<MeetingRoutesState>,
    Json(req): Json<NoteUpdateRequest>,
) -> ApiResult<Json<Value>> {
    state.session.update_shared_note(&req.content).await?;
    Ok(Json(json!({ "success": true })))
}

async fn list_questions(State(state): State<MeetingRoutesState>) -> Json<Value> {
    let live = state.session.state().get().await;
    Json(json!({ "questions": live.questions }))
}

async fn add_question(
    State(state): State<MeetingRoutesState>,
    Json(req): Json<NewQuestionRequest>,
) -> ApiResult<Json<Value>> {
    let text = req.question.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("Question text is empty".to_string()));
    }

    let question = state.session.add_question(text).await?;
    info!("Question {} submitted via API", question.id);
    Ok(Json(json!({ "success": true, "question": question })))
}

async fn toggle_upvote(
    State(state): State<MeetingRoutesState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    ensure_known_question(&state, &id).await?;
    state.session.toggle_upvote(&id).await?;
    Ok(Json(json!({ "success": true })))
}

async fn toggle_answered(
    State(state): State<MeetingRoutesState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    ensure_known_question(&state, &id).await?;
    state.session.toggle_answered(&id).await?;
    Ok(Json(json!({ "success": true })))
}

async fn mark_completed(State(state): State<MeetingRoutesState>) -> ApiResult<Json<Value>> {
    state.session.mark_completed().await?;
    info!(
        "Meeting {} marked complete via API",
        state.session.meeting_id()
    );
    Ok(Json(json!({ "success": true })))
}

async fn ensure_known_question(state: &MeetingRoutesState, id: &str) -> ApiResult<()> {
    let live = state.session.state().get().await;
    if live.questions.iter().any(|q| q.id == id) {
        Ok(())
    } else {
        Err(ApiError::NotFound(format!("Unknown question: {id}")))
    }
}

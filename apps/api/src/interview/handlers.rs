//! HTTP handlers for the interview API.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::history::Turn;
use crate::interview::keywords::{mine_keyword_sources, KeywordInputs};
use crate::interview::machine::InterviewSession;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    #[serde(flatten)]
    pub inputs: KeywordInputs,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub session_id: Uuid,
    pub first_question: String,
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub answer: String,
}

#[derive(Debug, Serialize)]
pub struct ReplyResponse {
    pub next_prompt: String,
    pub finished: bool,
}

#[derive(Debug, Serialize)]
pub struct FinishResponse {
    pub session_id: Uuid,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub transcript: Vec<Turn>,
}

/// POST /api/v1/interviews
pub async fn handle_start(
    State(state): State<AppState>,
    Json(req): Json<StartRequest>,
) -> Result<Json<StartResponse>, AppError> {
    let sources = mine_keyword_sources(state.oracle.as_ref(), &req.inputs).await?;
    let (session, first_question) =
        InterviewSession::start(state.oracle.as_ref(), &sources).await?;
    let session_id = session.id();
    state.sessions.insert(session);

    Ok(Json(StartResponse {
        session_id,
        first_question,
    }))
}

/// POST /api/v1/interviews/:id/reply
pub async fn handle_reply(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReplyRequest>,
) -> Result<Json<ReplyResponse>, AppError> {
    let handle = state
        .sessions
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("Interview session {id} not found")))?;

    // The per-session mutex serializes concurrent replies for the same id.
    let mut session = handle.lock().await;
    let outcome = session.submit_reply(state.oracle.as_ref(), &req.answer).await?;

    Ok(Json(ReplyResponse {
        next_prompt: outcome.next_prompt,
        finished: outcome.finished,
    }))
}

/// POST /api/v1/interviews/:id/finish
///
/// Closes the session if still open, removes it from the registry, and
/// returns the full transcript for reporting.
pub async fn handle_finish(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FinishResponse>, AppError> {
    let handle = state
        .sessions
        .remove(id)
        .ok_or_else(|| AppError::NotFound(format!("Interview session {id} not found")))?;

    let mut session = handle.lock().await;
    session.close();

    Ok(Json(FinishResponse {
        session_id: id,
        started_at: session.created_at(),
        transcript: session.export_history().to_vec(),
    }))
}

//! HTTP request handlers

use super::assets::{get_index_html, serve_static};
use super::types::{ChatRequest, ChatResponse, ErrorResponse, SessionResponse};
use super::AppState;
use crate::executor::{handle_turn, Session, TurnError, TurnOutcome};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Root serves the chat page
        .route("/", get(serve_page))
        // Static assets (embedded or filesystem fallback)
        .route("/assets/*path", get(serve_static))
        // Session lifecycle
        .route("/api/sessions/new", post(create_session))
        .route("/api/sessions/:id", get(get_session))
        // Turn submission
        .route("/api/sessions/:id/chat", post(send_chat))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Chat Page
// ============================================================

async fn serve_page() -> impl IntoResponse {
    match get_index_html() {
        Some(content) => Html(content).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Html("<h1>404 - UI not found</h1>".to_string()),
        )
            .into_response(),
    }
}

// ============================================================
// Session Lifecycle
// ============================================================

async fn create_session(State(state): State<AppState>) -> Json<SessionResponse> {
    let id = Uuid::new_v4();
    let session = Session::new(&state.seed);
    let turns = session.transcript.all().to_vec();

    state
        .sessions
        .write()
        .await
        .insert(id, Arc::new(Mutex::new(session)));

    tracing::info!(session_id = %id, "session created");

    Json(SessionResponse {
        session_id: id.to_string(),
        turns,
        terminated: false,
    })
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = lookup_session(&state, &id).await?;
    let session = session.lock().await;

    Ok(Json(SessionResponse {
        session_id: id,
        turns: session.transcript.all().to_vec(),
        terminated: session.is_terminated(),
    }))
}

// ============================================================
// Turn Submission
// ============================================================

async fn send_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let text = req.text.trim();
    if text.is_empty() {
        return Err(AppError::BadRequest("Message text is empty".to_string()));
    }

    let session = lookup_session(&state, &id).await?;
    // Holding the session lock across the turn serializes submissions: one is
    // fully processed before the next is accepted.
    let mut session = session.lock().await;

    let outcome = handle_turn(&mut session, &state.seed, state.model.as_ref(), text)
        .await
        .map_err(|e| match e {
            TurnError::SessionTerminated => AppError::Conflict(e.to_string()),
        })?;

    let terminated = session.is_terminated();
    let response = match outcome {
        TurnOutcome::Reply { turns } | TurnOutcome::Farewell { turns } => ChatResponse {
            turns,
            warning: None,
            terminated,
        },
        TurnOutcome::Failed { turns, warning } => ChatResponse {
            turns,
            warning: Some(warning),
            terminated,
        },
    };

    Ok(Json(response))
}

async fn lookup_session(state: &AppState, id: &str) -> Result<Arc<Mutex<Session>>, AppError> {
    let id: Uuid = id
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid session id".to_string()))?;

    state
        .sessions
        .read()
        .await
        .get(&id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("Unknown session: {id}")))
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("wisata-chat ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

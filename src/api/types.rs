//! API request and response types

use crate::transcript::Turn;
use serde::{Deserialize, Serialize};

/// Request to send a chat message
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub text: String,
}

/// Response for session creation and retrieval
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub turns: Vec<Turn>,
    pub terminated: bool,
}

/// Response for one processed chat submission
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    /// Turns appended to the transcript by this submission.
    pub turns: Vec<Turn>,
    /// Present when the model invocation failed; the turn was not persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub terminated: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

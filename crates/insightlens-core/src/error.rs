//! Error types for API access and chat session operations.

use std::time::Duration;

use crate::state::TurnId;

/// Errors from calls to the InsightLens API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("session expired or not logged in")]
    Unauthorized,
    #[error("API request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not reach the API: {0}")]
    Transport(String),
    #[error("unexpected response from the API: {0}")]
    Decode(String),
    #[error("{0}")]
    Rejected(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// Errors from chat session operations.
///
/// `EmptyQuery` and `Busy` are silent no-ops: callers are expected to drop
/// them without telling the user.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("question cannot be empty")]
    EmptyQuery,
    #[error("a question is already being answered")]
    Busy,
    #[error("no such turn: {0}")]
    UnknownTurn(TurnId),
    #[error("turn {0} is not an answered assistant turn")]
    NotSaveable(TurnId),
    #[error("answer failed: {0}")]
    Answer(#[source] ApiError),
    #[error("could not save report: {0}")]
    Save(#[source] ApiError),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("request cancelled")]
    Cancelled,
}

impl ChatError {
    /// True for the rejections that must not produce any user feedback.
    pub fn is_silent(&self) -> bool {
        matches!(self, ChatError::EmptyQuery | ChatError::Busy)
    }

    /// True when the underlying API call was refused for lack of a valid session.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            ChatError::Answer(ApiError::Unauthorized) | ChatError::Save(ApiError::Unauthorized)
        )
    }
}

//! Error taxonomy for answer turns
//!
//! This module provides:
//! - [`FailureReason`], the cause recorded on a turn that ended in `Failed`
//! - [`TurnError`], the error surfaced to callers of the chat client
//! - Classification of transport errors coming out of the backend crate

use docchat_backend::BackendError;
use std::fmt;
use thiserror::Error;
use tracing::{debug, error};

/// Longest error body kept in logs
const MAX_LOGGED_BODY: usize = 500;

/// Why a turn failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The connection could not be opened or broke mid-stream
    Transport(String),
    /// The server answered the request with a non-success status
    Rejected { status: u16, body: String },
    /// The stream carried an error record
    Server(String),
}

impl FailureReason {
    /// Text of the notice shown to the user for this failure
    pub fn notice(&self) -> String {
        match self {
            FailureReason::Transport(message) => format!("Connection error: {}", message),
            FailureReason::Rejected { body, .. } => format!("Error: {}", body),
            FailureReason::Server(message) => format!("Error: {}", message),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Transport(message) => write!(f, "transport failure: {}", message),
            FailureReason::Rejected { status, body } => {
                write!(f, "rejected with status {}: {}", status, body)
            }
            FailureReason::Server(message) => write!(f, "server error: {}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnError {
    /// A turn could not be started
    #[error("{0}")]
    Precondition(String),
    #[error("connection error: {0}")]
    Transport(String),
    #[error("server error: {0}")]
    ServerSignaled(String),
    #[error("generation stopped")]
    AbortedByUser,
}

impl From<&FailureReason> for TurnError {
    fn from(reason: &FailureReason) -> Self {
        match reason {
            FailureReason::Transport(message) => TurnError::Transport(message.clone()),
            FailureReason::Rejected { status, body } => {
                TurnError::ServerSignaled(format!("{} ({})", body, status))
            }
            FailureReason::Server(message) => TurnError::ServerSignaled(message.clone()),
        }
    }
}

/// Map an error from the answer stream onto a failure reason.
///
/// A rejected request keeps its status and body; everything else is a
/// transport failure described by the error chain.
pub fn classify_transport_error(err: &anyhow::Error) -> FailureReason {
    if let Some(BackendError::Status { status, body }) = err.downcast_ref::<BackendError>() {
        error!(
            "Answer request rejected ({}): {}",
            status,
            truncate_for_logging(body, MAX_LOGGED_BODY)
        );
        return FailureReason::Rejected {
            status: *status,
            body: body.clone(),
        };
    }

    debug!("Answer stream transport error: {:#}", err);
    FailureReason::Transport(err.to_string())
}

/// Truncate a string for logging purposes
pub fn truncate_for_logging(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_len).collect();
    format!("{}... (truncated)", kept)
}

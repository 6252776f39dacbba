//! Collaborators the docchat core talks to.
//!
//! The document-QA server exposes three surfaces: a streaming answer
//! endpoint, a chat session store and a document catalog. Each one is a
//! trait here so the core can run against the HTTP implementation or the
//! scripted [`MockBackend`] used in tests.

mod http;
pub mod mock;
mod streaming;

pub use http::HttpBackend;
pub use mock::{MockBackend, MockResponse};
pub use streaming::decode_utf8_streaming;

use anyhow::Result;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw body of a streaming answer, chunked however the transport delivers it.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Streaming answer endpoint
#[async_trait::async_trait]
pub trait AnswerBackend: Send + Sync {
    /// Open the event stream for one question. Resolves once the server has
    /// accepted the request; the body then arrives through the stream.
    async fn stream_answer(&self, request: AnswerRequest) -> Result<ByteStream>;

    /// Short name used in logs
    fn name(&self) -> &str;
}

/// Conversation storage owned by the server
#[async_trait::async_trait]
pub trait ChatStore: Send + Sync {
    async fn create_chat(&self, title: &str) -> Result<NewChat>;

    /// Conversations, most recent first
    async fn list_chats(&self) -> Result<Vec<ChatSummary>>;

    async fn chat_history(&self, chat_id: &str) -> Result<Vec<HistoryMessage>>;

    async fn rename_chat(&self, chat_id: &str, title: &str) -> Result<()>;

    async fn delete_chat(&self, chat_id: &str) -> Result<()>;
}

/// Documents the server can answer questions about
#[async_trait::async_trait]
pub trait DocumentCatalog: Send + Sync {
    async fn list_documents(&self) -> Result<Vec<String>>;
}

/// Everything a chat client needs from the server.
pub trait Backend: AnswerBackend + ChatStore + DocumentCatalog {}

impl<T: AnswerBackend + ChatStore + DocumentCatalog> Backend for T {}

/// Body of `POST /chat/stream`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRequest {
    /// Conversation the question belongs to
    pub chat_id: String,
    pub question: String,
    /// Document identifier the answer must be grounded in
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChat {
    pub chat_id: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub chat_id: String,
    pub title: String,
    #[serde(default)]
    pub last_message: String,
    /// Unix seconds of the last message, if any
    #[serde(default)]
    pub ts: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: Role,
    pub message: String,
    #[serde(default)]
    pub ts: Option<i64>,
}

/// Failures the HTTP layer can tell apart
#[derive(Debug, Error)]
pub enum BackendError {
    /// The server answered with a non-success status before any body was streamed
    #[error("{body}")]
    Status { status: u16, body: String },

    #[error("connection failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl BackendError {
    /// HTTP status if the server rejected the request
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            BackendError::Transport(e) => e.status().map(|s| s.as_u16()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_request_uses_wire_field_names() {
        let request = AnswerRequest {
            chat_id: "c1".to_string(),
            question: "What is it?".to_string(),
            source: "doc.pdf".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["chat_id"], "c1");
        assert_eq!(json["question"], "What is it?");
        assert_eq!(json["source"], "doc.pdf");
    }

    #[test]
    fn test_chat_summary_tolerates_missing_optional_fields() {
        let summary: ChatSummary =
            serde_json::from_str(r#"{"chat_id": "abc", "title": "Chat abc"}"#).unwrap();
        assert_eq!(summary.last_message, "");
        assert!(summary.ts.is_none());
    }

    #[test]
    fn test_history_message_parses_server_entry() {
        let entry: HistoryMessage = serde_json::from_str(
            r#"{"id": "x", "role": "assistant", "message": "Hi", "ts": 1700000000}"#,
        )
        .unwrap();
        assert_eq!(entry.role, Role::Assistant);
        assert_eq!(entry.ts, Some(1_700_000_000));
    }

    #[test]
    fn test_status_error_displays_body() {
        let err = BackendError::Status {
            status: 400,
            body: "missing source".to_string(),
        };
        assert_eq!(err.to_string(), "missing source");
        assert_eq!(err.status(), Some(400));
    }
}

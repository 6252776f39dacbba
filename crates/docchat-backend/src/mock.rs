//! Mock backend for testing
//!
//! A scripted stand-in for the document-QA server. Answer streams are queued
//! as [`MockResponse`]s and handed out one per `stream_answer` call; the chat
//! store and document catalog are kept in memory and record every call so
//! tests can assert on them.
//!
//! # Example
//!
//! ```rust,ignore
//! use docchat_backend::mock::{MockBackend, MockResponse};
//!
//! let backend = MockBackend::new()
//!     .with_documents(&["handbook.pdf"])
//!     .with_response(MockResponse::events(&["Hello, ", "world!"]));
//! ```

use crate::{
    AnswerBackend, AnswerRequest, BackendError, ByteStream, ChatStore, ChatSummary,
    DocumentCatalog, HistoryMessage, NewChat,
};
use anyhow::Result;
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// One scripted reply of the streaming answer endpoint
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// The body is delivered as these chunks, then the stream ends
    /// (or stays open forever when `hang` is set).
    Stream { chunks: Vec<Bytes>, hang: bool },
    /// Chunks are delivered, then the transport fails
    Broken { chunks: Vec<Bytes>, error: String },
    /// The server answers with a non-success status
    Rejected { status: u16, body: String },
    /// The request never reaches the server
    Unreachable(String),
}

fn event(payload: &str) -> Bytes {
    Bytes::from(format!("data: {}\n\n", payload))
}

impl MockResponse {
    /// A well-formed answer: one event per payload, then the end sentinel
    pub fn events(payloads: &[&str]) -> Self {
        let mut chunks: Vec<Bytes> = payloads.iter().map(|p| event(p)).collect();
        chunks.push(event("[END]"));
        Self::Stream {
            chunks,
            hang: false,
        }
    }

    /// Events without the end sentinel; the stream simply closes
    pub fn unterminated(payloads: &[&str]) -> Self {
        Self::Stream {
            chunks: payloads.iter().map(|p| event(p)).collect(),
            hang: false,
        }
    }

    /// Events that never finish; the stream stays open until dropped
    pub fn hanging(payloads: &[&str]) -> Self {
        Self::Stream {
            chunks: payloads.iter().map(|p| event(p)).collect(),
            hang: true,
        }
    }

    /// Arbitrary body chunks, for framing edge cases
    pub fn raw(chunks: &[&[u8]]) -> Self {
        Self::Stream {
            chunks: chunks.iter().map(|c| Bytes::copy_from_slice(c)).collect(),
            hang: false,
        }
    }

    /// Events followed by a transport failure
    pub fn broken_after(payloads: &[&str], error: &str) -> Self {
        Self::Broken {
            chunks: payloads.iter().map(|p| event(p)).collect(),
            error: error.to_string(),
        }
    }

    pub fn rejected(status: u16, body: &str) -> Self {
        Self::Rejected {
            status,
            body: body.to_string(),
        }
    }

    pub fn unreachable(error: &str) -> Self {
        Self::Unreachable(error.to_string())
    }
}

/// In-memory backend with scripted answer streams
#[derive(Debug, Default)]
pub struct MockBackend {
    responses: Mutex<VecDeque<MockResponse>>,
    requests: Mutex<Vec<AnswerRequest>>,
    documents: Vec<String>,
    chats: Mutex<Vec<ChatSummary>>,
    histories: Mutex<HashMap<String, Vec<HistoryMessage>>>,
    renames: Mutex<Vec<(String, String)>>,
    fail_renames: bool,
    chat_counter: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the next `stream_answer` call
    pub fn with_response(self, response: MockResponse) -> Self {
        lock(&self.responses).push_back(response);
        self
    }

    pub fn with_documents(mut self, documents: &[&str]) -> Self {
        self.documents = documents.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn with_chat(self, chat_id: &str, title: &str, history: Vec<HistoryMessage>) -> Self {
        let last = history.last().cloned();
        lock(&self.chats).push(ChatSummary {
            chat_id: chat_id.to_string(),
            title: title.to_string(),
            last_message: last.as_ref().map(|m| m.message.clone()).unwrap_or_default(),
            ts: last.and_then(|m| m.ts),
        });
        lock(&self.histories).insert(chat_id.to_string(), history);
        self
    }

    /// Make every rename call fail, to exercise best-effort title pushes
    pub fn failing_renames(mut self) -> Self {
        self.fail_renames = true;
        self
    }

    /// Every answer request received so far
    pub fn requests(&self) -> Vec<AnswerRequest> {
        lock(&self.requests).clone()
    }

    /// Every (chat_id, title) rename received so far
    pub fn renames(&self) -> Vec<(String, String)> {
        lock(&self.renames).clone()
    }

    pub fn chats(&self) -> Vec<ChatSummary> {
        lock(&self.chats).clone()
    }
}

#[async_trait::async_trait]
impl AnswerBackend for MockBackend {
    async fn stream_answer(&self, request: AnswerRequest) -> Result<ByteStream> {
        lock(&self.requests).push(request);

        let response = lock(&self.responses)
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("MockBackend has no scripted response left"))?;

        match response {
            MockResponse::Stream { chunks, hang } => {
                let body = stream::iter(chunks.into_iter().map(Ok));
                if hang {
                    Ok(body.chain(stream::pending()).boxed())
                } else {
                    Ok(body.boxed())
                }
            }
            MockResponse::Broken { chunks, error } => {
                let failure = stream::once(async move { Err(anyhow::anyhow!(error)) });
                Ok(stream::iter(chunks.into_iter().map(Ok))
                    .chain(failure)
                    .boxed())
            }
            MockResponse::Rejected { status, body } => {
                Err(BackendError::Status { status, body }.into())
            }
            MockResponse::Unreachable(error) => Err(anyhow::anyhow!(error)),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[async_trait::async_trait]
impl ChatStore for MockBackend {
    async fn create_chat(&self, title: &str) -> Result<NewChat> {
        let n = self.chat_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let chat_id = format!("mock-chat-{}", n);
        lock(&self.chats).insert(
            0,
            ChatSummary {
                chat_id: chat_id.clone(),
                title: title.to_string(),
                last_message: String::new(),
                ts: None,
            },
        );
        lock(&self.histories).insert(chat_id.clone(), Vec::new());
        Ok(NewChat {
            chat_id,
            title: Some(title.to_string()),
        })
    }

    async fn list_chats(&self) -> Result<Vec<ChatSummary>> {
        Ok(self.chats())
    }

    async fn chat_history(&self, chat_id: &str) -> Result<Vec<HistoryMessage>> {
        lock(&self.histories).get(chat_id).cloned().ok_or_else(|| {
            BackendError::Status {
                status: 404,
                body: "Chat not found".to_string(),
            }
            .into()
        })
    }

    async fn rename_chat(&self, chat_id: &str, title: &str) -> Result<()> {
        if self.fail_renames {
            anyhow::bail!("rename rejected by mock");
        }
        lock(&self.renames).push((chat_id.to_string(), title.to_string()));
        if let Some(chat) = lock(&self.chats).iter_mut().find(|c| c.chat_id == chat_id) {
            chat.title = title.to_string();
        }
        Ok(())
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<()> {
        if lock(&self.histories).remove(chat_id).is_none() {
            return Err(BackendError::Status {
                status: 404,
                body: "Chat not found".to_string(),
            }
            .into());
        }
        lock(&self.chats).retain(|c| c.chat_id != chat_id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl DocumentCatalog for MockBackend {
    async fn list_documents(&self) -> Result<Vec<String>> {
        Ok(self.documents.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> AnswerRequest {
        AnswerRequest {
            chat_id: "c".to_string(),
            question: "q".to_string(),
            source: "s".to_string(),
        }
    }

    #[tokio::test]
    async fn test_events_are_framed_and_terminated() {
        let backend = MockBackend::new().with_response(MockResponse::events(&["Hi"]));
        let chunks: Vec<Bytes> = backend
            .stream_answer(request())
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;

        assert_eq!(chunks, vec![event("Hi"), event("[END]")]);
        assert_eq!(backend.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_response_carries_status() {
        let backend = MockBackend::new().with_response(MockResponse::rejected(400, "missing source"));
        let err = match backend.stream_answer(request()).await {
            Ok(_) => panic!("expected rejection"),
            Err(e) => e,
        };
        let backend_error = err.downcast_ref::<BackendError>().unwrap();
        assert_eq!(backend_error.status(), Some(400));
    }

    #[tokio::test]
    async fn test_exhausted_script_is_an_error() {
        let backend = MockBackend::new();
        assert!(backend.stream_answer(request()).await.is_err());
    }

    #[tokio::test]
    async fn test_chat_store_round_trip() {
        let backend = MockBackend::new();
        let created = backend.create_chat("Quick Chat").await.unwrap();
        backend.rename_chat(&created.chat_id, "Renamed").await.unwrap();

        let chats = backend.list_chats().await.unwrap();
        assert_eq!(chats[0].title, "Renamed");
        assert_eq!(backend.renames(), vec![(created.chat_id.clone(), "Renamed".to_string())]);
        assert!(backend.chat_history(&created.chat_id).await.unwrap().is_empty());
        assert!(backend.chat_history("unknown").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_chat_removes_it() {
        let backend = MockBackend::new().with_chat("old", "Old", Vec::new());
        let kept = backend.create_chat("Kept").await.unwrap();

        backend.delete_chat("old").await.unwrap();
        let ids: Vec<String> = backend.chats().into_iter().map(|c| c.chat_id).collect();
        assert_eq!(ids, vec![kept.chat_id]);
        assert!(backend.chat_history("old").await.is_err());
        assert!(backend.delete_chat("old").await.is_err());
    }
}

use anyhow::Result;
use async_trait::async_trait;
use futures_util::stream::{StreamExt, TryStreamExt};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error};

use crate::{
    AnswerBackend, AnswerRequest, BackendError, ByteStream, ChatStore, ChatSummary,
    DocumentCatalog, HistoryMessage, NewChat,
};

/// Talks to the document-QA server over its JSON/HTTP + event-stream protocol.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct DocumentList {
    #[serde(default)]
    files: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ChatList {
    #[serde(default)]
    chats: Vec<ChatSummary>,
}

#[derive(Debug, Deserialize)]
struct ChatDetail {
    #[serde(default)]
    history: Vec<HistoryMessage>,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-success status into [`BackendError::Status`] carrying the body text.
    async fn ensure_success(response: Response) -> Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        error!("Server rejected request with {}: {}", status, body);
        Err(BackendError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl AnswerBackend for HttpBackend {
    async fn stream_answer(&self, request: AnswerRequest) -> Result<ByteStream> {
        debug!(
            "Opening answer stream: chat={} source={}",
            request.chat_id, request.source
        );

        let response = self
            .client
            .post(self.url("/chat/stream"))
            .json(&request)
            .send()
            .await
            .map_err(BackendError::from)?;
        let response = Self::ensure_success(response).await?;

        let stream = response
            .bytes_stream()
            .map_err(|e| anyhow::Error::from(BackendError::from(e)))
            .boxed();
        Ok(stream)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[async_trait]
impl ChatStore for HttpBackend {
    async fn create_chat(&self, title: &str) -> Result<NewChat> {
        let response = self
            .client
            .post(self.url("/api/chats/new"))
            .json(&json!({ "title": title }))
            .send()
            .await
            .map_err(BackendError::from)?;
        let created: NewChat = Self::ensure_success(response).await?.json().await?;
        debug!("Created chat {}", created.chat_id);
        Ok(created)
    }

    async fn list_chats(&self) -> Result<Vec<ChatSummary>> {
        let response = self
            .client
            .get(self.url("/api/chats"))
            .send()
            .await
            .map_err(BackendError::from)?;
        let list: ChatList = Self::ensure_success(response).await?.json().await?;
        Ok(list.chats)
    }

    async fn chat_history(&self, chat_id: &str) -> Result<Vec<HistoryMessage>> {
        let response = self
            .client
            .get(self.url(&format!("/api/chats/{}", chat_id)))
            .send()
            .await
            .map_err(BackendError::from)?;
        let detail: ChatDetail = Self::ensure_success(response).await?.json().await?;
        Ok(detail.history)
    }

    async fn rename_chat(&self, chat_id: &str, title: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url(&format!("/api/chats/{}/rename", chat_id)))
            .json(&json!({ "title": title }))
            .send()
            .await
            .map_err(BackendError::from)?;
        Self::ensure_success(response).await?;
        debug!("Renamed chat {} to {:?}", chat_id, title);
        Ok(())
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("/api/chats/{}", chat_id)))
            .send()
            .await
            .map_err(BackendError::from)?;
        Self::ensure_success(response).await?;
        debug!("Deleted chat {}", chat_id);
        Ok(())
    }
}

#[async_trait]
impl DocumentCatalog for HttpBackend {
    async fn list_documents(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.url("/api/pdf/list"))
            .send()
            .await
            .map_err(BackendError::from)?;
        let list: DocumentList = Self::ensure_success(response).await?.json().await?;
        Ok(list.files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let backend = HttpBackend::new("http://localhost:8000/", Duration::from_secs(1)).unwrap();
        assert_eq!(backend.url("/api/chats"), "http://localhost:8000/api/chats");
    }

    #[test]
    fn test_document_list_defaults_to_empty() {
        let list: DocumentList = serde_json::from_str("{}").unwrap();
        assert!(list.files.is_empty());
    }

    #[test]
    fn test_chat_detail_reads_history() {
        let detail: ChatDetail = serde_json::from_str(
            r#"{"chat_id": "c", "title": null, "history": [{"role": "user", "message": "hi", "ts": 1}]}"#,
        )
        .unwrap();
        assert_eq!(detail.history.len(), 1);
        assert_eq!(detail.history[0].message, "hi");
    }
}

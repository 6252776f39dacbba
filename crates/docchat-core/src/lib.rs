pub mod display;
pub mod error_handling;
pub mod markup;
pub mod session;
pub mod streaming_parser;
pub mod title;
pub mod turn;

pub use display::{DisplaySurface, DisplayUpdate, NullSurface, RecordingSurface};
pub use error_handling::{FailureReason, TurnError};
pub use session::SessionContext;
pub use turn::{Progress, TurnController, TurnId, TurnOutcome, TurnState, TurnTicket};

use anyhow::Result;
use docchat_backend::{AnswerRequest, Backend, ChatSummary, HistoryMessage};
use futures_util::StreamExt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Title given to a conversation created implicitly by the first question
pub const QUICK_CHAT_TITLE: &str = "Quick Chat";

/// Drives turns against a backend.
///
/// The controller sits behind a mutex that is only ever held for synchronous
/// updates, never across an await, so a second `ask` can preempt a running one
/// from another task.
pub struct ChatClient<D: DisplaySurface> {
    backend: Arc<dyn Backend>,
    controller: Arc<Mutex<TurnController<D>>>,
}

impl<D: DisplaySurface> Clone for ChatClient<D> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            controller: Arc::clone(&self.controller),
        }
    }
}

impl<D: DisplaySurface> ChatClient<D> {
    pub fn new(backend: Arc<dyn Backend>, display: D) -> Self {
        Self::with_session(backend, display, SessionContext::new())
    }

    pub fn with_session(backend: Arc<dyn Backend>, display: D, session: SessionContext) -> Self {
        debug!("Chat client using {} backend", backend.name());
        Self {
            backend,
            controller: Arc::new(Mutex::new(TurnController::new(session, display))),
        }
    }

    fn controller(&self) -> MutexGuard<'_, TurnController<D>> {
        self.controller
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn session(&self) -> SessionContext {
        self.controller().session().clone()
    }

    pub fn state(&self) -> TurnState {
        self.controller().state()
    }

    pub fn select_document(&self, document: &str) {
        self.controller()
            .session_mut()
            .select_document(Some(document.to_string()));
    }

    /// Fetch the document catalog and reconcile the current selection with it.
    pub async fn refresh_documents(&self) -> Result<Vec<String>> {
        let documents = self.backend.list_documents().await?;
        let selected = self
            .controller()
            .session_mut()
            .resolve_document(&documents)
            .map(str::to_string);
        debug!("{} documents available, selected {:?}", documents.len(), selected);
        Ok(documents)
    }

    pub async fn list_conversations(&self) -> Result<Vec<ChatSummary>> {
        self.backend.list_chats().await
    }

    /// Create a conversation and make it current.
    pub async fn new_conversation(&self, title: &str) -> Result<String> {
        let created = self.backend.create_chat(title).await?;
        info!("Started conversation {}", created.chat_id);
        self.controller()
            .session_mut()
            .start_conversation(created.chat_id.clone());
        Ok(created.chat_id)
    }

    /// Make an existing conversation current and return its history.
    pub async fn open_conversation(&self, chat_id: &str) -> Result<Vec<HistoryMessage>> {
        let history = self.backend.chat_history(chat_id).await?;
        let title = self
            .backend
            .list_chats()
            .await
            .ok()
            .and_then(|chats| chats.into_iter().find(|c| c.chat_id == chat_id))
            .map(|c| c.title);

        self.controller()
            .session_mut()
            .open_conversation(chat_id, title, &history);
        Ok(history)
    }

    /// Delete a stored conversation.
    ///
    /// Returns true when it was the current one; the session is then
    /// cleared and any turn in flight is stopped.
    pub async fn delete_conversation(&self, chat_id: &str) -> Result<bool> {
        self.backend.delete_chat(chat_id).await?;

        let mut controller = self.controller();
        if controller.session().conversation() != Some(chat_id) {
            return Ok(false);
        }
        controller.cancel();
        controller.session_mut().close_conversation();
        info!("Deleted the current conversation {}", chat_id);
        Ok(true)
    }

    /// Stored messages of the current conversation; empty before the first question.
    pub async fn history(&self) -> Result<Vec<HistoryMessage>> {
        let chat_id = self.controller().session().conversation().map(str::to_string);
        match chat_id {
            Some(chat_id) => self.backend.chat_history(&chat_id).await,
            None => Ok(Vec::new()),
        }
    }

    async fn ensure_conversation(&self) -> Result<String> {
        let existing = self.controller().session().conversation().map(str::to_string);
        match existing {
            Some(chat_id) => Ok(chat_id),
            None => self.new_conversation(QUICK_CHAT_TITLE).await,
        }
    }

    /// Ask a question about the selected document and stream the answer.
    ///
    /// Returns once the turn is terminal. Failures of the turn itself are
    /// reported through the outcome's state; an `Err` means the turn never
    /// started.
    pub async fn ask(&self, question: &str) -> Result<TurnOutcome> {
        if self.controller().session().document().is_none() {
            return Err(TurnError::Precondition("no document selected".to_string()).into());
        }
        let chat_id = self.ensure_conversation().await?;

        let (ticket, request) = {
            let mut controller = self.controller();
            let ticket = controller.start(question)?;
            let request = AnswerRequest {
                chat_id: chat_id.clone(),
                question: question.trim().to_string(),
                source: controller.session().document().unwrap_or_default().to_string(),
            };
            (ticket, request)
        };

        self.push_title().await;
        self.drive(&ticket, request).await;
        self.push_title().await;

        let outcome = self.controller().outcome(ticket.id());
        outcome.ok_or_else(|| anyhow::anyhow!("turn {} is no longer tracked", ticket.id()))
    }

    /// Stop the turn in flight, if any.
    pub fn cancel(&self) -> bool {
        self.controller().cancel()
    }

    async fn drive(&self, ticket: &TurnTicket, request: AnswerRequest) {
        let token = ticket.token().clone();

        let opened = tokio::select! {
            _ = token.cancelled() => return,
            opened = self.backend.stream_answer(request) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                self.controller().on_transport_error(ticket, &e);
                return;
            }
        };

        loop {
            let next = tokio::select! {
                _ = token.cancelled() => {
                    debug!("Turn {} cancelled, dropping answer stream", ticket.id());
                    return;
                }
                next = stream.next() => next,
            };

            let progress = match next {
                Some(Ok(chunk)) => self.controller().on_chunk(ticket, &chunk),
                Some(Err(e)) => self.controller().on_transport_error(ticket, &e),
                None => self.controller().on_complete(ticket),
            };
            if progress != Progress::Continue {
                return;
            }
        }
    }

    /// Store a changed title. Best effort: a failure is logged and dropped.
    async fn push_title(&self) {
        let update = {
            let mut controller = self.controller();
            let chat_id = controller.session().conversation().map(str::to_string);
            chat_id.zip(controller.take_title_update())
        };
        let Some((chat_id, title)) = update else {
            return;
        };
        if let Err(e) = self.backend.rename_chat(&chat_id, &title).await {
            warn!("Failed to store title for {}: {}", chat_id, e);
        }
    }
}

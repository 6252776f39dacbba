//! Session context: which document is being asked about, which stored
//! conversation the turns belong to, and what that conversation is called.

use docchat_backend::{HistoryMessage, Role};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    document: Option<String>,
    conversation: Option<String>,
    title: Option<String>,
    /// Answers already present in the conversation, loaded or settled here
    settled_answers: usize,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, document: impl Into<String>) -> Self {
        self.document = Some(document.into());
        self
    }

    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    pub fn select_document(&mut self, document: Option<String>) {
        debug!("Selected document: {:?}", document);
        self.document = document.filter(|d| !d.trim().is_empty());
    }

    /// Pick a document from the catalog: keep the current one if it is still
    /// listed, otherwise fall back to the first entry, otherwise none.
    pub fn resolve_document(&mut self, available: &[String]) -> Option<&str> {
        let keep = self
            .document
            .as_ref()
            .is_some_and(|current| available.contains(current));
        if !keep {
            self.select_document(available.first().cloned());
        }
        self.document()
    }

    pub fn conversation(&self) -> Option<&str> {
        self.conversation.as_deref()
    }

    /// Switch to a freshly created conversation. It has no title yet.
    pub fn start_conversation(&mut self, conversation_id: impl Into<String>) {
        self.conversation = Some(conversation_id.into());
        self.title = None;
        self.settled_answers = 0;
    }

    /// Leave the current conversation; the next question starts a new one.
    pub fn close_conversation(&mut self) {
        debug!("Closing conversation {:?}", self.conversation);
        self.conversation = None;
        self.title = None;
        self.settled_answers = 0;
    }

    /// Switch to an existing conversation with its stored history.
    pub fn open_conversation(
        &mut self,
        conversation_id: impl Into<String>,
        title: Option<String>,
        history: &[HistoryMessage],
    ) {
        self.conversation = Some(conversation_id.into());
        self.title = title.filter(|t| !t.trim().is_empty());
        self.settled_answers = history
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .count();
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    pub fn settled_answers(&self) -> usize {
        self.settled_answers
    }

    /// Count a settled answer, returning the new total.
    pub fn record_settled(&mut self) -> usize {
        self.settled_answers += 1;
        self.settled_answers
    }
}

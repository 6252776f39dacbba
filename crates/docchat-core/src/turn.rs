//! The turn controller: one question, one streamed answer.
//!
//! At most one turn is active at a time. Starting a new turn aborts the
//! previous one, and every event carries the [`TurnTicket`] issued by
//! [`TurnController::start`], so late events from a superseded stream are
//! recognised and dropped instead of corrupting the newer turn.
//!
//! ```text
//! Idle -> AwaitingResponse -> Streaming -> Settled
//!               |                 |
//!               +-----------------+--> Aborted | Failed
//! ```
//!
//! The controller is synchronous. The async driver in [`crate::ChatClient`]
//! feeds it chunks and completion events; the controller renders and
//! publishes after each one.

use crate::display::{DisplaySurface, DisplayUpdate};
use crate::error_handling::{classify_transport_error, FailureReason, TurnError};
use crate::markup;
use crate::session::SessionContext;
use crate::streaming_parser::{StreamRecord, StreamingParser};
use crate::title;
use std::collections::VecDeque;
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub type TurnId = u64;

pub const STOPPED_NOTICE: &str = "Generation stopped.";

/// Finished turns kept around for late lookups by their driver
const MAX_ARCHIVED_TURNS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingResponse,
    Streaming,
    Settled,
    Aborted,
    Failed(FailureReason),
}

impl TurnState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TurnState::Settled | TurnState::Aborted | TurnState::Failed(_)
        )
    }

    pub fn is_active(&self) -> bool {
        matches!(self, TurnState::AwaitingResponse | TurnState::Streaming)
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnState::Idle => write!(f, "idle"),
            TurnState::AwaitingResponse => write!(f, "awaiting response"),
            TurnState::Streaming => write!(f, "streaming"),
            TurnState::Settled => write!(f, "settled"),
            TurnState::Aborted => write!(f, "aborted"),
            TurnState::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

/// Handle for one turn's transport. Cancelling the token tears the stream down.
#[derive(Debug, Clone)]
pub struct TurnTicket {
    id: TurnId,
    token: CancellationToken,
}

impl TurnTicket {
    pub fn id(&self) -> TurnId {
        self.id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Result of feeding an event to the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// The ticket no longer belongs to the active turn; nothing changed
    Stale,
    /// More chunks are expected
    Continue,
    /// The turn reached this terminal state
    Finished(TurnState),
}

/// Where a turn ended up, or where it is now
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub id: TurnId,
    pub question: String,
    pub state: TurnState,
    pub answer: String,
}

impl TurnOutcome {
    pub fn markup(&self) -> String {
        markup::render(&self.answer)
    }

    /// The error a caller should see for this turn, if it did not settle
    pub fn error(&self) -> Option<TurnError> {
        match &self.state {
            TurnState::Failed(reason) => Some(TurnError::from(reason)),
            TurnState::Aborted => Some(TurnError::AbortedByUser),
            _ => None,
        }
    }
}

struct Turn {
    id: TurnId,
    question: String,
    answer: String,
    state: TurnState,
    token: CancellationToken,
    parser: StreamingParser,
}

impl Turn {
    fn outcome(&self) -> TurnOutcome {
        TurnOutcome {
            id: self.id,
            question: self.question.clone(),
            state: self.state.clone(),
            answer: self.answer.clone(),
        }
    }
}

pub struct TurnController<D: DisplaySurface> {
    display: D,
    session: SessionContext,
    current: Option<Turn>,
    archived: VecDeque<TurnOutcome>,
    next_id: TurnId,
    pending_title: Option<String>,
}

impl<D: DisplaySurface> TurnController<D> {
    pub fn new(session: SessionContext, display: D) -> Self {
        Self {
            display,
            session,
            current: None,
            archived: VecDeque::new(),
            next_id: 1,
            pending_title: None,
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionContext {
        &mut self.session
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn state(&self) -> TurnState {
        self.current
            .as_ref()
            .map_or(TurnState::Idle, |turn| turn.state.clone())
    }

    pub fn current_turn(&self) -> Option<TurnId> {
        self.current.as_ref().map(|turn| turn.id)
    }

    /// Raw answer text of the current turn
    pub fn answer(&self) -> &str {
        self.current.as_ref().map_or("", |turn| turn.answer.as_str())
    }

    /// Look up the current turn or a recently finished one.
    pub fn outcome(&self, id: TurnId) -> Option<TurnOutcome> {
        match &self.current {
            Some(turn) if turn.id == id => Some(turn.outcome()),
            _ => self.archived.iter().find(|s| s.id == id).cloned(),
        }
    }

    /// Title that changed since the last call and still has to be stored
    pub fn take_title_update(&mut self) -> Option<String> {
        self.pending_title.take()
    }

    /// Begin a new turn, aborting any turn still in flight.
    pub fn start(&mut self, question: &str) -> Result<TurnTicket, TurnError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(TurnError::Precondition("question is empty".to_string()));
        }
        if self.session.document().is_none() {
            return Err(TurnError::Precondition(
                "no document selected".to_string(),
            ));
        }

        self.abort_active();
        if let Some(previous) = self.current.take() {
            self.archive(previous.outcome());
        }

        let id = self.next_id;
        self.next_id += 1;
        let token = CancellationToken::new();
        self.current = Some(Turn {
            id,
            question: question.to_string(),
            answer: String::new(),
            state: TurnState::AwaitingResponse,
            token: token.clone(),
            parser: StreamingParser::new(),
        });
        info!("Turn {} started", id);
        self.publish_turn();

        if self.session.title().is_none() {
            self.update_title(title::synthesize(Some(question), None));
        }

        Ok(TurnTicket { id, token })
    }

    /// Feed a chunk of the answer body.
    pub fn on_chunk(&mut self, ticket: &TurnTicket, chunk: &[u8]) -> Progress {
        let Some(turn) = self.live_turn(ticket) else {
            debug!("Dropping {} bytes for stale turn {}", chunk.len(), ticket.id);
            return Progress::Stale;
        };

        let mut changed = false;
        if turn.state == TurnState::AwaitingResponse && !chunk.is_empty() {
            turn.state = TurnState::Streaming;
            changed = true;
        }
        let records = turn.parser.process_chunk(chunk);

        self.apply(records, changed)
    }

    /// The transport closed cleanly.
    pub fn on_complete(&mut self, ticket: &TurnTicket) -> Progress {
        let Some(turn) = self.live_turn(ticket) else {
            return Progress::Stale;
        };
        let records = turn.parser.finish();

        match self.apply(records, false) {
            Progress::Continue => {
                debug!("Turn {} stream closed without end marker", ticket.id);
                self.settle()
            }
            other => other,
        }
    }

    /// Opening or reading the transport failed.
    pub fn on_transport_error(&mut self, ticket: &TurnTicket, err: &anyhow::Error) -> Progress {
        if self.live_turn(ticket).is_none() {
            debug!("Ignoring transport error for stale turn {}: {}", ticket.id, err);
            return Progress::Stale;
        }
        self.fail(classify_transport_error(err))
    }

    /// Stop the active turn at the user's request. Returns false when
    /// nothing was in flight.
    pub fn cancel(&mut self) -> bool {
        self.abort_active()
    }

    fn live_turn(&mut self, ticket: &TurnTicket) -> Option<&mut Turn> {
        self.current
            .as_mut()
            .filter(|turn| turn.id == ticket.id && !turn.state.is_terminal())
    }

    fn apply(&mut self, records: Vec<StreamRecord>, mut changed: bool) -> Progress {
        for record in records {
            match record {
                StreamRecord::Text(text) => {
                    if let Some(turn) = self.current.as_mut() {
                        turn.answer.push_str(&text);
                        changed = true;
                    }
                }
                StreamRecord::Error(message) => return self.fail(FailureReason::Server(message)),
                StreamRecord::End => return self.settle(),
            }
        }
        if changed {
            self.publish_turn();
        }
        Progress::Continue
    }

    fn settle(&mut self) -> Progress {
        let Some(turn) = self.current.as_mut() else {
            return Progress::Stale;
        };
        turn.state = TurnState::Settled;
        let (id, question, answer) = (turn.id, turn.question.clone(), turn.answer.clone());
        info!("Turn {} settled ({} chars)", id, answer.len());
        self.publish_turn();

        // The settled title comes from the answer; the question only covers an empty one.
        if self.session.record_settled() == 1 {
            let title = if answer.trim().is_empty() {
                title::synthesize(Some(&question), None)
            } else {
                title::synthesize(None, Some(&answer))
            };
            self.update_title(title);
        }
        Progress::Finished(TurnState::Settled)
    }

    fn fail(&mut self, reason: FailureReason) -> Progress {
        let Some(turn) = self.current.as_mut() else {
            return Progress::Stale;
        };
        warn!("Turn {} failed: {}", turn.id, reason);
        turn.token.cancel();
        turn.state = TurnState::Failed(reason.clone());
        self.publish_turn();
        self.publish_notice(&reason.notice());
        Progress::Finished(TurnState::Failed(reason))
    }

    fn abort_active(&mut self) -> bool {
        let Some(turn) = self.current.as_mut().filter(|t| !t.state.is_terminal()) else {
            return false;
        };
        info!("Turn {} aborted", turn.id);
        turn.token.cancel();
        turn.state = TurnState::Aborted;
        self.publish_turn();
        self.publish_notice(STOPPED_NOTICE);
        true
    }

    fn update_title(&mut self, title: String) {
        debug!("Conversation title: {:?}", title);
        self.session.set_title(title.clone());
        self.pending_title = Some(title.clone());
        self.display.publish(DisplayUpdate::Title(title));
    }

    fn archive(&mut self, snapshot: TurnOutcome) {
        if self.archived.len() == MAX_ARCHIVED_TURNS {
            self.archived.pop_front();
        }
        self.archived.push_back(snapshot);
    }

    fn publish_turn(&self) {
        if let Some(turn) = &self.current {
            self.display.publish(DisplayUpdate::Turn {
                id: turn.id,
                state: turn.state.clone(),
                markup: markup::render(&turn.answer),
            });
        }
    }

    fn publish_notice(&self, text: &str) {
        self.display.publish(DisplayUpdate::Notice {
            markup: markup::render(text),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{NullSurface, RecordingSurface};
    use std::sync::Arc;

    fn controller() -> (TurnController<Arc<RecordingSurface>>, Arc<RecordingSurface>) {
        let surface = Arc::new(RecordingSurface::new());
        let session = SessionContext::new().with_document("manual.pdf");
        (TurnController::new(session, surface.clone()), surface)
    }

    #[test]
    fn test_happy_path_settles() {
        let (mut c, surface) = controller();
        let ticket = c.start("How do I reset it?").unwrap();
        assert_eq!(c.state(), TurnState::AwaitingResponse);

        assert_eq!(c.on_chunk(&ticket, b"data: **Hold** the\n\n"), Progress::Continue);
        assert_eq!(c.state(), TurnState::Streaming);
        assert_eq!(c.on_chunk(&ticket, b"data:  button\n\n"), Progress::Continue);
        assert_eq!(
            c.on_chunk(&ticket, b"data: [END]\n\n"),
            Progress::Finished(TurnState::Settled)
        );

        assert_eq!(c.answer(), "**Hold** the button");
        assert_eq!(
            surface.states_of(ticket.id()),
            vec![
                TurnState::AwaitingResponse,
                TurnState::Streaming,
                TurnState::Streaming,
                TurnState::Settled
            ]
        );
        assert_eq!(
            surface.last_markup(ticket.id()).as_deref(),
            Some("<p><strong>Hold</strong> the button</p>")
        );
    }

    #[test]
    fn test_start_requires_document_and_question() {
        let mut c = TurnController::new(SessionContext::new(), NullSurface);
        assert!(matches!(c.start("hi there"), Err(TurnError::Precondition(_))));
        assert_eq!(c.state(), TurnState::Idle);

        let (mut c, _) = controller();
        assert!(matches!(c.start("   "), Err(TurnError::Precondition(_))));
    }

    #[test]
    fn test_new_turn_preempts_and_stale_chunks_are_dropped() {
        let (mut c, surface) = controller();
        let first = c.start("first question").unwrap();
        c.on_chunk(&first, b"data: partial\n\n");

        let second = c.start("second question").unwrap();
        assert!(first.token().is_cancelled());
        assert!(!second.token().is_cancelled());

        let before = surface.updates().len();
        assert_eq!(c.on_chunk(&first, b"data: late\n\n"), Progress::Stale);
        assert_eq!(c.on_complete(&first), Progress::Stale);
        assert_eq!(surface.updates().len(), before);

        assert_eq!(c.outcome(first.id()).map(|s| s.state), Some(TurnState::Aborted));
        assert_eq!(c.outcome(first.id()).map(|s| s.answer), Some("partial".to_string()));
        assert_eq!(c.current_turn(), Some(second.id()));
        assert_eq!(c.answer(), "");
        assert_eq!(surface.notices(), vec!["<p>Generation stopped.</p>".to_string()]);
    }

    #[test]
    fn test_server_error_record_fails_turn() {
        let (mut c, surface) = controller();
        let ticket = c.start("question here").unwrap();
        let progress = c.on_chunk(&ticket, b"data: {\"error\": \"model offline\"}\n\n");

        assert_eq!(
            progress,
            Progress::Finished(TurnState::Failed(FailureReason::Server("model offline".into())))
        );
        assert!(ticket.token().is_cancelled());
        assert_eq!(surface.notices(), vec!["<p>Error: model offline</p>".to_string()]);
        assert_eq!(c.on_chunk(&ticket, b"data: more\n\n"), Progress::Stale);
    }

    #[test]
    fn test_clean_close_without_sentinel_settles() {
        let (mut c, _) = controller();
        let ticket = c.start("question here").unwrap();
        c.on_chunk(&ticket, b"data: done");
        assert_eq!(c.on_complete(&ticket), Progress::Finished(TurnState::Settled));
        assert_eq!(c.answer(), "done");
    }

    #[test]
    fn test_cancel_only_affects_active_turn() {
        let (mut c, surface) = controller();
        assert!(!c.cancel());

        let ticket = c.start("question here").unwrap();
        assert!(c.cancel());
        assert_eq!(c.state(), TurnState::Aborted);
        assert!(ticket.token().is_cancelled());
        assert!(!c.cancel());
        assert_eq!(surface.notices().len(), 1);
    }

    #[test]
    fn test_titles_provisional_then_from_first_answer() {
        let (mut c, surface) = controller();
        let ticket = c.start("tell me about returns").unwrap();
        assert_eq!(c.take_title_update().as_deref(), Some("Tell me about returns"));

        c.on_chunk(&ticket, b"data: Return policy: 30 days\n\ndata: [END]\n\n");
        assert_eq!(c.take_title_update().as_deref(), Some("Return policy"));
        assert_eq!(c.session().title(), Some("Return policy"));

        let second = c.start("and refunds").unwrap();
        c.on_chunk(&second, b"data: Refunds: 5 days\n\ndata: [END]\n\n");
        assert_eq!(c.take_title_update(), None);
        assert_eq!(
            surface.titles(),
            vec!["Tell me about returns".to_string(), "Return policy".to_string()]
        );
    }
}

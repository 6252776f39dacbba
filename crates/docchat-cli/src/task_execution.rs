//! Running a single question with Ctrl-C cancellation.

use docchat_core::{ChatClient, DisplaySurface, TurnError, TurnOutcome};
use tracing::{debug, error};

use crate::simple_output::SimpleOutput;

/// Ask one question and wait for the turn to finish.
///
/// Ctrl-C aborts the turn in flight. Returns `None` when the turn could not
/// start or was interrupted; failures of a started turn are in the outcome
/// and have already been shown as a notice.
pub async fn execute_question<D: DisplaySurface>(
    client: &ChatClient<D>,
    question: &str,
    output: &SimpleOutput,
) -> Option<TurnOutcome> {
    let result = tokio::select! {
        result = client.ask(question) => result,
        _ = tokio::signal::ctrl_c() => {
            client.cancel();
            output.print_info("Operation cancelled by user (Ctrl+C)");
            return None;
        }
    };

    match result {
        Ok(outcome) => {
            if let Some(err) = outcome.error() {
                debug!("Turn {} ended without an answer: {}", outcome.id, err);
            }
            Some(outcome)
        }
        Err(e) => {
            match e.downcast_ref::<TurnError>() {
                Some(TurnError::Precondition(reason)) => {
                    output.print_error(&format!("Cannot ask yet: {}", reason));
                    output.print_info("Use /docs to list documents and /doc <name> to pick one.");
                }
                _ => {
                    error!("Question failed: {:#}", e);
                    output.print_error(&format!("{:#}", e));
                }
            }
            None
        }
    }
}

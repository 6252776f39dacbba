use crossterm::cursor::MoveToColumn;
use crossterm::style::{Color, ResetColor, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};
use docchat_core::{DisplaySurface, DisplayUpdate, TurnState};
use std::io::{self, Write};
use std::sync::Mutex;

/// Console implementation of DisplaySurface that prints to stdout.
///
/// While a turn is in flight a single progress line is rewritten in place;
/// the final markup is printed once the turn is terminal.
pub struct ConsoleSurface {
    progress_line: Mutex<bool>,
}

impl ConsoleSurface {
    pub fn new() -> Self {
        Self {
            progress_line: Mutex::new(false),
        }
    }

    fn show_progress(&self, message: &str) {
        let mut shown = self
            .progress_line
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(stdout, MoveToColumn(0), Clear(ClearType::CurrentLine));
        print!("{}", message);
        let _ = stdout.flush();
        *shown = true;
    }

    fn clear_progress(&self) {
        let mut shown = self
            .progress_line
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *shown {
            let _ = crossterm::execute!(io::stdout(), MoveToColumn(0), Clear(ClearType::CurrentLine));
            *shown = false;
        }
    }
}

impl Default for ConsoleSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySurface for ConsoleSurface {
    fn publish(&self, update: DisplayUpdate) {
        match update {
            DisplayUpdate::Turn { state, markup, .. } => match state {
                TurnState::Idle => {}
                TurnState::AwaitingResponse => self.show_progress("🤔 Thinking..."),
                TurnState::Streaming => {
                    self.show_progress(&format!("📄 Receiving answer ({} bytes)", markup.len()))
                }
                TurnState::Settled | TurnState::Aborted | TurnState::Failed(_) => {
                    self.clear_progress();
                    if !markup.is_empty() {
                        println!("{}", markup);
                    }
                }
            },
            DisplayUpdate::Notice { markup } => {
                self.clear_progress();
                println!(
                    "{}⚠️  {}{}",
                    SetForegroundColor(Color::Yellow),
                    markup,
                    ResetColor
                );
            }
            DisplayUpdate::Title(title) => {
                self.clear_progress();
                println!(
                    "{}📝 {}{}",
                    SetForegroundColor(Color::Cyan),
                    title,
                    ResetColor
                );
            }
        }
    }
}

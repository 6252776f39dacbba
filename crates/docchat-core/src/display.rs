use crate::turn::{TurnId, TurnState};
use std::sync::{Arc, Mutex};

/// What the turn controller tells the outside world
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayUpdate {
    /// Current markup of a turn, published on every transition and increment
    Turn {
        id: TurnId,
        state: TurnState,
        markup: String,
    },
    /// A standalone notice, e.g. "Generation stopped." or a failure message
    Notice { markup: String },
    /// The conversation title changed
    Title(String),
}

/// Interface for presenting turn output.
/// Implementations must be cheap: publish is called with the controller locked.
pub trait DisplaySurface: Send + Sync {
    fn publish(&self, update: DisplayUpdate);
}

impl<T: DisplaySurface + ?Sized> DisplaySurface for Arc<T> {
    fn publish(&self, update: DisplayUpdate) {
        (**self).publish(update)
    }
}

/// A no-op surface for when output is not needed
pub struct NullSurface;

impl DisplaySurface for NullSurface {
    fn publish(&self, _update: DisplayUpdate) {}
}

/// Keeps every update, for tests and for replaying a turn
#[derive(Debug, Default)]
pub struct RecordingSurface {
    updates: Mutex<Vec<DisplayUpdate>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<DisplayUpdate> {
        self.updates
            .lock()
            .map(|u| u.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// States published for one turn, in order
    pub fn states_of(&self, id: TurnId) -> Vec<TurnState> {
        self.updates()
            .into_iter()
            .filter_map(|u| match u {
                DisplayUpdate::Turn { id: turn, state, .. } if turn == id => Some(state),
                _ => None,
            })
            .collect()
    }

    pub fn notices(&self) -> Vec<String> {
        self.updates()
            .into_iter()
            .filter_map(|u| match u {
                DisplayUpdate::Notice { markup } => Some(markup),
                _ => None,
            })
            .collect()
    }

    pub fn titles(&self) -> Vec<String> {
        self.updates()
            .into_iter()
            .filter_map(|u| match u {
                DisplayUpdate::Title(title) => Some(title),
                _ => None,
            })
            .collect()
    }

    /// Last markup published for a turn
    pub fn last_markup(&self, id: TurnId) -> Option<String> {
        self.updates().into_iter().rev().find_map(|u| match u {
            DisplayUpdate::Turn { id: turn, markup, .. } if turn == id => Some(markup),
            _ => None,
        })
    }
}

impl DisplaySurface for RecordingSurface {
    fn publish(&self, update: DisplayUpdate) {
        match self.updates.lock() {
            Ok(mut updates) => updates.push(update),
            Err(poisoned) => poisoned.into_inner().push(update),
        }
    }
}

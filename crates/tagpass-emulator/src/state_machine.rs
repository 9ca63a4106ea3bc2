//! Presentation session state machine.
//!
//! # States
//!
//! - `Idle`: no session pending, a presentation may begin
//! - `Presenting`: emulation is on and an auto-stop is armed
//! - `Cooldown`: emulation is off, new presentations are refused until the
//!   cooldown expires
//!
//! # Valid Transitions
//!
//! - Idle → Presenting → Idle
//! - Presenting → Cooldown → Idle
//!
//! An administrative stop uses [`SessionMachine::reset`] to return to `Idle`
//! from anywhere.
//!
//! # Examples
//!
//! ```
//! use tagpass_emulator::{PresentationState, SessionMachine};
//!
//! let mut machine = SessionMachine::new();
//! machine.transition_to(PresentationState::Presenting).unwrap();
//! machine.transition_to(PresentationState::Cooldown).unwrap();
//!
//! assert!(machine.transition_to(PresentationState::Presenting).is_err());
//! assert_eq!(machine.history().len(), 2);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tagpass_core::{Error, Result};

/// Maximum number of state transitions to keep in history.
const MAX_HISTORY_SIZE: usize = 64;

/// Phase of the current presentation session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationState {
    #[default]
    Idle,
    Presenting,
    Cooldown,
}

impl fmt::Display for PresentationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            PresentationState::Idle => "Idle",
            PresentationState::Presenting => "Presenting",
            PresentationState::Cooldown => "Cooldown",
        };
        write!(f, "{}", state_str)
    }
}

impl PresentationState {
    /// Check if transition to target state is valid from this state.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagpass_emulator::PresentationState;
    ///
    /// assert!(PresentationState::Idle.can_transition_to(&PresentationState::Presenting));
    /// assert!(!PresentationState::Idle.can_transition_to(&PresentationState::Cooldown));
    /// ```
    pub fn can_transition_to(&self, target: &PresentationState) -> bool {
        matches!(
            (self, target),
            (PresentationState::Idle, PresentationState::Presenting)
                | (
                    PresentationState::Presenting,
                    PresentationState::Cooldown | PresentationState::Idle
                )
                | (PresentationState::Cooldown, PresentationState::Idle)
        )
    }

    /// `true` while a session is pending and new presentations are refused.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        *self != PresentationState::Idle
    }
}

/// Represents a single state transition with timestamp.
///
/// The `timestamp` field is not serialized; on deserialization it is set to
/// the current time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: PresentationState,
    pub to: PresentationState,

    #[serde(skip, default = "Instant::now")]
    pub timestamp: Instant,
}

impl StateTransition {
    pub fn new(from: PresentationState, to: PresentationState) -> Self {
        Self {
            from,
            to,
            timestamp: Instant::now(),
        }
    }
}

/// Validated session state with a bounded transition history.
///
/// Not thread-safe; it is owned by one [`Presenter`](crate::Presenter).
#[derive(Debug)]
pub struct SessionMachine {
    current_state: PresentationState,
    history: VecDeque<StateTransition>,
}

impl SessionMachine {
    /// Create a new state machine in the Idle state.
    pub fn new() -> Self {
        Self {
            current_state: PresentationState::Idle,
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    pub fn current_state(&self) -> PresentationState {
        self.current_state
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// Transition to a new state, validating the transition.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidStateTransition` if the transition is not
    /// allowed from the current state. The state is unchanged on error.
    pub fn transition_to(&mut self, new_state: PresentationState) -> Result<StateTransition> {
        if !self.current_state.can_transition_to(&new_state) {
            return Err(Error::InvalidStateTransition {
                from: self.current_state.to_string(),
                to: new_state.to_string(),
            });
        }

        let transition = StateTransition::new(self.current_state, new_state);
        self.perform_state_change(new_state, transition.clone());
        Ok(transition)
    }

    /// Force the machine back to Idle regardless of current state.
    ///
    /// Returns `None` if it was already idle.
    pub fn reset(&mut self) -> Option<StateTransition> {
        if self.current_state == PresentationState::Idle {
            return None;
        }
        let transition = StateTransition::new(self.current_state, PresentationState::Idle);
        self.perform_state_change(PresentationState::Idle, transition.clone());
        Some(transition)
    }

    fn perform_state_change(&mut self, new_state: PresentationState, transition: StateTransition) {
        self.current_state = new_state;

        self.history.push_back(transition);
        if self.history.len() > MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
    }
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}

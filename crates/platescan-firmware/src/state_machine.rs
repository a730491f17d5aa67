//! Session state machine.
//!
//! Tracks where the station is in the scan workflow and rejects any
//! transition the workflow does not allow.
//!
//! # States
//!
//! - `Idle`: waiting for a card tap
//! - `ConfirmScan`: a valid card was read, waiting for the start button
//! - `Scanning`: the scanner is measuring
//! - `ConfirmResult`: a result is on screen, waiting for the card again
//!
//! # Valid Transitions
//!
//! - Idle → ConfirmScan → Scanning → ConfirmResult → Idle
//! - ConfirmScan → Idle (card tapped again to cancel)
//!
//! # Examples
//!
//! ```
//! use platescan_firmware::{SessionState, StateMachine};
//!
//! let mut machine = StateMachine::new();
//! machine.transition_to(SessionState::ConfirmScan).unwrap();
//! assert!(machine.transition_to(SessionState::ConfirmResult).is_err());
//! assert_eq!(machine.current_state(), &SessionState::ConfirmScan);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use platescan_core::{Error, Result};

/// Maximum number of state transitions to keep in history.
///
/// A complete session is four transitions, so this covers the last 25
/// sessions.
const MAX_HISTORY_SIZE: usize = 100;

/// Phase of the scan workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Waiting for a card tap.
    Idle,

    /// Card accepted; waiting for the start button (or a cancelling tap).
    ConfirmScan,

    /// Scan running on the peripheral.
    Scanning,

    /// Result available; waiting for the card to confirm.
    ConfirmResult,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            SessionState::Idle => "Idle",
            SessionState::ConfirmScan => "ConfirmScan",
            SessionState::Scanning => "Scanning",
            SessionState::ConfirmResult => "ConfirmResult",
        };
        write!(f, "{}", state_str)
    }
}

impl SessionState {
    /// Check if transition to target state is valid from this state.
    ///
    /// # Examples
    ///
    /// ```
    /// use platescan_firmware::SessionState;
    ///
    /// assert!(SessionState::Idle.can_transition_to(&SessionState::ConfirmScan));
    /// assert!(!SessionState::Idle.can_transition_to(&SessionState::Scanning));
    /// ```
    pub fn can_transition_to(&self, target: &SessionState) -> bool {
        matches!(
            (self, target),
            (SessionState::Idle, SessionState::ConfirmScan)
                | (SessionState::ConfirmScan, SessionState::Idle | SessionState::Scanning)
                | (SessionState::Scanning, SessionState::ConfirmResult)
                | (SessionState::ConfirmResult, SessionState::Idle)
        )
    }
}

/// A single state transition with timestamp.
///
/// The timestamp is not serialized; deserialized records carry the time of
/// deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: SessionState,
    pub to: SessionState,

    #[serde(skip, default = "Instant::now")]
    pub timestamp: Instant,
}

impl StateTransition {
    pub fn new(from: SessionState, to: SessionState) -> Self {
        Self {
            from,
            to,
            timestamp: Instant::now(),
        }
    }
}

/// Validated session state with a bounded transition history.
///
/// Owned by the session controller; it is not shared between threads.
///
/// # Examples
///
/// ```
/// use platescan_firmware::{SessionState, StateMachine};
///
/// let mut machine = StateMachine::new();
/// machine.transition_to(SessionState::ConfirmScan).unwrap();
/// machine.transition_to(SessionState::Scanning).unwrap();
/// machine.transition_to(SessionState::ConfirmResult).unwrap();
/// machine.transition_to(SessionState::Idle).unwrap();
///
/// assert_eq!(machine.history().len(), 4);
/// ```
pub struct StateMachine {
    current_state: SessionState,
    state_entered_at: Instant,
    history: VecDeque<StateTransition>,
}

impl StateMachine {
    /// Create a new state machine in the Idle state.
    pub fn new() -> Self {
        Self {
            current_state: SessionState::Idle,
            state_entered_at: Instant::now(),
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    pub fn current_state(&self) -> &SessionState {
        &self.current_state
    }

    /// Get the time elapsed in the current state.
    pub fn time_in_current_state(&self) -> Duration {
        self.state_entered_at.elapsed()
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// Transition to a new state, validating the transition.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidStateTransition` if the workflow does not allow
    /// moving from the current state to `new_state`. The machine is left
    /// unchanged.
    pub fn transition_to(&mut self, new_state: SessionState) -> Result<StateTransition> {
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

    /// Force the machine back to Idle regardless of the current state.
    pub fn reset(&mut self) -> StateTransition {
        let transition = StateTransition::new(self.current_state, SessionState::Idle);
        self.perform_state_change(SessionState::Idle, transition.clone());
        transition
    }

    fn perform_state_change(&mut self, new_state: SessionState, transition: StateTransition) {
        self.current_state = new_state;
        self.state_entered_at = Instant::now();

        self.history.push_back(transition);
        if self.history.len() > MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

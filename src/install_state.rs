//! Per-target install state machine
//!
//! Every `InstallTarget` consulted by the orchestrator walks through this
//! machine exactly once per run. Transitions are validated so a target can
//! never be reported installed without either passing its guard or going
//! through `Installing` first.
//!
//! # State Flow
//!
//! ```text
//! Absent ──(guard satisfied)──────────────► Installed
//!    │
//!    └──► Installing ──(actions succeeded)──► Installed
//!              │
//!              └──(any action failed)───────► Failed
//! ```
//!
//! `Installed` and `Failed` are terminal.

use std::fmt;
use thiserror::Error;

/// Lifecycle of a single install target within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallState {
    /// Guard not yet evaluated, or evaluated false
    Absent,
    /// Install actions are running
    Installing,
    /// Target is present (terminal)
    Installed,
    /// An install action failed (terminal)
    Failed,
}

impl InstallState {
    /// Returns true if this is a terminal state (Installed or Failed)
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Installed | Self::Failed)
    }

    /// Returns true if `to` is a legal successor of this state
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Absent, Self::Installing)
                | (Self::Absent, Self::Installed)
                | (Self::Installing, Self::Installed)
                | (Self::Installing, Self::Failed)
        )
    }

    /// Returns a human-readable description of this state
    pub const fn description(self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur during state transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// Attempted to transition from a terminal state
    #[error("Cannot transition from terminal state {from}")]
    FromTerminalState { from: InstallState },

    /// Attempted a transition the machine does not allow
    #[error("Cannot go from {from} to {to}")]
    Invalid { from: InstallState, to: InstallState },
}

/// Tracks one target's progress through the state machine.
///
/// # Example
///
/// ```
/// use devprov::install_state::{InstallState, TargetProgress};
///
/// let mut progress = TargetProgress::new("editor");
/// progress.transition_to(InstallState::Installing).unwrap();
/// progress.transition_to(InstallState::Installed).unwrap();
/// assert!(progress.is_terminal());
///
/// // Nothing leaves a terminal state
/// assert!(progress.transition_to(InstallState::Installing).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct TargetProgress {
    name: String,
    current: InstallState,
    history: Vec<InstallState>,
}

impl TargetProgress {
    /// Create a progress tracker in the `Absent` state.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            current: InstallState::Absent,
            history: vec![InstallState::Absent],
        }
    }

    /// Target name this tracker belongs to
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current state
    #[inline]
    pub fn current(&self) -> InstallState {
        self.current
    }

    /// Returns true once the target reached Installed or Failed
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    /// Every state visited so far, starting with `Absent`
    pub fn history(&self) -> &[InstallState] {
        &self.history
    }

    /// Move to `to`, validating the transition.
    ///
    /// # Errors
    ///
    /// - `FromTerminalState` if already Installed or Failed
    /// - `Invalid` for any other transition the machine does not allow
    pub fn transition_to(&mut self, to: InstallState) -> Result<(), TransitionError> {
        if self.current.is_terminal() {
            return Err(TransitionError::FromTerminalState { from: self.current });
        }
        if !self.current.can_transition_to(to) {
            return Err(TransitionError::Invalid {
                from: self.current,
                to,
            });
        }

        tracing::debug!("{}: {} -> {}", self.name, self.current, to);
        self.current = to;
        self.history.push(to);
        Ok(())
    }
}

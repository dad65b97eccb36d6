//! Session lifecycle state machine.
//!
//! ```text
//! Free ──start──▶ Running ──stop──▶ Stopped ──start──▶ Running ...
//! ```
//!
//! Transitions return a [`LifecycleAction`] for the runtime to execute:
//! registering the periodic tick on start and cancelling it on stop. Calls
//! that don't change state return `None`, so a repeated `start()` never
//! registers a second trigger and a stopped session never leaks one.

use std::fmt;

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Created, never started
    #[default]
    Free,
    /// Accepting commands and sealing frames
    Running,
    /// Halted; may be started again
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Side effect requested by a lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Register the periodic tick trigger
    ScheduleTicks,
    /// Cancel the periodic tick trigger
    CancelTicks,
}

/// Free/Running/Stopped state machine.
#[derive(Debug, Default)]
pub struct SessionStateMachine {
    state: SessionState,
}

impl SessionStateMachine {
    /// New machine in `Free`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the session is `Running`.
    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    /// Enter `Running`. No-op if already running.
    pub fn start(&mut self) -> Option<LifecycleAction> {
        if self.is_running() {
            return None;
        }

        tracing::debug!(from = %self.state, "session starting");
        self.state = SessionState::Running;
        Some(LifecycleAction::ScheduleTicks)
    }

    /// Leave `Running` for `Stopped`. No-op in any other state.
    pub fn stop(&mut self) -> Option<LifecycleAction> {
        if !self.is_running() {
            return None;
        }

        tracing::debug!("session stopping");
        self.state = SessionState::Stopped;
        Some(LifecycleAction::CancelTicks)
    }
}

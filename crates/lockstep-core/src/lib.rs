//! Lockstep frame-sync core.
//!
//! Sans-IO building blocks for an authoritative lockstep session:
//!
//! - [`FrameLog`]: append-only, monotonically keyed store of sealed frames
//! - [`Roster`]: connected participants, seats and delivery cursors
//! - [`SessionStateMachine`]: Free/Running/Stopped lifecycle
//! - [`FrameSyncSession`]: accumulator, sealing and per-tick catch-up delivery
//!
//! Nothing here touches the network, clocks or threads. Operations return
//! actions ([`SessionAction`], [`LifecycleAction`]) that a runtime executes.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod connection;
mod error;
pub mod lifecycle;
pub mod log;
pub mod roster;
pub mod session;

pub use connection::Connection;
pub use error::{DeliveryError, SessionError};
pub use lifecycle::{LifecycleAction, SessionState, SessionStateMachine};
pub use log::{FrameLog, FrameStore, MemoryFrameStore, RetentionPolicy, StorageError};
pub use roster::{Participant, Roster, Seat};
pub use session::{
    FrameSyncSession, ReportOutcome, SessionAction, SessionConfig, UnauthorizedPolicy,
};

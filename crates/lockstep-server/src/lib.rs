//! Lockstep session runtime.
//!
//! Tokio glue that drives [`lockstep_core`]'s action-based sessions with real
//! time and real channels.
//!
//! # Components
//!
//! - [`SessionHandle`]: serialized access to one session plus its tick task
//! - [`SessionRegistry`]: room id → session handle
//! - [`execute_actions`]: fire-and-forget frame delivery
//! - [`ChannelConnection`]: in-process connection over a bounded channel
//! - [`ChaoticConnection`]: fault-injecting connection wrapper
//! - [`ServerConfig`]: tick period, queue depth and session settings

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod chaotic;
mod config;
mod connection;
mod error;
mod executor;
mod handle;
mod registry;

pub use chaotic::ChaoticConnection;
pub use config::{DEFAULT_DELIVERY_BUFFER, DEFAULT_TICK_INTERVAL, ServerConfig};
pub use connection::{ChannelConnection, FrameReceiver, channel};
pub use error::{RegistryError, ServerError};
pub use executor::{DeliveryStats, execute_actions};
pub use handle::SessionHandle;
pub use registry::SessionRegistry;

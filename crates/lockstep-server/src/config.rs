//! Runtime configuration.

use std::time::Duration;

use lockstep_core::SessionConfig;

use crate::ServerError;

/// Default tick period (about 15 Hz).
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(66);

/// Default per-participant outbound queue depth, in frames.
pub const DEFAULT_DELIVERY_BUFFER: usize = 256;

/// Configuration shared by every room the server hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    /// Period between ticks of a running session
    pub tick_interval: Duration,
    /// Capacity of each participant's outbound frame queue
    pub delivery_buffer: usize,
    /// Per-session behaviour (retention, unauthorized reports)
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            delivery_buffer: DEFAULT_DELIVERY_BUFFER,
            session: SessionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reject settings the runtime cannot run with.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.tick_interval.is_zero() {
            return Err(ServerError::Config("tick interval must be non-zero".into()));
        }

        if self.delivery_buffer == 0 {
            return Err(ServerError::Config("delivery buffer must hold at least one frame".into()));
        }

        Ok(())
    }
}

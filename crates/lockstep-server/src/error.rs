//! Server error types.

use lockstep_core::SessionError;
use lockstep_proto::ProtocolError;
use thiserror::Error;

/// Errors from [`SessionRegistry`](crate::SessionRegistry) operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Room does not exist
    #[error("room not found: {0}")]
    RoomNotFound(u64),

    /// Room already exists
    #[error("room already exists: {0}")]
    RoomAlreadyExists(u64),
}

/// Errors that can occur in the server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid configuration.
    ///
    /// Fatal at startup. Fix the configuration and restart.
    #[error("configuration error: {0}")]
    Config(String),

    /// Session rejected an operation or hit a broken invariant.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Room lookup or creation failed.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Frame could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

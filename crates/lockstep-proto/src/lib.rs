//! Lockstep wire protocol types.
//!
//! Value types shared by the frame-sync server and its clients:
//!
//! - [`Command`]: one participant's input for the frame being built
//! - [`Frame`]: an immutable, sequentially numbered batch of commands
//! - [`FrameId`]: frame identity, with `0` reserved as an empty sentinel
//! - [`wire`]: CBOR encoding of frames and frame batches
//!
//! Nothing in this crate performs I/O.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod command;
pub mod errors;
mod frame;
pub mod wire;

pub use command::Command;
pub use errors::{ProtocolError, Result};
pub use frame::{Frame, FrameId};
pub use wire::{FrameBatch, MAX_ENCODED_FRAME_SIZE, decode_frame, encode_frame};

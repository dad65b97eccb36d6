//! In-process connection backed by a bounded tokio channel.
//!
//! Frames are CBOR-encoded on delivery, so the receiving side sees exactly
//! the bytes a network peer would.

use bytes::{Bytes, BytesMut};
use lockstep_core::{Connection, DeliveryError};
use lockstep_proto::{Frame, ProtocolError, decode_frame, encode_frame};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Sending half handed to the session.
#[derive(Debug, Clone)]
pub struct ChannelConnection {
    tx: mpsc::Sender<Bytes>,
}

/// Receiving half held by the participant.
#[derive(Debug)]
pub struct FrameReceiver {
    rx: mpsc::Receiver<Bytes>,
}

/// Create a connection whose queue holds up to `capacity` frames.
pub fn channel(capacity: usize) -> (ChannelConnection, FrameReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelConnection { tx }, FrameReceiver { rx })
}

impl Connection for ChannelConnection {
    fn deliver(&self, frame: &Frame) -> Result<(), DeliveryError> {
        let mut buf = BytesMut::new();
        encode_frame(frame, &mut buf).map_err(|e| DeliveryError::Transport(e.to_string()))?;

        self.tx.try_send(buf.freeze()).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Full,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

impl FrameReceiver {
    /// Wait for the next frame. `None` once the session side is gone.
    pub async fn recv(&mut self) -> Option<Result<Frame, ProtocolError>> {
        let bytes = self.rx.recv().await?;
        Some(decode_frame(&bytes))
    }

    /// Next frame if one is already queued.
    pub fn try_recv(&mut self) -> Option<Result<Frame, ProtocolError>> {
        let bytes = self.rx.try_recv().ok()?;
        Some(decode_frame(&bytes))
    }

    /// Drain every queued frame.
    pub fn drain(&mut self) -> Vec<Result<Frame, ProtocolError>> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

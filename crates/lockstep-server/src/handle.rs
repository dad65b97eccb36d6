//! Shared handle to a running frame-sync session.
//!
//! Every operation on a session goes through one `tokio::sync::Mutex`, so
//! reports, joins, leaves and ticks are serialized and a command lands in
//! exactly one frame. A tick delivers its frames before releasing the lock,
//! so frames from consecutive ticks reach each participant in seal order.
//!
//! Starting a session spawns one tick task that drives `on_tick` on a
//! `tokio::time::interval`. Missed ticks are skipped, not queued, so ticks
//! never overlap or burst. Stopping the session aborts the task.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use bytes::Bytes;
use lockstep_core::{
    Connection, FrameSyncSession, LifecycleAction, ReportOutcome, Seat, SessionConfig,
    SessionError, SessionState,
};
use lockstep_proto::{Command, FrameBatch, FrameId};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

use crate::{
    ServerError,
    executor::{DeliveryStats, execute_actions},
};

struct Inner<C: Connection> {
    session: FrameSyncSession<C>,
    /// Tick task, present while running
    ticker: Option<JoinHandle<()>>,
}

struct Shared<C: Connection> {
    room_id: u64,
    tick_interval: Duration,
    inner: Mutex<Inner<C>>,
}

/// Cloneable handle to one room's session.
///
/// The tick task only holds a weak reference: once every handle is dropped
/// the task exits on its next tick.
pub struct SessionHandle<C: Connection> {
    shared: Arc<Shared<C>>,
}

impl<C: Connection> Clone for SessionHandle<C> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<C: Connection> std::fmt::Debug for SessionHandle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("room_id", &self.shared.room_id)
            .field("tick_interval", &self.shared.tick_interval)
            .finish_non_exhaustive()
    }
}

impl<C: Connection> SessionHandle<C> {
    /// New session in `Free` with an empty log.
    ///
    /// A zero `tick_interval` is raised to one millisecond.
    pub fn new(room_id: u64, tick_interval: Duration, config: SessionConfig) -> Self {
        let tick_interval = tick_interval.max(Duration::from_millis(1));
        let inner = Inner { session: FrameSyncSession::new(config), ticker: None };

        Self { shared: Arc::new(Shared { room_id, tick_interval, inner: Mutex::new(inner) }) }
    }

    /// Room this session belongs to.
    pub fn room_id(&self) -> u64 {
        self.shared.room_id
    }

    /// Add a participant. It receives frames sealed from the next tick on.
    pub async fn join(&self, owner_id: u64, connection: C) -> Seat {
        let seat = self.shared.inner.lock().await.session.join(owner_id, connection);
        tracing::info!(room_id = self.shared.room_id, owner_id, %seat, "participant joined");
        seat
    }

    /// Remove a participant. Returns `false` if it wasn't connected.
    pub async fn leave(&self, owner_id: u64) -> bool {
        let left = self.shared.inner.lock().await.session.leave(owner_id);
        if left {
            tracing::info!(room_id = self.shared.room_id, owner_id, "participant left");
        }
        left
    }

    /// Start ticking. Returns `false` if already running.
    pub async fn start(&self) -> bool {
        let mut inner = self.shared.inner.lock().await;
        let Some(action) = inner.session.start() else {
            return false;
        };

        self.apply_lifecycle(&mut inner, action);
        true
    }

    /// Stop ticking. Returns `false` if not running.
    ///
    /// A tick that already holds the lock finishes; no tick runs after this
    /// returns.
    pub async fn stop(&self) -> bool {
        let mut inner = self.shared.inner.lock().await;
        let Some(action) = inner.session.stop() else {
            return false;
        };

        self.apply_lifecycle(&mut inner, action);
        true
    }

    /// Report a command on behalf of `owner_id`.
    pub async fn report_command(
        &self,
        owner_id: u64,
        caller_id: u64,
        entity_id: i32,
        command_type: u32,
        payload: impl Into<Bytes>,
    ) -> Result<ReportOutcome, SessionError> {
        let command = Command::new(entity_id, command_type, payload);
        self.shared.inner.lock().await.session.report_command(owner_id, caller_id, command)
    }

    /// Run one tick now and deliver its frames.
    ///
    /// Returns `None` if the session is not running. A fatal session error
    /// is logged and stops the session.
    ///
    /// Sealing and delivery both happen under the session lock, so
    /// concurrent callers (or a caller racing the tick task) never
    /// interleave their deliveries.
    pub async fn tick(&self) -> Option<DeliveryStats> {
        let room_id = self.shared.room_id;
        let mut inner = self.shared.inner.lock().await;

        let actions = match inner.session.on_tick() {
            Ok(actions) => actions,
            Err(e) => {
                tracing::error!(room_id, error = %e, "tick failed, stopping session");
                if let Some(action) = inner.session.stop() {
                    self.apply_lifecycle(&mut inner, action);
                }
                return None;
            },
        };

        if actions.is_empty() {
            return None;
        }

        // `Connection::deliver` never blocks, so holding the lock is bounded
        Some(execute_actions(room_id, actions))
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> SessionState {
        self.shared.inner.lock().await.session.state()
    }

    /// Newest sealed frame id.
    pub async fn latest_frame_id(&self) -> FrameId {
        self.shared.inner.lock().await.session.latest_frame_id()
    }

    /// Delivery cursor of a participant.
    pub async fn cursor(&self, owner_id: u64) -> Option<FrameId> {
        self.shared.inner.lock().await.session.cursor(owner_id)
    }

    /// Number of connected participants.
    pub async fn participant_count(&self) -> usize {
        self.shared.inner.lock().await.session.participant_count()
    }

    /// Retained frames sealed after `after`, as one consecutive batch.
    ///
    /// Frames already evicted by retention are left out.
    pub async fn history(&self, after: FrameId) -> Result<FrameBatch, ServerError> {
        let inner = self.shared.inner.lock().await;
        let latest = inner.session.latest_frame_id();
        if after >= latest {
            return Ok(FrameBatch::default());
        }

        let evicted_through = inner
            .session
            .log()
            .oldest_retained()
            .map_or(latest, |oldest| FrameId::new(oldest.get() - 1));
        let after = after.max(evicted_through);

        let frames = inner.session.log().range(after, latest).map_err(SessionError::from)?;
        Ok(FrameBatch::new(frames)?)
    }

    fn apply_lifecycle(&self, inner: &mut Inner<C>, action: LifecycleAction) {
        let room_id = self.shared.room_id;

        match action {
            LifecycleAction::ScheduleTicks => {
                if let Some(stale) = inner.ticker.replace(self.spawn_ticker()) {
                    stale.abort();
                }
                tracing::info!(room_id, interval = ?self.shared.tick_interval, "session started");
            },
            LifecycleAction::CancelTicks => {
                if let Some(ticker) = inner.ticker.take() {
                    ticker.abort();
                }
                tracing::info!(room_id, "session stopped");
            },
        }
    }

    fn spawn_ticker(&self) -> JoinHandle<()> {
        let shared: Weak<Shared<C>> = Arc::downgrade(&self.shared);
        let period = self.shared.tick_interval;
        let room_id = self.shared.room_id;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                let scheduled = interval.tick().await;

                let lateness = Instant::now().saturating_duration_since(scheduled);
                if lateness >= period {
                    tracing::warn!(room_id, ?lateness, "tick overran, skipping missed ticks");
                }

                let Some(shared) = shared.upgrade() else {
                    break;
                };

                if (SessionHandle { shared }).tick().await.is_none() {
                    break;
                }
            }

            tracing::debug!(room_id, "tick task exited");
        })
    }
}

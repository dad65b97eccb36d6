//! Frame-sync session: accumulator, sealing and catch-up delivery.
//!
//! A [`FrameSyncSession`] is the authoritative state of one room. Commands
//! reported while the session is running go into the accumulator. Each tick
//! seals the accumulator as the next frame and plans delivery of every frame
//! each participant has not been sent yet.
//!
//! The session performs no I/O. Operations return [`SessionAction`]s and
//! [`LifecycleAction`]s; the runtime executes them (pushes frames to
//! connections, registers or cancels the tick trigger).
//!
//! # Tick algorithm
//!
//! 1. `new_id = latest_id + 1`
//! 2. seal the accumulator as `Frame { new_id, commands }`
//! 3. reset the accumulator
//! 4. for every participant, emit one `Deliver` per frame in
//!    `(cursor, new_id]`, then set `cursor = new_id`
//!
//! The cursor advances whether or not the deliveries later succeed. A frame
//! that fails to reach a participant is skipped for that participant.

use std::sync::Arc;

use lockstep_proto::{Command, Frame, FrameId};

use crate::{
    error::SessionError,
    lifecycle::{LifecycleAction, SessionState, SessionStateMachine},
    log::{FrameLog, FrameStore, MemoryFrameStore, RetentionPolicy},
    roster::{Participant, Roster, Seat},
};

/// What to do with a report whose caller is not the channel owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnauthorizedPolicy {
    /// Drop the command without surfacing an error
    #[default]
    Silent,
    /// Drop the command and return `SessionError::Unauthorized`
    Reject,
}

/// Session configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionConfig {
    /// How many sealed frames to keep
    pub retention: RetentionPolicy,
    /// Handling of reports made on someone else's behalf
    pub unauthorized: UnauthorizedPolicy,
}

/// Result of a `report_command` call that did not error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Command appended to the accumulator
    Accepted,
    /// Dropped: session not running
    NotRunning,
    /// Dropped: caller is not the channel owner
    Unauthorized,
}

impl ReportOutcome {
    /// Whether the command made it into the accumulator.
    pub fn is_accepted(self) -> bool {
        self == Self::Accepted
    }
}

/// Actions produced by a tick.
#[derive(Debug, Clone)]
pub enum SessionAction<C> {
    /// A frame was sealed into the log
    FrameSealed {
        /// Id of the new frame
        frame_id: FrameId,
        /// Number of commands it carries
        command_count: usize,
    },

    /// Push one frame to one participant
    Deliver {
        /// Recipient
        owner_id: u64,
        /// Recipient's connection
        connection: C,
        /// Frame to push (shared between recipients)
        frame: Arc<Frame>,
    },
}

/// Authoritative frame-sync state for one room.
#[derive(Debug)]
pub struct FrameSyncSession<C, S: FrameStore = MemoryFrameStore> {
    lifecycle: SessionStateMachine,
    /// Commands for the frame being built, in report order
    accumulator: Vec<Command>,
    log: FrameLog<S>,
    roster: Roster<C>,
    config: SessionConfig,
}

impl<C> FrameSyncSession<C, MemoryFrameStore> {
    /// New session backed by an in-memory log.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_store(MemoryFrameStore::new(), config)
    }
}

impl<C, S: FrameStore> FrameSyncSession<C, S> {
    /// New session backed by `store`.
    pub fn with_store(store: S, config: SessionConfig) -> Self {
        Self {
            lifecycle: SessionStateMachine::new(),
            accumulator: Vec::new(),
            log: FrameLog::new(store, config.retention),
            roster: Roster::new(),
            config,
        }
    }

    /// Add a participant. Its cursor starts at the newest sealed frame.
    pub fn join(&mut self, owner_id: u64, connection: C) -> Seat {
        let latest = self.log.latest_id();
        let seat = self.roster.join(owner_id, connection, latest);

        tracing::debug!(owner_id, %seat, cursor = %latest, "participant joined");

        seat
    }

    /// Remove a participant. Returns `false` if it wasn't connected.
    pub fn leave(&mut self, owner_id: u64) -> bool {
        let Some(participant) = self.roster.leave(owner_id) else {
            return false;
        };

        tracing::debug!(owner_id, seat = %participant.seat, "participant left");

        true
    }

    /// Enter `Running`. Returns `ScheduleTicks` only on an actual transition.
    pub fn start(&mut self) -> Option<LifecycleAction> {
        self.lifecycle.start()
    }

    /// Leave `Running`. Returns `CancelTicks` only on an actual transition.
    pub fn stop(&mut self) -> Option<LifecycleAction> {
        self.lifecycle.stop()
    }

    /// Append a command to the frame being built.
    ///
    /// `owner_id` is the identity the report channel belongs to; `caller_id`
    /// is who actually called. Reports are dropped silently unless the
    /// session is running and the two match. Under
    /// [`UnauthorizedPolicy::Reject`] a mismatch is an error instead.
    pub fn report_command(
        &mut self,
        owner_id: u64,
        caller_id: u64,
        command: Command,
    ) -> Result<ReportOutcome, SessionError> {
        if !self.lifecycle.is_running() {
            tracing::trace!(owner_id, state = %self.lifecycle.state(), "report dropped");
            return Ok(ReportOutcome::NotRunning);
        }

        if caller_id != owner_id {
            tracing::debug!(owner_id, caller_id, "unauthorized report dropped");

            return match self.config.unauthorized {
                UnauthorizedPolicy::Silent => Ok(ReportOutcome::Unauthorized),
                UnauthorizedPolicy::Reject => {
                    Err(SessionError::Unauthorized { owner_id, caller_id })
                },
            };
        }

        self.accumulator.push(command);
        Ok(ReportOutcome::Accepted)
    }

    /// Run one tick: seal the accumulator and plan catch-up delivery.
    ///
    /// Returns no actions unless the session is running.
    ///
    /// # Errors
    ///
    /// Any error means the log and the session disagree (an out-of-sequence
    /// seal or a missing catch-up frame). Both are logic bugs; the caller
    /// should stop the session.
    pub fn on_tick(&mut self) -> Result<Vec<SessionAction<C>>, SessionError>
    where
        C: Clone,
    {
        if !self.lifecycle.is_running() {
            return Ok(Vec::new());
        }

        let latest = self.log.latest_id();
        let new_id = latest.checked_next().ok_or(SessionError::FrameIdExhausted(latest))?;

        let commands = std::mem::take(&mut self.accumulator);
        let command_count = commands.len();
        self.log.seal(new_id, Frame::new(new_id, commands))?;

        debug_assert!(self.accumulator.is_empty());
        tracing::debug!(frame_id = %new_id, command_count, "frame sealed");

        let mut actions = Vec::with_capacity(self.roster.len() + 1);
        actions.push(SessionAction::FrameSealed { frame_id: new_id, command_count });

        if let Some(oldest_cursor) = self.roster.min_cursor() {
            // Fetch each missed frame once and share it between recipients
            let pending: Vec<Arc<Frame>> =
                self.log.range(oldest_cursor, new_id)?.into_iter().map(Arc::new).collect();

            for participant in self.roster.iter_mut() {
                let cursor = participant.cursor();
                debug_assert!(cursor < new_id);

                let skip = (cursor.get() - oldest_cursor.get()) as usize;
                for frame in pending.iter().skip(skip) {
                    debug_assert!(frame.frame_id > cursor && frame.frame_id <= new_id);

                    actions.push(SessionAction::Deliver {
                        owner_id: participant.owner_id,
                        connection: participant.connection.clone(),
                        frame: Arc::clone(frame),
                    });
                }

                participant.advance_to(new_id);
            }
        }

        self.log.enforce_retention();

        Ok(actions)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.lifecycle.state()
    }

    /// Whether the session is running.
    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    /// Newest sealed frame id (sentinel if none).
    pub fn latest_frame_id(&self) -> FrameId {
        self.log.latest_id()
    }

    /// Commands waiting for the next seal, in report order.
    pub fn pending_commands(&self) -> &[Command] {
        &self.accumulator
    }

    /// Sealed frame by id.
    pub fn frame(&self, frame_id: FrameId) -> Result<Frame, SessionError> {
        Ok(self.log.get(frame_id)?)
    }

    /// Delivery cursor of a participant.
    pub fn cursor(&self, owner_id: u64) -> Option<FrameId> {
        self.roster.get(owner_id).map(Participant::cursor)
    }

    /// Seat of a participant.
    pub fn seat(&self, owner_id: u64) -> Option<Seat> {
        self.roster.get(owner_id).map(|p| p.seat)
    }

    /// Number of connected participants.
    pub fn participant_count(&self) -> usize {
        self.roster.len()
    }

    /// Participant roster.
    pub fn roster(&self) -> &Roster<C> {
        &self.roster
    }

    /// Frame log.
    pub fn log(&self) -> &FrameLog<S> {
        &self.log
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use bytes::Bytes;

    use super::*;

    type TestSession = FrameSyncSession<u64>;

    fn cmd(entity_id: i32) -> Command {
        Command::new(entity_id, 1, Bytes::from_static(b"x"))
    }

    /// (owner, frame id) pairs from Deliver actions, in emission order
    fn deliveries(actions: &[SessionAction<u64>]) -> Vec<(u64, u64)> {
        actions
            .iter()
            .filter_map(|a| match a {
                SessionAction::Deliver { owner_id, frame, .. } => {
                    Some((*owner_id, frame.frame_id.get()))
                },
                SessionAction::FrameSealed { .. } => None,
            })
            .collect()
    }

    #[test]
    fn tick_before_start_does_nothing() {
        let mut session = TestSession::new(SessionConfig::default());
        session.join(1, 1);

        assert!(session.on_tick().expect("tick failed").is_empty());
        assert_eq!(session.latest_frame_id(), FrameId::SENTINEL);
    }

    #[test]
    fn report_before_start_is_dropped() {
        let mut session = TestSession::new(SessionConfig::default());

        let outcome = session.report_command(1, 1, cmd(1)).expect("report failed");

        assert_eq!(outcome, ReportOutcome::NotRunning);
        assert!(session.pending_commands().is_empty());
    }

    #[test]
    fn unauthorized_report_is_silent_by_default() {
        let mut session = TestSession::new(SessionConfig::default());
        session.start();

        let outcome = session.report_command(1, 2, cmd(1)).expect("report failed");

        assert_eq!(outcome, ReportOutcome::Unauthorized);
        assert!(session.pending_commands().is_empty());
    }

    #[test]
    fn unauthorized_report_rejected_under_reject_policy() {
        let config =
            SessionConfig { unauthorized: UnauthorizedPolicy::Reject, ..Default::default() };
        let mut session = TestSession::new(config);
        session.start();

        let result = session.report_command(1, 2, cmd(1));

        assert_eq!(result, Err(SessionError::Unauthorized { owner_id: 1, caller_id: 2 }));
        assert!(session.pending_commands().is_empty());
    }

    #[test]
    fn commands_sealed_in_report_order() {
        let mut session = TestSession::new(SessionConfig::default());
        session.start();

        for entity in [3, 1, 2, 1] {
            assert!(session.report_command(9, 9, cmd(entity)).expect("report failed").is_accepted());
        }

        session.on_tick().expect("tick failed");

        let frame = session.frame(FrameId::FIRST).expect("frame 1 sealed");
        let order: Vec<i32> = frame.commands.iter().map(|c| c.entity_id).collect();
        assert_eq!(order, vec![3, 1, 2, 1]);
        assert!(session.pending_commands().is_empty());
    }

    #[test]
    fn empty_tick_seals_empty_frame() {
        let mut session = TestSession::new(SessionConfig::default());
        session.start();

        let actions = session.on_tick().expect("tick failed");

        assert!(matches!(
            actions.first(),
            Some(SessionAction::FrameSealed { frame_id, command_count: 0 }) if *frame_id == FrameId::FIRST
        ));
        assert!(session.frame(FrameId::FIRST).expect("frame 1 sealed").is_empty());
    }

    #[test]
    fn late_joiner_gets_no_backlog() {
        let mut session = TestSession::new(SessionConfig::default());
        session.join(1, 100);
        session.start();

        for _ in 0..3 {
            session.on_tick().expect("tick failed");
        }

        session.join(2, 200);
        assert_eq!(session.cursor(2), Some(FrameId::new(3)));

        session.report_command(2, 2, cmd(7)).expect("report failed");
        let actions = session.on_tick().expect("tick failed");

        let mut got = deliveries(&actions);
        got.sort_unstable();
        assert_eq!(got, vec![(1, 4), (2, 4)]);
        assert_eq!(session.cursor(1), Some(FrameId::new(4)));
        assert_eq!(session.cursor(2), Some(FrameId::new(4)));
    }

    #[test]
    fn deliver_carries_participant_connection() {
        let mut session = TestSession::new(SessionConfig::default());
        session.join(1, 1111);
        session.start();

        let actions = session.on_tick().expect("tick failed");

        let connections: Vec<u64> = actions
            .iter()
            .filter_map(|a| match a {
                SessionAction::Deliver { connection, .. } => Some(*connection),
                SessionAction::FrameSealed { .. } => None,
            })
            .collect();
        assert_eq!(connections, vec![1111]);
    }

    #[test]
    fn stop_halts_sealing_and_restart_continues_sequence() {
        let mut session = TestSession::new(SessionConfig::default());
        session.join(1, 1);
        session.start();
        session.on_tick().expect("tick failed");

        assert_eq!(session.stop(), Some(LifecycleAction::CancelTicks));
        assert!(session.on_tick().expect("tick failed").is_empty());
        assert_eq!(session.latest_frame_id(), FrameId::FIRST);

        assert_eq!(session.start(), Some(LifecycleAction::ScheduleTicks));
        let actions = session.on_tick().expect("tick failed");
        assert_eq!(deliveries(&actions), vec![(1, 2)]);
    }

    #[test]
    fn commands_reported_while_stopped_never_sealed() {
        let mut session = TestSession::new(SessionConfig::default());
        session.start();
        session.stop();

        session.report_command(1, 1, cmd(5)).expect("report failed");
        session.start();
        session.on_tick().expect("tick failed");

        assert!(session.frame(FrameId::FIRST).expect("frame 1 sealed").is_empty());
    }

    #[test]
    fn left_participant_receives_nothing() {
        let mut session = TestSession::new(SessionConfig::default());
        session.join(1, 1);
        session.join(2, 2);
        session.start();

        assert!(session.leave(2));
        assert!(!session.leave(2));

        let actions = session.on_tick().expect("tick failed");
        assert_eq!(deliveries(&actions), vec![(1, 1)]);
        assert_eq!(session.cursor(2), None);
    }

    #[test]
    fn retention_applies_after_tick() {
        let config = SessionConfig {
            retention: RetentionPolicy::KeepLast(NonZeroUsize::MIN),
            ..Default::default()
        };
        let mut session = TestSession::new(config);
        session.join(1, 1);
        session.start();

        for expected in 1..=5u64 {
            let actions = session.on_tick().expect("tick failed");
            assert_eq!(deliveries(&actions), vec![(1, expected)]);
        }

        assert_eq!(session.log().len(), 1);
        assert_eq!(session.log().oldest_retained(), Some(FrameId::new(5)));
    }
}

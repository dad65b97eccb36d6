//! Fuzz target for the frame-sync session state machine
//!
//! # Strategy
//!
//! - Random interleavings of join, leave, report, tick, start and stop
//! - Reports with mismatched caller ids
//! - Tight retention windows
//!
//! # Invariants
//!
//! - Sealed frame ids are consecutive from 1
//! - Every participant receives frames in strictly increasing order, never a
//!   frame sealed before it joined, never the same frame twice
//! - Every connected cursor equals the newest frame after a tick
//! - Ticks outside `Running` produce nothing

#![no_main]

use std::{collections::HashMap, num::NonZeroUsize};

use arbitrary::Arbitrary;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use lockstep_core::{
    FrameSyncSession, RetentionPolicy, SessionAction, SessionConfig, UnauthorizedPolicy,
};
use lockstep_proto::{Command, FrameId};

#[derive(Debug, Clone, Arbitrary)]
enum SessionOp {
    Join { owner: u8 },
    Leave { owner: u8 },
    Report { owner: u8, caller: u8, entity: i32, command_type: u32, payload: Vec<u8> },
    Tick,
    Start,
    Stop,
}

#[derive(Debug, Arbitrary)]
struct Input {
    keep_last: Option<u8>,
    reject_unauthorized: bool,
    ops: Vec<SessionOp>,
}

fuzz_target!(|input: Input| {
    let retention = input
        .keep_last
        .and_then(|n| NonZeroUsize::new(n as usize))
        .map_or(RetentionPolicy::Unbounded, RetentionPolicy::KeepLast);
    let unauthorized = if input.reject_unauthorized {
        UnauthorizedPolicy::Reject
    } else {
        UnauthorizedPolicy::Silent
    };

    let mut session: FrameSyncSession<u64> =
        FrameSyncSession::new(SessionConfig { retention, unauthorized });
    // owner -> (frame id at join, last delivered)
    let mut seen: HashMap<u64, (u64, u64)> = HashMap::new();
    let mut sealed = 0u64;

    for op in input.ops {
        match op {
            SessionOp::Join { owner } => {
                let owner = u64::from(owner);
                session.join(owner, owner);
                let latest = session.latest_frame_id().get();
                seen.insert(owner, (latest, latest));
            },
            SessionOp::Leave { owner } => {
                let owner = u64::from(owner);
                assert_eq!(session.leave(owner), seen.remove(&owner).is_some());
            },
            SessionOp::Report { owner, caller, entity, command_type, payload } => {
                let result = session.report_command(
                    u64::from(owner),
                    u64::from(caller),
                    Command::new(entity, command_type, Bytes::from(payload)),
                );
                if result.is_err() {
                    assert!(input.reject_unauthorized && owner != caller);
                }
            },
            SessionOp::Tick => {
                let running = session.is_running();
                let actions = session.on_tick().expect("tick must not fail");
                if !running {
                    assert!(actions.is_empty());
                    continue;
                }

                for action in actions {
                    match action {
                        SessionAction::FrameSealed { frame_id, .. } => {
                            sealed += 1;
                            assert_eq!(frame_id, FrameId::new(sealed));
                        },
                        SessionAction::Deliver { owner_id, frame, .. } => {
                            let (joined_at, last) =
                                seen.get_mut(&owner_id).expect("delivery to unknown owner");
                            let id = frame.frame_id.get();
                            assert!(id > *joined_at, "frame {id} predates join at {joined_at}");
                            assert!(id > *last, "frame {id} after {last}");
                            *last = id;
                        },
                    }
                }

                for participant in session.roster().iter() {
                    assert_eq!(participant.cursor(), FrameId::new(sealed));
                }
            },
            SessionOp::Start => {
                session.start();
            },
            SessionOp::Stop => {
                session.stop();
            },
        }
    }
});

//! Tick task tests on a paused clock.
//!
//! `start_paused` makes tokio time virtual: sleeping advances the clock
//! instantly, firing every tick due before the wake-up in order. Sleeping to
//! the middle of a period leaves no tick racing the assertions.

use std::{num::NonZeroUsize, time::Duration};

use lockstep_core::{RetentionPolicy, SessionConfig, SessionState};
use lockstep_proto::{Frame, FrameId};
use lockstep_server::{ChannelConnection, FrameReceiver, SessionHandle, channel};

const TICK: Duration = Duration::from_millis(66);

fn handle() -> SessionHandle<ChannelConnection> {
    SessionHandle::new(1, TICK, SessionConfig::default())
}

/// Sleep until halfway through the period after the `n`th tick.
async fn advance_ticks(n: u32) {
    tokio::time::sleep(TICK * n + TICK / 2).await;
}

fn frame_ids(rx: &mut FrameReceiver) -> Vec<u64> {
    rx.drain().into_iter().map(|f| f.expect("decode failed").frame_id.get()).collect()
}

#[tokio::test(start_paused = true)]
async fn ticks_seal_and_deliver_on_schedule() {
    let session = handle();
    let (conn, mut rx) = channel(16);

    session.join(1, conn).await;
    assert!(session.start().await);

    advance_ticks(3).await;

    assert_eq!(frame_ids(&mut rx), vec![1, 2, 3]);
    assert_eq!(session.latest_frame_id().await, FrameId::new(3));
}

#[tokio::test(start_paused = true)]
async fn nothing_ticks_before_start() {
    let session = handle();
    let (conn, mut rx) = channel(16);
    session.join(1, conn).await;

    advance_ticks(5).await;

    assert!(frame_ids(&mut rx).is_empty());
    assert_eq!(session.state().await, SessionState::Free);
}

#[tokio::test(start_paused = true)]
async fn double_start_runs_one_ticker() {
    let session = handle();
    let (conn, mut rx) = channel(16);
    session.join(1, conn).await;

    assert!(session.start().await);
    assert!(!session.start().await);

    advance_ticks(2).await;

    assert_eq!(frame_ids(&mut rx), vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_ticker() {
    let session = handle();
    session.start().await;
    advance_ticks(2).await;

    assert!(session.stop().await);
    assert!(!session.stop().await);

    advance_ticks(10).await;

    assert_eq!(session.latest_frame_id().await, FrameId::new(2));
    assert_eq!(session.state().await, SessionState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn restart_continues_sequence() {
    let session = handle();
    let (conn, mut rx) = channel(16);
    session.join(1, conn).await;

    session.start().await;
    advance_ticks(1).await;
    session.stop().await;
    advance_ticks(3).await;
    session.start().await;
    advance_ticks(2).await;

    assert_eq!(frame_ids(&mut rx), vec![1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn reported_command_lands_in_next_frame() {
    let session = handle();
    let (conn, mut rx) = channel(16);
    session.join(1, conn).await;
    session.start().await;

    advance_ticks(1).await;
    session.report_command(1, 1, 7, 1, &b"x"[..]).await.expect("report failed");
    tokio::time::sleep(TICK).await;

    let frames: Vec<Frame> = rx.drain().into_iter().map(|f| f.expect("decode failed")).collect();
    assert_eq!(frames.len(), 2);
    assert!(frames[0].is_empty());
    assert_eq!(frames[1].commands.len(), 1);
    assert_eq!(frames[1].commands[0].entity_id, 7);
    assert_eq!(frames[1].commands[0].payload.as_ref(), b"x");
}

#[tokio::test(start_paused = true)]
async fn late_joiner_only_sees_new_frames() {
    let session = handle();
    let (a_conn, mut a_rx) = channel(16);
    let (b_conn, mut b_rx) = channel(16);

    session.join(1, a_conn).await;
    session.start().await;
    advance_ticks(3).await;

    session.join(2, b_conn).await;
    assert_eq!(session.cursor(2).await, Some(FrameId::new(3)));
    tokio::time::sleep(TICK).await;

    assert_eq!(frame_ids(&mut a_rx), vec![1, 2, 3, 4]);
    assert_eq!(frame_ids(&mut b_rx), vec![4]);
}

#[tokio::test(start_paused = true)]
async fn slow_consumer_loses_frames_but_cursor_advances() {
    let session = handle();
    let (conn, mut rx) = channel(1);
    session.join(1, conn).await;
    session.start().await;

    advance_ticks(3).await;

    // Queue held one frame; 2 and 3 hit a full channel
    assert_eq!(frame_ids(&mut rx), vec![1]);
    assert_eq!(session.cursor(1).await, Some(FrameId::new(3)));

    tokio::time::sleep(TICK).await;
    assert_eq!(frame_ids(&mut rx), vec![4]);
}

#[tokio::test(start_paused = true)]
async fn dropping_every_handle_ends_ticker() {
    let session = handle();
    let (conn, mut rx) = channel(16);
    session.join(1, conn).await;
    session.start().await;
    advance_ticks(1).await;

    drop(session);
    advance_ticks(3).await;

    // Session dropped with its connections: channel is closed after frame 1
    assert_eq!(frame_ids(&mut rx), vec![1]);
    assert!(rx.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn manual_tick_reports_stats() {
    let session = handle();
    let (conn, _rx) = channel(16);
    session.join(1, conn).await;

    assert!(session.tick().await.is_none());

    session.start().await;
    let stats = session.tick().await.expect("running session ticks");

    assert_eq!(stats.sealed, Some(FrameId::FIRST));
    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.failed, 0);
}

#[tokio::test(start_paused = true)]
async fn history_returns_consecutive_batch() {
    let session = handle();
    session.start().await;
    advance_ticks(4).await;

    let batch = session.history(FrameId::new(1)).await.expect("history failed");

    assert_eq!(batch.first_id(), Some(FrameId::new(2)));
    assert_eq!(batch.last_id(), Some(FrameId::new(4)));
    assert!(session.history(FrameId::new(4)).await.expect("history failed").is_empty());
}

#[tokio::test(start_paused = true)]
async fn history_skips_evicted_frames() {
    let config = SessionConfig {
        retention: RetentionPolicy::KeepLast(NonZeroUsize::new(2).expect("non-zero")),
        ..Default::default()
    };
    let session: SessionHandle<ChannelConnection> = SessionHandle::new(1, TICK, config);
    session.start().await;
    advance_ticks(5).await;

    let batch = session.history(FrameId::SENTINEL).await.expect("history failed");

    assert_eq!(batch.first_id(), Some(FrameId::new(4)));
    assert_eq!(batch.last_id(), Some(FrameId::new(5)));
}

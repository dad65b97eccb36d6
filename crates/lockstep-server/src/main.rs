//! Lockstep server binary.
//!
//! Hosts one or more rooms and drives them with simulated participants over
//! in-process channels.
//!
//! # Usage
//!
//! ```bash
//! # Two rooms of four participants, 100 ticks at 15 Hz
//! lockstep-server --rooms 2 --participants 4 --ticks 100
//!
//! # Lossy links, keep only the newest 32 frames
//! lockstep-server --drop-rate 0.1 --retain 32
//! ```

use std::{num::NonZeroUsize, time::Duration};

use clap::Parser;
use lockstep_core::{ReportOutcome, RetentionPolicy, SessionConfig, UnauthorizedPolicy};
use lockstep_proto::FrameId;
use lockstep_server::{
    ChannelConnection, ChaoticConnection, FrameReceiver, ServerConfig, ServerError,
    SessionHandle, SessionRegistry, channel,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::task::JoinSet;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

type SimConnection = ChaoticConnection<ChannelConnection>;

/// Lockstep frame-sync server
#[derive(Parser, Debug)]
#[command(name = "lockstep-server")]
#[command(about = "Authoritative lockstep frame-sync server")]
#[command(version)]
struct Args {
    /// Number of rooms to host
    #[arg(long, default_value = "1")]
    rooms: u64,

    /// Simulated participants per room
    #[arg(long, default_value = "4")]
    participants: u64,

    /// Tick period in milliseconds
    #[arg(long, default_value = "66")]
    tick_ms: u64,

    /// Number of ticks to run before shutting down
    #[arg(long, default_value = "150")]
    ticks: u32,

    /// Keep only the newest N frames per room (default: keep all)
    #[arg(long)]
    retain: Option<NonZeroUsize>,

    /// Return an error for reports made on someone else's behalf
    #[arg(long)]
    reject_unauthorized: bool,

    /// Per-participant outbound queue depth
    #[arg(long, default_value = "256")]
    delivery_buffer: usize,

    /// Probability of dropping each delivered frame (0.0 - 1.0)
    #[arg(long, default_value = "0.0")]
    drop_rate: f64,

    /// Seed for simulated inputs and fault injection
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        let session = SessionConfig {
            retention: self.retain.map_or(RetentionPolicy::Unbounded, RetentionPolicy::KeepLast),
            unauthorized: if self.reject_unauthorized {
                UnauthorizedPolicy::Reject
            } else {
                UnauthorizedPolicy::Silent
            },
        };

        ServerConfig {
            tick_interval: Duration::from_millis(self.tick_ms),
            delivery_buffer: self.delivery_buffer,
            session,
        }
    }
}

/// What one simulated participant observed.
#[derive(Debug, Default)]
struct ParticipantReport {
    room_id: u64,
    owner_id: u64,
    frames: u64,
    commands: u64,
    last: FrameId,
    out_of_order: u64,
}

/// Read frames until the session side drops the connection.
async fn consume(room_id: u64, owner_id: u64, mut rx: FrameReceiver) -> ParticipantReport {
    let mut report = ParticipantReport { room_id, owner_id, ..Default::default() };

    while let Some(result) = rx.recv().await {
        match result {
            Ok(frame) => {
                if frame.frame_id <= report.last {
                    report.out_of_order += 1;
                }
                report.frames += 1;
                report.commands += frame.len() as u64;
                report.last = frame.frame_id;
            },
            Err(e) => tracing::warn!(room_id, owner_id, error = %e, "undecodable frame"),
        }
    }

    report
}

/// Report a random command roughly twice per tick until `deadline` passes.
async fn play(
    handle: SessionHandle<SimConnection>,
    owner_id: u64,
    participants: u64,
    period: Duration,
    deadline: tokio::time::Instant,
    seed: u64,
) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut interval = tokio::time::interval(period / 2);

    while interval.tick().await < deadline {
        // Occasionally try to speak for someone else
        let caller_id =
            if rng.gen_ratio(1, 20) { rng.gen_range(1..=participants) } else { owner_id };
        let entity_id = rng.gen_range(0..64);
        let command_type = rng.gen_range(0..4);
        let payload: [u8; 4] = rng.r#gen();

        match handle.report_command(owner_id, caller_id, entity_id, command_type, payload.to_vec()).await {
            Ok(ReportOutcome::Accepted | ReportOutcome::NotRunning) => {},
            Ok(ReportOutcome::Unauthorized) => {
                tracing::debug!(owner_id, caller_id, "unauthorized report dropped");
            },
            Err(e) => tracing::debug!(owner_id, caller_id, error = %e, "report rejected"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    if !(0.0..=1.0).contains(&args.drop_rate) {
        return Err(ServerError::Config(format!(
            "drop rate must be between 0.0 and 1.0, got {}",
            args.drop_rate
        ))
        .into());
    }

    let config = args.server_config();
    config.validate()?;

    tracing::info!(
        rooms = args.rooms,
        participants = args.participants,
        interval = ?config.tick_interval,
        ticks = args.ticks,
        "Lockstep server starting"
    );

    let mut registry: SessionRegistry<SimConnection> = SessionRegistry::new(config);
    let mut consumers = JoinSet::new();
    let mut players = JoinSet::new();

    let run_for = config.tick_interval * args.ticks;
    let deadline = tokio::time::Instant::now() + run_for;

    for room_id in 1..=args.rooms {
        let handle = registry.create_room(room_id)?;

        for owner_id in 1..=args.participants {
            let (conn, rx) = channel(config.delivery_buffer);
            let link_seed = args.seed ^ (room_id << 32) ^ owner_id;
            let conn = ChaoticConnection::with_seed(conn, args.drop_rate, link_seed);

            handle.join(owner_id, conn).await;
            consumers.spawn(consume(room_id, owner_id, rx));
            players.spawn(play(
                handle.clone(),
                owner_id,
                args.participants,
                config.tick_interval,
                deadline,
                link_seed.rotate_left(17),
            ));
        }

        handle.start().await;
    }

    tokio::time::sleep(run_for).await;
    while players.join_next().await.is_some() {}

    for room_id in registry.room_ids() {
        let handle = registry.remove_room(room_id).await?;
        let latest = handle.latest_frame_id().await;
        let history = handle.history(FrameId::SENTINEL).await?;

        tracing::info!(
            room_id,
            latest = %latest,
            retained = history.len(),
            oldest = ?history.first_id().map(FrameId::get),
            "room closed"
        );

        for owner_id in 1..=args.participants {
            handle.leave(owner_id).await;
        }
    }

    while let Some(joined) = consumers.join_next().await {
        let report = joined?;
        tracing::info!(
            room_id = report.room_id,
            owner_id = report.owner_id,
            frames = report.frames,
            commands = report.commands,
            last = %report.last,
            out_of_order = report.out_of_order,
            "participant summary"
        );
    }

    tracing::info!("Lockstep server stopped");

    Ok(())
}

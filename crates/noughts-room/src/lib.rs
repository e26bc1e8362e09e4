//! Rooms for Noughts.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns the
//! authoritative game: board, turn, move log, and the line counters used
//! for win detection.
//!
//! # Key types
//!
//! - [`Room`] — the synchronous state machine: move validation, win and
//!   draw detection, disconnect and rejoin bookkeeping
//! - [`RoomHandle`] — send commands to a running room actor
//! - [`RoomRegistry`] — creates rooms, looks them up, evicts finished ones
//! - [`MatchmakingQueue`] — the single waiting slot that pairs arrivals
//! - [`RoomConfig`] — eviction grace, persistence timeout, channel size

mod actor;
mod config;
mod error;
mod lines;
mod matchmaking;
mod registry;
mod room;

pub use actor::{ConnectionSender, RoomHandle};
pub use config::{
    RoomConfig, DEFAULT_CHANNEL_SIZE, DEFAULT_EVICTION_GRACE, DEFAULT_PERSIST_TIMEOUT,
};
pub use error::RoomError;
pub use lines::LineCounts;
pub use matchmaking::{JoinOutcome, MatchmakingQueue, Seat};
pub use registry::RoomRegistry;
pub use room::{GameResult, MoveOutcome, Participant, Room};

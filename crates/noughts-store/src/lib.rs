//! Persistence gateway for Noughts.
//!
//! The room layer never talks to a database. It talks to a [`GameStore`]:
//! four async calls covering game rows, per-user tallies, and display
//! names. Durable storage lives behind this trait and is somebody else's
//! problem; this crate ships an in-memory [`MemoryStore`] for development
//! and tests.
//!
//! Store failures are soft. Gameplay carries on and the failed write goes
//! into a [`ReconciliationLog`] so it can be replayed later.

#![allow(async_fn_in_trait)]

mod error;
mod gateway;
mod memory;
mod reconcile;

pub use error::StoreError;
pub use gateway::{GameStore, Outcome};
pub use memory::{
    GameRow, LeaderboardEntry, MemoryStore, UserStats, DEFAULT_LEADERBOARD_SIZE,
};
pub use reconcile::{PendingOp, PendingWrite, ReconciliationLog};

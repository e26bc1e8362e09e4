//! The [`GameStore`] trait: what the room layer needs from durable storage.

use std::fmt;
use std::future::Future;

use noughts_protocol::{GameRef, GameStatus, MoveRecord, UserId};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// Result of a finished game from one participant's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Win => f.write_str("win"),
            Self::Loss => f.write_str("loss"),
            Self::Draw => f.write_str("draw"),
        }
    }
}

/// Durable storage for games and statistics.
///
/// Implementations are shared by every room task (behind an `Arc`), so the
/// trait is `Send + Sync + 'static` and every returned future is `Send`.
///
/// # Example
///
/// ```rust
/// use noughts_protocol::{GameRef, GameStatus, MoveRecord, UserId};
/// use noughts_store::{GameStore, Outcome, StoreError};
///
/// /// Drops every write. Useful when nothing needs to be kept.
/// struct NullStore;
///
/// impl GameStore for NullStore {
///     async fn create_game(&self, _a: UserId, _b: UserId) -> Result<GameRef, StoreError> {
///         Ok(GameRef(0))
///     }
///     async fn finish_game(
///         &self,
///         _game: GameRef,
///         _moves: Vec<MoveRecord>,
///         _status: GameStatus,
///         _winner: Option<UserId>,
///     ) -> Result<(), StoreError> {
///         Ok(())
///     }
///     async fn increment_stat(&self, _user: UserId, _outcome: Outcome) -> Result<(), StoreError> {
///         Ok(())
///     }
///     async fn lookup_username(&self, _user: UserId) -> Result<Option<String>, StoreError> {
///         Ok(None)
///     }
/// }
/// ```
pub trait GameStore: Send + Sync + 'static {
    /// Records a new ongoing game between `player_a` (mark A) and
    /// `player_b` (mark B) and returns its reference.
    fn create_game(
        &self,
        player_a: UserId,
        player_b: UserId,
    ) -> impl Future<Output = Result<GameRef, StoreError>> + Send;

    /// Stores the final move log, terminal status and winner (`None` on a
    /// draw) of a game created by [`create_game`](Self::create_game).
    fn finish_game(
        &self,
        game: GameRef,
        moves: Vec<MoveRecord>,
        status: GameStatus,
        winner: Option<UserId>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Adds one to the user's win, loss or draw tally.
    fn increment_stat(
        &self,
        user: UserId,
        outcome: Outcome,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Best-effort display name. `Ok(None)` for unknown users.
    fn lookup_username(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;
}

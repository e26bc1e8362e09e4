//! In-memory [`GameStore`] for development and tests.
//!
//! Everything lives in one `tokio::sync::Mutex`. Calls are short and never
//! hold the lock across an await point of their own, so contention is not
//! a concern at the scale this store is meant for.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use noughts_protocol::{unix_millis, GameRef, GameStatus, MoveRecord, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{GameStore, Outcome, StoreError};

/// Default number of rows returned by [`MemoryStore::leaderboard`].
pub const DEFAULT_LEADERBOARD_SIZE: usize = 10;

/// A stored game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRow {
    pub id: GameRef,
    pub player_a: UserId,
    pub player_b: UserId,
    pub status: GameStatus,
    pub winner: Option<UserId>,
    pub moves: Vec<MoveRecord>,
    pub created_at: u64,
    pub finished_at: Option<u64>,
}

/// Win/loss/draw tallies for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    pub username: Option<String>,
    #[serde(flatten)]
    pub stats: UserStats,
}

#[derive(Default)]
struct Inner {
    next_game: u64,
    games: BTreeMap<GameRef, GameRow>,
    stats: HashMap<UserId, UserStats>,
    usernames: HashMap<UserId, String>,
}

/// A [`GameStore`] kept entirely in process memory.
///
/// [`set_available(false)`](Self::set_available) makes every call fail
/// with [`StoreError::Unavailable`], to exercise the degraded path.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    offline: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already knows some display names.
    pub fn with_usernames<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = (UserId, S)>,
        S: Into<String>,
    {
        let inner = Inner {
            usernames: names.into_iter().map(|(id, n)| (id, n.into())).collect(),
            ..Inner::default()
        };
        Self {
            inner: Mutex::new(inner),
            offline: AtomicBool::new(false),
        }
    }

    /// Registers or renames a user.
    pub async fn register_user(&self, user: UserId, name: impl Into<String>) {
        self.inner.lock().await.usernames.insert(user, name.into());
    }

    /// Toggles the simulated outage.
    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    /// Every stored game, oldest first.
    pub async fn games(&self) -> Vec<GameRow> {
        self.inner.lock().await.games.values().cloned().collect()
    }

    /// A single game row.
    pub async fn game(&self, game: GameRef) -> Option<GameRow> {
        self.inner.lock().await.games.get(&game).cloned()
    }

    /// Tallies for one user (all zero if never recorded).
    pub async fn stats(&self, user: UserId) -> UserStats {
        self.inner
            .lock()
            .await
            .stats
            .get(&user)
            .copied()
            .unwrap_or_default()
    }

    /// Top `limit` users by wins desc, then draws desc, then losses asc.
    /// Ties beyond that fall back to user id so the order is stable.
    pub async fn leaderboard(&self, limit: usize) -> Vec<LeaderboardEntry> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<LeaderboardEntry> = inner
            .stats
            .iter()
            .map(|(user, stats)| LeaderboardEntry {
                user_id: *user,
                username: inner.usernames.get(user).cloned(),
                stats: *stats,
            })
            .collect();
        rows.sort_by_key(|e| {
            (Reverse(e.stats.wins), Reverse(e.stats.draws), e.stats.losses, e.user_id)
        });
        rows.truncate(limit);
        rows
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".into()));
        }
        Ok(())
    }
}

impl GameStore for MemoryStore {
    async fn create_game(
        &self,
        player_a: UserId,
        player_b: UserId,
    ) -> Result<GameRef, StoreError> {
        self.check_online()?;
        let mut inner = self.inner.lock().await;
        inner.next_game += 1;
        let id = GameRef(inner.next_game);
        inner.games.insert(
            id,
            GameRow {
                id,
                player_a,
                player_b,
                status: GameStatus::Ongoing,
                winner: None,
                moves: Vec::new(),
                created_at: unix_millis(),
                finished_at: None,
            },
        );
        tracing::debug!(game = %id, %player_a, %player_b, "game row created");
        Ok(id)
    }

    async fn finish_game(
        &self,
        game: GameRef,
        moves: Vec<MoveRecord>,
        status: GameStatus,
        winner: Option<UserId>,
    ) -> Result<(), StoreError> {
        self.check_online()?;
        let mut inner = self.inner.lock().await;
        let row = inner
            .games
            .get_mut(&game)
            .ok_or(StoreError::GameNotFound(game))?;
        row.moves = moves;
        row.status = status;
        row.winner = winner;
        row.finished_at = Some(unix_millis());
        tracing::debug!(%game, %status, "game row finished");
        Ok(())
    }

    async fn increment_stat(&self, user: UserId, outcome: Outcome) -> Result<(), StoreError> {
        self.check_online()?;
        let mut inner = self.inner.lock().await;
        let stats = inner.stats.entry(user).or_default();
        match outcome {
            Outcome::Win => stats.wins += 1,
            Outcome::Loss => stats.losses += 1,
            Outcome::Draw => stats.draws += 1,
        }
        Ok(())
    }

    async fn lookup_username(&self, user: UserId) -> Result<Option<String>, StoreError> {
        self.check_online()?;
        Ok(self.inner.lock().await.usernames.get(&user).cloned())
    }
}

#[cfg(test)]
mod tests {
    use noughts_protocol::Mark;

    use super::*;

    fn record(cell: u8, user: u64, mark: Mark) -> MoveRecord {
        MoveRecord {
            cell_index: cell,
            user_id: UserId(user),
            mark,
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn test_create_game_assigns_increasing_refs() {
        let store = MemoryStore::new();
        let g1 = store.create_game(UserId(1), UserId(2)).await.unwrap();
        let g2 = store.create_game(UserId(3), UserId(4)).await.unwrap();
        assert!(g2 > g1);
        assert_eq!(store.games().await.len(), 2);
    }

    #[tokio::test]
    async fn test_finish_game_updates_row() {
        let store = MemoryStore::new();
        let g = store.create_game(UserId(1), UserId(2)).await.unwrap();
        store
            .finish_game(g, vec![record(0, 1, Mark::A)], GameStatus::Finished, Some(UserId(1)))
            .await
            .unwrap();

        let row = store.game(g).await.unwrap();
        assert_eq!(row.status, GameStatus::Finished);
        assert_eq!(row.winner, Some(UserId(1)));
        assert_eq!(row.moves.len(), 1);
        assert!(row.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_finish_unknown_game_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .finish_game(GameRef(99), vec![], GameStatus::Finished, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::GameNotFound(GameRef(99))));
    }

    #[tokio::test]
    async fn test_increment_stat_tallies_each_outcome() {
        let store = MemoryStore::new();
        store.increment_stat(UserId(1), Outcome::Win).await.unwrap();
        store.increment_stat(UserId(1), Outcome::Win).await.unwrap();
        store.increment_stat(UserId(1), Outcome::Draw).await.unwrap();
        store.increment_stat(UserId(1), Outcome::Loss).await.unwrap();
        assert_eq!(
            store.stats(UserId(1)).await,
            UserStats { wins: 2, losses: 1, draws: 1 }
        );
        assert_eq!(store.stats(UserId(9)).await, UserStats::default());
    }

    #[tokio::test]
    async fn test_leaderboard_orders_by_wins_draws_then_losses() {
        let store = MemoryStore::with_usernames([(UserId(1), "ann"), (UserId(2), "bo")]);
        // ann: 1 win 0 draws 3 losses; bo: 1 win 0 draws 1 loss; cy: 1 win 2 draws
        store.increment_stat(UserId(1), Outcome::Win).await.unwrap();
        for _ in 0..3 {
            store.increment_stat(UserId(1), Outcome::Loss).await.unwrap();
        }
        store.increment_stat(UserId(2), Outcome::Win).await.unwrap();
        store.increment_stat(UserId(2), Outcome::Loss).await.unwrap();
        store.increment_stat(UserId(3), Outcome::Win).await.unwrap();
        store.increment_stat(UserId(3), Outcome::Draw).await.unwrap();
        store.increment_stat(UserId(3), Outcome::Draw).await.unwrap();
        store.increment_stat(UserId(4), Outcome::Loss).await.unwrap();

        let board = store.leaderboard(DEFAULT_LEADERBOARD_SIZE).await;
        let order: Vec<u64> = board.iter().map(|e| e.user_id.0).collect();
        assert_eq!(order, vec![3, 2, 1, 4]);
        assert_eq!(board[1].username.as_deref(), Some("bo"));
        assert_eq!(board[0].username, None);

        assert_eq!(store.leaderboard(2).await.len(), 2);
    }

    #[tokio::test]
    async fn test_offline_store_fails_every_call() {
        let store = MemoryStore::with_usernames([(UserId(1), "ann")]);
        store.set_available(false);

        assert!(matches!(
            store.create_game(UserId(1), UserId(2)).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.increment_stat(UserId(1), Outcome::Win).await.is_err());
        assert!(store.lookup_username(UserId(1)).await.is_err());

        store.set_available(true);
        assert_eq!(
            store.lookup_username(UserId(1)).await.unwrap().as_deref(),
            Some("ann")
        );
    }
}

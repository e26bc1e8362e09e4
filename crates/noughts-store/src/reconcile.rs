//! Record of persistence writes that failed and still need to happen.
//!
//! A store outage must not stall a game, but the write can't just vanish
//! either. Every failed gateway call lands here with enough data to replay
//! it, and [`ReconciliationLog::retry`] replays whatever it can.

use noughts_protocol::{unix_millis, GameRef, GameStatus, MoveRecord, RoomId, UserId};
use tokio::sync::Mutex;

use crate::{GameStore, Outcome, StoreError};

/// The write that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingOp {
    /// `create_game` failed; the room runs without a game reference.
    CreateGame {
        room_id: RoomId,
        player_a: UserId,
        player_b: UserId,
    },

    /// `finish_game` failed, or could not be attempted because the room
    /// never got a game reference (`game` is `None`).
    FinishGame {
        room_id: RoomId,
        game: Option<GameRef>,
        player_a: UserId,
        player_b: UserId,
        moves: Vec<MoveRecord>,
        status: GameStatus,
        winner: Option<UserId>,
    },

    /// `increment_stat` failed.
    IncrementStat { user: UserId, outcome: Outcome },
}

impl PendingOp {
    fn name(&self) -> &'static str {
        match self {
            Self::CreateGame { .. } => "create_game",
            Self::FinishGame { .. } => "finish_game",
            Self::IncrementStat { .. } => "increment_stat",
        }
    }
}

/// A failed write plus why and when it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub op: PendingOp,
    pub error: String,
    /// Milliseconds since the Unix epoch.
    pub recorded_at: u64,
}

/// Append-only list of failed writes, shared by every room.
#[derive(Debug, Default)]
pub struct ReconciliationLog {
    pending: Mutex<Vec<PendingWrite>>,
}

impl ReconciliationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failed write and logs it.
    pub async fn record(&self, op: PendingOp, error: &StoreError) {
        tracing::warn!(op = op.name(), %error, "persistence write failed, queued for reconciliation");
        self.pending.lock().await.push(PendingWrite {
            op,
            error: error.to_string(),
            recorded_at: unix_millis(),
        });
    }

    /// A copy of every outstanding write, oldest first.
    pub async fn entries(&self) -> Vec<PendingWrite> {
        self.pending.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }

    /// Replays outstanding writes against `store`.
    ///
    /// Writes that succeed are dropped; writes that fail again stay queued
    /// with the new error. A `CreateGame` whose room also has a queued
    /// `FinishGame` is dropped, because replaying the finish creates the
    /// row itself. Returns how many writes were resolved.
    pub async fn retry<S: GameStore>(&self, store: &S) -> usize {
        let batch = std::mem::take(&mut *self.pending.lock().await);
        let mut still_pending = Vec::new();
        let mut resolved = 0;

        for write in &batch {
            // Replays may learn things (a fresh game reference) that a
            // requeued op has to keep.
            let mut op = write.op.clone();
            let result = match &mut op {
                PendingOp::CreateGame { room_id, player_a, player_b } => {
                    if finish_queued(&batch, room_id) {
                        Ok(())
                    } else {
                        store.create_game(*player_a, *player_b).await.map(|_| ())
                    }
                }
                PendingOp::FinishGame {
                    game,
                    player_a,
                    player_b,
                    moves,
                    status,
                    winner,
                    ..
                } => {
                    let created = match *game {
                        Some(g) => Ok(g),
                        None => store.create_game(*player_a, *player_b).await,
                    };
                    match created {
                        Ok(g) => {
                            *game = Some(g);
                            store.finish_game(g, moves.clone(), *status, *winner).await
                        }
                        Err(e) => Err(e),
                    }
                }
                PendingOp::IncrementStat { user, outcome } => {
                    store.increment_stat(*user, *outcome).await
                }
            };

            match result {
                Ok(()) => resolved += 1,
                Err(e) => still_pending.push(PendingWrite {
                    op,
                    error: e.to_string(),
                    recorded_at: write.recorded_at,
                }),
            }
        }

        if resolved > 0 {
            tracing::info!(resolved, remaining = still_pending.len(), "reconciliation pass complete");
        }

        // Anything recorded while we were replaying goes after the leftovers.
        let mut pending = self.pending.lock().await;
        still_pending.append(&mut pending);
        *pending = still_pending;
        resolved
    }
}

fn finish_queued(batch: &[PendingWrite], room: &RoomId) -> bool {
    batch.iter().any(|w| {
        matches!(&w.op, PendingOp::FinishGame { room_id, .. } if room_id == room)
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use noughts_protocol::Mark;

    use super::*;
    use crate::MemoryStore;

    /// Creates games normally; `finish_game` fails while `finish_down` is set.
    struct FinishDown {
        inner: MemoryStore,
        finish_down: AtomicBool,
    }

    impl GameStore for FinishDown {
        async fn create_game(&self, a: UserId, b: UserId) -> Result<GameRef, StoreError> {
            self.inner.create_game(a, b).await
        }

        async fn finish_game(
            &self,
            game: GameRef,
            moves: Vec<MoveRecord>,
            status: GameStatus,
            winner: Option<UserId>,
        ) -> Result<(), StoreError> {
            if self.finish_down.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("finish down".into()));
            }
            self.inner.finish_game(game, moves, status, winner).await
        }

        async fn increment_stat(&self, user: UserId, outcome: Outcome) -> Result<(), StoreError> {
            self.inner.increment_stat(user, outcome).await
        }

        async fn lookup_username(&self, user: UserId) -> Result<Option<String>, StoreError> {
            self.inner.lookup_username(user).await
        }
    }

    fn unavailable() -> StoreError {
        StoreError::Unavailable("down".into())
    }

    #[tokio::test]
    async fn test_record_keeps_op_and_error() {
        let log = ReconciliationLog::new();
        log.record(
            PendingOp::IncrementStat { user: UserId(1), outcome: Outcome::Win },
            &unavailable(),
        )
        .await;

        let entries = log.entries().await;
        assert_eq!(entries.len(), 1);
        assert!(entries[0].error.contains("down"));
        assert!(matches!(entries[0].op, PendingOp::IncrementStat { .. }));
    }

    #[tokio::test]
    async fn test_retry_replays_stats_and_finish() {
        let store = MemoryStore::new();
        let log = ReconciliationLog::new();
        log.record(
            PendingOp::IncrementStat { user: UserId(1), outcome: Outcome::Draw },
            &unavailable(),
        )
        .await;
        log.record(
            PendingOp::CreateGame {
                room_id: RoomId::from("r1"),
                player_a: UserId(1),
                player_b: UserId(2),
            },
            &unavailable(),
        )
        .await;
        log.record(
            PendingOp::FinishGame {
                room_id: RoomId::from("r1"),
                game: None,
                player_a: UserId(1),
                player_b: UserId(2),
                moves: vec![MoveRecord {
                    cell_index: 4,
                    user_id: UserId(1),
                    mark: Mark::A,
                    timestamp: 0,
                }],
                status: GameStatus::Finished,
                winner: None,
            },
            &unavailable(),
        )
        .await;

        assert_eq!(log.retry(&store).await, 3);
        assert!(log.is_empty().await);

        // The queued create was folded into the finish: exactly one row.
        let games = store.games().await;
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].status, GameStatus::Finished);
        assert_eq!(games[0].moves.len(), 1);
        assert_eq!(store.stats(UserId(1)).await.draws, 1);
    }

    #[tokio::test]
    async fn test_retry_keeps_writes_that_fail_again() {
        let store = MemoryStore::new();
        store.set_available(false);
        let log = ReconciliationLog::new();
        log.record(
            PendingOp::IncrementStat { user: UserId(1), outcome: Outcome::Loss },
            &unavailable(),
        )
        .await;

        assert_eq!(log.retry(&store).await, 0);
        assert_eq!(log.len().await, 1);

        store.set_available(true);
        assert_eq!(log.retry(&store).await, 1);
        assert_eq!(store.stats(UserId(1)).await.losses, 1);
    }

    #[tokio::test]
    async fn test_retry_keeps_game_created_during_failed_finish() {
        let store = FinishDown {
            inner: MemoryStore::new(),
            finish_down: AtomicBool::new(true),
        };
        let log = ReconciliationLog::new();
        log.record(
            PendingOp::FinishGame {
                room_id: RoomId::from("r1"),
                game: None,
                player_a: UserId(1),
                player_b: UserId(2),
                moves: Vec::new(),
                status: GameStatus::Finished,
                winner: Some(UserId(1)),
            },
            &unavailable(),
        )
        .await;

        // The row gets created, the finish fails: the requeued op must
        // point at that row from now on.
        assert_eq!(log.retry(&store).await, 0);
        assert_eq!(log.retry(&store).await, 0);
        let entries = log.entries().await;
        assert_eq!(entries.len(), 1);
        let PendingOp::FinishGame { game: Some(game), .. } = &entries[0].op else {
            panic!("expected a finish with a game reference, got {:?}", entries[0].op);
        };
        assert_eq!(store.inner.games().await.len(), 1);

        store.finish_down.store(false, Ordering::SeqCst);
        assert_eq!(log.retry(&store).await, 1);
        let games = store.inner.games().await;
        assert_eq!(games.len(), 1);
        assert_eq!(store.inner.game(*game).await.map(|g| g.status), Some(GameStatus::Finished));
    }
}

//! Room actor: an isolated Tokio task that owns one [`Room`].
//!
//! Each room runs in its own task and is reached only through an mpsc
//! channel, so moves, rejoins and disconnects for one room are handled
//! strictly one at a time and no room ever waits on another.
//!
//! Once the game finishes the actor keeps answering for
//! [`RoomConfig::eviction_grace`], then stops and reports its id on the
//! registry's eviction channel. A command that reaches the actor before
//! the deadline fires is served in full; one that arrives after finds the
//! channel closed and gets [`RoomError::RoomNotFound`].

use std::future::{self, Future};
use std::sync::Arc;
use std::time::Duration;

use noughts_protocol::{
    ConnectionId, GameRef, Mark, RoomId, RoomSnapshot, ServerEvent, UserId,
    OPPONENT_DISCONNECTED_MESSAGE,
};
use noughts_store::{GameStore, PendingOp, ReconciliationLog, StoreError};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;

use crate::room::{GameResult, Room};
use crate::{RoomConfig, RoomError};

/// Channel sender for delivering outbound events to one connection.
pub type ConnectionSender = mpsc::UnboundedSender<ServerEvent>;

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    MakeMove {
        user: UserId,
        index: i64,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    Rejoin {
        conn: ConnectionId,
        user: UserId,
        sender: ConnectionSender,
        reply: oneshot::Sender<Result<RoomSnapshot, RoomError>>,
    },

    /// Fire-and-forget: the connection is already gone.
    Disconnect { conn: ConnectionId },

    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },

    Shutdown,
}

/// Handle to a running room actor.
///
/// Cheap to clone: it's an `mpsc::Sender` plus the room id. Every method
/// maps a closed channel to [`RoomError::RoomNotFound`], since a stopped
/// actor means an evicted or removed room.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Returns `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Submits a move. `Ok` means it was applied and broadcast.
    pub async fn make_move(&self, user: UserId, index: i64) -> Result<(), RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::MakeMove { user, index, reply }).await?;
        rx.await.map_err(|_| self.gone())?
    }

    /// Attaches `conn` to the room as `user` and returns the full state.
    pub async fn rejoin(
        &self,
        conn: ConnectionId,
        user: UserId,
        sender: ConnectionSender,
    ) -> Result<RoomSnapshot, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Rejoin {
            conn,
            user,
            sender,
            reply,
        })
        .await?;
        rx.await.map_err(|_| self.gone())?
    }

    /// Tells the room that `conn` dropped.
    pub async fn disconnect(&self, conn: ConnectionId) -> Result<(), RoomError> {
        self.send(RoomCommand::Disconnect { conn }).await
    }

    /// Current room state.
    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| self.gone())
    }

    /// Stops the actor without waiting for the eviction deadline.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.send(RoomCommand::Shutdown).await
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.sender.send(cmd).await.map_err(|_| self.gone())
    }

    fn gone(&self) -> RoomError {
        RoomError::RoomNotFound(self.room_id.clone())
    }
}

/// Shared collaborators every room actor needs.
pub(crate) struct RoomContext<S: GameStore> {
    pub store: Arc<S>,
    pub log: Arc<ReconciliationLog>,
    /// Server-wide events (`leaderboard_update`).
    pub global: broadcast::Sender<ServerEvent>,
    pub evictions: mpsc::UnboundedSender<RoomId>,
    pub config: RoomConfig,
}

impl<S: GameStore> Clone for RoomContext<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            log: Arc::clone(&self.log),
            global: self.global.clone(),
            evictions: self.evictions.clone(),
            config: self.config.clone(),
        }
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor<S: GameStore> {
    room: Room,
    /// Outbound channel per live connection; mirrors `room.connections()`.
    senders: std::collections::HashMap<ConnectionId, ConnectionSender>,
    ctx: RoomContext<S>,
    receiver: mpsc::Receiver<RoomCommand>,
    evict_at: Option<Instant>,
}

impl<S: GameStore> RoomActor<S> {
    async fn run(mut self) {
        let room_id = self.room.room_id().clone();
        tracing::info!(%room_id, "room actor started");
        self.announce_start();

        loop {
            let deadline = self.evict_at;
            let eviction = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => future::pending().await,
                }
            };

            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(RoomCommand::Shutdown) | None => {
                        tracing::info!(%room_id, "room shutting down");
                        break;
                    }
                    Some(cmd) => self.handle(cmd),
                },
                () = eviction => {
                    tracing::info!(%room_id, "finished room evicted");
                    break;
                }
            }
        }

        let _ = self.ctx.evictions.send(room_id.clone());
        tracing::info!(%room_id, "room actor stopped");
    }

    fn handle(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::MakeMove { user, index, reply } => {
                let _ = reply.send(self.handle_move(user, index));
            }
            RoomCommand::Rejoin {
                conn,
                user,
                sender,
                reply,
            } => {
                let _ = reply.send(self.handle_rejoin(conn, user, sender));
            }
            RoomCommand::Disconnect { conn } => self.handle_disconnect(conn),
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.room.snapshot());
            }
            RoomCommand::Shutdown => {}
        }
    }

    fn announce_start(&self) {
        self.broadcast(ServerEvent::GameStarted {
            room_id: self.room.room_id().clone(),
            players: self.room.players(),
            board: *self.room.board(),
            turn: Mark::A,
            game_id: self.room.game_ref(),
        });
    }

    fn handle_move(&mut self, user: UserId, index: i64) -> Result<(), RoomError> {
        let outcome = self.room.apply_move(user, index).inspect_err(|reason| {
            tracing::debug!(
                room_id = %self.room.room_id(),
                user_id = %user,
                index,
                %reason,
                "move rejected"
            );
        })?;

        self.broadcast(ServerEvent::MoveMade {
            board: *self.room.board(),
            last_move: outcome.record,
            turn: self.room.turn(),
        });

        if let Some(result) = outcome.result {
            self.finish(result);
        }
        Ok(())
    }

    fn finish(&mut self, result: GameResult) {
        tracing::info!(
            room_id = %self.room.room_id(),
            winner = ?result.winner(),
            moves = self.room.moves().len(),
            "game finished"
        );

        self.broadcast(ServerEvent::GameOver {
            winner: result.winner(),
            board: *self.room.board(),
            moves: self.room.moves().to_vec(),
        });

        let record = FinishedGame {
            room_id: self.room.room_id().clone(),
            game: self.room.game_ref(),
            players: [
                self.room.participant(Mark::A).user_id,
                self.room.participant(Mark::B).user_id,
            ],
            result,
            snapshot: self.room.snapshot(),
        };
        tokio::spawn(persist_finished(self.ctx.clone(), record));

        self.evict_at = Some(Instant::now() + self.ctx.config.eviction_grace);
    }

    fn handle_rejoin(
        &mut self,
        conn: ConnectionId,
        user: UserId,
        sender: ConnectionSender,
    ) -> Result<RoomSnapshot, RoomError> {
        let replaced = self.room.rejoin(conn, user)?;
        if let Some(old) = replaced {
            self.senders.remove(&old);
        }
        self.senders.insert(conn, sender);

        tracing::info!(
            room_id = %self.room.room_id(),
            user_id = %user,
            conn_id = %conn,
            replaced = ?replaced,
            paused = self.room.is_paused(),
            "participant rejoined"
        );
        Ok(self.room.snapshot())
    }

    fn handle_disconnect(&mut self, conn: ConnectionId) {
        self.senders.remove(&conn);
        if let Some(user) = self.room.disconnect(conn) {
            tracing::info!(
                room_id = %self.room.room_id(),
                user_id = %user,
                conn_id = %conn,
                "participant disconnected, room paused"
            );
            self.broadcast(ServerEvent::PlayerDisconnected {
                user_id: user,
                message: OPPONENT_DISCONNECTED_MESSAGE.to_string(),
            });
        }
    }

    /// Sends `event` to every live connection. A closed receiver just
    /// means that connection's handler is on its way out.
    fn broadcast(&self, event: ServerEvent) {
        for sender in self.senders.values() {
            let _ = sender.send(event.clone());
        }
    }
}

/// Everything the persistence task needs after the room has moved on.
struct FinishedGame {
    room_id: RoomId,
    game: Option<GameRef>,
    players: [UserId; 2],
    result: GameResult,
    snapshot: RoomSnapshot,
}

/// Writes the final game row and the tallies, then announces the new
/// leaderboard. Runs detached from the room; failures are logged and
/// queued for reconciliation, never surfaced to players.
async fn persist_finished<S: GameStore>(ctx: RoomContext<S>, game: FinishedGame) {
    let timeout = ctx.config.persist_timeout;
    let [player_a, player_b] = game.players;
    let pending_finish = || PendingOp::FinishGame {
        room_id: game.room_id.clone(),
        game: game.game,
        player_a,
        player_b,
        moves: game.snapshot.moves.clone(),
        status: game.snapshot.status,
        winner: game.result.winner(),
    };

    let written = match game.game {
        Some(game_ref) => {
            let write = ctx.store.finish_game(
                game_ref,
                game.snapshot.moves.clone(),
                game.snapshot.status,
                game.result.winner(),
            );
            bounded(timeout, "finish_game", write).await
        }
        None => Err(StoreError::Unavailable("game row was never created".into())),
    };
    if let Err(e) = written {
        ctx.log.record(pending_finish(), &e).await;
    }

    let mut all_tallied = true;
    for (user, outcome) in game.result.tallies() {
        let write = ctx.store.increment_stat(user, outcome);
        if let Err(e) = bounded(timeout, "increment_stat", write).await {
            all_tallied = false;
            ctx.log.record(PendingOp::IncrementStat { user, outcome }, &e).await;
        }
    }

    if all_tallied {
        tracing::debug!(room_id = %game.room_id, "stats recorded");
        // No subscribers is fine.
        let _ = ctx.global.send(ServerEvent::LeaderboardUpdate);
    }
}

/// Runs a gateway call with an upper bound; running out counts as the
/// store being unavailable.
pub(crate) async fn bounded<T>(
    limit: Duration,
    op: &str,
    call: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Unavailable(format!("{op} timed out after {limit:?}"))),
    }
}

/// Spawns a room actor task and returns a handle to it.
///
/// `senders` are the outbound channels of the two connections the room
/// starts with; both receive `game_started` before any command is served.
pub(crate) fn spawn_room<S: GameStore>(
    room: Room,
    senders: [(ConnectionId, ConnectionSender); 2],
    ctx: RoomContext<S>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(ctx.config.channel_size.max(1));
    let room_id = room.room_id().clone();

    let actor = RoomActor {
        room,
        senders: senders.into_iter().collect(),
        ctx,
        receiver: rx,
        evict_at: None,
    };

    tokio::spawn(actor.run());

    RoomHandle { room_id, sender: tx }
}

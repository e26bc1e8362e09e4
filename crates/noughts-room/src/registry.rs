//! Room registry: creates rooms, finds them by id, forgets them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use noughts_protocol::{RoomId, ServerEvent, UserId};
use noughts_store::{GameStore, PendingOp, ReconciliationLog};
use rand::Rng;
use tokio::sync::{broadcast, mpsc, Mutex};

use crate::actor::{bounded, spawn_room, RoomContext};
use crate::room::{Participant, Room};
use crate::{RoomConfig, RoomError, RoomHandle, Seat};

/// Capacity of the server-wide event channel. Receivers that fall further
/// behind than this skip ahead; `leaderboard_update` carries no payload,
/// so missing some is harmless.
const GLOBAL_CHANNEL_SIZE: usize = 64;

/// Owns every live room.
///
/// All methods take `&self`; the registry is shared behind an `Arc` by
/// every connection handler. The room map is locked only for inserts,
/// lookups and removals, never across a store call or a room command.
///
/// Rooms evict themselves: a finished room's actor stops after the grace
/// period and reports its id on an internal channel, which the registry
/// drains at the start of each operation.
pub struct RoomRegistry<S: GameStore> {
    rooms: Mutex<HashMap<RoomId, RoomHandle>>,
    evicted: Mutex<mpsc::UnboundedReceiver<RoomId>>,
    ctx: RoomContext<S>,
    next_room: AtomicU64,
}

impl<S: GameStore> RoomRegistry<S> {
    pub fn new(store: Arc<S>, config: RoomConfig) -> Self {
        let (evictions, evicted) = mpsc::unbounded_channel();
        let (global, _) = broadcast::channel(GLOBAL_CHANNEL_SIZE);
        Self {
            rooms: Mutex::new(HashMap::new()),
            evicted: Mutex::new(evicted),
            ctx: RoomContext {
                store,
                log: Arc::new(ReconciliationLog::new()),
                global,
                evictions,
                config,
            },
            next_room: AtomicU64::new(1),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.ctx.store
    }

    /// Failed persistence writes from every room.
    pub fn reconciliation_log(&self) -> &Arc<ReconciliationLog> {
        &self.ctx.log
    }

    pub fn config(&self) -> &RoomConfig {
        &self.ctx.config
    }

    /// Subscribes to server-wide events (`leaderboard_update`).
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.ctx.global.subscribe()
    }

    /// Seats `a` (mark A) and `b` (mark B) in a new room and starts it.
    ///
    /// The store is asked for a game reference first, bounded by
    /// [`RoomConfig::persist_timeout`]. If it fails or runs out, the room
    /// starts anyway without one and the failure goes to the
    /// reconciliation log. Display names are looked up the same way but
    /// are purely cosmetic, so a failed lookup is only logged.
    pub async fn create_room(&self, a: Seat, b: Seat) -> RoomHandle {
        self.drain_evictions().await;

        let room_id = self.generate_id();
        let limit = self.ctx.config.persist_timeout;

        let create = self.ctx.store.create_game(a.user_id, b.user_id);
        let game_ref = match bounded(limit, "create_game", create).await {
            Ok(game) => Some(game),
            Err(e) => {
                let op = PendingOp::CreateGame {
                    room_id: room_id.clone(),
                    player_a: a.user_id,
                    player_b: b.user_id,
                };
                self.ctx.log.record(op, &e).await;
                None
            }
        };

        let participant_a =
            Participant::new(a.user_id).with_username(self.username(a.user_id).await);
        let participant_b =
            Participant::new(b.user_id).with_username(self.username(b.user_id).await);

        let room = Room::new(
            room_id.clone(),
            (a.conn, participant_a),
            (b.conn, participant_b),
            game_ref,
        );
        let handle = spawn_room(room, [(a.conn, a.sender), (b.conn, b.sender)], self.ctx.clone());

        self.rooms.lock().await.insert(room_id.clone(), handle.clone());
        tracing::info!(
            %room_id,
            player_a = %a.user_id,
            player_b = %b.user_id,
            game = ?game_ref,
            "room created"
        );
        handle
    }

    /// Looks up a live room.
    pub async fn get(&self, room_id: &RoomId) -> Result<RoomHandle, RoomError> {
        self.drain_evictions().await;

        let mut rooms = self.rooms.lock().await;
        if let Some(handle) = rooms.get(room_id).filter(|h| !h.is_closed()) {
            return Ok(handle.clone());
        }
        // Stopped, but its eviction notice may not have been drained yet.
        rooms.remove(room_id);
        Err(RoomError::RoomNotFound(room_id.clone()))
    }

    /// Shuts a room down and forgets it. Removing an unknown or already
    /// removed room does nothing. Returns `true` if a room was removed.
    pub async fn remove(&self, room_id: &RoomId) -> bool {
        self.drain_evictions().await;

        let Some(handle) = self.rooms.lock().await.remove(room_id) else {
            return false;
        };
        let _ = handle.shutdown().await;
        tracing::info!(%room_id, "room removed");
        true
    }

    /// Number of live rooms.
    pub async fn len(&self) -> usize {
        self.drain_evictions().await;
        self.rooms.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Ids of every live room.
    pub async fn room_ids(&self) -> Vec<RoomId> {
        self.drain_evictions().await;
        self.rooms.lock().await.keys().cloned().collect()
    }

    async fn drain_evictions(&self) {
        let mut evicted = self.evicted.lock().await;
        let mut gone = Vec::new();
        while let Ok(room_id) = evicted.try_recv() {
            gone.push(room_id);
        }
        drop(evicted);

        if gone.is_empty() {
            return;
        }
        let mut rooms = self.rooms.lock().await;
        for room_id in gone {
            if rooms.remove(&room_id).is_some() {
                tracing::debug!(%room_id, "room dropped from registry");
            }
        }
    }

    async fn username(&self, user: UserId) -> Option<String> {
        let lookup = self.ctx.store.lookup_username(user);
        match bounded(self.ctx.config.persist_timeout, "lookup_username", lookup).await {
            Ok(name) => name,
            Err(e) => {
                tracing::debug!(user_id = %user, error = %e, "username lookup failed");
                None
            }
        }
    }

    /// `room-<sequence>-<random hex>`. The sequence alone makes ids unique
    /// for the registry's lifetime.
    fn generate_id(&self) -> RoomId {
        let n = self.next_room.fetch_add(1, Ordering::Relaxed);
        let suffix: u32 = rand::rng().random();
        RoomId(format!("room-{n}-{suffix:08x}"))
    }
}

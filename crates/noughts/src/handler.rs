//! Per-connection handler: decode inbound events, route them, deliver
//! outbound ones.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The task waits on three sources at once:
//!   1. frames from the client → decoded into [`ClientEvent`]s and routed
//!      to the queue or a room; direct replies go straight back
//!   2. the connection's own outbound channel, fed by room actors
//!   3. the server-wide broadcast (`leaderboard_update`)
//!
//! When the client goes away the handler's guard clears the waiting slot,
//! unbinds the connection and tells every affected room.

use std::sync::Arc;

use noughts_protocol::{
    ClientEvent, Codec, ConnectionId, EventTag, RoomId, ServerEvent, UserId, MALFORMED_MESSAGE,
    WAITING_MESSAGE,
};
use noughts_room::{ConnectionSender, JoinOutcome, RoomError, Seat};
use noughts_store::GameStore;
use noughts_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::server::ServerState;
use crate::NoughtsError;

/// Drop guard that releases a connection's queue slot and room bindings
/// when the handler exits, however it exits.
///
/// `Drop` is synchronous, so the async cleanup runs in a spawned task.
struct ConnectionGuard<S: GameStore, C: Codec> {
    conn_id: ConnectionId,
    state: Arc<ServerState<S, C>>,
}

impl<S: GameStore, C: Codec> Drop for ConnectionGuard<S, C> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(release(state, conn_id));
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<S, C>>,
) -> Result<(), NoughtsError>
where
    S: GameStore,
    C: Codec,
{
    let conn_id = conn.id();
    tracing::info!(%conn_id, peer = %conn.peer_addr(), "connection opened");

    let (tx, mut outbound) = mpsc::unbounded_channel();
    let mut global = state.registry.subscribe();
    let _guard = ConnectionGuard {
        conn_id,
        state: Arc::clone(&state),
    };

    loop {
        tokio::select! {
            frame = conn.recv() => match frame {
                Ok(Some(data)) => {
                    if let Some(reply) = dispatch(&state, conn_id, &tx, &data).await {
                        send(&conn, &state.codec, &reply).await?;
                    }
                }
                Ok(None) => {
                    tracing::info!(%conn_id, "connection closed cleanly");
                    break;
                }
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "recv error");
                    break;
                }
            },
            Some(event) = outbound.recv() => {
                send(&conn, &state.codec, &event).await?;
            }
            Ok(event) = global.recv() => {
                send(&conn, &state.codec, &event).await?;
            }
        }
    }

    // _guard drops here → cleanup fires.
    Ok(())
}

/// Decodes one frame and routes it. Returns the direct reply, if any.
async fn dispatch<S, C>(
    state: &ServerState<S, C>,
    conn_id: ConnectionId,
    tx: &ConnectionSender,
    data: &[u8],
) -> Option<ServerEvent>
where
    S: GameStore,
    C: Codec,
{
    let event: ClientEvent = match state.codec.decode(data) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(%conn_id, error = %e, "failed to decode event");
            return Some(ServerEvent::error(malformed_reply(&state.codec, data)));
        }
    };

    match event {
        ClientEvent::JoinGame { user_id } => join_game(state, conn_id, user_id, tx).await,
        ClientEvent::JoinRoom { room_id, user_id } => {
            join_room(state, conn_id, room_id, user_id, tx).await
        }
        ClientEvent::MakeMove {
            room_id,
            user_id,
            index,
        } => make_move(state, room_id, user_id, index).await,
    }
}

/// A `make_move` whose body doesn't decode is still a bad move; anything
/// else is just malformed.
fn malformed_reply(codec: &impl Codec, data: &[u8]) -> String {
    match codec.decode::<EventTag>(data) {
        Ok(tag) if tag.event == "make_move" => RoomError::InvalidMove.to_string(),
        _ => MALFORMED_MESSAGE.to_string(),
    }
}

async fn join_game<S, C>(
    state: &ServerState<S, C>,
    conn_id: ConnectionId,
    user_id: UserId,
    tx: &ConnectionSender,
) -> Option<ServerEvent>
where
    S: GameStore,
    C: Codec,
{
    let seat = Seat {
        conn: conn_id,
        user_id,
        sender: tx.clone(),
    };
    // Read-and-clear of the slot happens under this one lock.
    let outcome = state.queue.lock().await.join(seat);

    let (a, b) = match outcome {
        JoinOutcome::Waiting => {
            return Some(ServerEvent::Waiting {
                message: WAITING_MESSAGE.to_string(),
            });
        }
        JoinOutcome::Paired { a, b } => (a, b),
    };

    // Kept to notice a participant that hung up while the room was being made.
    let seated = [(a.conn, a.user_id, a.sender.clone()), (b.conn, b.user_id, b.sender.clone())];

    // game_started reaches both sides through their outbound channels.
    let handle = state.registry.create_room(a, b).await;
    let room_id = handle.room_id().clone();

    let mut moved_from = Vec::new();
    {
        let mut mapper = state.mapper.lock().await;
        for (conn, user, _) in &seated {
            if let Some(previous) = mapper.bind(*conn, room_id.clone(), *user) {
                moved_from.push((*conn, previous.room_id));
            }
        }
    }
    for (conn, old_room) in moved_from {
        leave_room(state, conn, &old_room).await;
    }

    for (conn, _, sender) in &seated {
        if sender.is_closed() {
            state.mapper.lock().await.unbind(*conn);
            let _ = handle.disconnect(*conn).await;
        }
    }

    None
}

async fn join_room<S, C>(
    state: &ServerState<S, C>,
    conn_id: ConnectionId,
    room_id: RoomId,
    user_id: UserId,
    tx: &ConnectionSender,
) -> Option<ServerEvent>
where
    S: GameStore,
    C: Codec,
{
    let rejoined = match state.registry.get(&room_id).await {
        Ok(handle) => handle.rejoin(conn_id, user_id, tx.clone()).await,
        Err(e) => Err(e),
    };

    let snapshot = match rejoined {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::debug!(%conn_id, %room_id, user_id = %user_id, error = %e, "join_room rejected");
            return Some(ServerEvent::error(e.to_string()));
        }
    };

    let previous = state
        .mapper
        .lock()
        .await
        .bind(conn_id, room_id.clone(), user_id);
    if let Some(previous) = previous.filter(|p| p.room_id != room_id) {
        leave_room(state, conn_id, &previous.room_id).await;
    }

    Some(ServerEvent::RoomState(snapshot))
}

async fn make_move<S, C>(
    state: &ServerState<S, C>,
    room_id: RoomId,
    user_id: UserId,
    index: i64,
) -> Option<ServerEvent>
where
    S: GameStore,
    C: Codec,
{
    let result = match state.registry.get(&room_id).await {
        Ok(handle) => handle.make_move(user_id, index).await,
        Err(e) => Err(e),
    };
    result.err().map(|e| ServerEvent::error(e.to_string()))
}

/// Tells `room_id` that `conn` no longer speaks for anyone there.
async fn leave_room<S, C>(state: &ServerState<S, C>, conn: ConnectionId, room_id: &RoomId)
where
    S: GameStore,
    C: Codec,
{
    match state.registry.get(room_id).await {
        Ok(handle) => {
            let _ = handle.disconnect(conn).await;
        }
        Err(_) => {
            // Evicted: nobody left to notify, and nothing else should
            // stay bound to it either.
            state.mapper.lock().await.forget_room(room_id);
        }
    }
}

/// Cleanup for a closed connection.
async fn release<S, C>(state: Arc<ServerState<S, C>>, conn_id: ConnectionId)
where
    S: GameStore,
    C: Codec,
{
    state.queue.lock().await.leave(conn_id);

    let bindings = state.mapper.lock().await.unbind(conn_id);
    for binding in &bindings {
        leave_room(&state, conn_id, &binding.room_id).await;
    }

    tracing::info!(%conn_id, rooms = bindings.len(), "connection released");
}

async fn send(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    event: &ServerEvent,
) -> Result<(), NoughtsError> {
    let bytes = codec.encode(event)?;
    conn.send(&bytes).await?;
    Ok(())
}

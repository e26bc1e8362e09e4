//! Integration tests for the room system: registry, room actors and the
//! in-memory store working together.

use std::sync::Arc;
use std::time::Duration;

use noughts_protocol::{
    ConnectionId, GameRef, GameStatus, Mark, MoveRecord, PlayerInfo, RoomId, ServerEvent, UserId,
    OPPONENT_DISCONNECTED_MESSAGE,
};
use noughts_room::{RoomConfig, RoomError, RoomHandle, RoomRegistry, Seat};
use noughts_store::{GameStore, MemoryStore, Outcome, PendingOp, StoreError, UserStats};
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

const ANN: UserId = UserId(1);
const BO: UserId = UserId(2);

type Inbox = mpsc::UnboundedReceiver<ServerEvent>;

fn seat(conn: u64, user: UserId) -> (Seat, Inbox) {
    let (sender, rx) = mpsc::unbounded_channel();
    let seat = Seat {
        conn: ConnectionId::new(conn),
        user_id: user,
        sender,
    };
    (seat, rx)
}

fn registry_with(store: MemoryStore) -> RoomRegistry<MemoryStore> {
    RoomRegistry::new(Arc::new(store), RoomConfig::default())
}

/// Creates a room for ANN (conn 1, mark A) and BO (conn 2, mark B) and
/// consumes the `game_started` each of them receives.
async fn start_room<S: GameStore>(registry: &RoomRegistry<S>) -> (RoomHandle, Inbox, Inbox) {
    let (a, mut rx_a) = seat(1, ANN);
    let (b, mut rx_b) = seat(2, BO);
    let handle = registry.create_room(a, b).await;
    assert!(matches!(next(&mut rx_a).await, ServerEvent::GameStarted { .. }));
    assert!(matches!(next(&mut rx_b).await, ServerEvent::GameStarted { .. }));
    (handle, rx_a, rx_b)
}

async fn next(rx: &mut Inbox) -> ServerEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("room dropped the connection")
}

/// Plays `cells` alternately, ANN first.
async fn play(handle: &RoomHandle, cells: &[i64]) {
    for (i, cell) in cells.iter().enumerate() {
        let user = if i % 2 == 0 { ANN } else { BO };
        handle.make_move(user, *cell).await.unwrap();
    }
}

/// Skips `move_made` events and returns the `game_over`.
async fn game_over(rx: &mut Inbox) -> (Option<UserId>, Vec<MoveRecord>) {
    loop {
        match next(rx).await {
            ServerEvent::MoveMade { .. } => continue,
            ServerEvent::GameOver { winner, moves, .. } => return (winner, moves),
            other => panic!("unexpected event {other:?}"),
        }
    }
}

async fn wait_for_log_len<S: GameStore>(registry: &RoomRegistry<S>, len: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while registry.reconciliation_log().len().await < len {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("reconciliation log never filled");
}

/// A store whose `create_game` takes longer than any sensible timeout.
struct SlowStore(MemoryStore);

impl GameStore for SlowStore {
    async fn create_game(&self, a: UserId, b: UserId) -> Result<GameRef, StoreError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        self.0.create_game(a, b).await
    }

    async fn finish_game(
        &self,
        game: GameRef,
        moves: Vec<MoveRecord>,
        status: GameStatus,
        winner: Option<UserId>,
    ) -> Result<(), StoreError> {
        self.0.finish_game(game, moves, status, winner).await
    }

    async fn increment_stat(&self, user: UserId, outcome: Outcome) -> Result<(), StoreError> {
        self.0.increment_stat(user, outcome).await
    }

    async fn lookup_username(&self, user: UserId) -> Result<Option<String>, StoreError> {
        self.0.lookup_username(user).await
    }
}

// =========================================================================
// Creation
// =========================================================================

#[tokio::test]
async fn test_create_room_sends_game_started_to_both() {
    let registry = registry_with(MemoryStore::with_usernames([(BO, "bo")]));
    let (a, mut rx_a) = seat(1, ANN);
    let (b, mut rx_b) = seat(2, BO);

    let handle = registry.create_room(a, b).await;

    for rx in [&mut rx_a, &mut rx_b] {
        match next(rx).await {
            ServerEvent::GameStarted {
                room_id,
                players,
                board,
                turn,
                game_id,
            } => {
                assert_eq!(&room_id, handle.room_id());
                assert_eq!(
                    players,
                    vec![
                        PlayerInfo { user_id: ANN, mark: Mark::A, username: None },
                        PlayerInfo { user_id: BO, mark: Mark::B, username: Some("bo".into()) },
                    ]
                );
                assert!(board.cells().iter().all(Option::is_none));
                assert_eq!(turn, Mark::A);
                assert_eq!(game_id, Some(GameRef(1)));
            }
            other => panic!("expected game_started, got {other:?}"),
        }
    }

    assert_eq!(registry.len().await, 1);
    assert_eq!(registry.store().games().await.len(), 1);
}

#[tokio::test]
async fn test_create_room_ids_are_unique() {
    let registry = registry_with(MemoryStore::new());
    let (h1, _, _) = start_room(&registry).await;
    let (h2, _, _) = start_room(&registry).await;
    assert_ne!(h1.room_id(), h2.room_id());
    assert!(h1.room_id().as_str().starts_with("room-"));
    assert_eq!(registry.len().await, 2);
}

#[tokio::test]
async fn test_get_unknown_room_is_not_found() {
    let registry = registry_with(MemoryStore::new());
    let err = registry.get(&RoomId::from("room-404")).await.unwrap_err();
    assert_eq!(err, RoomError::RoomNotFound(RoomId::from("room-404")));
    assert_eq!(err.to_string(), "Room not found");
}

// =========================================================================
// Gameplay scenarios
// =========================================================================

#[tokio::test]
async fn test_first_player_wins_left_column() {
    let registry = registry_with(MemoryStore::new());
    let mut global = registry.subscribe();
    let (handle, mut rx_a, mut rx_b) = start_room(&registry).await;

    play(&handle, &[0, 1, 3, 4, 6]).await;

    // Both sides see every move, then the terminal event.
    for rx in [&mut rx_a, &mut rx_b] {
        for (i, cell) in [0u8, 1, 3, 4, 6].into_iter().enumerate() {
            match next(rx).await {
                ServerEvent::MoveMade { last_move, turn, .. } => {
                    assert_eq!(last_move.cell_index, cell);
                    let expected = match i {
                        4 => None,
                        i if i % 2 == 0 => Some(Mark::B),
                        _ => Some(Mark::A),
                    };
                    assert_eq!(turn, expected);
                }
                other => panic!("expected move_made, got {other:?}"),
            }
        }
        let (winner, moves) = game_over(rx).await;
        assert_eq!(winner, Some(ANN));
        assert_eq!(moves.len(), 5);
    }

    let update = tokio::time::timeout(Duration::from_secs(5), global.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(update, ServerEvent::LeaderboardUpdate);

    let store = registry.store();
    assert_eq!(store.stats(ANN).await, UserStats { wins: 1, losses: 0, draws: 0 });
    assert_eq!(store.stats(BO).await, UserStats { wins: 0, losses: 1, draws: 0 });
    let row = store.game(GameRef(1)).await.unwrap();
    assert_eq!(row.status, GameStatus::Finished);
    assert_eq!(row.winner, Some(ANN));
    assert_eq!(row.moves.len(), 5);
    assert!(registry.reconciliation_log().is_empty().await);
}

#[tokio::test]
async fn test_occupied_cell_is_invalid_move() {
    let registry = registry_with(MemoryStore::new());
    let (handle, _rx_a, _rx_b) = start_room(&registry).await;

    play(&handle, &[4]).await;
    let before = handle.snapshot().await.unwrap();

    let err = handle.make_move(BO, 4).await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid move");

    let after = handle.snapshot().await.unwrap();
    assert_eq!(after, before);
    assert_eq!(after.board.get(4), Some(Mark::A));
    assert_eq!(after.turn, Some(Mark::B));
}

#[tokio::test]
async fn test_second_player_moving_first_is_not_your_turn() {
    let registry = registry_with(MemoryStore::new());
    let (handle, _rx_a, _rx_b) = start_room(&registry).await;

    let err = handle.make_move(BO, 0).await.unwrap_err();
    assert_eq!(err, RoomError::NotYourTurn);

    let err = handle.make_move(UserId(99), 0).await.unwrap_err();
    assert_eq!(err.to_string(), "You are not a player in this game");
    assert!(handle.snapshot().await.unwrap().moves.is_empty());
}

#[tokio::test]
async fn test_full_board_without_line_is_draw() {
    let registry = registry_with(MemoryStore::new());
    let mut global = registry.subscribe();
    let (handle, mut rx_a, _rx_b) = start_room(&registry).await;

    // A: 0,1,5,6,8  B: 2,3,4,7
    play(&handle, &[0, 2, 1, 3, 5, 4, 6, 7, 8]).await;

    let (winner, moves) = game_over(&mut rx_a).await;
    assert_eq!(winner, None);
    assert_eq!(moves.len(), 9);

    tokio::time::timeout(Duration::from_secs(5), global.recv())
        .await
        .unwrap()
        .unwrap();
    let store = registry.store();
    assert_eq!(store.stats(ANN).await.draws, 1);
    assert_eq!(store.stats(BO).await.draws, 1);

    let err = handle.make_move(BO, 0).await.unwrap_err();
    assert_eq!(err, RoomError::GameFinished);
}

#[tokio::test]
async fn test_disconnect_pauses_and_notifies_opponent() {
    let registry = registry_with(MemoryStore::new());
    let (handle, _rx_a, mut rx_b) = start_room(&registry).await;
    play(&handle, &[0]).await;
    assert!(matches!(next(&mut rx_b).await, ServerEvent::MoveMade { .. }));
    let before = handle.snapshot().await.unwrap();

    handle.disconnect(ConnectionId::new(1)).await.unwrap();

    assert_eq!(
        next(&mut rx_b).await,
        ServerEvent::PlayerDisconnected {
            user_id: ANN,
            message: OPPONENT_DISCONNECTED_MESSAGE.into(),
        }
    );
    let after = handle.snapshot().await.unwrap();
    assert!(after.paused);
    assert_eq!(after.status, GameStatus::Ongoing);
    assert_eq!(after.board, before.board);
    assert_eq!(after.turn, before.turn);
    assert_eq!(after.moves, before.moves);
}

#[tokio::test]
async fn test_rejoin_restores_connection_and_state() {
    let registry = registry_with(MemoryStore::new());
    let (handle, _rx_a, _rx_b) = start_room(&registry).await;
    play(&handle, &[4, 0]).await;
    handle.disconnect(ConnectionId::new(1)).await.unwrap();

    let room = registry.get(handle.room_id()).await.unwrap();
    let (sender, mut rx_new) = mpsc::unbounded_channel();
    let snapshot = room.rejoin(ConnectionId::new(3), ANN, sender).await.unwrap();

    assert_eq!(snapshot.moves.len(), 2);
    assert_eq!(snapshot.turn, Some(Mark::A));
    assert_eq!(snapshot.status, GameStatus::Ongoing);
    assert!(!snapshot.paused);
    assert_eq!(snapshot.players[0].user_id, ANN);

    // The new connection receives subsequent broadcasts.
    room.make_move(ANN, 8).await.unwrap();
    assert!(matches!(next(&mut rx_new).await, ServerEvent::MoveMade { .. }));
}

#[tokio::test]
async fn test_rejoin_by_stranger_is_rejected() {
    let registry = registry_with(MemoryStore::new());
    let (handle, _rx_a, _rx_b) = start_room(&registry).await;

    let (sender, _rx) = mpsc::unbounded_channel();
    let err = handle
        .rejoin(ConnectionId::new(9), UserId(9), sender)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "You are not a player");
}

#[tokio::test]
async fn test_rooms_do_not_share_state() {
    let registry = registry_with(MemoryStore::new());
    let (first, _a1, _b1) = start_room(&registry).await;
    let (second, _a2, _b2) = start_room(&registry).await;

    play(&first, &[0, 1, 3, 4, 6]).await;

    let snap = second.snapshot().await.unwrap();
    assert!(snap.moves.is_empty());
    assert_eq!(snap.status, GameStatus::Ongoing);
    second.make_move(ANN, 0).await.unwrap();
}

// =========================================================================
// Lifecycle
// =========================================================================

#[tokio::test]
async fn test_remove_twice_equals_once() {
    let registry = registry_with(MemoryStore::new());
    let (handle, _rx_a, _rx_b) = start_room(&registry).await;
    let room_id = handle.room_id().clone();

    assert!(registry.remove(&room_id).await);
    assert!(!registry.remove(&room_id).await);
    assert_eq!(registry.len().await, 0);
    assert!(matches!(
        registry.get(&room_id).await,
        Err(RoomError::RoomNotFound(_))
    ));
    assert!(matches!(
        handle.make_move(ANN, 0).await,
        Err(RoomError::RoomNotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_finished_room_evicted_after_grace() {
    let registry = registry_with(MemoryStore::new());
    let grace = registry.config().eviction_grace;
    let (handle, mut rx_a, _rx_b) = start_room(&registry).await;
    let room_id = handle.room_id().clone();

    play(&handle, &[0, 1, 3, 4, 6]).await;
    game_over(&mut rx_a).await;

    // Still reachable inside the grace window.
    tokio::time::sleep(grace - Duration::from_secs(1)).await;
    let room = registry.get(&room_id).await.unwrap();
    assert_eq!(room.make_move(BO, 8).await, Err(RoomError::GameFinished));
    assert_eq!(room.snapshot().await.unwrap().winner, Some(ANN));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(
        registry.get(&room_id).await.unwrap_err(),
        RoomError::RoomNotFound(room_id.clone())
    );
    assert_eq!(registry.len().await, 0);
    assert!(handle.snapshot().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_unfinished_room_is_never_evicted() {
    let registry = registry_with(MemoryStore::new());
    let (handle, _rx_a, _rx_b) = start_room(&registry).await;
    play(&handle, &[0]).await;

    tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
    assert!(registry.get(handle.room_id()).await.is_ok());
}

// =========================================================================
// Persistence failures
// =========================================================================

#[tokio::test]
async fn test_offline_store_does_not_block_gameplay() {
    let store = MemoryStore::new();
    store.set_available(false);
    let registry = registry_with(store);

    let (a, mut rx_a) = seat(1, ANN);
    let (b, _rx_b) = seat(2, BO);
    let handle = registry.create_room(a, b).await;
    match next(&mut rx_a).await {
        ServerEvent::GameStarted { game_id, .. } => assert_eq!(game_id, None),
        other => panic!("expected game_started, got {other:?}"),
    }

    play(&handle, &[0, 1, 3, 4, 6]).await;
    let (winner, _) = game_over(&mut rx_a).await;
    assert_eq!(winner, Some(ANN));

    // create_game, finish_game, and one tally per participant.
    wait_for_log_len(&registry, 4).await;
    let entries = registry.reconciliation_log().entries().await;
    assert!(matches!(entries[0].op, PendingOp::CreateGame { .. }));
    assert!(entries.iter().any(|e| matches!(
        &e.op,
        PendingOp::FinishGame { game: None, winner: Some(ANN), .. }
    )));
    assert!(entries.iter().any(|e| e.op
        == PendingOp::IncrementStat { user: BO, outcome: Outcome::Loss }));

    // Once the store is back the log replays into one finished game.
    registry.store().set_available(true);
    assert_eq!(registry.reconciliation_log().retry(registry.store().as_ref()).await, 4);
    let games = registry.store().games().await;
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].winner, Some(ANN));
    assert_eq!(registry.store().stats(ANN).await.wins, 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_create_game_times_out() {
    let config = RoomConfig {
        persist_timeout: Duration::from_millis(100),
        ..RoomConfig::default()
    };
    let registry = RoomRegistry::new(Arc::new(SlowStore(MemoryStore::new())), config);

    let (a, mut rx_a) = seat(1, ANN);
    let (b, _rx_b) = seat(2, BO);
    let handle = registry.create_room(a, b).await;

    match next(&mut rx_a).await {
        ServerEvent::GameStarted { game_id, .. } => assert_eq!(game_id, None),
        other => panic!("expected game_started, got {other:?}"),
    }
    let entries = registry.reconciliation_log().entries().await;
    assert_eq!(entries.len(), 1);
    assert!(entries[0].error.contains("timed out"));

    handle.make_move(ANN, 4).await.unwrap();
}

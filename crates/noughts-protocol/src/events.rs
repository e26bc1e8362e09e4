//! Inbound and outbound events.
//!
//! Every frame on the wire is one JSON object of the form
//! `{ "event": "<name>", "data": { ... } }`. Both directions are closed
//! enums: anything that doesn't decode into one of these variants is
//! rejected at the edge and never reaches a room.

use serde::{Deserialize, Serialize};

use crate::{Board, GameRef, GameStatus, Mark, MoveRecord, RoomId, UserId};

/// `waiting.message` sent to a participant parked in the queue.
pub const WAITING_MESSAGE: &str = "Waiting for opponent...";

/// `player_disconnected.message` sent to the remaining participant.
pub const OPPONENT_DISCONNECTED_MESSAGE: &str = "Your opponent disconnected";

/// `error_msg.message` for a frame that doesn't decode at all.
pub const MALFORMED_MESSAGE: &str = "Malformed message";

// ---------------------------------------------------------------------------
// Shared payload pieces
// ---------------------------------------------------------------------------

/// A participant as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub user_id: UserId,
    pub mark: Mark,
    /// Display name, when the store could resolve one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Full state of a room, sent on reconnection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub board: Board,
    /// `None` once the game is finished.
    pub turn: Option<Mark>,
    pub players: Vec<PlayerInfo>,
    pub moves: Vec<MoveRecord>,
    pub status: GameStatus,
    pub winner: Option<UserId>,
    pub paused: bool,
}

// ---------------------------------------------------------------------------
// ClientEvent
// ---------------------------------------------------------------------------

/// Everything a client may send.
///
/// `tag`/`content` produce the adjacently tagged shape
/// `{"event": "make_move", "data": {"roomId": "...", "userId": 1, "index": 4}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    /// Enter matchmaking.
    JoinGame { user_id: UserId },

    /// Re-attach this connection to a room the user already plays in.
    JoinRoom { room_id: RoomId, user_id: UserId },

    /// Place the user's mark.
    ///
    /// `index` is signed so that out-of-range values (including negative
    /// ones) decode and are rejected by move validation as `Invalid move`
    /// instead of as a malformed frame.
    MakeMove {
        room_id: RoomId,
        user_id: UserId,
        index: i64,
    },
}

/// Just the `event` name of an inbound frame.
///
/// Used to pick an error message for a frame whose `data` failed to
/// decode; unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct EventTag {
    pub event: String,
}

// ---------------------------------------------------------------------------
// ServerEvent
// ---------------------------------------------------------------------------

/// Everything the server may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Parked in the matchmaking slot.
    Waiting { message: String },

    /// Sent to both participants when a room is created.
    GameStarted {
        room_id: RoomId,
        players: Vec<PlayerInfo>,
        board: Board,
        turn: Mark,
        /// Durable game reference; `None` if the store was unavailable.
        game_id: Option<GameRef>,
    },

    /// Reply to a successful `join_room`.
    RoomState(RoomSnapshot),

    /// Broadcast after every accepted move.
    MoveMade {
        board: Board,
        last_move: MoveRecord,
        /// `None` when this move finished the game.
        turn: Option<Mark>,
    },

    /// Broadcast once when the game finishes. `winner` is `null` on a draw.
    GameOver {
        winner: Option<UserId>,
        board: Board,
        moves: Vec<MoveRecord>,
    },

    /// Global signal: statistics changed, refetch the leaderboard.
    LeaderboardUpdate,

    /// A participant's connection dropped.
    PlayerDisconnected { user_id: UserId, message: String },

    /// A request from this connection was rejected.
    ErrorMsg { message: String },
}

impl ServerEvent {
    /// Shorthand for an `error_msg` event.
    pub fn error(message: impl Into<String>) -> Self {
        Self::ErrorMsg {
            message: message.into(),
        }
    }
}

//! Error types for the room layer.
//!
//! The `Display` text of each variant is exactly what the offending
//! connection receives in `error_msg.message`, so the handler can forward
//! `err.to_string()` without a mapping table.

use noughts_protocol::RoomId;

/// A rejected room operation. None of these mutate room state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// Unknown room id, or the room was evicted or shut down.
    #[error("Room not found")]
    RoomNotFound(RoomId),

    #[error("Game already finished")]
    GameFinished,

    /// A move from a user who holds no mark in this room.
    #[error("You are not a player in this game")]
    NotAPlayer,

    #[error("Not your turn")]
    NotYourTurn,

    /// Cell index outside `0..=8`, or the cell is taken.
    #[error("Invalid move")]
    InvalidMove,

    /// `join_room` from a user who holds no mark in this room.
    #[error("You are not a player")]
    NotAParticipant,
}

//! Wire protocol for Noughts.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Identity** ([`UserId`], [`RoomId`], [`GameRef`]) — newtypes so a
//!   room id can never be passed where a user id is expected.
//! - **Board** ([`Board`], [`Mark`], [`MoveRecord`], [`GameStatus`]) —
//!   the authoritative game data as it appears on the wire.
//! - **Events** ([`ClientEvent`], [`ServerEvent`]) — closed tagged unions
//!   of everything that can be sent in either direction.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how events become bytes.
//!
//! ```text
//! Transport (bytes) → Protocol (events) → Room (state machine)
//! ```

mod board;
mod codec;
mod error;
mod events;
mod ids;

pub use board::{unix_millis, Board, GameStatus, Mark, MoveRecord, BOARD_CELLS};
pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use events::{
    ClientEvent, EventTag, PlayerInfo, RoomSnapshot, ServerEvent,
    MALFORMED_MESSAGE, OPPONENT_DISCONNECTED_MESSAGE, WAITING_MESSAGE,
};
pub use ids::{GameRef, RoomId, UserId};
pub use noughts_transport::ConnectionId;

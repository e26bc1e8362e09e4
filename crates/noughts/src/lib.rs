//! # Noughts
//!
//! Real-time room coordinator for two-player noughts and crosses.
//!
//! Clients connect over WebSocket and exchange small JSON events. The
//! server pairs arrivals into rooms, validates every move against the
//! authoritative board, relays state to both participants, and records
//! finished games through a [`GameStore`](noughts_store::GameStore).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use noughts::prelude::*;
//!
//! # async fn run() -> Result<(), NoughtsError> {
//! let server = NoughtsServerBuilder::with_config(ServerConfig::from_env())
//!     .build(Arc::new(MemoryStore::new()))
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::{
    ServerConfig, DEFAULT_BIND_ADDR, DEFAULT_HANDSHAKE_TIMEOUT, ENV_BIND, ENV_EVICTION_GRACE_SECS,
    ENV_HANDSHAKE_TIMEOUT_MS, ENV_PERSIST_TIMEOUT_MS,
};
pub use error::NoughtsError;
pub use server::{NoughtsServer, NoughtsServerBuilder};

/// Everything needed to start a server and talk about its events.
pub mod prelude {
    pub use crate::{NoughtsError, NoughtsServer, NoughtsServerBuilder, ServerConfig};
    pub use noughts_protocol::{
        Board, ClientEvent, GameRef, GameStatus, Mark, MoveRecord, PlayerInfo, RoomId,
        RoomSnapshot, ServerEvent, UserId,
    };
    pub use noughts_room::{RoomConfig, RoomError, RoomRegistry};
    pub use noughts_store::{GameStore, MemoryStore, Outcome, ReconciliationLog, StoreError};
}

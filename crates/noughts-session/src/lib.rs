//! Connection bindings for Noughts.
//!
//! A transport connection is anonymous: it only knows its
//! [`ConnectionId`](noughts_protocol::ConnectionId). This crate keeps the
//! other half of the picture, which room and which participant each
//! connection currently speaks for, so that a dropped connection can be
//! traced back to the rooms that need to hear about it.
//!
//! # How it fits in the stack
//!
//! ```text
//! Server / handler (above)  ← binds on pairing and join_room, unbinds on close
//!     ↕
//! Session Layer (this crate)  ← ConnectionId ↔ (RoomId, UserId)
//!     ↕
//! Protocol Layer (below)  ← provides ConnectionId, RoomId, UserId
//! ```

mod mapper;

pub use mapper::{Binding, ConnectionMapper};

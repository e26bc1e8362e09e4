//! The connection mapper: which connection speaks for whom, in which room.
//!
//! # Concurrency note
//!
//! `ConnectionMapper` is a plain struct with `&mut self` methods. The
//! server owns exactly one and keeps it behind a mutex; every call is a
//! couple of hash map operations, so nothing here ever awaits.

use std::collections::{HashMap, HashSet};

use noughts_protocol::{ConnectionId, RoomId, UserId};

/// One connection's seat: the room it is attached to and the participant
/// it acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub room_id: RoomId,
    pub user_id: UserId,
}

/// Bidirectional index between connections and rooms.
///
/// A connection is bound to at most one room at a time. A room may have
/// any number of bound connections over its life, but the room itself
/// decides which of them are live; this index only remembers who to tell
/// when a connection goes away.
#[derive(Debug, Default)]
pub struct ConnectionMapper {
    by_conn: HashMap<ConnectionId, Binding>,
    by_room: HashMap<RoomId, HashSet<ConnectionId>>,
}

impl ConnectionMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `conn` to `room_id` as `user_id`.
    ///
    /// Returns the binding this replaced, if the connection was already
    /// attached somewhere. The caller decides what the old room should be
    /// told; the mapper just forgets it.
    pub fn bind(&mut self, conn: ConnectionId, room_id: RoomId, user_id: UserId) -> Option<Binding> {
        let previous = self.detach(conn);

        self.by_room.entry(room_id.clone()).or_default().insert(conn);
        tracing::debug!(conn_id = %conn, room_id = %room_id, user_id = %user_id, "connection bound");
        self.by_conn.insert(conn, Binding { room_id, user_id });

        previous
    }

    /// Detaches `conn` and reports every room it was registered in.
    ///
    /// An unknown connection yields an empty list.
    pub fn unbind(&mut self, conn: ConnectionId) -> Vec<Binding> {
        self.detach(conn).into_iter().collect()
    }

    /// The current binding of `conn`, if any.
    pub fn binding(&self, conn: ConnectionId) -> Option<&Binding> {
        self.by_conn.get(&conn)
    }

    /// Every connection currently bound to `room_id`, in id order.
    pub fn connections_in(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        let mut conns: Vec<ConnectionId> = self
            .by_room
            .get(room_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        conns.sort();
        conns
    }

    /// Drops every binding into `room_id`, for a room that no longer
    /// exists. Returns the connections that were detached.
    pub fn forget_room(&mut self, room_id: &RoomId) -> Vec<ConnectionId> {
        let Some(conns) = self.by_room.remove(room_id) else {
            return Vec::new();
        };
        let mut conns: Vec<ConnectionId> = conns.into_iter().collect();
        conns.sort();
        for conn in &conns {
            self.by_conn.remove(conn);
        }
        conns
    }

    /// Number of bound connections.
    pub fn len(&self) -> usize {
        self.by_conn.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_conn.is_empty()
    }

    fn detach(&mut self, conn: ConnectionId) -> Option<Binding> {
        let binding = self.by_conn.remove(&conn)?;
        if let Some(set) = self.by_room.get_mut(&binding.room_id) {
            set.remove(&conn);
            if set.is_empty() {
                self.by_room.remove(&binding.room_id);
            }
        }
        Some(binding)
    }
}

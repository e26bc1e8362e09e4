//! The matchmaking queue: a single waiting slot.
//!
//! `MatchmakingQueue` is not thread-safe by itself. The server keeps it
//! behind a mutex so that reading and clearing the slot is one step: two
//! concurrent joins can never both wait, and never both take the same
//! waiting participant.

use noughts_protocol::{ConnectionId, UserId};

use crate::ConnectionSender;

/// A participant ready to be seated: who they are and how to reach them.
#[derive(Debug, Clone)]
pub struct Seat {
    pub conn: ConnectionId,
    pub user_id: UserId,
    pub sender: ConnectionSender,
}

/// Result of [`MatchmakingQueue::join`].
#[derive(Debug)]
pub enum JoinOutcome {
    /// The caller now holds the slot.
    Waiting,
    /// The caller was paired. `a` was waiting and plays first.
    Paired { a: Seat, b: Seat },
}

/// Holds at most one waiting participant.
#[derive(Debug, Default)]
pub struct MatchmakingQueue {
    waiting: Option<Seat>,
}

impl MatchmakingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters matchmaking.
    ///
    /// If someone else is waiting the slot is consumed and both are
    /// returned for seating. A join from the connection or user already
    /// in the slot replaces it, so nobody is ever paired with themselves.
    pub fn join(&mut self, seat: Seat) -> JoinOutcome {
        match self.waiting.take() {
            Some(w) if w.conn == seat.conn || w.user_id == seat.user_id => {
                tracing::debug!(conn_id = %seat.conn, user_id = %seat.user_id, "waiting slot refreshed");
                self.waiting = Some(seat);
                JoinOutcome::Waiting
            }
            Some(a) => {
                tracing::info!(a = %a.user_id, b = %seat.user_id, "participants paired");
                JoinOutcome::Paired { a, b: seat }
            }
            None => {
                tracing::info!(conn_id = %seat.conn, user_id = %seat.user_id, "participant waiting");
                self.waiting = Some(seat);
                JoinOutcome::Waiting
            }
        }
    }

    /// Clears the slot if `conn` is the one holding it.
    ///
    /// Returns `true` when the slot was cleared.
    pub fn leave(&mut self, conn: ConnectionId) -> bool {
        if self.waiting.as_ref().is_some_and(|w| w.conn == conn) {
            self.waiting = None;
            tracing::debug!(conn_id = %conn, "waiting slot cleared");
            return true;
        }
        false
    }

    /// The waiting participant, if any.
    pub fn waiting(&self) -> Option<(ConnectionId, UserId)> {
        self.waiting.as_ref().map(|w| (w.conn, w.user_id))
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_none()
    }
}

//! The room state machine.
//!
//! [`Room`] is plain synchronous data: a board, a turn, a move log and the
//! per-mark line counters, plus which connection currently speaks for each
//! participant. It knows nothing about tasks or channels. The room actor
//! owns one and is the only thing that ever mutates it, which is what
//! makes every room's updates serialized.
//!
//! ```text
//!   Ongoing ──(winning move | 9th move)──→ Finished
//! ```
//!
//! `Finished` is terminal. Disconnects only ever touch `paused` and the
//! connection table; they never finish a game.

use std::collections::HashMap;

use noughts_protocol::{
    unix_millis, Board, ConnectionId, GameRef, GameStatus, Mark, MoveRecord, PlayerInfo, RoomId,
    RoomSnapshot, UserId, BOARD_CELLS,
};
use noughts_store::Outcome;

use crate::lines::LineCounts;
use crate::RoomError;

/// One of the two users seated in a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub user_id: UserId,
    /// Display name, when the store knew one at creation time.
    pub username: Option<String>,
}

impl Participant {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            username: None,
        }
    }

    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username;
        self
    }
}

/// How a finished game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    Won { winner: UserId, loser: UserId },
    Draw { players: [UserId; 2] },
}

impl GameResult {
    /// The winning user, `None` on a draw.
    pub fn winner(&self) -> Option<UserId> {
        match self {
            Self::Won { winner, .. } => Some(*winner),
            Self::Draw { .. } => None,
        }
    }

    /// The statistic each participant earns.
    pub fn tallies(&self) -> [(UserId, Outcome); 2] {
        match *self {
            Self::Won { winner, loser } => [(winner, Outcome::Win), (loser, Outcome::Loss)],
            Self::Draw { players: [a, b] } => [(a, Outcome::Draw), (b, Outcome::Draw)],
        }
    }
}

/// What an accepted move produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    /// The log entry appended for this move.
    pub record: MoveRecord,
    /// Set when this move finished the game.
    pub result: Option<GameResult>,
}

/// Authoritative state of one game.
#[derive(Debug, Clone)]
pub struct Room {
    room_id: RoomId,
    /// Indexed by [`Mark::index`].
    participants: [Participant; 2],
    connections: HashMap<ConnectionId, UserId>,
    board: Board,
    turn: Mark,
    moves: Vec<MoveRecord>,
    status: GameStatus,
    winner: Option<UserId>,
    paused: bool,
    game_ref: Option<GameRef>,
    /// Indexed by [`Mark::index`].
    counters: [LineCounts; 2],
}

impl Room {
    /// A fresh game: empty board, `A` to move, both participants
    /// connected through the given connections.
    pub fn new(
        room_id: RoomId,
        a: (ConnectionId, Participant),
        b: (ConnectionId, Participant),
        game_ref: Option<GameRef>,
    ) -> Self {
        let mut connections = HashMap::with_capacity(2);
        connections.insert(a.0, a.1.user_id);
        connections.insert(b.0, b.1.user_id);

        Self {
            room_id,
            participants: [a.1, b.1],
            connections,
            board: Board::new(),
            turn: Mark::A,
            moves: Vec::with_capacity(BOARD_CELLS),
            status: GameStatus::Ongoing,
            winner: None,
            paused: false,
            game_ref,
            counters: [LineCounts::new(); 2],
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// The mark to move next, `None` once the game is finished.
    pub fn turn(&self) -> Option<Mark> {
        (!self.status.is_finished()).then_some(self.turn)
    }

    pub fn moves(&self) -> &[MoveRecord] {
        &self.moves
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn winner(&self) -> Option<UserId> {
        self.winner
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn game_ref(&self) -> Option<GameRef> {
        self.game_ref
    }

    pub fn participant(&self, mark: Mark) -> &Participant {
        &self.participants[mark.index()]
    }

    /// The mark `user` plays, if they are seated here.
    pub fn mark_of(&self, user: UserId) -> Option<Mark> {
        Mark::ALL
            .into_iter()
            .find(|m| self.participants[m.index()].user_id == user)
    }

    /// Participants with their marks, `A` first.
    pub fn players(&self) -> Vec<PlayerInfo> {
        Mark::ALL
            .into_iter()
            .map(|mark| {
                let p = &self.participants[mark.index()];
                PlayerInfo {
                    user_id: p.user_id,
                    mark,
                    username: p.username.clone(),
                }
            })
            .collect()
    }

    /// Live connections and the user each one speaks for.
    pub fn connections(&self) -> impl Iterator<Item = (ConnectionId, UserId)> + '_ {
        self.connections.iter().map(|(c, u)| (*c, *u))
    }

    /// Returns `true` if `user` has a live connection in this room.
    pub fn is_connected(&self, user: UserId) -> bool {
        self.connections.values().any(|u| *u == user)
    }

    /// Validates and applies one move.
    ///
    /// Checks run in a fixed order and the first failure wins: finished
    /// game, unknown user, wrong turn, bad or occupied cell. A rejected
    /// move leaves every field untouched.
    pub fn apply_move(&mut self, user: UserId, index: i64) -> Result<MoveOutcome, RoomError> {
        if self.status.is_finished() {
            return Err(RoomError::GameFinished);
        }
        let mark = self.mark_of(user).ok_or(RoomError::NotAPlayer)?;
        if mark != self.turn {
            return Err(RoomError::NotYourTurn);
        }
        let cell = usize::try_from(index)
            .ok()
            .filter(|c| self.board.is_free(*c))
            .ok_or(RoomError::InvalidMove)?;

        self.board.place(cell, mark);
        let record = MoveRecord {
            cell_index: cell as u8,
            user_id: user,
            mark,
            timestamp: unix_millis(),
        };
        self.moves.push(record.clone());
        let won = self.counters[mark.index()].record(cell);

        let result = if won {
            Some(GameResult::Won {
                winner: user,
                loser: self.participant(mark.other()).user_id,
            })
        } else if self.moves.len() == BOARD_CELLS {
            Some(GameResult::Draw {
                players: [
                    self.participants[0].user_id,
                    self.participants[1].user_id,
                ],
            })
        } else {
            None
        };

        match result {
            Some(r) => {
                self.status = GameStatus::Finished;
                self.winner = r.winner();
            }
            None => self.turn = mark.other(),
        }

        Ok(MoveOutcome { record, result })
    }

    /// Drops `conn` from the connection table.
    ///
    /// Returns the user whose connection dropped when the remaining
    /// participant needs to hear about it: the game is still ongoing and
    /// `conn` was a live connection of this room. In that case the room
    /// is also marked paused.
    pub fn disconnect(&mut self, conn: ConnectionId) -> Option<UserId> {
        let user = self.connections.remove(&conn)?;
        if self.status.is_finished() {
            return None;
        }
        self.paused = true;
        Some(user)
    }

    /// Attaches `conn` as `user`'s live connection.
    ///
    /// Any older connection for the same user is dropped and returned so
    /// the caller can stop delivering to it. Once both participants are
    /// connected again the room is no longer paused.
    ///
    /// A connection already speaking for one participant can't switch to
    /// the other seat; that is rejected like an unknown user and changes
    /// nothing.
    pub fn rejoin(
        &mut self,
        conn: ConnectionId,
        user: UserId,
    ) -> Result<Option<ConnectionId>, RoomError> {
        if self.mark_of(user).is_none() {
            return Err(RoomError::NotAParticipant);
        }
        if self.connections.get(&conn).is_some_and(|held| *held != user) {
            return Err(RoomError::NotAParticipant);
        }

        let replaced = self
            .connections
            .iter()
            .find(|(c, u)| **u == user && **c != conn)
            .map(|(c, _)| *c);
        if let Some(old) = replaced {
            self.connections.remove(&old);
        }
        self.connections.insert(conn, user);

        if self.paused
            && self
                .participants
                .iter()
                .all(|p| self.is_connected(p.user_id))
        {
            self.paused = false;
        }

        Ok(replaced)
    }

    /// Full state as sent in `room_state`.
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.room_id.clone(),
            board: self.board,
            turn: self.turn(),
            players: self.players(),
            moves: self.moves.clone(),
            status: self.status,
            winner: self.winner,
            paused: self.paused,
        }
    }
}

//! Board, marks, and move records.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::UserId;

/// Number of cells on the 3×3 board.
pub const BOARD_CELLS: usize = 9;

// ---------------------------------------------------------------------------
// Mark
// ---------------------------------------------------------------------------

/// A participant's role in a room.
///
/// Assigned once at pairing: the participant who was already waiting gets
/// `A` and always moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    A,
    B,
}

impl Mark {
    /// Both marks in turn order.
    pub const ALL: [Mark; 2] = [Mark::A, Mark::B];

    /// The opposing mark.
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    /// Dense index (`A` = 0, `B` = 1) for per-mark arrays.
    pub fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("A"),
            Self::B => f.write_str("B"),
        }
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// The 3×3 grid in row-major order: index `row * 3 + col`.
///
/// Serialized as a flat array of nine entries, each `null`, `"A"` or `"B"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board([Option<Mark>; BOARD_CELLS]);

impl Board {
    /// An empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the mark at `index`, or `None` if empty or out of range.
    pub fn get(&self, index: usize) -> Option<Mark> {
        self.0.get(index).copied().flatten()
    }

    /// Returns `true` if `index` is on the board and unoccupied.
    pub fn is_free(&self, index: usize) -> bool {
        index < BOARD_CELLS && self.0[index].is_none()
    }

    /// Writes `mark` into `index`.
    ///
    /// Callers validate with [`is_free`](Self::is_free) first; an
    /// out-of-range index is ignored.
    pub fn place(&mut self, index: usize, mark: Mark) {
        if let Some(cell) = self.0.get_mut(index) {
            *cell = Some(mark);
        }
    }

    /// Number of cells holding `mark`.
    pub fn count(&self, mark: Mark) -> usize {
        self.0.iter().filter(|c| **c == Some(mark)).count()
    }

    /// Returns `true` when no empty cell is left.
    pub fn is_full(&self) -> bool {
        self.0.iter().all(Option::is_some)
    }

    /// Borrow the raw cells.
    pub fn cells(&self) -> &[Option<Mark>; BOARD_CELLS] {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// MoveRecord / GameStatus
// ---------------------------------------------------------------------------

/// One entry of a room's append-only move log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    /// Board index in `0..9`.
    pub cell_index: u8,
    pub user_id: UserId,
    pub mark: Mark,
    /// Server-assigned, milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Falls back to 0 if the system clock is before 1970.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Lifecycle of a room's game. Monotonic: never leaves `Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    #[default]
    Ongoing,
    Finished,
}

impl GameStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Finished)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ongoing => f.write_str("ongoing"),
            Self::Finished => f.write_str("finished"),
        }
    }
}

//! Per-mark line counters for constant-time win detection.
//!
//! Each mark owns one [`LineCounts`]. Placing a mark bumps the counters of
//! the row and column through that cell, plus the diagonal and
//! anti-diagonal when the cell lies on them. A counter reaching 3 means
//! that mark owns the whole line.

/// Marks needed to complete a line.
pub const LINE_LENGTH: u8 = 3;

/// How many cells of each line one mark holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineCounts {
    rows: [u8; 3],
    cols: [u8; 3],
    diag: u8,
    anti_diag: u8,
}

impl LineCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a mark placed at `cell` (row-major, `0..9`).
    ///
    /// Returns `true` if one of the lines through `cell` is now complete.
    /// Out-of-range cells are ignored.
    pub fn record(&mut self, cell: usize) -> bool {
        if cell >= 9 {
            return false;
        }
        let (row, col) = (cell / 3, cell % 3);

        self.rows[row] += 1;
        self.cols[col] += 1;
        let mut won = self.rows[row] == LINE_LENGTH || self.cols[col] == LINE_LENGTH;

        if row == col {
            self.diag += 1;
            won |= self.diag == LINE_LENGTH;
        }
        if row + col == 2 {
            self.anti_diag += 1;
            won |= self.anti_diag == LINE_LENGTH;
        }
        won
    }

    /// Sum over rows, which equals the number of cells recorded.
    pub fn total(&self) -> u8 {
        self.rows.iter().sum()
    }
}

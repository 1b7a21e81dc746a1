use std::fmt;

use anyhow::{anyhow, bail, Result};

use crate::cell::Cell;

pub const WIDTH: usize = 8;
pub const HEIGHT: usize = 8;

/// Occupancy of every cell on the grid, one bit per cell at `x + y * WIDTH`.
///
/// Tokens are indistinguishable, so two patterns are the same board exactly
/// when their bits match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct GridPattern(u64);

impl GridPattern {
    pub const EMPTY: GridPattern = GridPattern(0);

    pub fn from_bits(bits: u64) -> GridPattern {
        GridPattern(bits)
    }

    pub fn bits(&self) -> u64 {
        self.0
    }

    /// Parse a board from rows of `0`/`1`, top row first.
    ///
    /// Every row must be exactly `WIDTH` characters. Fewer than `HEIGHT` rows
    /// is allowed; the missing rows at the bottom are empty.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Result<GridPattern> {
        if rows.len() > HEIGHT {
            bail!("Expected at most {HEIGHT} rows, got {}", rows.len());
        }

        let mut pattern = GridPattern::EMPTY;
        for (y, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.chars().count() != WIDTH {
                bail!("Row {y} ({row:?}) must be {WIDTH} characters wide");
            }

            for (x, c) in row.chars().enumerate() {
                match c {
                    '0' => {}
                    '1' => pattern.set(Cell::new(x, y)),
                    _ => return Err(anyhow!("Invalid cell {c:?} at ({x}, {y})")),
                }
            }
        }

        Ok(pattern)
    }

    pub fn test(&self, cell: Cell) -> bool {
        self.0 & (1 << cell.index()) != 0
    }

    pub fn set(&mut self, cell: Cell) {
        self.0 |= 1 << cell.index();
    }

    pub fn reset(&mut self, cell: Cell) {
        self.0 &= !(1 << cell.index());
    }

    pub fn count(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn intersection(&self, other: GridPattern) -> GridPattern {
        GridPattern(self.0 & other.0)
    }

    /// Occupied cells in scan order.
    pub fn occupied(&self) -> impl Iterator<Item = Cell> + '_ {
        Cell::all().filter(move |cell| self.test(*cell))
    }

    /// The occupied cell closest to `cell` by Manhattan distance.
    ///
    /// On ties the first cell in scan order wins. `None` if nothing is occupied.
    pub fn nearest_occupied(&self, cell: Cell) -> Option<Cell> {
        let mut best: Option<(usize, Cell)> = None;

        for candidate in self.occupied() {
            let distance = candidate.manhattan_distance(cell);
            if best.map_or(true, |(best_distance, _)| distance < best_distance) {
                best = Some((distance, candidate));
            }
        }

        best.map(|(_, cell)| cell)
    }

    /// Estimated number of single-cell moves to turn `self` into `other`.
    ///
    /// Each token of `self`, taken in scan order, is greedily paired with the
    /// nearest unpaired token of `other`. This is not symmetric. Tokens left
    /// over once `other` runs out add nothing.
    pub fn distance(&self, other: &GridPattern) -> usize {
        let mut remaining = *other;
        let mut total = 0;

        for cell in self.occupied() {
            let Some(nearest) = remaining.nearest_occupied(cell) else {
                break;
            };

            remaining.reset(nearest);
            total += cell.manhattan_distance(nearest);
        }

        total
    }

    /// Render the board, drawing `forbidden` cells over empty ones.
    pub fn stringify(&self, forbidden: &ForbiddenSet) -> String {
        let mut output = String::new();

        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                let cell = Cell::new(x, y);
                output.push(if self.test(cell) {
                    'o'
                } else if forbidden.contains(cell) {
                    'x'
                } else {
                    '.'
                });
            }
            output.push('\n');
        }

        output
    }
}

impl fmt::Display for GridPattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                write!(f, "{}", if self.test(Cell::new(x, y)) { '1' } else { '0' })?;
            }
            if y + 1 < HEIGHT {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

/// Cells no token may move into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForbiddenSet(GridPattern);

impl ForbiddenSet {
    /// Every `1` in `rows` is a forbidden cell, rows as in `GridPattern::from_rows`.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Result<ForbiddenSet> {
        Ok(ForbiddenSet(GridPattern::from_rows(rows)?))
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.0.test(cell)
    }

    pub fn pattern(&self) -> GridPattern {
        self.0
    }
}

impl From<GridPattern> for ForbiddenSet {
    fn from(pattern: GridPattern) -> ForbiddenSet {
        ForbiddenSet(pattern)
    }
}

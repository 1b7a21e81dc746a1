use crate::direction::Direction;
use crate::grid::{HEIGHT, WIDTH};

/// An in-bounds coordinate on the grid.
///
/// Cells can only be made from coordinates already known to be in range, or by
/// stepping from another cell, which returns `None` when the step leaves the
/// grid. Occupancy lookups rely on this and do no bounds checks of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    x: usize,
    y: usize,
}

impl Cell {
    pub(crate) fn new(x: usize, y: usize) -> Cell {
        debug_assert!(x < WIDTH && y < HEIGHT, "cell ({x}, {y}) out of bounds");
        Cell { x, y }
    }

    /// Checked constructor for coordinates coming from outside the crate.
    pub fn try_new(x: usize, y: usize) -> Option<Cell> {
        if x < WIDTH && y < HEIGHT {
            Some(Cell { x, y })
        } else {
            None
        }
    }

    pub fn x(&self) -> usize {
        self.x
    }

    pub fn y(&self) -> usize {
        self.y
    }

    /// Cells in scan order: by row, then by column.
    pub fn all() -> impl Iterator<Item = Cell> {
        (0..HEIGHT).flat_map(|y| (0..WIDTH).map(move |x| Cell::new(x, y)))
    }

    /// Bit position of this cell in a pattern.
    pub fn index(&self) -> usize {
        self.x + self.y * WIDTH
    }

    pub fn manhattan_distance(&self, other: Cell) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// The cell `distance` steps away in `direction`, if it is on the grid.
    pub fn step(&self, direction: Direction, distance: usize) -> Option<Cell> {
        let (dx, dy) = direction.delta();
        let x = self.x.checked_add_signed(dx * distance as isize)?;
        let y = self.y.checked_add_signed(dy * distance as isize)?;
        Cell::try_new(x, y)
    }
}

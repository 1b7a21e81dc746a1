mod cell;
pub use cell::Cell;

mod direction;
pub use direction::Direction;

mod grid;
pub use grid::{ForbiddenSet, GridPattern, HEIGHT, WIDTH};

mod state;
pub use state::{IdCounter, SearchState, StateId};

mod search;
pub use search::{SearchConfig, SearchConfigBuilder, SearchOutcome, Solver};

mod puzzle;
pub use puzzle::Puzzle;

use std::fmt;
use std::hash::{Hash, Hasher};

use anyhow::Result;

use crate::cell::Cell;
use crate::grid::GridPattern;

/// Identity of a search state. `ROOT` marks "no parent".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub u64);

impl StateId {
    pub const ROOT: StateId = StateId(0);

    pub fn is_root(&self) -> bool {
        *self == StateId::ROOT
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out state ids, starting at 1.
#[derive(Debug)]
pub struct IdCounter {
    next: u64,
}

impl Default for IdCounter {
    fn default() -> Self {
        IdCounter { next: 1 }
    }
}

impl IdCounter {
    pub fn new() -> IdCounter {
        IdCounter::default()
    }

    pub fn next_id(&mut self) -> StateId {
        let id = StateId(self.next);
        self.next += 1;
        id
    }

    /// How many ids have been handed out so far.
    pub fn issued(&self) -> u64 {
        self.next - 1
    }
}

/// A board plus the bookkeeping needed to walk back to where it came from.
///
/// Equality and hashing only look at the pattern, so a board reached twice is
/// the same node no matter its id, parent or cost.
#[derive(Debug, Clone)]
pub struct SearchState {
    id: StateId,
    parent_id: StateId,
    cost: usize,
    pattern: GridPattern,
}

impl SearchState {
    /// A root state (no parent, zero cost).
    pub fn new(ids: &mut IdCounter, pattern: GridPattern) -> SearchState {
        SearchState {
            id: ids.next_id(),
            parent_id: StateId::ROOT,
            cost: 0,
            pattern,
        }
    }

    pub fn from_rows<S: AsRef<str>>(ids: &mut IdCounter, rows: &[S]) -> Result<SearchState> {
        Ok(SearchState::new(ids, GridPattern::from_rows(rows)?))
    }

    /// The state reached by moving the token at `from` to `to`.
    pub(crate) fn successor(&self, ids: &mut IdCounter, from: Cell, to: Cell) -> SearchState {
        let mut pattern = self.pattern;
        pattern.reset(from);
        pattern.set(to);

        SearchState {
            id: ids.next_id(),
            parent_id: self.id,
            cost: self.cost + 1,
            pattern,
        }
    }

    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn parent_id(&self) -> StateId {
        self.parent_id
    }

    pub fn cost(&self) -> usize {
        self.cost
    }

    pub fn pattern(&self) -> &GridPattern {
        &self.pattern
    }

    pub fn test(&self, cell: Cell) -> bool {
        self.pattern.test(cell)
    }

    pub fn distance(&self, other: &SearchState) -> usize {
        self.pattern.distance(&other.pattern)
    }
}

impl PartialEq for SearchState {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for SearchState {}

impl Hash for SearchState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pattern.bits().hash(state);
    }
}

impl fmt::Display for SearchState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "State {} (parent {}, cost {})", self.id, self.parent_id, self.cost)?;
        write!(f, "{}", self.pattern)
    }
}

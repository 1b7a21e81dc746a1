use std::cmp::Reverse;
use std::fmt;
use std::time::Instant;

use anyhow::{anyhow, bail, Result};
use derive_builder::Builder;
use fxhash::{FxBuildHasher, FxHashMap, FxHashSet};
use priority_queue::PriorityQueue;

use crate::direction::Direction;
use crate::grid::{ForbiddenSet, GridPattern};
use crate::state::{IdCounter, SearchState, StateId};

// Lowest estimated total first, then the state closest to the goal, then the
// oldest state
type Priority = Reverse<(usize, usize, StateId)>;

#[derive(Debug, Clone, Builder)]
#[builder(default)]
pub struct SearchConfig {
    /// Give up after this many expansions.
    #[builder(setter(strip_option))]
    pub max_iterations: Option<usize>,

    /// Log progress every this many expansions; 0 disables it.
    pub progress_interval: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            max_iterations: None,
            progress_interval: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// A state matching the goal was reached after `cost` moves.
    Solved { cost: usize },
    /// Every reachable board was expanded without meeting the goal.
    Exhausted,
    /// The expansion budget ran out first.
    OutOfBudget { iterations: usize },
}

/// Best-first search from a start board to a goal board.
pub struct Solver {
    ids: IdCounter,
    open: PriorityQueue<SearchState, Priority, FxBuildHasher>,
    closed: FxHashSet<SearchState>,
    restricted: ForbiddenSet,
    start: SearchState,
    goal: SearchState,
    last_state: Option<SearchState>,
    config: SearchConfig,
    iterations: usize,
    time_spent: f32,
}

impl Solver {
    /// Set up a search from `start` to `goal`. The solver owns the id counter,
    /// so `start` and `goal` are ids 1 and 2 and every successor comes after.
    pub fn new(restricted: ForbiddenSet, start: GridPattern, goal: GridPattern) -> Solver {
        let mut ids = IdCounter::new();
        let start = SearchState::new(&mut ids, start);
        let goal = SearchState::new(&mut ids, goal);

        let mut solver = Solver {
            ids,
            open: PriorityQueue::with_default_hasher(),
            closed: FxHashSet::default(),
            restricted,
            start: start.clone(),
            goal,
            last_state: None,
            config: SearchConfig::default(),
            iterations: 0,
            time_spent: 0 as f32,
        };

        solver.open_state(start);
        solver
    }

    pub fn set_config(&mut self, config: SearchConfig) -> &mut Self {
        self.config = config;
        self
    }

    pub fn start(&self) -> &SearchState {
        &self.start
    }

    pub fn goal(&self) -> &SearchState {
        &self.goal
    }

    pub fn restricted(&self) -> &ForbiddenSet {
        &self.restricted
    }

    pub fn open_len(&self) -> usize {
        self.open.len()
    }

    pub fn closed_len(&self) -> usize {
        self.closed.len()
    }

    pub fn open_states(&self) -> impl Iterator<Item = &SearchState> {
        self.open.iter().map(|(state, _)| state)
    }

    pub fn closed_states(&self) -> impl Iterator<Item = &SearchState> {
        self.closed.iter()
    }

    /// Number of states expanded so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn time_spent(&self) -> f32 {
        self.time_spent
    }

    /// The goal-equal state found by the last successful `solve`.
    pub fn last_state(&self) -> Option<&SearchState> {
        self.last_state.as_ref()
    }

    /// Run the search until the goal is reached, the frontier empties, or the
    /// budget is spent. Calling it again after `OutOfBudget` with a larger
    /// budget picks up where it stopped.
    pub fn solve(&mut self) -> SearchOutcome {
        let start = Instant::now();
        let outcome = self.run();
        self.time_spent += start.elapsed().as_secs_f32();

        log::debug!("{:?}: {}", outcome, self);
        outcome
    }

    fn run(&mut self) -> SearchOutcome {
        while let Some((best, priority)) = self.open.pop() {
            if best == self.goal {
                let cost = best.cost();
                self.last_state = Some(best.clone());
                self.open.push(best, priority);
                return SearchOutcome::Solved { cost };
            }

            if let Some(max_iterations) = self.config.max_iterations {
                if self.iterations >= max_iterations {
                    self.open.push(best, priority);
                    return SearchOutcome::OutOfBudget {
                        iterations: self.iterations,
                    };
                }
            }

            self.iterations += 1;
            if self.config.progress_interval > 0
                && self.iterations % self.config.progress_interval == 0
            {
                tracing::debug!(
                    "iter: {}, open: {}, closed: {}, best cost: {}, remaining: {}",
                    self.iterations,
                    self.open.len(),
                    self.closed.len(),
                    best.cost(),
                    (priority.0).1,
                );
            }

            for next_state in self.successors(&best) {
                self.open_state(next_state);
            }
            self.closed.insert(best);
        }

        SearchOutcome::Exhausted
    }

    /// Every board one move away from `state`.
    ///
    /// A token may step into an adjacent empty cell that is not restricted, or
    /// jump over an adjacent token into the empty cell beyond it. A jump only
    /// checks its landing cell against the restricted set, so tokens can jump
    /// over restricted cells that happen to be occupied.
    pub(crate) fn successors(&mut self, state: &SearchState) -> Vec<SearchState> {
        let mut successors = Vec::new();

        for from in state.pattern().occupied() {
            for direction in Direction::ALL {
                let Some(over) = from.step(direction, 1) else {
                    continue;
                };

                if !state.test(over) {
                    if !self.restricted.contains(over) {
                        successors.push(state.successor(&mut self.ids, from, over));
                    }
                    continue;
                }

                if let Some(to) = from.step(direction, 2) {
                    if !state.test(to) && !self.restricted.contains(to) {
                        successors.push(state.successor(&mut self.ids, from, to));
                    }
                }
            }
        }

        successors
    }

    // Boards already expanded are never reopened, and a board already waiting
    // in the frontier keeps its original entry.
    fn open_state(&mut self, state: SearchState) {
        if self.closed.contains(&state) || self.open.get(&state).is_some() {
            return;
        }

        let remaining = state.distance(&self.goal);
        let estimate = state.cost() + remaining;
        let id = state.id();
        self.open.push(state, Reverse((estimate, remaining, id)));
    }

    /// The states from the start to the goal, following parent ids back from
    /// the state found by `solve`.
    pub fn path(&self) -> Result<Vec<SearchState>> {
        let last_state = self
            .last_state
            .as_ref()
            .ok_or_else(|| anyhow!("No solution found, cannot build a path"))?;

        let mut by_id = FxHashMap::default();
        for state in self.open_states().chain(self.closed_states()) {
            if let Some(other) = by_id.insert(state.id(), state) {
                bail!("Inconsistent search state: id {} used by two states", other.id());
            }
        }

        let mut path = vec![last_state.clone()];
        let mut current = last_state;

        while !current.parent_id().is_root() {
            let parent_id = current.parent_id();
            let parent: &SearchState = by_id.get(&parent_id).copied().ok_or_else(|| {
                anyhow!(
                    "Inconsistent search state: parent {parent_id} of {} is in neither \
                     the open nor the closed states",
                    current.id()
                )
            })?;

            if current.cost() != parent.cost() + 1 {
                bail!(
                    "Inconsistent search state: {} has cost {} but its parent {} has cost {}",
                    current.id(),
                    current.cost(),
                    parent.id(),
                    parent.cost()
                );
            }

            path.push(parent.clone());
            current = parent;
        }

        path.reverse();
        Ok(path)
    }
}

impl fmt::Display for Solver {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Solver<{} open, {} closed, {} iterations, {} ids, {:.3} seconds>",
            self.open.len(),
            self.closed.len(),
            self.iterations,
            self.ids.issued(),
            self.time_spent,
        )
    }
}

#[cfg(test)]
mod test_solver {
    use super::*;
    use crate::cell::Cell;

    fn solver(start: &[&str], goal: &[&str], forbidden: &[&str]) -> Solver {
        let start = GridPattern::from_rows(start).unwrap();
        let goal = GridPattern::from_rows(goal).unwrap();
        let forbidden = ForbiddenSet::from_rows(forbidden).unwrap();

        Solver::new(forbidden, start, goal)
    }

    fn assert_valid_path(solver: &Solver, path: &[SearchState]) {
        let first = path.first().expect("empty path");
        let last = path.last().expect("empty path");

        assert!(first.parent_id().is_root());
        assert_eq!(first, solver.start());
        assert_eq!(last, solver.goal());

        for (i, pair) in path.windows(2).enumerate() {
            assert_eq!(pair[1].parent_id(), pair[0].id(), "step {i}");
            assert_eq!(pair[1].cost(), pair[0].cost() + 1, "step {i}");
            assert_eq!(pair[0].pattern().count(), pair[1].pattern().count());
        }
    }

    #[test]
    fn test_single_step() {
        let mut solver = solver(&["10000000"], &["01000000"], &[]);

        assert_eq!(solver.solve(), SearchOutcome::Solved { cost: 1 });

        let path = solver.path().unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path[1].cost(), 1);
        assert_valid_path(&solver, &path);
    }

    #[test]
    fn test_start_is_goal() {
        let mut solver = solver(&["00000000", "00100000"], &["00000000", "00100000"], &[]);
        let start_id = solver.start().id();

        assert_eq!(solver.solve(), SearchOutcome::Solved { cost: 0 });
        assert_eq!(solver.last_state().map(|s| s.id()), Some(start_id));
        assert_eq!(solver.iterations(), 0);

        let path = solver.path().unwrap();
        assert_eq!(path.len(), 1);
        assert_valid_path(&solver, &path);
    }

    #[test]
    fn test_lone_token_cannot_jump() {
        let mut solver = solver(&["10000000"], &["00100000"], &[]);

        assert_eq!(solver.solve(), SearchOutcome::Solved { cost: 2 });

        let path = solver.path().unwrap();
        assert_eq!(path.len(), 3);
        assert!(path[1].test(Cell::new(1, 0)));
        assert_eq!(path[2].cost(), 2);
        assert_valid_path(&solver, &path);
    }

    #[test]
    fn test_jump_over_token() {
        let mut solver = solver(&["11000000"], &["01100000"], &[]);

        assert_eq!(solver.solve(), SearchOutcome::Solved { cost: 1 });

        let path = solver.path().unwrap();
        assert_eq!(path.len(), 2);
        assert_valid_path(&solver, &path);
    }

    #[test]
    fn test_successor_counts() {
        let mut solver = solver(&["10000000"], &["10000000"], &[]);
        let corner = solver.start().clone();
        assert_eq!(solver.successors(&corner).len(), 2);

        let mut ids = IdCounter::new();
        let middle =
            SearchState::from_rows(&mut ids, &["00000000", "00000000", "00010000"]).unwrap();
        assert_eq!(solver.successors(&middle).len(), 4);
    }

    #[test]
    fn test_restricted_single_step() {
        let mut solver = solver(&["10000000"], &["00000000", "10000000"], &["01000000"]);
        let start = solver.start().clone();

        let successors = solver.successors(&start);
        assert_eq!(successors.len(), 1);
        assert!(successors[0].test(Cell::new(0, 1)));
    }

    #[test]
    fn test_jump_rejected_on_restricted_landing() {
        let mut solver = solver(&["11000000"], &["01100000"], &["00100000"]);
        let start = solver.start().clone();

        let successors = solver.successors(&start);
        assert!(!successors.is_empty());
        assert!(successors.iter().all(|s| !s.test(Cell::new(2, 0))));
    }

    #[test]
    fn test_jump_allowed_over_restricted_cell() {
        let mut solver = solver(&["11000000"], &["01100000"], &["01000000"]);
        let start = solver.start().clone();

        let successors = solver.successors(&start);
        let jumped = successors
            .iter()
            .find(|s| s.test(Cell::new(1, 0)) && s.test(Cell::new(2, 0)))
            .expect("jump over the restricted cell should be generated");
        assert_eq!(jumped.parent_id(), start.id());
        assert_eq!(jumped.cost(), 1);

        assert_eq!(solver.solve(), SearchOutcome::Solved { cost: 1 });
    }

    #[test]
    fn test_successors_never_revisit_closed() {
        let mut solver = solver(
            &["11100000"],
            &[
                "00000000", "00000000", "00000000", "00000000", "00000000", "00000000",
                "00000001", "00000011",
            ],
            &["00000000", "00000000", "00010000", "00001000", "01000000"],
        );

        assert!(matches!(solver.solve(), SearchOutcome::Solved { .. }));
        for state in solver.open_states() {
            assert!(!solver.closed.contains(state), "\n{state}");
        }

        let path = solver.path().unwrap();
        assert_valid_path(&solver, &path);
    }

    #[test]
    fn test_deterministic() {
        let run = || {
            let mut solver = solver(
                &["11000000", "10000000"],
                &["00000000", "00000000", "00000000", "00000000", "00000001", "00000011"],
                &["00000000", "00100000"],
            );
            solver.solve();
            solver
                .path()
                .unwrap()
                .iter()
                .map(|s| (s.id(), s.pattern().bits()))
                .collect::<Vec<_>>()
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn test_exhausted() {
        let mut solver = solver(
            &["10000000"],
            &["00000000", "01000000"],
            &["01000000", "10000000"],
        );

        assert_eq!(solver.solve(), SearchOutcome::Exhausted);
        assert_eq!(solver.open_len(), 0);
        assert_eq!(solver.closed_len(), 1);
        assert!(solver.path().is_err());
    }

    #[test]
    fn test_out_of_budget() {
        let mut solver = solver(
            &["11000000"],
            &[
                "00000000", "00000000", "00000000", "00000000", "00000000", "00000000",
                "00000000", "00000011",
            ],
            &[],
        );
        solver.set_config(SearchConfigBuilder::default().max_iterations(1).build().unwrap());

        assert_eq!(solver.solve(), SearchOutcome::OutOfBudget { iterations: 1 });
        assert!(solver.path().is_err());

        // Resuming with no budget finishes the search
        solver.set_config(SearchConfig::default());
        assert!(matches!(solver.solve(), SearchOutcome::Solved { .. }));
        let path = solver.path().unwrap();
        assert_valid_path(&solver, &path);
    }

    #[test]
    fn test_missing_parent_is_an_error() {
        let mut solver = solver(&["10000000"], &["01000000"], &[]);
        solver.solve();

        let mut ids = IdCounter::new();
        for _ in 0..1000 {
            ids.next_id();
        }
        let stray = SearchState::from_rows(&mut ids, &["10000000"]).unwrap();
        solver.last_state = Some(stray.successor(&mut ids, Cell::new(0, 0), Cell::new(1, 0)));

        let error = solver.path().unwrap_err();
        assert!(error.to_string().contains("Inconsistent"), "{error}");
    }

    #[test]
    fn test_ids_do_not_depend_on_caller_counters() {
        // Ids handed out elsewhere must not leak into the search
        let mut ids = IdCounter::new();
        for _ in 0..7 {
            ids.next_id();
        }
        let start = SearchState::from_rows(&mut ids, &["11000000", "10000000"]).unwrap();
        let goal = SearchState::from_rows(&mut ids, &["00000000", "00000000", "00000111"]).unwrap();

        let mut solver = Solver::new(ForbiddenSet::default(), *start.pattern(), *goal.pattern());
        assert_eq!(solver.start().id(), StateId(1));
        assert_eq!(solver.goal().id(), StateId(2));

        let outcome = solver.solve();
        let path = solver.path().unwrap();
        assert_eq!(outcome, SearchOutcome::Solved { cost: path.len() - 1 });
        assert_valid_path(&solver, &path);

        let mut seen = FxHashSet::default();
        for state in solver.open_states().chain(solver.closed_states()) {
            assert!(seen.insert(state.id()), "duplicate id {}", state.id());
        }
    }

    #[test]
    fn test_cost_mismatch_is_an_error() {
        let mut solver = solver(&["10000000"], &["01000000"], &[]);
        solver.solve();

        // #3 is the solver's cost 1 successor; this chain claims it has cost 2
        let mut ids = IdCounter::new();
        let root = SearchState::from_rows(&mut ids, &["10000000"]).unwrap();
        let second = root.successor(&mut ids, Cell::new(0, 0), Cell::new(1, 0));
        let third = second.successor(&mut ids, Cell::new(1, 0), Cell::new(2, 0));
        assert_eq!(third.id(), StateId(3));
        let fourth = third.successor(&mut ids, Cell::new(2, 0), Cell::new(3, 0));
        solver.last_state = Some(fourth);

        let error = solver.path().unwrap_err();
        assert!(error.to_string().contains("cost"), "{error}");
    }

    #[test]
    fn test_display() {
        let mut solver = solver(&["10000000"], &["01000000"], &[]);
        solver.solve();

        let output = solver.to_string();
        assert!(output.contains("open"));
        assert!(output.contains("1 closed"));
    }
}

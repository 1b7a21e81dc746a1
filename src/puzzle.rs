use std::io::Read;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::grid::{ForbiddenSet, GridPattern};
use crate::search::Solver;

/// A puzzle as written in a JSON file: boards are lists of `0`/`1` rows.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Puzzle {
    #[serde(default)]
    pub name: Option<String>,

    pub start: Vec<String>,
    pub goal: Vec<String>,

    #[serde(default)]
    pub forbidden: Vec<String>,
}

impl Puzzle {
    pub fn read<R: Read>(reader: R) -> Result<Puzzle> {
        serde_json::from_reader(reader).context("Failed to parse puzzle")
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }

    /// Parse and check the boards, then set up a solver for them.
    pub fn solver(&self) -> Result<Solver> {
        let start = GridPattern::from_rows(&self.start).context("Invalid start board")?;
        let goal = GridPattern::from_rows(&self.goal).context("Invalid goal board")?;
        let forbidden =
            ForbiddenSet::from_rows(&self.forbidden).context("Invalid forbidden cells")?;

        if start.count() != goal.count() {
            bail!(
                "Start has {} tokens but goal has {}",
                start.count(),
                goal.count()
            );
        }

        for (label, pattern) in [("start", start), ("goal", goal)] {
            let overlap = pattern.intersection(forbidden.pattern());
            if !overlap.is_empty() {
                log::warn!(
                    "{}: {label} has {} token(s) on forbidden cells",
                    self.name(),
                    overlap.count()
                );
            }
        }

        Ok(Solver::new(forbidden, start, goal))
    }
}

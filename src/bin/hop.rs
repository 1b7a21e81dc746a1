use std::fs::File;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use lazy_static::lazy_static;

use hopsolver::{Puzzle, SearchConfigBuilder, SearchOutcome};

lazy_static! {
    static ref MAX_ITERATIONS: Option<usize> = std::env::var("HOP_MAX_ITERATIONS")
        .ok()
        .and_then(|s| s.parse().ok());

    static ref FRAME_DELAY: Duration = Duration::from_millis(
        std::env::var("HOP_FRAME_DELAY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    );
}

fn main() -> Result<()> {
    env_logger::init();

    // Read from the file given as the first argument, or stdin otherwise
    let puzzle = match std::env::args().nth(1) {
        Some(path) => {
            let file = File::open(&path).with_context(|| format!("Failed to open {path}"))?;
            Puzzle::read(file)?
        }
        None => Puzzle::read(std::io::stdin().lock())?,
    };

    let mut solver = puzzle.solver()?;

    let mut config = SearchConfigBuilder::default();
    if let Some(max_iterations) = *MAX_ITERATIONS {
        config.max_iterations(max_iterations);
    }
    solver.set_config(config.build()?);

    log::info!(
        "{}: distance before start: {}\n{}",
        puzzle.name(),
        solver.start().distance(solver.goal()),
        solver.start().pattern().stringify(solver.restricted()),
    );

    let outcome = solver.solve();
    log::info!("{outcome:?}, {solver}");

    match outcome {
        SearchOutcome::Solved { .. } => {}
        SearchOutcome::Exhausted => {
            return Err(anyhow!(
                "No solution exists after {} states",
                solver.closed_len()
            ))
        }
        SearchOutcome::OutOfBudget { iterations } => {
            return Err(anyhow!("No solution found within {iterations} iterations"))
        }
    }

    let path_start = Instant::now();
    let path = solver.path()?;
    log::info!(
        "Built path of {} states in {} seconds",
        path.len(),
        path_start.elapsed().as_secs_f32()
    );

    for (i, state) in path.iter().enumerate() {
        if i > 0 {
            thread::sleep(*FRAME_DELAY);
        }
        println!("[{i}] cost {}", state.cost());
        println!("{}", state.pattern().stringify(solver.restricted()));
    }

    Ok(())
}

use std::path::Path;

use crate::config_file::set_cfl;
use crate::mode::IntegrationMode;
use crate::report::{parse_report, Convergence, ErrorTable, RunResult};
use crate::solver::Solver;
use crate::SweepError;

/// Mean of a batch of runs taken at one CFL value and mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregatedResult {
    pub runs: usize,
    pub mean_time_s: f64,
    pub errors: ErrorTable,
}

/// Entry-wise arithmetic mean. `None` for an empty batch.
pub fn average_runs(runs: &[RunResult]) -> Option<AggregatedResult> {
    if runs.is_empty() {
        return None;
    }
    let n = runs.len() as f64;

    let mut errors = ErrorTable::default();
    for (category, variable, _) in ErrorTable::default().entries() {
        let sum: f64 = runs
            .iter()
            .map(|run| run.errors.get(category, variable))
            .sum();
        errors.set(category, variable, sum / n);
    }
    let mean_time_s = runs.iter().map(|run| run.time_s).sum::<f64>() / n;

    Some(AggregatedResult {
        runs: runs.len(),
        mean_time_s,
        errors,
    })
}

/// Writes `cfl` into the config once, then runs the solver `repeat_count`
/// times. A single unparseable report marks the whole batch unconverged.
pub fn aggregate<S: Solver + ?Sized>(
    solver: &mut S,
    config_path: &Path,
    cfl: f64,
    mode: IntegrationMode,
    repeat_count: usize,
) -> Result<Convergence<AggregatedResult>, SweepError> {
    if repeat_count == 0 {
        return Err(SweepError::InvalidSettings(
            "repeat_count must be greater than zero".to_string(),
        ));
    }

    set_cfl(config_path, cfl)?;

    let mut runs = Vec::with_capacity(repeat_count);
    for attempt in 0..repeat_count {
        let output = solver.run(config_path)?;
        match parse_report(&output, mode) {
            Convergence::Converged(run) => {
                tracing::debug!(%mode, cfl, attempt, time_s = run.time_s, "run parsed");
                runs.push(run);
            }
            Convergence::Unconverged(reason) => return Ok(Convergence::Unconverged(reason)),
        }
    }

    match average_runs(&runs) {
        Some(result) => Ok(Convergence::Converged(result)),
        None => Ok(Convergence::Unconverged("no runs collected".to_string())),
    }
}

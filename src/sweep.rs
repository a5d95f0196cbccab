use std::path::Path;

use serde::Serialize;

use crate::aggregate::{aggregate, AggregatedResult};
use crate::config_file::set_integration_mode;
use crate::mode::IntegrationMode;
use crate::report::Convergence;
use crate::settings::SweepSettings;
use crate::solver::Solver;
use crate::SweepError;

/// `num` points spaced evenly in log10 between `10^start_exp` and `10^end_exp`,
/// endpoints included.
pub fn logspace(start_exp: f64, end_exp: f64, num: usize) -> Vec<f64> {
    if num == 0 {
        return Vec::new();
    }
    if num == 1 {
        return vec![10f64.powf(start_exp)];
    }

    let step = (end_exp - start_exp) / (num - 1) as f64;
    (0..num)
        .map(|idx| {
            // pin the last exponent so the upper bound is hit exactly
            let exponent = if idx == num - 1 {
                end_exp
            } else {
                start_exp + step * idx as f64
            };
            10f64.powf(exponent)
        })
        .collect()
}

/// One converged CFL value with its averaged results.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepRecord {
    pub cfl: f64,
    pub mode: IntegrationMode,
    pub result: AggregatedResult,
}

/// A CFL value dropped from the sweep, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exclusion {
    pub cfl: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModeSweep {
    pub mode: IntegrationMode,
    /// Ascending in CFL, excluded values removed.
    pub records: Vec<SweepRecord>,
    pub excluded: Vec<Exclusion>,
}

impl ModeSweep {
    pub fn cfl_values(&self) -> Vec<f64> {
        self.records.iter().map(|record| record.cfl).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepOptions {
    pub repeat_count: usize,
    /// Treat a non-zero solver exit like a short report instead of aborting.
    pub exclude_solver_failures: bool,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            repeat_count: 1,
            exclude_solver_failures: false,
        }
    }
}

/// Sweeps `cfl_values` in ascending order for one integration mode.
///
/// The mode is written to the config once up front; each value then gets its
/// own CFL rewrite and solver batch. Runs are strictly sequential because every
/// run re-reads the same config file.
pub fn run_sweep<S: Solver + ?Sized>(
    solver: &mut S,
    config_path: &Path,
    mode: IntegrationMode,
    cfl_values: &[f64],
    options: &SweepOptions,
) -> Result<ModeSweep, SweepError> {
    if let Some(bad) = cfl_values.iter().find(|cfl| !(cfl.is_finite() && **cfl > 0.0)) {
        return Err(SweepError::InvalidSettings(format!(
            "CFL values must be positive and finite, got {bad}"
        )));
    }

    let mut pending = cfl_values.to_vec();
    pending.sort_by(f64::total_cmp);

    set_integration_mode(config_path, mode)?;

    let mut records = Vec::with_capacity(pending.len());
    let mut excluded = Vec::new();

    for cfl in pending {
        tracing::info!(%mode, cfl, "running");

        let outcome = match aggregate(solver, config_path, cfl, mode, options.repeat_count) {
            Err(SweepError::SolverFailed { program, status })
                if options.exclude_solver_failures =>
            {
                Convergence::Unconverged(format!(
                    "solver {} exited with {status}",
                    program.display()
                ))
            }
            other => other?,
        };

        match outcome {
            Convergence::Converged(result) => records.push(SweepRecord { cfl, mode, result }),
            Convergence::Unconverged(reason) => {
                tracing::warn!(%mode, cfl, %reason, "not converged, excluding");
                excluded.push(Exclusion { cfl, reason });
            }
        }
    }

    Ok(ModeSweep {
        mode,
        records,
        excluded,
    })
}

/// Runs every configured mode against a freshly generated CFL grid, so
/// exclusions in one mode never thin out another.
pub fn run_all_modes<S: Solver + ?Sized>(
    solver: &mut S,
    settings: &SweepSettings,
) -> Result<Vec<ModeSweep>, SweepError> {
    settings.validate()?;
    let options = settings.sweep_options();

    settings
        .modes
        .iter()
        .map(|&mode| {
            let grid = settings.cfl_grid();
            run_sweep(&mut *solver, &settings.simulation, mode, &grid, &options)
        })
        .collect()
}

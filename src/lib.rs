//! CFL sweep driver
//!
//! Runs an external finite-volume solver over a logarithmic range of Courant
//! numbers, for explicit and implicit time integration, parses the error norms
//! and computation time out of each report, and collects the converged points
//! for log-log comparison.

pub mod aggregate;
pub mod config_file;
pub mod mode;
pub mod output;
pub mod report;
pub mod settings;
pub mod solver;
pub mod sweep;

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

pub use aggregate::{aggregate, AggregatedResult};
pub use config_file::SimulationConfig;
pub use mode::IntegrationMode;
pub use report::{parse_report, Convergence, ErrorCategory, ErrorTable, RunResult, Variable};
pub use settings::SweepSettings;
pub use solver::{ExternalSolver, Solver};
pub use sweep::{
    logspace, run_all_modes, run_sweep, Exclusion, ModeSweep, SweepOptions, SweepRecord,
};

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("cannot access simulation config {path}: {source}")]
    ConfigAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to start solver {program}: {source}")]
    SolverSpawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("solver {program} exited with {status}")]
    SolverFailed {
        program: PathBuf,
        status: ExitStatus,
    },
    #[error("solver {program} printed a report that is not valid UTF-8: {source}")]
    SolverOutput {
        program: PathBuf,
        #[source]
        source: std::string::FromUtf8Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("plot error: {0}")]
    Plot(String),
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}

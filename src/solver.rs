use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::SweepError;

/// Anything that can run the simulation described by a config file and hand
/// back its textual report.
pub trait Solver {
    fn run(&mut self, config_path: &Path) -> Result<String, SweepError>;
}

/// The real solver executable, run as a blocking child process with the
/// config path as its only argument.
#[derive(Debug, Clone)]
pub struct ExternalSolver {
    program: PathBuf,
}

impl ExternalSolver {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Solver for ExternalSolver {
    fn run(&mut self, config_path: &Path) -> Result<String, SweepError> {
        tracing::debug!(
            program = %self.program.display(),
            config = %config_path.display(),
            "starting solver"
        );

        // stderr goes straight to the terminal; only stdout carries the report.
        let output = Command::new(&self.program)
            .arg(config_path)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|source| SweepError::SolverSpawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SweepError::SolverFailed {
                program: self.program.clone(),
                status: output.status,
            });
        }

        String::from_utf8(output.stdout).map_err(|source| SweepError::SolverOutput {
            program: self.program.clone(),
            source,
        })
    }
}

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};

use crate::mode::IntegrationMode;
use crate::report::{ErrorCategory, Variable};
use crate::sweep::{logspace, SweepOptions};
use crate::SweepError;

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    /// Solver executable.
    #[serde_as(as = "DefaultOnNull")]
    pub solver: PathBuf,
    /// Simulation config file the solver is pointed at. Rewritten in place.
    #[serde_as(as = "DefaultOnNull")]
    pub simulation: PathBuf,
    #[serde_as(as = "DefaultOnNull")]
    pub exponent_min: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub exponent_max: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub num_points: usize,
    #[serde_as(as = "DefaultOnNull")]
    pub repeat_count: usize,
    #[serde_as(as = "DefaultOnNull")]
    pub modes: Vec<IntegrationMode>,
    #[serde_as(as = "DefaultOnNull")]
    pub plot_category: ErrorCategory,
    #[serde_as(as = "DefaultOnNull")]
    pub plot_variable: Variable,
    #[serde_as(as = "DefaultOnNull")]
    pub exclude_solver_failures: bool,
    #[serde_as(as = "DefaultOnNull")]
    pub output_root: PathBuf,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            solver: PathBuf::from("cfdfv"),
            simulation: PathBuf::from("Sod.ini"),
            exponent_min: -2.0,
            exponent_max: 2.0,
            num_points: 500,
            repeat_count: 1,
            modes: IntegrationMode::ALL.to_vec(),
            plot_category: ErrorCategory::L2,
            plot_variable: Variable::Rho,
            exclude_solver_failures: false,
            output_root: PathBuf::from("output-cfl-sweep"),
        }
    }
}

impl SweepSettings {
    pub fn load(path: &Path) -> Result<Self, SweepError> {
        let raw = fs::read_to_string(path)?;
        let settings: SweepSettings = serde_json::from_str(&raw)?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SweepError> {
        if self.num_points == 0 {
            return Err(SweepError::InvalidSettings(
                "num_points must be greater than zero".to_string(),
            ));
        }

        if self.repeat_count == 0 {
            return Err(SweepError::InvalidSettings(
                "repeat_count must be greater than zero".to_string(),
            ));
        }

        if !self.exponent_min.is_finite() || !self.exponent_max.is_finite() {
            return Err(SweepError::InvalidSettings(
                "exponent_min and exponent_max must be finite".to_string(),
            ));
        }

        if self.exponent_max < self.exponent_min {
            return Err(SweepError::InvalidSettings(
                "exponent_max must be greater than or equal to exponent_min".to_string(),
            ));
        }

        if self.modes.is_empty() {
            return Err(SweepError::InvalidSettings(
                "at least one integration mode must be selected".to_string(),
            ));
        }

        Ok(())
    }

    pub fn cfl_grid(&self) -> Vec<f64> {
        logspace(self.exponent_min, self.exponent_max, self.num_points)
    }

    pub fn sweep_options(&self) -> SweepOptions {
        SweepOptions {
            repeat_count: self.repeat_count,
            exclude_solver_failures: self.exclude_solver_failures,
        }
    }
}

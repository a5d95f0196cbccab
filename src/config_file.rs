//! In-memory model of the solver's line-oriented simulation config.
//!
//! Only whole lines are ever replaced. Every line that is not a targeted field
//! line is kept byte for byte, terminator included, at the same position.

use std::fs;
use std::path::Path;

use crate::mode::IntegrationMode;
use crate::SweepError;

pub const CFL_FIELD: &str = "CFL";
pub const IMPLICIT_FIELD: &str = "implicit";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SimulationConfig {
    lines: Vec<String>,
}

impl SimulationConfig {
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.split_inclusive('\n').map(str::to_string).collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, SweepError> {
        let text = fs::read_to_string(path).map_err(|source| SweepError::ConfigAccess {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&text))
    }

    pub fn save(&self, path: &Path) -> Result<(), SweepError> {
        fs::write(path, self.to_text()).map_err(|source| SweepError::ConfigAccess {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_text(&self) -> String {
        self.lines.concat()
    }

    /// Replaces every line starting with `name` with `name=value`. Returns
    /// the number of lines replaced; zero leaves the config untouched.
    pub fn set_field(&mut self, name: &str, value: &str) -> usize {
        let mut replaced = 0;
        for line in self.lines.iter_mut() {
            if line.starts_with(name) {
                *line = format!("{name}={value}\n");
                replaced += 1;
            }
        }
        replaced
    }

    /// Value of the first line starting with `name`, without surrounding
    /// whitespace.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.lines
            .iter()
            .find(|line| line.starts_with(name))
            .map(|line| {
                let rest = line[name.len()..].trim_start();
                rest.strip_prefix('=').unwrap_or(rest).trim()
            })
    }
}

/// Shortest round-trip representation, always with a decimal point or exponent.
pub fn format_cfl(cfl: f64) -> String {
    format!("{cfl:?}")
}

/// Read, rewrite one field, write back. No backup is kept.
pub fn set_field(path: &Path, name: &str, value: &str) -> Result<(), SweepError> {
    let mut config = SimulationConfig::load(path)?;
    let replaced = config.set_field(name, value);
    if replaced == 0 {
        tracing::warn!(path = %path.display(), field = name, "field not present in config");
    }
    config.save(path)
}

pub fn set_cfl(path: &Path, cfl: f64) -> Result<(), SweepError> {
    set_field(path, CFL_FIELD, &format_cfl(cfl))
}

pub fn set_integration_mode(path: &Path, mode: IntegrationMode) -> Result<(), SweepError> {
    set_field(path, IMPLICIT_FIELD, mode.implicit_flag())
}

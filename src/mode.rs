use std::fmt;

use serde::{Deserialize, Serialize};

use crate::report::ReportLayout;

/// Time integration scheme of the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationMode {
    Explicit,
    Implicit,
}

impl IntegrationMode {
    pub const ALL: [IntegrationMode; 2] =
        [IntegrationMode::Explicit, IntegrationMode::Implicit];

    /// Value written to the `implicit` field of the simulation config.
    pub fn implicit_flag(self) -> &'static str {
        match self {
            IntegrationMode::Explicit => "F",
            IntegrationMode::Implicit => "T",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            IntegrationMode::Explicit => "explicit",
            IntegrationMode::Implicit => "implicit",
        }
    }

    pub fn report_layout(self) -> ReportLayout {
        match self {
            IntegrationMode::Explicit => ReportLayout::EXPLICIT,
            IntegrationMode::Implicit => ReportLayout::IMPLICIT,
        }
    }
}

impl fmt::Display for IntegrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

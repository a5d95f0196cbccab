//! Extraction of timing and error norms from the solver's text report.
//!
//! The solver prints a free-form log and closes it with an error-norm block and
//! a timing line at fixed distances from the end of the output. Where exactly
//! depends on the integration mode and is captured by [`ReportLayout`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::mode::IntegrationMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ErrorCategory {
    #[serde(rename = "L_1")]
    L1,
    #[default]
    #[serde(rename = "L_2")]
    L2,
    #[serde(rename = "L_inf")]
    LInf,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 3] = [ErrorCategory::L1, ErrorCategory::L2, ErrorCategory::LInf];

    pub fn label(self) -> &'static str {
        match self {
            ErrorCategory::L1 => "L_1",
            ErrorCategory::L2 => "L_2",
            ErrorCategory::LInf => "L_inf",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Primitive flow variables, in the column order of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variable {
    #[default]
    Rho,
    V1,
    V2,
    P,
}

impl Variable {
    pub const ALL: [Variable; 4] = [Variable::Rho, Variable::V1, Variable::V2, Variable::P];

    pub fn label(self) -> &'static str {
        match self {
            Variable::Rho => "rho",
            Variable::V1 => "v1",
            Variable::V2 => "v2",
            Variable::P => "p",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error magnitudes for every (norm, variable) pair. The key set is fixed, so
/// the table is dense.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ErrorTable {
    values: [[f64; 4]; 3],
}

impl ErrorTable {
    pub fn get(&self, category: ErrorCategory, variable: Variable) -> f64 {
        self.values[category.index()][variable.index()]
    }

    pub fn set(&mut self, category: ErrorCategory, variable: Variable, value: f64) {
        self.values[category.index()][variable.index()] = value;
    }

    /// All twelve entries in row-major order.
    pub fn entries(&self) -> impl Iterator<Item = (ErrorCategory, Variable, f64)> + '_ {
        ErrorCategory::ALL.into_iter().flat_map(move |category| {
            Variable::ALL
                .into_iter()
                .map(move |variable| (category, variable, self.get(category, variable)))
        })
    }
}

/// Outcome of a single solver invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunResult {
    pub time_s: f64,
    pub errors: ErrorTable,
}

/// A report either parses or is taken as evidence the run did not converge.
#[derive(Debug, Clone, PartialEq)]
pub enum Convergence<T> {
    Converged(T),
    Unconverged(String),
}

impl<T> Convergence<T> {
    pub fn is_converged(&self) -> bool {
        matches!(self, Convergence::Converged(_))
    }

    pub fn converged(self) -> Option<T> {
        match self {
            Convergence::Converged(value) => Some(value),
            Convergence::Unconverged(_) => None,
        }
    }
}

/// Where the timing and error rows sit, counted from the end of the output.
/// Offsets are 1-based: 1 is the last piece after splitting on `\n`, which is
/// empty when the output ends with a newline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportLayout {
    pub time_line_from_end: usize,
    /// Position of the time token among the single-space separated fields.
    pub time_token_from_end: usize,
    /// One row per [`ErrorCategory`], in `ErrorCategory::ALL` order.
    pub error_rows_from_end: [usize; 3],
    pub column_separator: &'static str,
}

impl ReportLayout {
    pub const EXPLICIT: ReportLayout = ReportLayout {
        time_line_from_end: 3,
        time_token_from_end: 2,
        error_rows_from_end: [7, 6, 5],
        column_separator: "   ",
    };

    // The implicit solver prints two extra trailing lines.
    pub const IMPLICIT: ReportLayout = ReportLayout {
        time_line_from_end: 5,
        time_token_from_end: 2,
        error_rows_from_end: [9, 8, 7],
        column_separator: "   ",
    };

    fn lines_required(&self) -> usize {
        self.error_rows_from_end
            .iter()
            .copied()
            .chain(std::iter::once(self.time_line_from_end))
            .max()
            .unwrap_or(0)
    }
}

fn from_end<T: Copy>(items: &[T], offset: usize) -> Option<T> {
    items
        .len()
        .checked_sub(offset)
        .and_then(|idx| items.get(idx))
        .copied()
}

fn parse_number(token: &str, what: &str) -> Result<f64, String> {
    token
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("{what}: cannot parse {:?} as a number", token.trim()))
}

pub fn parse_report(output: &str, mode: IntegrationMode) -> Convergence<RunResult> {
    parse_with_layout(output, &mode.report_layout())
}

pub fn parse_with_layout(output: &str, layout: &ReportLayout) -> Convergence<RunResult> {
    match extract(output, layout) {
        Ok(result) => Convergence::Converged(result),
        Err(reason) => Convergence::Unconverged(reason),
    }
}

fn extract(output: &str, layout: &ReportLayout) -> Result<RunResult, String> {
    let lines: Vec<&str> = output.split('\n').collect();
    if lines.len() < layout.lines_required() {
        return Err(format!(
            "report has {} lines, layout needs at least {}",
            lines.len(),
            layout.lines_required()
        ));
    }

    let time_line = from_end(&lines, layout.time_line_from_end)
        .ok_or_else(|| "time line missing".to_string())?;
    let time_fields: Vec<&str> = time_line.split(' ').collect();
    let time_token = from_end(&time_fields, layout.time_token_from_end)
        .ok_or_else(|| format!("time line {time_line:?} has too few fields"))?;
    let time_s = parse_number(time_token, "computation time")?;

    let mut errors = ErrorTable::default();
    for (category, &row_offset) in ErrorCategory::ALL.iter().zip(&layout.error_rows_from_end) {
        let row = from_end(&lines, row_offset).ok_or_else(|| format!("{category} row missing"))?;
        let columns: Vec<&str> = row.split(layout.column_separator).collect();
        if columns.len() < Variable::ALL.len() {
            return Err(format!("{category} row {row:?} has too few columns"));
        }
        for (idx, variable) in Variable::ALL.iter().enumerate() {
            let token = from_end(&columns, Variable::ALL.len() - idx)
                .ok_or_else(|| format!("{category} {variable} column missing"))?;
            let value = parse_number(token, &format!("{category} {variable}"))?;
            errors.set(*category, *variable, value);
        }
    }

    Ok(RunResult { time_s, errors })
}

/// Builds a report the way the solver prints it. Used by tests that need a
/// stand-in for the real executable.
#[cfg(test)]
pub(crate) fn render_report(mode: IntegrationMode, time_s: f64, errors: &ErrorTable) -> String {
    let mut lines = vec![
        " CFDFV 2D finite volume solver".to_string(),
        " Reading mesh ... done".to_string(),
        " Error norms:            rho            v1            v2             p".to_string(),
    ];
    for category in ErrorCategory::ALL {
        let values: Vec<String> = Variable::ALL
            .iter()
            .map(|&variable| format!("{:.8E}", errors.get(category, variable)))
            .collect();
        lines.push(format!(" {}:   {}", category.label(), values.join("   ")));
    }
    lines.push(" ------------------------------------------".to_string());
    lines.push(format!(" Computation time:   {time_s} s"));
    lines.push(" Simulation finished".to_string());
    if mode == IntegrationMode::Implicit {
        lines.push(" Newton iterations:   412".to_string());
        lines.push(" GMRES iterations:   9876".to_string());
    }
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

#[cfg(test)]
pub(crate) fn sample_table(scale: f64) -> ErrorTable {
    let mut table = ErrorTable::default();
    for (row, category) in ErrorCategory::ALL.into_iter().enumerate() {
        for (col, variable) in Variable::ALL.into_iter().enumerate() {
            table.set(
                category,
                variable,
                scale * (1.0 + row as f64 + 0.1 * col as f64),
            );
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_report_yields_all_twelve_entries() {
        let table = sample_table(0.01);
        let text = render_report(IntegrationMode::Explicit, 3.25, &table);

        let result = parse_report(&text, IntegrationMode::Explicit)
            .converged()
            .expect("well-formed report");
        assert_eq!(result.time_s, 3.25);
        assert_eq!(result.errors.entries().count(), 12);
        for (category, variable, value) in table.entries() {
            let parsed = result.errors.get(category, variable);
            assert!((parsed - value).abs() <= 1e-8 * value.abs(), "{category} {variable}");
        }
    }

    #[test]
    fn implicit_report_uses_implicit_offsets() {
        let table = sample_table(0.02);
        let text = render_report(IntegrationMode::Implicit, 0.75, &table);

        let result = parse_report(&text, IntegrationMode::Implicit)
            .converged()
            .expect("well-formed report");
        assert_eq!(result.time_s, 0.75);
        let l2_rho = result.errors.get(ErrorCategory::L2, Variable::Rho);
        assert!((l2_rho - 0.04).abs() < 1e-12);
    }

    #[test]
    fn mismatched_mode_is_not_silently_accepted() {
        let text = render_report(IntegrationMode::Implicit, 0.75, &sample_table(0.02));
        assert!(!parse_report(&text, IntegrationMode::Explicit).is_converged());
    }

    #[test]
    fn truncated_report_is_unconverged_in_both_modes() {
        let text = render_report(IntegrationMode::Explicit, 1.0, &sample_table(0.01));
        let tail: Vec<&str> = text.split('\n').rev().take(4).collect();
        let truncated = tail.into_iter().rev().collect::<Vec<_>>().join("\n");

        for mode in IntegrationMode::ALL {
            assert!(matches!(
                parse_report(&truncated, mode),
                Convergence::Unconverged(_)
            ));
        }
        assert!(!parse_report("", IntegrationMode::Implicit).is_converged());
    }

    #[test]
    fn diverged_solution_with_nonnumeric_norm_is_unconverged() {
        let text = render_report(IntegrationMode::Explicit, 1.0, &sample_table(0.01))
            .replacen("2.00000000E-2", "*************", 1);
        match parse_report(&text, IntegrationMode::Explicit) {
            Convergence::Unconverged(reason) => assert!(reason.contains("L_2 rho"), "{reason}"),
            Convergence::Converged(_) => panic!("garbage norm accepted"),
        }
    }

    #[test]
    fn entries_are_row_major() {
        let order: Vec<(ErrorCategory, Variable)> =
            ErrorTable::default().entries().map(|(c, v, _)| (c, v)).collect();
        assert_eq!(order[0], (ErrorCategory::L1, Variable::Rho));
        assert_eq!(order[3], (ErrorCategory::L1, Variable::P));
        assert_eq!(order[4], (ErrorCategory::L2, Variable::Rho));
        assert_eq!(order[11], (ErrorCategory::LInf, Variable::P));
    }
}

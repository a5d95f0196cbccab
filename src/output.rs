use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use csv::Writer;
use plotters::prelude::*;
use serde::Serialize;

use crate::mode::IntegrationMode;
use crate::report::{ErrorCategory, ErrorTable, Variable};
use crate::settings::SweepSettings;
use crate::sweep::{Exclusion, ModeSweep, SweepRecord};
use crate::SweepError;

/// CFL values and one error norm of a sweep, ready for a log-log plot.
pub fn to_series(
    records: &[SweepRecord],
    category: ErrorCategory,
    variable: Variable,
) -> (Vec<f64>, Vec<f64>) {
    records
        .iter()
        .map(|record| (record.cfl, record.result.errors.get(category, variable)))
        .unzip()
}

pub fn to_time_series(records: &[SweepRecord]) -> (Vec<f64>, Vec<f64>) {
    records
        .iter()
        .map(|record| (record.cfl, record.result.mean_time_s))
        .unzip()
}

#[derive(Debug, Clone, Serialize)]
pub struct ModeSummary {
    pub mode: IntegrationMode,
    pub converged: usize,
    pub cfl_values: Vec<f64>,
    pub excluded: Vec<Exclusion>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepSummary {
    pub generated_at: String,
    pub settings: SweepSettings,
    pub modes: Vec<ModeSummary>,
}

impl SweepSummary {
    pub fn new(settings: &SweepSettings, sweeps: &[ModeSweep]) -> Self {
        Self {
            generated_at: Utc::now().to_rfc3339(),
            settings: settings.clone(),
            modes: sweeps
                .iter()
                .map(|sweep| ModeSummary {
                    mode: sweep.mode,
                    converged: sweep.records.len(),
                    cfl_values: sweep.cfl_values(),
                    excluded: sweep.excluded.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputFiles {
    pub output_dir: PathBuf,
    pub csv_paths: Vec<PathBuf>,
    pub summary_path: PathBuf,
    pub plot_error_path: Option<PathBuf>,
    pub plot_time_path: Option<PathBuf>,
}

pub fn create_timestamped_output_dir(output_root: &Path) -> Result<PathBuf, SweepError> {
    fs::create_dir_all(output_root)?;

    let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let mut output_dir = output_root.join(&timestamp);
    let mut counter = 1_u32;

    while output_dir.exists() {
        output_dir = output_root.join(format!("{timestamp}-{counter:02}"));
        counter += 1;
    }

    fs::create_dir_all(&output_dir)?;
    Ok(output_dir)
}

fn fmt_f64(value: f64) -> String {
    format!("{value:.10e}")
}

fn error_column(category: ErrorCategory, variable: Variable) -> String {
    format!("{}_{}", category.label(), variable.label())
}

pub fn write_records_csv(path: &Path, records: &[SweepRecord]) -> Result<(), SweepError> {
    let mut writer = Writer::from_path(path)?;

    let mut header = vec!["cfl".to_string(), "time_s".to_string(), "runs".to_string()];
    header.extend(
        ErrorTable::default()
            .entries()
            .map(|(category, variable, _)| error_column(category, variable)),
    );
    writer.write_record(&header)?;

    for record in records {
        let mut row = vec![
            fmt_f64(record.cfl),
            fmt_f64(record.result.mean_time_s),
            record.result.runs.to_string(),
        ];
        let errors = &record.result.errors;
        row.extend(errors.entries().map(|(_, _, value)| fmt_f64(value)));
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_summary_json(path: &Path, summary: &SweepSummary) -> Result<(), SweepError> {
    let data = serde_json::to_string_pretty(summary)?;
    fs::write(path, data)?;
    Ok(())
}

fn plot_err<E: std::fmt::Display>(error: E) -> SweepError {
    SweepError::Plot(error.to_string())
}

fn mode_color(mode: IntegrationMode) -> RGBColor {
    match mode {
        IntegrationMode::Explicit => BLUE,
        IntegrationMode::Implicit => RED,
    }
}

/// Tick label counts on the CFL and error/time axes.
const X_LABELS: usize = 20;
const Y_LABELS: usize = 10;

struct PlotSeries {
    mode: IntegrationMode,
    points: Vec<(f64, f64)>,
}

/// Positive, finite points only; a log axis cannot show anything else.
fn plottable(xs: &[f64], ys: &[f64]) -> Vec<(f64, f64)> {
    xs.iter()
        .zip(ys)
        .map(|(&x, &y)| (x, y))
        .filter(|&(x, y)| x.is_finite() && y.is_finite() && x > 0.0 && y > 0.0)
        .collect()
}

fn log_range(values: impl Iterator<Item = f64>) -> Option<std::ops::Range<f64>> {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() || !max.is_finite() {
        return None;
    }
    Some(min / 1.5..max * 1.5)
}

/// Log-log chart with one line per mode. Returns `false` without writing a
/// file when no mode has a single plottable point.
fn plot_log_log(
    series: &[PlotSeries],
    path: &Path,
    caption: &str,
    y_desc: &str,
) -> Result<bool, SweepError> {
    let all_points = || series.iter().flat_map(|s| s.points.iter().copied());
    let (Some(x_range), Some(y_range)) = (
        log_range(all_points().map(|(x, _)| x)),
        log_range(all_points().map(|(_, y)| y)),
    ) else {
        return Ok(false);
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let root = BitMapBackend::new(path, (1280, 720)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 34).into_font())
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(90)
        .build_cartesian_2d(x_range.log_scale(), y_range.log_scale())
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_labels(X_LABELS)
        .y_labels(Y_LABELS)
        .x_desc("CFL")
        .y_desc(y_desc)
        .draw()
        .map_err(plot_err)?;

    for entry in series.iter().filter(|s| !s.points.is_empty()) {
        let color = mode_color(entry.mode);
        chart
            .draw_series(LineSeries::new(entry.points.iter().copied(), &color))
            .map_err(plot_err)?
            .label(entry.mode.label())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 25, y)], color.stroke_width(3))
            });
        chart
            .draw_series(
                entry
                    .points
                    .iter()
                    .map(|&point| Cross::new(point, 4, color.stroke_width(2))),
            )
            .map_err(plot_err)?;
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .border_style(BLACK)
        .background_style(WHITE.mix(0.7))
        .draw()
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(true)
}

pub fn plot_error_series(
    sweeps: &[ModeSweep],
    category: ErrorCategory,
    variable: Variable,
    path: &Path,
) -> Result<bool, SweepError> {
    let series: Vec<PlotSeries> = sweeps
        .iter()
        .map(|sweep| {
            let (xs, ys) = to_series(&sweep.records, category, variable);
            PlotSeries {
                mode: sweep.mode,
                points: plottable(&xs, &ys),
            }
        })
        .collect();
    let label = format!("{category} {variable}");
    plot_log_log(&series, path, &format!("{label} error vs CFL"), &label)
}

pub fn plot_time_series(sweeps: &[ModeSweep], path: &Path) -> Result<bool, SweepError> {
    let series: Vec<PlotSeries> = sweeps
        .iter()
        .map(|sweep| {
            let (xs, ys) = to_time_series(&sweep.records);
            PlotSeries {
                mode: sweep.mode,
                points: plottable(&xs, &ys),
            }
        })
        .collect();
    plot_log_log(
        &series,
        path,
        "Computation time vs CFL",
        "Computation time [s]",
    )
}

/// Writes every artifact of a finished sweep into `output_dir`.
pub fn write_sweep_outputs(
    settings: &SweepSettings,
    sweeps: &[ModeSweep],
    output_dir: &Path,
) -> Result<OutputFiles, SweepError> {
    fs::create_dir_all(output_dir)?;

    let mut csv_paths = Vec::with_capacity(sweeps.len());
    for sweep in sweeps {
        let path = output_dir.join(format!("{}_sweep.csv", sweep.mode.label()));
        write_records_csv(&path, &sweep.records)?;
        csv_paths.push(path);
    }

    let summary_path = output_dir.join("summary.json");
    write_summary_json(&summary_path, &SweepSummary::new(settings, sweeps))?;

    let error_path = output_dir.join("error_vs_cfl.png");
    let plot_error_path = plot_error_series(
        sweeps,
        settings.plot_category,
        settings.plot_variable,
        &error_path,
    )?
    .then_some(error_path);

    let time_path = output_dir.join("time_vs_cfl.png");
    let plot_time_path = plot_time_series(sweeps, &time_path)?.then_some(time_path);

    if plot_error_path.is_none() {
        tracing::info!("no converged points, skipping plots");
    }

    Ok(OutputFiles {
        output_dir: output_dir.to_path_buf(),
        csv_paths,
        summary_path,
        plot_error_path,
        plot_time_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AggregatedResult;
    use crate::report::sample_table;

    fn record(cfl: f64, mode: IntegrationMode) -> SweepRecord {
        SweepRecord {
            cfl,
            mode,
            result: AggregatedResult {
                runs: 1,
                mean_time_s: 0.5 + cfl,
                errors: sample_table(1.0 + cfl),
            },
        }
    }

    fn empty_sweeps() -> Vec<ModeSweep> {
        IntegrationMode::ALL
            .iter()
            .map(|&mode| ModeSweep {
                mode,
                records: Vec::new(),
                excluded: vec![Exclusion {
                    cfl: 50.0,
                    reason: "report has 3 lines, layout needs at least 7".to_string(),
                }],
            })
            .collect()
    }

    #[test]
    fn empty_records_give_empty_series() {
        let (xs, ys) = to_series(&[], ErrorCategory::L2, Variable::Rho);
        assert!(xs.is_empty());
        assert!(ys.is_empty());
    }

    #[test]
    fn series_projects_selected_norm() {
        let records = [
            record(0.1, IntegrationMode::Explicit),
            record(1.0, IntegrationMode::Explicit),
        ];
        let (xs, ys) = to_series(&records, ErrorCategory::L1, Variable::P);
        assert_eq!(xs, vec![0.1, 1.0]);
        assert_eq!(ys[0], records[0].result.errors.get(ErrorCategory::L1, Variable::P));
        assert_eq!(ys[1], records[1].result.errors.get(ErrorCategory::L1, Variable::P));

        let (_, times) = to_time_series(&records);
        assert!((times[0] - 0.6).abs() < 1e-12);
        assert!((times[1] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn plottable_drops_nonpositive_points() {
        let points = plottable(&[0.1, 1.0, 10.0], &[0.0, 2.0, f64::NAN]);
        assert_eq!(points, vec![(1.0, 2.0)]);
    }

    #[test]
    fn log_range_pads_both_ends() {
        let range = log_range([0.01, 10.0, 0.5].into_iter()).unwrap();
        assert!((range.start - 0.01 / 1.5).abs() < 1e-12);
        assert!((range.end - 15.0).abs() < 1e-12);
        assert!(log_range(std::iter::empty::<f64>()).is_none());
    }

    #[test]
    fn csv_has_one_row_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("explicit_sweep.csv");
        let records = [
            record(0.1, IntegrationMode::Explicit),
            record(1.0, IntegrationMode::Explicit),
        ];
        write_records_csv(&path, &records).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), 15);
        assert_eq!(&headers[0], "cfl");
        assert_eq!(&headers[3], "L_1_rho");
        assert_eq!(&headers[14], "L_inf_p");

        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 2);
        let cfl: f64 = rows[1][0].parse().unwrap();
        assert!((cfl - 1.0).abs() < 1e-12);
    }

    #[test]
    fn fully_excluded_sweep_still_writes_summary() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SweepSettings::default();
        let files = write_sweep_outputs(&settings, &empty_sweeps(), dir.path()).unwrap();

        assert_eq!(files.csv_paths.len(), 2);
        assert!(files.csv_paths.iter().all(|p| p.exists()));
        assert!(files.plot_error_path.is_none());
        assert!(files.plot_time_path.is_none());

        let raw = fs::read_to_string(&files.summary_path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["modes"][0]["mode"], "explicit");
        assert_eq!(json["modes"][1]["converged"], 0);
        assert_eq!(json["modes"][1]["excluded"][0]["cfl"], 50.0);
    }

    #[test]
    fn timestamped_dirs_do_not_collide() {
        let root = tempfile::tempdir().unwrap();
        let first = create_timestamped_output_dir(root.path()).unwrap();
        let second = create_timestamped_output_dir(root.path()).unwrap();
        assert_ne!(first, second);
        assert!(first.is_dir() && second.is_dir());
    }
}

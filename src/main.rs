use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cfl_sweep::output::{create_timestamped_output_dir, write_sweep_outputs};
use cfl_sweep::{run_all_modes, ExternalSolver, IntegrationMode, SweepSettings};

#[derive(Debug, Parser)]
#[command(author, version, about = "CFL convergence sweep for an external CFD solver")]
struct Cli {
    /// JSON settings file (config.json in the working directory is used if present)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Solver executable
    #[arg(long)]
    solver: Option<PathBuf>,

    /// Simulation config file handed to the solver; rewritten in place
    #[arg(long)]
    simulation: Option<PathBuf>,

    /// Number of logarithmically spaced CFL values
    #[arg(long)]
    points: Option<usize>,

    /// log10 of the smallest CFL value
    #[arg(long, allow_hyphen_values = true)]
    min_exponent: Option<f64>,

    /// log10 of the largest CFL value
    #[arg(long, allow_hyphen_values = true)]
    max_exponent: Option<f64>,

    /// Solver runs averaged per CFL value
    #[arg(long)]
    repeat: Option<usize>,

    /// Integration mode to sweep; repeat the flag for several (default: both)
    #[arg(long = "mode", value_parser = parse_mode)]
    modes: Vec<IntegrationMode>,

    /// Exclude CFL values where the solver exits with an error instead of aborting
    #[arg(long, default_value_t = false)]
    exclude_solver_failures: bool,

    /// Output base directory; each run gets a timestamped subdirectory
    #[arg(long)]
    output: Option<PathBuf>,
}

fn parse_mode(raw: &str) -> Result<IntegrationMode, String> {
    match raw.to_ascii_lowercase().as_str() {
        "explicit" => Ok(IntegrationMode::Explicit),
        "implicit" => Ok(IntegrationMode::Implicit),
        other => Err(format!("unknown mode {other:?}, expected explicit or implicit")),
    }
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<SweepSettings> {
    if let Some(path) = path {
        return SweepSettings::load(path)
            .with_context(|| format!("failed to load settings {}", path.display()));
    }

    let cwd_settings = PathBuf::from("config.json");
    if cwd_settings.exists() {
        return SweepSettings::load(&cwd_settings)
            .with_context(|| format!("failed to load settings {}", cwd_settings.display()));
    }

    Ok(SweepSettings::default())
}

fn apply_overrides(settings: &mut SweepSettings, cli: Cli) {
    if let Some(v) = cli.solver {
        settings.solver = v;
    }
    if let Some(v) = cli.simulation {
        settings.simulation = v;
    }
    if let Some(v) = cli.points {
        settings.num_points = v;
    }
    if let Some(v) = cli.min_exponent {
        settings.exponent_min = v;
    }
    if let Some(v) = cli.max_exponent {
        settings.exponent_max = v;
    }
    if let Some(v) = cli.repeat {
        settings.repeat_count = v;
    }
    if !cli.modes.is_empty() {
        settings.modes = cli.modes;
    }
    if cli.exclude_solver_failures {
        settings.exclude_solver_failures = true;
    }
    if let Some(v) = cli.output {
        settings.output_root = v;
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cfl_sweep=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings(cli.settings.as_deref())?;
    apply_overrides(&mut settings, cli);
    settings.validate()?;

    info!(
        solver = %settings.solver.display(),
        simulation = %settings.simulation.display(),
        points = settings.num_points,
        "starting CFL sweep"
    );

    let mut solver = ExternalSolver::new(&settings.solver);
    let sweeps = run_all_modes(&mut solver, &settings)?;

    let output_dir = create_timestamped_output_dir(&settings.output_root)?;
    let files = write_sweep_outputs(&settings, &sweeps, &output_dir)?;

    for sweep in &sweeps {
        println!(
            "{:>8}: {} converged, {} excluded",
            sweep.mode.label(),
            sweep.records.len(),
            sweep.excluded.len()
        );
    }
    println!("Run directory: {}", files.output_dir.display());
    for path in &files.csv_paths {
        println!("CSV: {}", path.display());
    }
    println!("Summary: {}", files.summary_path.display());
    if let Some(path) = &files.plot_error_path {
        println!("Error plot: {}", path.display());
    }
    if let Some(path) = &files.plot_time_path {
        println!("Time plot: {}", path.display());
    }

    Ok(())
}

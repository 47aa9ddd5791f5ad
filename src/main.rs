use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use lgssm::config::Scenario;
use lgssm::pipeline::run;
use lgssm::utils::plot::plot_beliefs;

/// Generate a linear-Gaussian trajectory, then filter and smooth it
#[derive(Parser, Debug)]
#[command(name = "lgssm", version)]
struct Cli {
    /// TOML scenario file, the 2-D rotation scenario when omitted
    #[arg(long)]
    scenario: Option<PathBuf>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    steps: Option<usize>,
    /// Report filtered instead of smoothed beliefs
    #[arg(long)]
    no_smooth: bool,
    /// PNG output path
    #[arg(long)]
    plot: Option<PathBuf>,
    /// JSON report output path
    #[arg(long)]
    report: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> LevelFilter {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    logger_init(cli.log_level)?;

    let result = execute(cli);
    if let Err(e) = &result {
        log::error!("{}", e);
    }
    result
}

fn execute(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut scenario = match &cli.scenario {
        Some(path) => Scenario::from_file(path)?,
        None => Scenario::rotation(),
    };
    if let Some(seed) = cli.seed {
        scenario.seed = seed;
    }
    if let Some(steps) = cli.steps {
        scenario.steps = steps;
    }
    if cli.no_smooth {
        scenario.output.smooth = false;
    }
    if cli.plot.is_some() {
        scenario.output.plot = cli.plot;
    }
    if cli.report.is_some() {
        scenario.output.report = cli.report;
    }

    let output = run(&scenario)?;
    let report = output.report(scenario.seed);
    log::info!(
        "free energy {:.4}, rmse observations {:.4}, filtered {:.4}, smoothed {:?}",
        report.free_energy,
        report.rmse_observations,
        report.rmse_filtered,
        report.rmse_smoothed
    );

    if let Some(path) = &scenario.output.plot {
        let title = if output.smoothed.is_some() {
            "Smoothed beliefs"
        } else {
            "Filtered beliefs"
        };
        plot_beliefs(path, &output.trajectory, output.beliefs(), title)?;
    }
    if let Some(path) = &scenario.output.report {
        report.write(path)?;
        log::info!("saved report to {}", path.display());
    }

    println!("{:.6}", report.free_energy);
    Ok(())
}

fn logger_init(log_level: LogLevel) -> Result<(), Box<dyn Error>> {
    TermLogger::init(
        log_level.into(),
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )?;
    Ok(())
}

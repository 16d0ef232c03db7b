mod commands;
mod logging;
mod summary;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "nightwatch", about = "Unattended image-quality monitor for an all-night sky camera")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (TOML); built-in defaults when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure one frame and append its rows to the night's tables
    Measure(commands::measure::MeasureArgs),
    /// Replay every object frame of a night already on disk
    Night(commands::night::NightArgs),
    /// Watch tonight's raw directory and measure frames as they land
    Monitor(commands::monitor::MonitorArgs),
    /// Convert a raw camera frame to FITS
    Convert(commands::convert::ConvertArgs),
    /// Show what the sidecar says about a frame
    Info(commands::info::InfoArgs),
    /// Print or save the effective configuration as TOML
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    let night_log = match &cli.command {
        Commands::Measure(args) => commands::measure::night_log(args, &config),
        _ => None,
    };
    logging::init(cli.verbose, night_log)?;

    let ctx = commands::Context {
        config,
        config_file: cli.config.clone(),
        verbose: cli.verbose,
    };
    match &cli.command {
        Commands::Measure(args) => commands::measure::run(args, &ctx),
        Commands::Night(args) => commands::night::run(args, &ctx),
        Commands::Monitor(args) => commands::monitor::run(args, &ctx),
        Commands::Convert(args) => commands::convert::run(args, &ctx),
        Commands::Info(args) => commands::info::run(args, &ctx),
        Commands::Config(args) => commands::config::run(args, &ctx),
    }
}

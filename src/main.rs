//! Loopdeck CLI
//!
//! Command-line interface for offline arrangement tools.

use clap::Parser;
use env_logger::Env;
use log::info;

use loopdeck::cli::commands;
use loopdeck::cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("Loopdeck v{}", env!("CARGO_PKG_VERSION"));
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Some(cmd) => handle_command(&config, cmd),
        None => {
            println!("Loopdeck v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(config: &loopdeck::WorkstationConfig, cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Frames { bars, bpm } => commands::frames(config, bars, bpm),
        Commands::Bars {
            wav,
            duration_ms,
            bpm,
        } => commands::bars(config, wav.as_deref(), duration_ms, bpm),
        Commands::Plan { arrangement } => commands::plan(config, &arrangement),
        Commands::Render {
            arrangement,
            output,
        } => commands::render(config, &arrangement, &output),
        Commands::Form {
            arrangement,
            mix,
            title,
            description,
            tags,
            public,
        } => commands::form(
            config,
            &arrangement,
            &mix,
            commands::metadata(title, description, tags, public),
        ),
    }
}

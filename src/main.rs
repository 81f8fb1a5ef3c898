//! resforge - build orchestrator for multi-resource server projects.

mod cli;
mod compiler;
mod config;
mod core;
mod deploy;
mod graph;
mod logger;
mod reload;
mod scheduler;
mod utils;
mod watch;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::{ConfigOverrides, ProjectConfig};

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = ProjectConfig::load(&cli)?;

    match &cli.command {
        Commands::Build { .. } => cli::build::run(&config),
        Commands::Dev { .. } => cli::dev::run(config, ConfigOverrides::from_cli(&cli)),
        Commands::Deploy => cli::deploy::run(&config),
        Commands::Tasks { pretty } => cli::tasks::run(&config, *pretty),
        Commands::Clean => cli::clean::run(&config),
    }
}

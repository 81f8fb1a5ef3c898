//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Build orchestrator for multi-resource projects
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: resforge.toml, searched upward)
    #[arg(short = 'C', long, global = true, default_value = "resforge.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build every unit of the project
    #[command(visible_alias = "b")]
    Build {
        #[command(flatten)]
        build_args: BuildArgs,
    },

    /// Build once, then rebuild and hot-reload on changes
    #[command(visible_alias = "d")]
    Dev {
        #[command(flatten)]
        build_args: BuildArgs,

        /// Port of the local restart endpoint
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Copy the existing build output to the configured destination
    Deploy,

    /// Print the resolved build tasks as JSON
    #[command(visible_alias = "t")]
    Tasks {
        /// Pretty-print JSON output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Remove the output directory
    Clean,
}

/// Shared build arguments for Build and Dev commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Clean output directory completely before building
    #[arg(short, long)]
    pub clean: bool,

    /// Ask the compiler to minify bundles
    #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub minify: Option<bool>,

    /// Ask the compiler to emit source maps
    #[arg(short = 'S', long = "source-maps", action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub source_maps: Option<bool>,

    /// Run tasks one at a time and stop at the first failure
    #[arg(short, long)]
    pub sequential: bool,

    /// Number of parallel compiler processes
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,

    /// Output directory path (relative to project root)
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,
}

impl Cli {
    pub const fn build_args(&self) -> Option<&BuildArgs> {
        match &self.command {
            Commands::Build { build_args } | Commands::Dev { build_args, .. } => Some(build_args),
            _ => None,
        }
    }
}

//! Command-line interface module.

mod args;
pub mod build;
pub mod clean;
pub mod deploy;
pub mod dev;
pub mod tasks;

pub use args::{Cli, Commands};

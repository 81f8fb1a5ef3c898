//! `resforge clean`: remove the output directory.

use anyhow::{Result, bail};
use std::fs;

use crate::{config::ProjectConfig, log};

/// Remove the output directory. Returns `false` if it did not exist.
pub fn clean_output(config: &ProjectConfig) -> Result<bool> {
    let output = &config.output;
    if config.root.starts_with(output) {
        bail!(
            "refusing to remove {}: it contains the project root",
            output.display()
        );
    }
    if !output.exists() {
        return Ok(false);
    }
    fs::remove_dir_all(output)?;
    Ok(true)
}

pub fn run(config: &ProjectConfig) -> Result<()> {
    if clean_output(config)? {
        log!("clean"; "removed {}", config.root_relative(&config.output));
    } else {
        log!("clean"; "nothing to remove");
    }
    Ok(())
}

//! `resforge deploy`: copy an existing build to the destination.

use anyhow::{Result, bail};

use crate::config::ProjectConfig;

pub fn run(config: &ProjectConfig) -> Result<()> {
    if config.destination.is_none() {
        bail!(
            "no `destination` set in {}",
            config.root_relative(&config.config_path)
        );
    }
    super::build::deploy_output(config)
}

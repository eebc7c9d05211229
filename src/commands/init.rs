//! Init command: write the default configuration template.

use anyhow::{bail, Result};
use std::path::Path;
use tracing::info;

use crate::config::{write_atomic, Config};

/// Run the init command
pub async fn run(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {} (use --force to overwrite)",
            config_path.display()
        );
    }

    write_atomic(config_path, &Config::generate_default_yaml())?;
    info!("Wrote default configuration to {}", config_path.display());
    println!(
        "Edit {} and set account_id, api_token and the source URLs.",
        config_path.display()
    );
    Ok(())
}

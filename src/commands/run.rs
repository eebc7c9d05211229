//! Run command: a single reconciliation, for cron or a systemd timer.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use super::alert_transport;
use crate::alerts::AlertManager;
use crate::config::Config;
use crate::lock::LockGuard;
use crate::reconciler::{Reconciler, RunOutcome};
use crate::scheduler::log_outcome;

/// Run the run command
pub async fn run(dry_run: bool, config_path: &Path) -> Result<()> {
    let config = Config::load_or_env(config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    let mut settings = config.settings()?;
    settings.dry_run = dry_run;

    let _lock = LockGuard::acquire(&config.lock_file)?;

    if dry_run {
        info!("Dry-run mode: the list will not be modified");
    }
    info!("Synchronizing list '{}'...", settings.list_name);

    let alerts = if config.alerts.webhook.enabled {
        Some(AlertManager::new(
            config.alerts.clone(),
            alert_transport(&settings)?,
        ))
    } else {
        None
    };

    let reconciler = Reconciler::from_settings(settings)?;
    let outcome = reconciler.run().await;
    log_outcome(&outcome);

    if let Some(alerts) = alerts {
        alerts.notify(&outcome).await;
    }

    match outcome {
        RunOutcome::Success(_) => Ok(()),
        RunOutcome::Failed(failure) => Err(failure.into()),
    }
}

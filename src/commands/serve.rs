//! Serve command: status endpoint plus the periodic trigger loop.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use super::alert_transport;
use crate::alerts::AlertManager;
use crate::config::Config;
use crate::error::SyncError;
use crate::reconciler::Reconciler;
use crate::scheduler::{ReconcilerFactory, Scheduler};
use crate::server::{self, StatusInfo};
use crate::signal::ShutdownToken;

/// Run the serve command
pub async fn run(config_path: &Path) -> Result<()> {
    let config = Config::load_or_env(config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Fail fast on a bad config; each tick validates again after reloading
    let settings = config.settings()?;
    let interval = config.schedule_interval()?;

    let shutdown = ShutdownToken::new();
    shutdown.listen_for_signals();

    let mut scheduler = Scheduler::new(interval, reconciler_factory(config_path.to_path_buf()));
    if config.alerts.webhook.enabled {
        scheduler = scheduler.with_alerts(Arc::new(AlertManager::new(
            config.alerts.clone(),
            alert_transport(&settings)?,
        )));
    }

    let status = StatusInfo::new(config.schedule.clone(), config.list_name.clone());
    info!(
        "Serving list '{}' every {} on {}",
        config.list_name, config.schedule, config.listen
    );

    let server = async {
        let served = server::serve(config.listen, status, shutdown.clone()).await;
        // A bind failure must also stop the trigger loop
        shutdown.cancel();
        served
    };
    let (served, ()) = tokio::join!(server, scheduler.run(shutdown.clone()));
    served
}

/// Reload the configuration for every run so edits apply on the next tick
fn reconciler_factory(config_path: PathBuf) -> ReconcilerFactory {
    Arc::new(move || -> Result<Reconciler, SyncError> {
        let config = Config::load_or_env(&config_path)
            .map_err(|e| SyncError::Config(format!("{:#}", e)))?;
        Reconciler::from_settings(config.settings()?)
    })
}

//! Periodic trigger for reconciliation runs.
//!
//! Each tick builds a fresh [`Reconciler`] and spawns it, so a slow run never
//! delays the timer. At most one run is in flight: a tick that finds the
//! previous run still going is skipped with a warning.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::alerts::AlertManager;
use crate::error::SyncError;
use crate::reconciler::{Action, Reconciler, RunOutcome};
use crate::signal::ShutdownToken;
use crate::utils::format_count;

/// Builds the reconciler for one run
pub type ReconcilerFactory = Arc<dyn Fn() -> Result<Reconciler, SyncError> + Send + Sync>;

/// Clears the in-flight flag when the run ends, even on panic
struct RunGuard {
    running: Arc<AtomicBool>,
}

impl RunGuard {
    fn try_start(running: &Arc<AtomicBool>) -> Option<Self> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                running: Arc::clone(running),
            })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

pub struct Scheduler {
    interval: Duration,
    factory: ReconcilerFactory,
    alerts: Option<Arc<AlertManager>>,
    running: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(interval: Duration, factory: ReconcilerFactory) -> Self {
        Self {
            interval,
            factory,
            alerts: None,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_alerts(mut self, alerts: Arc<AlertManager>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Start a run unless one is already in flight
    pub fn trigger(&self) -> Option<JoinHandle<()>> {
        let Some(guard) = RunGuard::try_start(&self.running) else {
            warn!("Previous run still in progress, skipping this trigger");
            return None;
        };

        let factory = Arc::clone(&self.factory);
        let alerts = self.alerts.clone();
        Some(tokio::spawn(async move {
            let _guard = guard;
            let outcome = match factory() {
                Ok(reconciler) => reconciler.run().await,
                Err(e) => {
                    error!("Cannot start run: {}", e);
                    return;
                }
            };
            log_outcome(&outcome);
            if let Some(alerts) = alerts {
                alerts.notify(&outcome).await;
            }
        }))
    }

    /// Tick until shutdown; the first tick fires immediately
    pub async fn run(&self, shutdown: ShutdownToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Scheduler started, running every {:?}", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.trigger();
                }
                _ = shutdown.cancelled() => {
                    info!("Scheduler stopping");
                    break;
                }
            }
        }
    }
}

/// Log a finished run
pub fn log_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Success(report) => match report.action {
            Action::NoOp => info!(
                "Run complete: no change ({} entries)",
                format_count(report.desired_count)
            ),
            Action::Replaced => info!(
                "Run complete: list replaced with {} entries (+{} / -{}){}",
                format_count(report.desired_count),
                report.added,
                report.removed,
                report
                    .operation_id
                    .as_deref()
                    .map(|id| format!(", operation {}", id))
                    .unwrap_or_default()
            ),
            Action::WouldReplace => info!(
                "Run complete (dry run): would replace with {} entries (+{} / -{})",
                format_count(report.desired_count),
                report.added,
                report.removed
            ),
        },
        RunOutcome::Failed(failure) => error!("{}", failure),
    }
}

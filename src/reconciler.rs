//! One reconciliation run: fetch, normalize, compare, and replace if needed.
//!
//! ```text
//! FetchingSources -> Normalizing -> ResolvingList -> FetchingExisting
//!     -> Comparing -> (NoOp | Replacing) -> Done
//! ```
//!
//! Any phase can end in a [`RunFailure`]. Nothing is written before the
//! Replacing phase, and Replacing is a single full PUT, so a failed run never
//! leaves a partially patched list behind.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cidr::{normalize_entry, NormalizeOptions, NormalizedCidr};
use crate::config::SyncSettings;
use crate::error::SyncError;
use crate::fetcher::SourceFetcher;
use crate::store::{CloudflareListStore, ListStore};
use crate::transport::{ReqwestTransport, Transport};
use crate::utils::{count_addresses, format_count};

/// Phases of a run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    FetchingSources,
    Normalizing,
    ResolvingList,
    FetchingExisting,
    Comparing,
    Replacing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::FetchingSources => "fetching sources",
            Phase::Normalizing => "normalizing",
            Phase::ResolvingList => "resolving list",
            Phase::FetchingExisting => "fetching existing items",
            Phase::Comparing => "comparing",
            Phase::Replacing => "replacing items",
        };
        f.write_str(name)
    }
}

/// What the run did to the remote list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Action {
    /// Remote list already matched the desired set
    NoOp,
    /// Remote list was replaced
    Replaced,
    /// Remote list differs but dry-run mode suppressed the write
    WouldReplace,
}

/// Result of normalizing a batch of raw entries
#[derive(Debug, Default, Clone)]
pub struct Partition {
    pub normalized: Vec<NormalizedCidr>,
    pub dropped: usize,
    /// Dropped entries keyed by [`crate::error::ValidationError::kind`]
    pub dropped_by_reason: BTreeMap<&'static str, usize>,
}

/// Entries to add and remove to turn `existing` into `desired`
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SetDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl SetDiff {
    /// True when both sides hold the same set of entries
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Summary of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub action: Action,
    pub list_id: String,
    pub raw_count: usize,
    pub normalized_count: usize,
    pub dropped_count: usize,
    pub dropped_by_reason: BTreeMap<&'static str, usize>,
    pub desired_count: usize,
    pub existing_count: usize,
    pub added: usize,
    pub removed: usize,
    pub operation_id: Option<String>,
}

/// A run that ended early
#[derive(Debug)]
pub struct RunFailure {
    pub phase: Phase,
    pub error: SyncError,
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run failed while {}: {}", self.phase, self.error)
    }
}

impl std::error::Error for RunFailure {}

/// Final state of a run
#[derive(Debug)]
pub enum RunOutcome {
    Success(RunReport),
    Failed(RunFailure),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success(_))
    }
}

/// Apply the normalizer to every raw entry, keeping input order
pub fn partition_entries<S: AsRef<str>>(raw: &[S], options: NormalizeOptions) -> Partition {
    let mut partition = Partition::default();
    for entry in raw {
        match normalize_entry(entry.as_ref(), options) {
            Ok(cidr) => partition.normalized.push(cidr),
            Err(reason) => {
                debug!("Dropping '{}': {}", entry.as_ref(), reason);
                partition.dropped += 1;
                *partition.dropped_by_reason.entry(reason.kind()).or_insert(0) += 1;
            }
        }
    }
    partition
}

/// Deduplicated, lexicographically sorted desired entries
pub fn desired_set(normalized: &[NormalizedCidr]) -> Vec<String> {
    normalized
        .iter()
        .map(|cidr| cidr.as_str().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Set difference in both directions; order and duplicates are ignored
pub fn diff_sets<D, E>(desired: &[D], existing: &[E]) -> SetDiff
where
    D: AsRef<str>,
    E: AsRef<str>,
{
    let desired: BTreeSet<&str> = desired.iter().map(AsRef::as_ref).collect();
    let existing: BTreeSet<&str> = existing.iter().map(AsRef::as_ref).collect();

    SetDiff {
        added: desired.difference(&existing).map(|s| s.to_string()).collect(),
        removed: existing.difference(&desired).map(|s| s.to_string()).collect(),
    }
}

/// Set equality, insensitive to order and duplicates
///
/// # Examples
/// ```
/// use relaysync::reconciler::same_set;
/// assert!(same_set(
///     &["1.1.1.0/24", "2.2.2.0/24"],
///     &["2.2.2.0/24", "1.1.1.0/24", "1.1.1.0/24"],
/// ));
/// ```
pub fn same_set<A, B>(a: &[A], b: &[B]) -> bool
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    diff_sets(a, b).is_empty()
}

/// Drives one reconciliation against a list store
pub struct Reconciler {
    settings: SyncSettings,
    fetcher: SourceFetcher,
    store: Box<dyn ListStore>,
}

impl Reconciler {
    pub fn new(settings: SyncSettings, fetcher: SourceFetcher, store: Box<dyn ListStore>) -> Self {
        Self {
            settings,
            fetcher,
            store,
        }
    }

    /// Wire the reqwest transport and the Cloudflare store from settings
    pub fn from_settings(settings: SyncSettings) -> Result<Self, SyncError> {
        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(settings.retry)?);
        let fetcher = SourceFetcher::new(Arc::clone(&transport));
        let store = Box::new(CloudflareListStore::new(transport, &settings));
        Ok(Self::new(settings, fetcher, store))
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Execute the run to completion
    pub async fn run(&self) -> RunOutcome {
        match self.reconcile().await {
            Ok(report) => RunOutcome::Success(report),
            Err(failure) => RunOutcome::Failed(failure),
        }
    }

    async fn reconcile(&self) -> Result<RunReport, RunFailure> {
        let at = |phase: Phase| move |error: SyncError| RunFailure { phase, error };

        // FetchingSources
        let sources = self
            .fetcher
            .fetch_sources(&self.settings.ipv4_url, &self.settings.ipv6_url)
            .await
            .map_err(at(Phase::FetchingSources))?;
        let raw = sources.combined();

        // Normalizing
        let partition = partition_entries(&raw, self.settings.normalize);
        if partition.dropped > 0 {
            info!(
                "Dropped {} of {} entries: {:?}",
                format_count(partition.dropped),
                format_count(raw.len()),
                partition.dropped_by_reason
            );
        }

        // ResolvingList
        let list_id = self
            .store
            .get_or_create_list(&self.settings.list_name)
            .await
            .map_err(at(Phase::ResolvingList))?;

        // FetchingExisting
        let existing = self
            .store
            .get_all_items(&list_id, None)
            .await
            .map_err(at(Phase::FetchingExisting))?;

        // Comparing
        let desired = desired_set(&partition.normalized);
        let diff = diff_sets(&desired, &existing);
        info!(
            "Desired {} entries ({} addresses), list '{}' holds {}",
            format_count(desired.len()),
            count_addresses(&desired),
            self.settings.list_name,
            format_count(existing.len())
        );

        let mut report = RunReport {
            action: Action::NoOp,
            list_id,
            raw_count: raw.len(),
            normalized_count: partition.normalized.len(),
            dropped_count: partition.dropped,
            dropped_by_reason: partition.dropped_by_reason,
            desired_count: desired.len(),
            existing_count: existing.len(),
            added: diff.added.len(),
            removed: diff.removed.len(),
            operation_id: None,
        };

        if diff.is_empty() {
            info!("List '{}' is up to date", self.settings.list_name);
            return Ok(report);
        }

        if self.settings.dry_run {
            info!(
                "Dry run: would replace list '{}' (+{} / -{})",
                self.settings.list_name, report.added, report.removed
            );
            report.action = Action::WouldReplace;
            return Ok(report);
        }

        // Replacing
        let confirmation = self
            .store
            .replace_all_items(&report.list_id, &desired)
            .await
            .map_err(at(Phase::Replacing))?;
        info!(
            "Replaced list '{}' with {} entries (+{} / -{})",
            self.settings.list_name,
            format_count(desired.len()),
            report.added,
            report.removed
        );

        report.action = Action::Replaced;
        report.operation_id = confirmation.operation_id;
        Ok(report)
    }
}

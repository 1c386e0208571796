//! Applies one retention boundary to every mounted application store
//!
//! A store failing to prune never stops its siblings: the failure becomes a
//! [`PruneOutcome`] and the loop moves on. Compaction runs once, after every
//! store has been handled.

use tracing::{debug, error, info, warn};

use crate::observability::RunMetrics;
use crate::storage::{Store, StoreHandle, StoreRegistry, VersionedStore};

use super::outcome::{PruneOutcome, StatePruneSummary};
use super::retention::RetentionBoundary;
use super::{PruneError, Result};

pub struct PruningCoordinator<'a> {
    registry: &'a dyn StoreRegistry,
    metrics: &'a RunMetrics,
}

impl<'a> PruningCoordinator<'a> {
    pub fn new(registry: &'a dyn StoreRegistry, metrics: &'a RunMetrics) -> Self {
        Self { registry, metrics }
    }

    /// Boundary from the registry's latest version and `keep`, then prune
    /// every mounted store
    pub fn prune_all(&self, keep: u64) -> Result<StatePruneSummary> {
        let latest = self.registry.latest_version()?;
        let boundary = RetentionBoundary::for_latest(latest, keep)?;

        if boundary.is_noop() {
            info!(latest, keep, "No heights to prune");
            return Ok(self.summary(latest, boundary, Vec::new(), false));
        }

        info!(latest, %boundary, "Pruning all stores");
        let outcomes = self
            .registry
            .handles()
            .iter()
            .map(|handle| self.prune_handle(handle, boundary))
            .collect();

        self.compact()?;
        Ok(self.summary(latest, boundary, outcomes, true))
    }

    /// Prune a single named store; it must be mounted and versioned
    pub fn prune_one(&self, name: &str, keep: u64) -> Result<StatePruneSummary> {
        let latest = self.registry.latest_version()?;
        let boundary = RetentionBoundary::for_latest(latest, keep)?;

        let handle = self
            .registry
            .handle(name)
            .ok_or_else(|| PruneError::StoreNotFound(name.to_string()))?;
        if !matches!(handle.store, Store::Versioned(_)) {
            return Err(PruneError::NotVersioned(name.to_string()));
        }

        if boundary.is_noop() {
            info!(store = name, latest, keep, "No heights to prune");
            return Ok(self.summary(latest, boundary, Vec::new(), false));
        }

        let outcome = self.prune_handle(&handle, boundary);
        self.compact()?;
        Ok(self.summary(latest, boundary, vec![outcome], true))
    }

    /// Prune one store, converting any failure into an outcome
    pub fn prune_handle(&self, handle: &StoreHandle, boundary: RetentionBoundary) -> PruneOutcome {
        let Store::Versioned(store) = &handle.store else {
            debug!(store = %handle.name, "Skipping store without version history");
            self.metrics.store_skipped();
            return PruneOutcome::skipped(&handle.name);
        };

        match prune_versioned(store.as_ref(), boundary) {
            Ok(true) => {
                self.metrics.store_pruned();
                PruneOutcome::pruned(&handle.name)
            }
            Ok(false) => {
                self.metrics.store_skipped();
                PruneOutcome::skipped(&handle.name)
            }
            Err(e) if e.is_version_missing() => {
                warn!(store = %handle.name, %boundary, error = %e, "Failed to prune store");
                self.metrics.store_failed();
                PruneOutcome::failed(&handle.name, &e)
            }
            Err(e) => {
                error!(store = %handle.name, %boundary, error = %e, "Failed to prune store");
                self.metrics.store_failed();
                PruneOutcome::failed(&handle.name, &e)
            }
        }
    }

    fn compact(&self) -> Result<()> {
        info!("Compacting application state");
        self.registry.compact()?;
        self.metrics.compaction();
        info!("Compacting application state complete");
        Ok(())
    }

    fn summary(
        &self,
        latest_version: i64,
        boundary: RetentionBoundary,
        outcomes: Vec<PruneOutcome>,
        compacted: bool,
    ) -> StatePruneSummary {
        StatePruneSummary {
            latest_version,
            boundary,
            outcomes,
            compacted,
            space: None,
        }
    }
}

/// `Ok(false)` when the store has no history to prune
fn prune_versioned(
    store: &dyn VersionedStore,
    boundary: RetentionBoundary,
) -> crate::storage::Result<bool> {
    let versions = store.versions()?;
    let Some(first) = versions.first() else {
        info!(store = store.name(), "Store has no versions, skipping");
        return Ok(false);
    };

    let exists = store.version_exists(first)?;
    info!(
        store = store.name(),
        versions = versions.len(),
        first,
        exists,
        "Pruning store"
    );

    store.delete_versions_to(boundary.last_pruned())?;
    Ok(true)
}

//! Entry points that open the on-disk databases under a node home
//!
//! Each function opens only the databases it needs and drops them before
//! returning, so a skipped track never touches its files.

use std::path::Path;

use tracing::{info, instrument};

use crate::config::{Config, DataPaths};
use crate::humanize::SpaceUsage;
use crate::observability::RunMetrics;
use crate::storage::{
    disk_usage, FjallBlockArchive, FjallMultiStore, FjallStateArchive, StorageError, StoreRegistry,
};

use super::analyzer::{self, AnalyzerSettings, VersionReport};
use super::coordinator::PruningCoordinator;
use super::history::HistoryPruningCoordinator;
use super::outcome::{HistoryPruneSummary, StatePruneSummary};
use super::Result;

/// Databases are never created by the pruner; a missing one is fatal
fn require_database(path: &Path) -> Result<()> {
    if !path.is_dir() {
        let err = std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("database not found at {}", path.display()),
        );
        return Err(StorageError::Io(err).into());
    }
    Ok(())
}

/// Open the application multi-store and mount the configured store set
pub fn open_registry(config: &Config, paths: &DataPaths) -> Result<FjallMultiStore> {
    require_database(&paths.application)?;
    let specs = config.store_set()?;

    let mut registry = FjallMultiStore::open(&paths.application)?;
    for spec in &specs {
        registry.mount(&spec.name, spec.kind)?;
    }
    info!(stores = specs.len(), "Mounted application stores");
    Ok(registry)
}

/// Report version statistics for every mounted store
#[instrument(skip(config, home), fields(home = %home.display()))]
pub fn check_store_versions(config: &Config, home: &Path) -> Result<Option<VersionReport>> {
    let paths = config.storage.paths(home);
    let registry = open_registry(config, &paths)?;
    analyzer::analyze(&registry, AnalyzerSettings::from(&config.pruning))
}

/// Prune one named store, keeping `config.pruning.versions` versions
#[instrument(skip(config, home, metrics), fields(home = %home.display()))]
pub fn prune_store(
    config: &Config,
    home: &Path,
    name: &str,
    metrics: &RunMetrics,
) -> Result<StatePruneSummary> {
    let paths = config.storage.paths(home);
    let registry = open_registry(config, &paths)?;
    let before = disk_usage(&paths.application)?;

    let mut summary =
        PruningCoordinator::new(&registry, metrics).prune_one(name, config.pruning.versions)?;
    drop(registry);

    summary.space = Some(SpaceUsage::new(before, disk_usage(&paths.application)?));
    Ok(summary)
}

/// Prune every mounted application store to the shared boundary
#[instrument(skip(config, home, metrics), fields(home = %home.display()))]
pub fn application_track(
    config: &Config,
    home: &Path,
    metrics: &RunMetrics,
) -> Result<StatePruneSummary> {
    let paths = config.storage.paths(home);
    let registry = open_registry(config, &paths)?;
    let before = disk_usage(&paths.application)?;

    let mut summary =
        PruningCoordinator::new(&registry, metrics).prune_all(config.pruning.versions)?;
    drop(registry);

    let space = SpaceUsage::new(before, disk_usage(&paths.application)?);
    info!(%space, "Application store pruning complete");
    summary.space = Some(space);
    Ok(summary)
}

/// Prune the block and state archives
#[instrument(skip(config, home, metrics), fields(home = %home.display()))]
pub fn history_track(
    config: &Config,
    home: &Path,
    metrics: &RunMetrics,
) -> Result<HistoryPruneSummary> {
    let paths = config.storage.paths(home);
    require_database(&paths.blockstore)?;
    require_database(&paths.state)?;

    let block_before = disk_usage(&paths.blockstore)?;
    let state_before = disk_usage(&paths.state)?;

    let blocks = FjallBlockArchive::open(&paths.blockstore)?;
    let states = FjallStateArchive::open(&paths.state)?;
    let mut summary = HistoryPruningCoordinator::new(&blocks, &states, metrics)
        .prune(config.pruning.blocks, config.pruning.state_batch_size)?;
    drop(blocks);
    drop(states);

    summary.block_space = Some(SpaceUsage::new(block_before, disk_usage(&paths.blockstore)?));
    summary.state_space = Some(SpaceUsage::new(state_before, disk_usage(&paths.state)?));
    info!("Block and state store pruning complete");
    Ok(summary)
}

//! Storage capabilities consumed by the pruner
//!
//! The pruner never owns storage state. It talks to two kinds of backends
//! through the traits in this module:
//!
//! - [`StoreRegistry`]: the application multi-store. Each mounted store is
//!   either versioned (supports version introspection and deletion) or opaque.
//! - [`BlockArchive`] / [`StateArchive`]: append-only, height-keyed logs.
//!
//! The fjall-backed implementations live in [`multistore`] and [`archive`].

pub mod archive;
pub mod error;
pub mod keys;
pub mod multistore;

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use archive::{FjallBlockArchive, FjallStateArchive};
pub use error::{Result, StorageError};
pub use multistore::FjallMultiStore;

/// How a store is mounted in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Merkle-tree backed, keeps a version per commit
    Versioned,
    /// Transient/memory-style store without version history
    Opaque,
}

/// A mounted store, tagged by capability
#[derive(Clone)]
pub enum Store {
    Versioned(Arc<dyn VersionedStore>),
    Opaque,
}

impl Store {
    pub fn kind(&self) -> StoreKind {
        match self {
            Store::Versioned(_) => StoreKind::Versioned,
            Store::Opaque => StoreKind::Opaque,
        }
    }
}

/// Name plus capability for one mounted store
#[derive(Clone)]
pub struct StoreHandle {
    pub name: String,
    pub store: Store,
}

/// Ascending version identifiers of one store, read fresh on every call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionSet(Vec<i64>);

impl VersionSet {
    /// Build from arbitrary input; sorts and dedups
    pub fn new(mut versions: Vec<i64>) -> Self {
        versions.sort_unstable();
        versions.dedup();
        Self(versions)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<i64> {
        self.0.first().copied()
    }

    pub fn last(&self) -> Option<i64> {
        self.0.last().copied()
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }
}

/// Operations available on a versioned store
pub trait VersionedStore: Send + Sync {
    fn name(&self) -> &str;

    /// All versions currently present, ascending
    fn versions(&self) -> Result<VersionSet>;

    fn version_exists(&self, version: i64) -> Result<bool>;

    /// Remove every version `<= version`; `version + 1` and later survive.
    ///
    /// Fails with [`StorageError::VersionDoesNotExist`] when the store has no
    /// version newer than `version`, since nothing would remain.
    fn delete_versions_to(&self, version: i64) -> Result<()>;
}

/// Registry of named stores mounted over one multi-store database
///
/// Mounting requires `&mut self`: the registry is used exclusively by one
/// coordinator for the duration of a run.
pub trait StoreRegistry: Send + Sync {
    /// Mount a store; mounting the same name twice returns the existing handle
    fn mount(&mut self, name: &str, kind: StoreKind) -> Result<StoreHandle>;

    /// Mounted stores ordered by name
    fn handles(&self) -> Vec<StoreHandle>;

    fn handle(&self, name: &str) -> Option<StoreHandle>;

    /// Latest committed version of the whole multi-store; `<= 0` means empty
    fn latest_version(&self) -> Result<i64>;

    fn compact(&self) -> Result<()>;
}

/// Consensus state needed to prune the block archive safely
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ArchiveState {
    pub chain_id: String,
    pub last_block_height: i64,
    /// Headers newer than `last_block_height - evidence_max_age_blocks` are kept
    pub evidence_max_age_blocks: i64,
}

impl ArchiveState {
    pub fn evidence_point(&self) -> i64 {
        (self.last_block_height - self.evidence_max_age_blocks).max(0)
    }
}

/// Result of a block archive prune
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrunedBlocks {
    pub pruned: u64,
    pub evidence_point: i64,
}

pub trait BlockArchive: Send + Sync {
    fn base(&self) -> Result<i64>;
    fn height(&self) -> Result<i64>;

    /// Prune blocks in `[base, target)` and move the base to `target`
    fn prune_blocks(&self, target: i64, state: &ArchiveState) -> Result<PrunedBlocks>;

    fn compact(&self) -> Result<()>;
}

pub trait StateArchive: Send + Sync {
    fn base(&self) -> Result<i64>;

    /// Load the persisted consensus state; missing or malformed state is fatal
    fn load_state(&self) -> Result<ArchiveState>;

    /// Prune state records in `[from, to)`, committing `batch_size` heights
    /// per write batch (0 = single batch). Returns pruned heights.
    fn prune_states(&self, from: i64, to: i64, batch_size: u64) -> Result<u64>;

    fn compact(&self) -> Result<()>;
}

/// Total size in bytes of all files below `path`; 0 if it does not exist
pub fn disk_usage(path: &Path) -> Result<u64> {
    if !path.exists() {
        return Ok(0);
    }
    let metadata = std::fs::metadata(path)?;
    if metadata.is_file() {
        return Ok(metadata.len());
    }

    let mut total = 0;
    for entry in std::fs::read_dir(path)? {
        total += disk_usage(&entry?.path())?;
    }
    Ok(total)
}

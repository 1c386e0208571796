//! Pruning orchestration
//!
//! - [`analyzer`]: read-only version statistics (`check-store-versions`)
//! - [`retention`]: the shared boundary computation
//! - [`coordinator`]: application store pruning
//! - [`history`]: block and state archive pruning
//! - [`tracks`]: opening the on-disk databases for each track
//! - [`controller`]: running the requested tracks for `prune`

pub mod analyzer;
pub mod controller;
pub mod coordinator;
pub mod history;
pub mod outcome;
pub mod retention;
pub mod tracks;

use thiserror::Error;

use crate::config::ConfigError;
use crate::storage::StorageError;

pub use analyzer::{AnalyzerSettings, StoreStats, VersionReport};
pub use controller::RunController;
pub use coordinator::PruningCoordinator;
pub use history::HistoryPruningCoordinator;
pub use outcome::{
    FailureKind, HistoryPruneSummary, PruneFailure, PruneOutcome, RunSummary, StatePruneSummary,
};
pub use retention::RetentionBoundary;

#[derive(Debug, Error)]
pub enum PruneError {
    #[error("the database has no valid heights to prune, the latest height: {latest}")]
    NoValidHeight { latest: i64 },

    #[error("store {0} does not exist")]
    StoreNotFound(String),

    #[error("store {0} has no version history and cannot be pruned")]
    NotVersioned(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("pruning task failed: {0}")]
    Join(String),

    #[error("{failed} store(s) failed to prune")]
    PartialFailure { failed: usize },
}

pub type Result<T> = std::result::Result<T, PruneError>;

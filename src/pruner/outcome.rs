use std::fmt;

use crate::humanize::SpaceUsage;
use crate::observability::MetricsSnapshot;
use crate::storage::StorageError;

use super::retention::RetentionBoundary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The store's history cannot retain the boundary (inconsistent earlier pruning)
    VersionDoesNotExist,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneFailure {
    pub kind: FailureKind,
    pub reason: String,
}

/// Result of pruning one store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneOutcome {
    pub name: String,
    pub attempted: bool,
    pub succeeded: bool,
    pub failure: Option<PruneFailure>,
}

impl PruneOutcome {
    pub fn skipped(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attempted: false,
            succeeded: false,
            failure: None,
        }
    }

    pub fn pruned(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attempted: true,
            succeeded: true,
            failure: None,
        }
    }

    pub fn failed(name: &str, error: &StorageError) -> Self {
        let kind = if error.is_version_missing() {
            FailureKind::VersionDoesNotExist
        } else {
            FailureKind::Other
        };
        Self {
            name: name.to_string(),
            attempted: true,
            succeeded: false,
            failure: Some(PruneFailure {
                kind,
                reason: error.to_string(),
            }),
        }
    }

    /// Failures other than a missing version count against the run
    pub fn is_hard_failure(&self) -> bool {
        matches!(
            self.failure,
            Some(PruneFailure {
                kind: FailureKind::Other,
                ..
            })
        )
    }
}

/// Application store track result
#[derive(Debug, Clone)]
pub struct StatePruneSummary {
    pub latest_version: i64,
    pub boundary: RetentionBoundary,
    pub outcomes: Vec<PruneOutcome>,
    pub compacted: bool,
    pub space: Option<SpaceUsage>,
}

impl StatePruneSummary {
    pub fn succeeded(&self) -> bool {
        self.hard_failures() == 0
    }

    /// Failures that count against the run
    pub fn hard_failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_hard_failure()).count()
    }

    pub fn outcome(&self, name: &str) -> Option<&PruneOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    pub fn failed_stores(&self) -> impl Iterator<Item = &PruneOutcome> {
        self.outcomes.iter().filter(|o| o.failure.is_some())
    }
}

impl fmt::Display for StatePruneSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pruned = self.outcomes.iter().filter(|o| o.succeeded).count();
        let skipped = self.outcomes.iter().filter(|o| !o.attempted).count();
        write!(
            f,
            "application: latest {}, boundary {}, {} pruned, {} skipped, {} failed",
            self.latest_version,
            self.boundary,
            pruned,
            skipped,
            self.failed_stores().count()
        )?;
        if let Some(space) = &self.space {
            write!(f, ", {}", space)?;
        }
        Ok(())
    }
}

/// Block and state archive track result
#[derive(Debug, Clone, Default)]
pub struct HistoryPruneSummary {
    pub height: i64,
    pub prune_height: i64,
    pub blocks_pruned: u64,
    pub states_pruned: u64,
    pub evidence_point: i64,
    pub compacted: bool,
    pub block_space: Option<SpaceUsage>,
    pub state_space: Option<SpaceUsage>,
}

impl fmt::Display for HistoryPruneSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "history: height {}, pruned to {}, {} blocks and {} state heights removed",
            self.height, self.prune_height, self.blocks_pruned, self.states_pruned
        )?;
        if let Some(space) = &self.block_space {
            write!(f, ", blockstore {}", space)?;
        }
        if let Some(space) = &self.state_space {
            write!(f, ", state {}", space)?;
        }
        Ok(())
    }
}

/// Combined result of a `prune` run; tracks that were not requested are `None`
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub application: Option<StatePruneSummary>,
    pub history: Option<HistoryPruneSummary>,
    pub metrics: MetricsSnapshot,
}

impl RunSummary {
    pub fn succeeded(&self) -> bool {
        self.hard_failures() == 0
    }

    pub fn hard_failures(&self) -> usize {
        self.application
            .as_ref()
            .map_or(0, StatePruneSummary::hard_failures)
    }
}

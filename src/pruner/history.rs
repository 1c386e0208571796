//! Block and consensus-state archive pruning
//!
//! Both archives are pruned to the same height. They live in separate
//! databases, so each one is pruned and compacted on its own thread.

use std::thread;

use tracing::{info, warn};

use crate::observability::RunMetrics;
use crate::storage::{ArchiveState, BlockArchive, PrunedBlocks, StateArchive};

use super::outcome::HistoryPruneSummary;
use super::retention::RetentionBoundary;
use super::{PruneError, Result};

pub struct HistoryPruningCoordinator<'a> {
    blocks: &'a dyn BlockArchive,
    states: &'a dyn StateArchive,
    metrics: &'a RunMetrics,
}

impl<'a> HistoryPruningCoordinator<'a> {
    pub fn new(
        blocks: &'a dyn BlockArchive,
        states: &'a dyn StateArchive,
        metrics: &'a RunMetrics,
    ) -> Self {
        Self {
            blocks,
            states,
            metrics,
        }
    }

    /// Keep the newest `keep_blocks` heights of both archives
    pub fn prune(&self, keep_blocks: u64, state_batch_size: u64) -> Result<HistoryPruneSummary> {
        let state = self.states.load_state()?;
        let base = self.blocks.base()?;
        let height = self.blocks.height()?;
        let target = RetentionBoundary::below(height, keep_blocks);

        info!(base, height, prune_height = %target, "Pruning block and state archives");

        let mut summary = HistoryPruneSummary {
            height,
            prune_height: target.height(),
            evidence_point: state.evidence_point(),
            ..HistoryPruneSummary::default()
        };

        if target.is_noop() {
            info!(base, prune_height = %target, "Nothing to prune in archives");
            return Ok(summary);
        }

        // Each archive is checked against its own base
        let (blocks, states) = thread::scope(|scope| {
            let blocks = scope.spawn(|| {
                if target.height() <= base {
                    info!(base, prune_height = %target, "Block store already pruned");
                    return Ok(None);
                }
                self.prune_blocks(target.height(), &state).map(Some)
            });
            let states = scope.spawn(|| self.prune_states(target.height(), state_batch_size));
            (join(blocks, "block"), join(states, "state"))
        });
        let blocks = blocks?;
        let states = states?;

        if let Some(pruned) = blocks {
            summary.blocks_pruned = pruned.pruned;
            summary.evidence_point = pruned.evidence_point;
        }
        summary.states_pruned = states.unwrap_or(0);
        summary.compacted = blocks.is_some() || states.is_some();
        Ok(summary)
    }

    fn prune_blocks(&self, target: i64, state: &ArchiveState) -> Result<PrunedBlocks> {
        let pruned = self.blocks.prune_blocks(target, state)?;
        info!(
            pruned = pruned.pruned,
            evidence_point = pruned.evidence_point,
            "Pruned block store"
        );
        self.metrics.blocks_pruned(pruned.pruned);

        info!("Compacting block store");
        self.blocks.compact()?;
        self.metrics.compaction();
        info!("Compacting block store complete");
        Ok(pruned)
    }

    /// `None` when the state store is already pruned to `target`
    fn prune_states(&self, target: i64, batch_size: u64) -> Result<Option<u64>> {
        let base = self.states.base()?;
        if target <= base {
            info!(base, target, "State store already pruned");
            return Ok(None);
        }
        let pruned = self.states.prune_states(base, target, batch_size)?;
        info!(base, target, pruned, "Pruned state store");
        self.metrics.states_pruned(pruned);

        info!("Compacting state store");
        self.states.compact()?;
        self.metrics.compaction();
        info!("Compacting state store complete");
        Ok(Some(pruned))
    }
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, Result<T>>, archive: &str) -> Result<T> {
    handle.join().unwrap_or_else(|_| {
        warn!(archive, "Archive pruning thread panicked");
        Err(PruneError::Join(format!("{archive} pruning thread panicked")))
    })
}

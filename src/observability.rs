//! Logging setup and run counters

use std::sync::atomic::{AtomicU64, Ordering};

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

const DEFAULT_LEVEL: &str = "info";

/// Handle to the installed log filter
pub struct LogFilter {
    handle: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

impl LogFilter {
    /// Switch to the configured level; `RUST_LOG` always wins
    pub fn set_level(&self, level: &str) {
        if self.from_env {
            return;
        }
        let filter = EnvFilter::try_new(level).unwrap_or_else(|e| {
            tracing::warn!(level, error = %e, "Invalid log level, keeping {}", DEFAULT_LEVEL);
            EnvFilter::new(DEFAULT_LEVEL)
        });
        if let Err(e) = self.handle.reload(filter) {
            tracing::warn!(error = %e, "Failed to apply log level");
        }
    }
}

/// Install the global subscriber before configuration is loaded, filtered by
/// `RUST_LOG` or `info` until [`LogFilter::set_level`] is called
pub fn init_tracing() -> LogFilter {
    let env_filter = EnvFilter::try_from_default_env().ok();
    let from_env = env_filter.is_some();
    let (filter, handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new(DEFAULT_LEVEL)));

    // A second install (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();

    LogFilter { handle, from_env }
}

/// Counters for one pruning run, shared by both tracks
#[derive(Debug, Default)]
pub struct RunMetrics {
    stores_pruned: AtomicU64,
    stores_skipped: AtomicU64,
    stores_failed: AtomicU64,
    blocks_pruned: AtomicU64,
    states_pruned: AtomicU64,
    compactions: AtomicU64,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store_pruned(&self) {
        self.stores_pruned.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "stores_pruned", "Metric incremented");
    }

    pub fn store_skipped(&self) {
        self.stores_skipped.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "stores_skipped", "Metric incremented");
    }

    pub fn store_failed(&self) {
        self.stores_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "stores_failed", "Metric incremented");
    }

    pub fn blocks_pruned(&self, count: u64) {
        self.blocks_pruned.fetch_add(count, Ordering::Relaxed);
    }

    pub fn states_pruned(&self, count: u64) {
        self.states_pruned.fetch_add(count, Ordering::Relaxed);
    }

    pub fn compaction(&self) {
        self.compactions.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "compactions", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            stores_pruned: self.stores_pruned.load(Ordering::Relaxed),
            stores_skipped: self.stores_skipped.load(Ordering::Relaxed),
            stores_failed: self.stores_failed.load(Ordering::Relaxed),
            blocks_pruned: self.blocks_pruned.load(Ordering::Relaxed),
            states_pruned: self.states_pruned.load(Ordering::Relaxed),
            compactions: self.compactions.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub stores_pruned: u64,
    pub stores_skipped: u64,
    pub stores_failed: u64,
    pub blocks_pruned: u64,
    pub states_pruned: u64,
    pub compactions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = RunMetrics::new();
        metrics.store_pruned();
        metrics.store_pruned();
        metrics.store_failed();
        metrics.blocks_pruned(500);
        metrics.compaction();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.stores_pruned, 2);
        assert_eq!(snapshot.stores_failed, 1);
        assert_eq!(snapshot.stores_skipped, 0);
        assert_eq!(snapshot.blocks_pruned, 500);
        assert_eq!(snapshot.compactions, 1);
    }

    #[test]
    fn test_set_level_accepts_invalid_level() {
        let filter = init_tracing();
        filter.set_level("debug");
        filter.set_level("not a level[");
    }
}

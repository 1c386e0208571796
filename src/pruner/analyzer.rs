//! Version history statistics and anomaly detection across mounted stores
//!
//! Read-only. The findings are advisory: operators use them to decide on
//! follow-up actions such as `prune-store` for a single lagging store.

use std::fmt;

use tracing::{info, warn};

use crate::config::PruningConfig;
use crate::storage::{Store, StoreHandle, StoreRegistry, VersionSet};

use super::Result;

/// Thresholds for the anomaly flags
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyzerSettings {
    /// Flag stores holding more than `multiplier * average` versions
    pub excessive_multiplier: f64,
    /// Flag stores whose gap exceeds `threshold * max_gap`
    pub gap_threshold: f64,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            excessive_multiplier: 1.5,
            gap_threshold: 0.8,
        }
    }
}

impl From<&PruningConfig> for AnalyzerSettings {
    fn from(config: &PruningConfig) -> Self {
        Self {
            excessive_multiplier: config.excessive_multiplier,
            gap_threshold: config.gap_threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub name: String,
    pub version_count: usize,
    pub first_version: i64,
    pub last_version: i64,
    /// `last_version - first_version`
    pub version_gap: i64,
}

impl StoreStats {
    /// `None` for a store without history
    pub fn from_versions(name: &str, versions: &VersionSet) -> Option<Self> {
        let first = versions.first()?;
        let last = versions.last()?;
        Some(Self {
            name: name.to_string(),
            version_count: versions.len(),
            first_version: first,
            last_version: last,
            version_gap: last - first,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VersionReport {
    pub stats: Vec<StoreStats>,
    pub average_version_count: f64,
    pub max_gap: i64,
    /// Stores with a pruning backlog
    pub excessive: Vec<String>,
    /// Stores pruned less aggressively than their peers, or never
    pub gap_anomalous: Vec<String>,
    /// Lagging stores: the newest version is behind the newest version of
    /// any store. A short history flags here, not in `gap_anomalous`;
    /// pruning such a store to a shared boundary fails with a missing version
    pub diverged: Vec<String>,
}

impl VersionReport {
    /// Compute flags over `stats`; `None` when no store has any version
    pub fn from_stats(stats: Vec<StoreStats>, settings: AnalyzerSettings) -> Option<Self> {
        if stats.is_empty() {
            return None;
        }

        let total: usize = stats.iter().map(|s| s.version_count).sum();
        let average_version_count = total as f64 / stats.len() as f64;
        let max_gap = stats.iter().map(|s| s.version_gap).max().unwrap_or(0);
        let newest = stats.iter().map(|s| s.last_version).max().unwrap_or(0);

        let excessive_limit = average_version_count * settings.excessive_multiplier;
        let gap_limit = max_gap as f64 * settings.gap_threshold;

        let flagged = |predicate: &dyn Fn(&StoreStats) -> bool| {
            stats
                .iter()
                .filter(|s| predicate(s))
                .map(|s| s.name.clone())
                .collect::<Vec<_>>()
        };
        let excessive = flagged(&|s: &StoreStats| s.version_count as f64 > excessive_limit);
        let gap_anomalous = flagged(&|s: &StoreStats| s.version_gap as f64 > gap_limit);
        let diverged = flagged(&|s: &StoreStats| s.last_version < newest);

        Some(Self {
            stats,
            average_version_count,
            max_gap,
            excessive,
            gap_anomalous,
            diverged,
        })
    }

    pub fn stats_for(&self, name: &str) -> Option<&StoreStats> {
        self.stats.iter().find(|s| s.name == name)
    }

    /// Emit the findings as log events
    pub fn log(&self) {
        info!(
            stores = self.stats.len(),
            average = self.average_version_count,
            max_gap = self.max_gap,
            "Analyzed store versions"
        );
        for name in &self.excessive {
            if let Some(s) = self.stats_for(name) {
                warn!(
                    store = %name,
                    versions = s.version_count,
                    average = self.average_version_count,
                    "Store has excessive versions and may need pruning"
                );
            }
        }
        for name in &self.gap_anomalous {
            if let Some(s) = self.stats_for(name) {
                warn!(
                    store = %name,
                    gap = s.version_gap,
                    first = s.first_version,
                    last = s.last_version,
                    "Store has a large version gap, pruning may have been inconsistent"
                );
            }
        }
        for name in &self.diverged {
            if let Some(s) = self.stats_for(name) {
                warn!(
                    store = %name,
                    last = s.last_version,
                    "Store history ends before the newest version"
                );
            }
        }
    }
}

impl fmt::Display for VersionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<28} {:>10} {:>12} {:>12} {:>12}",
            "STORE", "VERSIONS", "FIRST", "LAST", "GAP"
        )?;
        for s in &self.stats {
            writeln!(
                f,
                "{:<28} {:>10} {:>12} {:>12} {:>12}",
                s.name, s.version_count, s.first_version, s.last_version, s.version_gap
            )?;
        }

        writeln!(f, "\nStores with potentially excessive versions (may need pruning):")?;
        for name in &self.excessive {
            if let Some(s) = self.stats_for(name) {
                writeln!(
                    f,
                    "  {} has {} versions (average: {:.2})",
                    name, s.version_count, self.average_version_count
                )?;
            }
        }

        writeln!(f, "\nStores with large version gaps (may indicate inconsistent pruning):")?;
        for name in &self.gap_anomalous {
            if let Some(s) = self.stats_for(name) {
                writeln!(
                    f,
                    "  {} has a gap of {} (from {} to {})",
                    name, s.version_gap, s.first_version, s.last_version
                )?;
            }
        }

        writeln!(
            f,
            "\nStores lagging the newest version (cannot be pruned to a shared boundary):"
        )?;
        for name in &self.diverged {
            if let Some(s) = self.stats_for(name) {
                writeln!(f, "  {} ends at version {}", name, s.last_version)?;
            }
        }
        Ok(())
    }
}

/// Statistics for every versioned store with history; opaque and empty
/// stores are skipped
pub fn collect_stats(handles: &[StoreHandle]) -> Result<Vec<StoreStats>> {
    let mut stats = Vec::new();
    for handle in handles {
        let Store::Versioned(store) = &handle.store else {
            continue;
        };
        let versions = store.versions()?;
        if let Some(s) = StoreStats::from_versions(&handle.name, &versions) {
            stats.push(s);
        }
    }
    Ok(stats)
}

/// Analyze all stores mounted in `registry`
pub fn analyze(
    registry: &dyn StoreRegistry,
    settings: AnalyzerSettings,
) -> Result<Option<VersionReport>> {
    let stats = collect_stats(&registry.handles())?;
    let report = VersionReport::from_stats(stats, settings);
    match &report {
        Some(report) => report.log(),
        None => info!("No store has any versions, nothing to analyze"),
    }
    Ok(report)
}

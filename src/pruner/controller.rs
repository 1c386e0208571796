//! Runs the requested pruning tracks for one `prune` invocation
//!
//! The application track and the history track open disjoint databases.
//! When both are requested and `pruning.parallel` is set they run on two
//! blocking tasks that are always joined before the run returns.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, info_span, Instrument, Span};
use uuid::Uuid;

use crate::config::Config;
use crate::observability::RunMetrics;

use super::outcome::{HistoryPruneSummary, RunSummary, StatePruneSummary};
use super::{tracks, PruneError, Result};

pub struct RunController {
    config: Arc<Config>,
    home: Arc<PathBuf>,
    metrics: Arc<RunMetrics>,
}

impl RunController {
    pub fn new(config: Config, home: impl Into<PathBuf>) -> Self {
        Self {
            config: Arc::new(config),
            home: Arc::new(home.into()),
            metrics: Arc::new(RunMetrics::new()),
        }
    }

    /// Run every enabled track; fails if any requested track fails
    pub async fn run(&self) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!("prune", %run_id, home = %self.home.display());
        self.run_tracks().instrument(span).await
    }

    async fn run_tracks(&self) -> Result<RunSummary> {
        let tracks = &self.config.tracks;
        info!(
            application = tracks.application,
            history = tracks.history,
            parallel = self.config.pruning.parallel,
            "Starting pruning run"
        );

        let (application, history) = if self.config.pruning.parallel {
            tokio::join!(self.application(), self.history())
        } else {
            let application = self.application().await;
            let history = self.history().await;
            (application, history)
        };

        let application = application.transpose();
        let history = history.transpose();
        if let Err(e) = &application {
            error!(error = %e, "Application store pruning failed");
        }
        if let Err(e) = &history {
            error!(error = %e, "Block and state store pruning failed");
        }

        let summary = RunSummary {
            application: application?,
            history: history?,
            metrics: self.metrics.snapshot(),
        };
        info!(succeeded = summary.succeeded(), metrics = ?summary.metrics, "Pruning run finished");
        Ok(summary)
    }

    async fn application(&self) -> Option<Result<StatePruneSummary>> {
        if !self.config.tracks.application {
            info!("Skipping application store pruning");
            return None;
        }
        let (config, home, metrics) = self.shared();
        Some(blocking(move || tracks::application_track(&config, &home, &metrics)).await)
    }

    async fn history(&self) -> Option<Result<HistoryPruneSummary>> {
        if !self.config.tracks.history {
            info!("Skipping block and state store pruning");
            return None;
        }
        let (config, home, metrics) = self.shared();
        Some(blocking(move || tracks::history_track(&config, &home, &metrics)).await)
    }

    fn shared(&self) -> (Arc<Config>, Arc<PathBuf>, Arc<RunMetrics>) {
        (self.config.clone(), self.home.clone(), self.metrics.clone())
    }
}

/// Run synchronous disk work on the blocking pool, inside the caller's span
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let span = Span::current();
    tokio::task::spawn_blocking(move || span.in_scope(work))
        .await
        .map_err(|e| PruneError::Join(e.to_string()))?
}

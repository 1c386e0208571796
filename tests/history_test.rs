//! Block and state archive pruning, and full `prune` runs

use std::path::Path;

use statepruner::config::Config;
use statepruner::observability::RunMetrics;
use statepruner::pruner::{tracks, PruneError, RunController};
use statepruner::storage::{
    ArchiveState, BlockArchive, FjallBlockArchive, FjallMultiStore, FjallStateArchive,
    StateArchive, StoreKind, StoreRegistry,
};
use tempfile::TempDir;

fn seed_archives(home: &Path, config: &Config, height: i64, evidence_max_age_blocks: i64) {
    let paths = config.storage.paths(home);

    let blocks = FjallBlockArchive::open(&paths.blockstore).unwrap();
    for h in 1..=height {
        blocks
            .save_block(h, format!("header-{h}").as_bytes(), b"body")
            .unwrap();
    }
    blocks.compact().unwrap();

    let states = FjallStateArchive::open(&paths.state).unwrap();
    states
        .save_state(&ArchiveState {
            chain_id: "osmosis-1".to_string(),
            last_block_height: height,
            evidence_max_age_blocks,
        })
        .unwrap();
    for h in 1..=height {
        states.save_records(h, b"validators", b"params", b"responses").unwrap();
    }
    states.compact().unwrap();
}

fn seed_application(home: &Path, config: &Config, latest: i64) {
    let paths = config.storage.paths(home);
    let mut registry = FjallMultiStore::open(&paths.application).unwrap();
    for name in &config.stores.core {
        registry.mount(name, StoreKind::Versioned).unwrap();
        let tree = registry.tree(name).unwrap();
        for v in 1..=latest {
            tree.commit_version(v, &[(b"k".as_slice(), b"v".as_slice())]).unwrap();
        }
    }
    registry.set_latest_version(latest).unwrap();
    registry.compact().unwrap();
}

fn history_config(keep: u64) -> Config {
    let mut config = Config::default();
    config.pruning.blocks = keep;
    config.pruning.state_batch_size = 64;
    config
}

#[test]
fn test_history_prunes_to_height_minus_keep() {
    let temp_dir = TempDir::new().unwrap();
    let config = history_config(500);
    seed_archives(temp_dir.path(), &config, 1000, 100);

    let summary = tracks::history_track(&config, temp_dir.path(), &RunMetrics::new()).unwrap();

    assert_eq!(summary.height, 1000);
    assert_eq!(summary.prune_height, 500);
    assert_eq!(summary.blocks_pruned, 499);
    assert_eq!(summary.states_pruned, 499);
    assert_eq!(summary.evidence_point, 900);
    assert!(summary.compacted);
    assert!(summary.block_space.is_some());

    let paths = config.storage.paths(temp_dir.path());
    let blocks = FjallBlockArchive::open(&paths.blockstore).unwrap();
    assert_eq!(blocks.base().unwrap(), 500);
    assert!(!blocks.has_body(499).unwrap());
    assert!(!blocks.has_header(499).unwrap());
    assert!(blocks.has_body(500).unwrap());
    assert!(blocks.has_header(500).unwrap());
    drop(blocks);

    let states = FjallStateArchive::open(&paths.state).unwrap();
    assert_eq!(states.base().unwrap(), 500);
    assert!(!states.has_records(499).unwrap());
    assert!(states.has_records(500).unwrap());
}

#[test]
fn test_headers_newer_than_evidence_point_survive() {
    let temp_dir = TempDir::new().unwrap();
    let config = history_config(500);
    seed_archives(temp_dir.path(), &config, 1000, 700);

    let summary = tracks::history_track(&config, temp_dir.path(), &RunMetrics::new()).unwrap();
    assert_eq!(summary.evidence_point, 300);

    let paths = config.storage.paths(temp_dir.path());
    let blocks = FjallBlockArchive::open(&paths.blockstore).unwrap();
    assert!(!blocks.has_header(299).unwrap());
    assert!(blocks.has_header(300).unwrap());
    assert!(!blocks.has_body(300).unwrap());
}

#[test]
fn test_history_second_run_is_noop() {
    let temp_dir = TempDir::new().unwrap();
    let config = history_config(500);
    seed_archives(temp_dir.path(), &config, 1000, 100);

    tracks::history_track(&config, temp_dir.path(), &RunMetrics::new()).unwrap();
    let metrics = RunMetrics::new();
    let again = tracks::history_track(&config, temp_dir.path(), &metrics).unwrap();

    assert_eq!(again.blocks_pruned, 0);
    assert!(!again.compacted);
    assert_eq!(metrics.snapshot().compactions, 0);
}

#[test]
fn test_state_store_catches_up_after_partial_run() {
    let temp_dir = TempDir::new().unwrap();
    let config = history_config(500);
    seed_archives(temp_dir.path(), &config, 1000, 100);
    let paths = config.storage.paths(temp_dir.path());
    {
        let blocks = FjallBlockArchive::open(&paths.blockstore).unwrap();
        let state = FjallStateArchive::open(&paths.state).unwrap().load_state().unwrap();
        blocks.prune_blocks(500, &state).unwrap();
        blocks.compact().unwrap();
    }

    let summary = tracks::history_track(&config, temp_dir.path(), &RunMetrics::new()).unwrap();

    assert_eq!(summary.blocks_pruned, 0);
    assert_eq!(summary.states_pruned, 499);
    assert!(summary.compacted);

    let states = FjallStateArchive::open(&paths.state).unwrap();
    assert_eq!(states.base().unwrap(), 500);
    assert!(!states.has_records(499).unwrap());
    assert!(states.has_records(500).unwrap());
}

#[test]
fn test_missing_consensus_state_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let config = history_config(10);
    let paths = config.storage.paths(temp_dir.path());
    {
        let blocks = FjallBlockArchive::open(&paths.blockstore).unwrap();
        blocks.save_block(1, b"h", b"b").unwrap();
        blocks.compact().unwrap();
        let states = FjallStateArchive::open(&paths.state).unwrap();
        states.compact().unwrap();
    }

    let err = tracks::history_track(&config, temp_dir.path(), &RunMetrics::new()).unwrap_err();
    assert!(matches!(err, PruneError::Storage(_)));
}

#[tokio::test]
async fn test_full_run_prunes_both_tracks() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = history_config(50);
    config.stores.core = vec!["acc".to_string(), "bank".to_string()];
    config.pruning.versions = 5;
    seed_application(temp_dir.path(), &config, 40);
    seed_archives(temp_dir.path(), &config, 200, 10);

    let summary = RunController::new(config, temp_dir.path())
        .run()
        .await
        .unwrap();

    assert!(summary.succeeded());
    let application = summary.application.unwrap();
    assert_eq!(application.boundary.height(), 35);
    assert!(application.outcomes.iter().all(|o| o.succeeded));
    assert_eq!(summary.history.unwrap().prune_height, 150);
    assert_eq!(summary.metrics.stores_pruned, 2);
    assert_eq!(summary.metrics.blocks_pruned, 149);
    assert_eq!(summary.metrics.compactions, 3);
}

#[tokio::test]
async fn test_application_only_run() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = history_config(50);
    config.stores.core = vec!["acc".to_string()];
    config.tracks.history = false;
    seed_application(temp_dir.path(), &config, 40);

    let summary = RunController::new(config.clone(), temp_dir.path())
        .run()
        .await
        .unwrap();

    assert!(summary.history.is_none());
    assert!(summary.application.is_some());
    assert!(!config.storage.paths(temp_dir.path()).blockstore.exists());
}

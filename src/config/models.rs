use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub pruning: PruningConfig,
    #[serde(default)]
    pub tracks: TracksConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub stores: StoresConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Retention windows and analyzer thresholds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PruningConfig {
    /// Application versions to keep below the latest
    #[serde(default = "default_keep")]
    pub versions: u64,
    /// Blocks to keep below the block store height
    #[serde(default = "default_keep")]
    pub blocks: u64,
    /// Heights per write batch when pruning the state store (0 = one batch)
    #[serde(default)]
    pub state_batch_size: u64,
    /// Run the application and history tracks concurrently
    #[serde(default = "default_true")]
    pub parallel: bool,
    #[serde(default = "default_excessive_multiplier")]
    pub excessive_multiplier: f64,
    #[serde(default = "default_gap_threshold")]
    pub gap_threshold: f64,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            versions: default_keep(),
            blocks: default_keep(),
            state_batch_size: 0,
            parallel: true,
            excessive_multiplier: default_excessive_multiplier(),
            gap_threshold: default_gap_threshold(),
        }
    }
}

fn default_keep() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_excessive_multiplier() -> f64 {
    1.5
}

fn default_gap_threshold() -> f64 {
    0.8
}

/// Which pruning tracks `prune` runs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TracksConfig {
    #[serde(default = "default_true")]
    pub application: bool,
    #[serde(default = "default_true")]
    pub history: bool,
}

impl Default for TracksConfig {
    fn default() -> Self {
        Self {
            application: true,
            history: true,
        }
    }
}

/// Database locations relative to the node home directory
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_application_db")]
    pub application_db: String,
    #[serde(default = "default_blockstore_db")]
    pub blockstore_db: String,
    #[serde(default = "default_state_db")]
    pub state_db: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            application_db: default_application_db(),
            blockstore_db: default_blockstore_db(),
            state_db: default_state_db(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_application_db() -> String {
    "application".to_string()
}

fn default_blockstore_db() -> String {
    "blockstore".to_string()
}

fn default_state_db() -> String {
    "state".to_string()
}

impl StorageConfig {
    /// Resolve database paths under `home`; an absolute `data_dir` wins
    pub fn paths(&self, home: &Path) -> DataPaths {
        let data_dir = if self.data_dir.is_absolute() {
            self.data_dir.clone()
        } else {
            home.join(&self.data_dir)
        };

        DataPaths {
            application: data_dir.join(&self.application_db),
            blockstore: data_dir.join(&self.blockstore_db),
            state: data_dir.join(&self.state_db),
            data_dir,
        }
    }
}

/// Concrete database directories for one node home
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub data_dir: PathBuf,
    pub application: PathBuf,
    pub blockstore: PathBuf,
    pub state: PathBuf,
}

/// Which stores are mounted in the application multi-store
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoresConfig {
    /// Application variant selecting extra stores from `variants`
    pub app: Option<String>,
    /// Stores mounted for every application
    #[serde(default = "default_core_stores")]
    pub core: Vec<String>,
    /// Variant name -> extra store names
    #[serde(default = "default_variants")]
    pub variants: BTreeMap<String, Vec<String>>,
    /// Stores without version history (mounted but never pruned)
    #[serde(default)]
    pub opaque: Vec<String>,
}

impl Default for StoresConfig {
    fn default() -> Self {
        Self {
            app: None,
            core: default_core_stores(),
            variants: default_variants(),
            opaque: Vec::new(),
        }
    }
}

fn to_names(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn default_core_stores() -> Vec<String> {
    to_names(&[
        "acc",
        "bank",
        "authz",
        "staking",
        "distribution",
        "slashing",
        "ibc",
        "icahost",
        "interchainquery",
        "evidence",
        "mint",
        "gov",
        "transfer",
        "packetfowardmiddleware",
        "params",
        "consensus",
        "crisis",
        "upgrade",
    ])
}

fn default_variants() -> BTreeMap<String, Vec<String>> {
    let mut variants = BTreeMap::new();
    variants.insert(
        "osmosis".to_string(),
        to_names(&[
            "downtimedetector",
            "hooks-for-ibc",
            "lockup",
            "concentratedliquidity",
            "gamm",
            "cosmwasmpool",
            "poolmanager",
            "twap",
            "epochs",
            "protorev",
            "txfees",
            "incentives",
            "poolincentives",
            "tokenfactory",
            "valsetpref",
            "superfluid",
            "wasm",
            "smartaccount",
        ]),
    );
    variants
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.pruning.versions, 10);
        assert_eq!(config.pruning.blocks, 10);
        assert!(config.pruning.parallel);
        assert!(config.tracks.application && config.tracks.history);
        assert_eq!(config.stores.core.len(), 18);
        assert!(config.stores.variants.contains_key("osmosis"));
    }

    #[test]
    fn test_relative_data_dir_resolves_under_home() {
        let storage = StorageConfig::default();
        let paths = storage.paths(Path::new("/var/node"));

        assert_eq!(paths.data_dir, PathBuf::from("/var/node/data"));
        assert_eq!(paths.application, PathBuf::from("/var/node/data/application"));
        assert_eq!(paths.blockstore, PathBuf::from("/var/node/data/blockstore"));
        assert_eq!(paths.state, PathBuf::from("/var/node/data/state"));
    }

    #[test]
    fn test_absolute_data_dir_ignores_home() {
        let storage = StorageConfig {
            data_dir: PathBuf::from("/mnt/fast"),
            ..StorageConfig::default()
        };
        let paths = storage.paths(Path::new("/var/node"));
        assert_eq!(paths.application, PathBuf::from("/mnt/fast/application"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
[pruning]
versions = 100

[stores]
app = "osmosis"
            "#,
        )
        .unwrap();

        assert_eq!(config.pruning.versions, 100);
        assert_eq!(config.pruning.blocks, 10);
        assert_eq!(config.stores.app.as_deref(), Some("osmosis"));
        assert_eq!(config.stores.core.len(), 18);
    }
}

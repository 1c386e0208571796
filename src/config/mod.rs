//! Configuration management for the pruner
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! Command-line flags are applied on top by the binary.
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `PRUNER__<section>__<key>`
//!
//! Examples:
//! - `PRUNER__PRUNING__VERSIONS=362880`
//! - `PRUNER__STORAGE__DATA_DIR=/mnt/fast/data`
//! - `PRUNER__STORES__APP=osmosis`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/pruner.toml`.
//! This can be overridden using the `PRUNER_CONFIG` environment variable.

mod models;
mod resolver;
mod sources;
mod validation;

pub use models::{
    Config, DataPaths, LogConfig, PruningConfig, StorageConfig, StoresConfig, TracksConfig,
};
pub use resolver::{ResolverError, StoreSetResolver, StoreSpec};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Store set resolution failed: {0}")]
    ResolverError(#[from] ResolverError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Not validated: callers apply command-line overrides first and then
    /// call [`Config::validate`].
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed.
    pub fn load() -> Result<Self, ConfigError> {
        Ok(sources::load()?)
    }

    /// Load configuration from a specific path, unvalidated
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        Ok(sources::load_from_sources(path)?)
    }

    /// Validate once command-line overrides have been applied
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate(self)?;
        Ok(())
    }

    /// Validation specific to `prune`: at least one track must be enabled
    pub fn validate_tracks(&self) -> Result<(), ConfigError> {
        validation::validate_tracks(self)?;
        Ok(())
    }

    /// Stores to mount for this configuration
    pub fn store_set(&self) -> Result<Vec<StoreSpec>, ConfigError> {
        Ok(StoreSetResolver::new(&self.stores).resolve()?)
    }
}

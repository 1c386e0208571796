use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "version {version} does not exist in store '{store}' (first: {first}, latest: {latest})"
    )]
    VersionDoesNotExist {
        store: String,
        version: i64,
        first: i64,
        latest: i64,
    },

    #[error("cannot prune beyond the latest height {height} (target {target})")]
    PruneBeyondHeight { target: i64, height: i64 },

    #[error("archive metadata unavailable: {0}")]
    ArchiveMetadata(String),

    #[error("Invalid key format: {0}")]
    InvalidKey(String),
}

impl StorageError {
    /// Recoverable per-store condition caused by earlier inconsistent pruning
    pub fn is_version_missing(&self) -> bool {
        matches!(self, StorageError::VersionDoesNotExist { .. })
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use tracing::{debug, info, warn};

use super::error::{Result, StorageError};
use super::keys::{
    decode_i64, decode_version_key, encode_i64, encode_meta_key, encode_node_key,
    encode_node_prefix, encode_version_key, store_partition, VERSION_PREFIX,
};
use super::{Store, StoreHandle, StoreKind, StoreRegistry, VersionSet, VersionedStore};

const META_LATEST_VERSION: &str = "latest_version";

/// Fjall-backed multi-store: one partition per versioned store plus metadata
pub struct FjallMultiStore {
    keyspace: Keyspace,
    metadata: PartitionHandle,
    trees: BTreeMap<String, Arc<FjallVersionedStore>>,
    opaque: BTreeSet<String>,
}

impl FjallMultiStore {
    /// Open or create the multi-store database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening application store at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let metadata = keyspace.open_partition("metadata", PartitionCreateOptions::default())?;

        Ok(Self {
            keyspace,
            metadata,
            trees: BTreeMap::new(),
            opaque: BTreeSet::new(),
        })
    }

    /// Record the latest committed version of the whole multi-store
    pub fn set_latest_version(&self, version: i64) -> Result<()> {
        self.metadata
            .insert(encode_meta_key(META_LATEST_VERSION), encode_i64(version))?;
        debug!(version, "Latest version updated");
        Ok(())
    }

    /// Mounted versioned store by name, for writes
    pub fn tree(&self, name: &str) -> Option<Arc<FjallVersionedStore>> {
        self.trees.get(name).cloned()
    }
}

impl StoreRegistry for FjallMultiStore {
    fn mount(&mut self, name: &str, kind: StoreKind) -> Result<StoreHandle> {
        if let Some(existing) = self.handle(name) {
            if existing.store.kind() != kind {
                warn!(store = name, mounted = ?existing.store.kind(), requested = ?kind,
                    "Store already mounted with a different kind, keeping the first mount");
            }
            return Ok(existing);
        }

        match kind {
            StoreKind::Versioned => {
                let partition = self
                    .keyspace
                    .open_partition(&store_partition(name), PartitionCreateOptions::default())?;
                let tree = Arc::new(FjallVersionedStore {
                    name: name.to_string(),
                    keyspace: self.keyspace.clone(),
                    partition,
                });
                self.trees.insert(name.to_string(), tree);
            }
            StoreKind::Opaque => {
                self.opaque.insert(name.to_string());
            }
        }
        debug!(store = name, ?kind, "Mounted store");

        self.handle(name)
            .ok_or_else(|| StorageError::InvalidKey(format!("store {} failed to mount", name)))
    }

    fn handles(&self) -> Vec<StoreHandle> {
        let names: BTreeSet<&String> = self.trees.keys().chain(self.opaque.iter()).collect();
        names.into_iter().filter_map(|name| self.handle(name)).collect()
    }

    fn handle(&self, name: &str) -> Option<StoreHandle> {
        if let Some(tree) = self.trees.get(name) {
            let store: Arc<dyn VersionedStore> = tree.clone();
            return Some(StoreHandle {
                name: name.to_string(),
                store: Store::Versioned(store),
            });
        }
        self.opaque.contains(name).then(|| StoreHandle {
            name: name.to_string(),
            store: Store::Opaque,
        })
    }

    fn latest_version(&self) -> Result<i64> {
        match self.metadata.get(encode_meta_key(META_LATEST_VERSION))? {
            Some(bytes) => decode_i64(&bytes),
            None => Ok(0),
        }
    }

    fn compact(&self) -> Result<()> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

/// One versioned store backed by a fjall partition
pub struct FjallVersionedStore {
    name: String,
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl FjallVersionedStore {
    /// Write `entries` as a new version and mark the version as present
    pub fn commit_version(&self, version: i64, entries: &[(&[u8], &[u8])]) -> Result<()> {
        let mut batch = self.keyspace.batch();
        for (key, value) in entries {
            batch.insert(&self.partition, encode_node_key(version, key), *value);
        }
        batch.insert(&self.partition, encode_version_key(version), Vec::<u8>::new());
        batch.commit()?;
        Ok(())
    }

    /// Value of `key` as written at `version`
    pub fn get_at(&self, version: i64, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .partition
            .get(encode_node_key(version, key))?
            .map(|value| value.to_vec()))
    }

    /// Remove one version and all nodes written at it in a single batch
    fn delete_version(&self, version: i64) -> Result<()> {
        let mut batch = self.keyspace.batch();
        for item in self.partition.prefix(encode_node_prefix(version)) {
            let (key, _) = item?;
            batch.remove(&self.partition, key);
        }
        batch.remove(&self.partition, encode_version_key(version));
        batch.commit()?;
        Ok(())
    }
}

impl VersionedStore for FjallVersionedStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn versions(&self) -> Result<VersionSet> {
        let mut versions = Vec::new();
        for item in self.partition.prefix(VERSION_PREFIX) {
            let (key, _) = item?;
            versions.push(decode_version_key(&key)?);
        }
        Ok(VersionSet::new(versions))
    }

    fn version_exists(&self, version: i64) -> Result<bool> {
        Ok(self.partition.contains_key(encode_version_key(version))?)
    }

    fn delete_versions_to(&self, version: i64) -> Result<()> {
        let versions = self.versions()?;
        let first = versions.first().unwrap_or(0);
        let latest = versions.last().unwrap_or(0);

        if latest <= version {
            return Err(StorageError::VersionDoesNotExist {
                store: self.name.clone(),
                version: version + 1,
                first,
                latest,
            });
        }
        if version < first {
            debug!(store = %self.name, version, first, "Nothing below requested version");
            return Ok(());
        }

        // Ascending, one batch per version: an interrupted run leaves a
        // contiguous history behind.
        let mut deleted = 0usize;
        for &v in versions.as_slice().iter().take_while(|&&v| v <= version) {
            self.delete_version(v)?;
            deleted += 1;
        }
        debug!(store = %self.name, version, deleted, "Deleted versions");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (FjallMultiStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FjallMultiStore::open(temp_dir.path().join("application")).unwrap();
        (store, temp_dir)
    }

    fn seed(store: &mut FjallMultiStore, name: &str, versions: std::ops::RangeInclusive<i64>) {
        store.mount(name, StoreKind::Versioned).unwrap();
        let tree = store.tree(name).unwrap();
        for v in versions {
            let value = v.to_string();
            tree.commit_version(v, &[(b"key".as_slice(), value.as_bytes())]).unwrap();
        }
    }

    #[test]
    fn test_mount_is_idempotent() {
        let (mut store, _temp) = create_test_store();
        store.mount("bank", StoreKind::Versioned).unwrap();
        let again = store.mount("bank", StoreKind::Opaque).unwrap();

        assert_eq!(again.store.kind(), StoreKind::Versioned);
        assert_eq!(store.handles().len(), 1);
    }

    #[test]
    fn test_handles_are_sorted_across_kinds() {
        let (mut store, _temp) = create_test_store();
        store.mount("staking", StoreKind::Versioned).unwrap();
        store.mount("memory", StoreKind::Opaque).unwrap();
        store.mount("bank", StoreKind::Versioned).unwrap();

        let names: Vec<_> = store.handles().into_iter().map(|h| h.name).collect();
        assert_eq!(names, vec!["bank", "memory", "staking"]);
    }

    #[test]
    fn test_latest_version_defaults_to_zero() {
        let (store, _temp) = create_test_store();
        assert_eq!(store.latest_version().unwrap(), 0);

        store.set_latest_version(120).unwrap();
        assert_eq!(store.latest_version().unwrap(), 120);
    }

    #[test]
    fn test_versions_listed_ascending() {
        let (mut store, _temp) = create_test_store();
        seed(&mut store, "bank", 8..=12);

        let tree = store.tree("bank").unwrap();
        let versions = tree.versions().unwrap();
        assert_eq!(versions.as_slice(), &[8, 9, 10, 11, 12]);
        assert!(tree.version_exists(8).unwrap());
        assert!(!tree.version_exists(7).unwrap());
    }

    #[test]
    fn test_delete_versions_to_keeps_newer_versions() {
        let (mut store, _temp) = create_test_store();
        seed(&mut store, "bank", 1..=10);
        let tree = store.tree("bank").unwrap();

        tree.delete_versions_to(6).unwrap();

        assert_eq!(tree.versions().unwrap().as_slice(), &[7, 8, 9, 10]);
        assert_eq!(tree.get_at(6, b"key").unwrap(), None);
        assert_eq!(tree.get_at(7, b"key").unwrap(), Some(b"7".to_vec()));
    }

    #[test]
    fn test_delete_versions_to_is_idempotent() {
        let (mut store, _temp) = create_test_store();
        seed(&mut store, "bank", 1..=10);
        let tree = store.tree("bank").unwrap();

        tree.delete_versions_to(4).unwrap();
        tree.delete_versions_to(4).unwrap();

        assert_eq!(tree.versions().unwrap().first(), Some(5));
    }

    #[test]
    fn test_delete_past_latest_reports_missing_version() {
        let (mut store, _temp) = create_test_store();
        seed(&mut store, "lockup", 1..=10);
        let tree = store.tree("lockup").unwrap();

        let err = tree.delete_versions_to(89).unwrap_err();
        assert!(err.is_version_missing());
        assert!(matches!(
            err,
            StorageError::VersionDoesNotExist { version: 90, first: 1, latest: 10, .. }
        ));
        assert_eq!(tree.versions().unwrap().len(), 10);
    }

    #[test]
    fn test_opaque_store_has_no_tree() {
        let (mut store, _temp) = create_test_store();
        let handle = store.mount("transient", StoreKind::Opaque).unwrap();

        assert!(matches!(handle.store, Store::Opaque));
        assert!(store.tree("transient").is_none());
    }
}

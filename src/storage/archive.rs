/// Height-keyed block and consensus-state archives on fjall
use std::path::Path;

use fjall::{Batch, Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use tracing::{debug, info};

use super::error::{Result, StorageError};
use super::keys::{
    decode_i64, encode_height_key, encode_i64, encode_meta_key, BLOCK_BODY_PREFIX,
    BLOCK_HEADER_PREFIX, STATE_RECORD_PREFIXES,
};
use super::{ArchiveState, BlockArchive, PrunedBlocks, StateArchive};

const META_BASE: &str = "base";
const META_HEIGHT: &str = "height";
const META_STATE: &str = "state";

/// Removals per committed batch when pruning blocks
const BLOCK_PRUNE_BATCH: u64 = 1000;

fn open_keyspace(path: &Path) -> Result<Keyspace> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Config::new(path).open()?)
}

fn read_i64(meta: &PartitionHandle, key: &str) -> Result<i64> {
    match meta.get(encode_meta_key(key))? {
        Some(bytes) => decode_i64(&bytes),
        None => Ok(0),
    }
}

/// Block bodies and headers keyed by height
pub struct FjallBlockArchive {
    keyspace: Keyspace,
    blocks: PartitionHandle,
    meta: PartitionHandle,
}

impl FjallBlockArchive {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening block store at: {}", path.display());

        let keyspace = open_keyspace(path)?;
        let blocks = keyspace.open_partition("blocks", PartitionCreateOptions::default())?;
        let meta = keyspace.open_partition("meta", PartitionCreateOptions::default())?;

        Ok(Self {
            keyspace,
            blocks,
            meta,
        })
    }

    /// Append a block; the first block saved becomes the base
    pub fn save_block(&self, height: i64, header: &[u8], body: &[u8]) -> Result<()> {
        let mut batch = self.keyspace.batch();
        batch.insert(&self.blocks, encode_height_key(BLOCK_HEADER_PREFIX, height), header);
        batch.insert(&self.blocks, encode_height_key(BLOCK_BODY_PREFIX, height), body);

        if self.base()? == 0 {
            batch.insert(&self.meta, encode_meta_key(META_BASE), encode_i64(height));
        }
        if height > self.height()? {
            batch.insert(&self.meta, encode_meta_key(META_HEIGHT), encode_i64(height));
        }
        batch.commit()?;
        Ok(())
    }

    pub fn has_body(&self, height: i64) -> Result<bool> {
        Ok(self
            .blocks
            .contains_key(encode_height_key(BLOCK_BODY_PREFIX, height))?)
    }

    pub fn has_header(&self, height: i64) -> Result<bool> {
        Ok(self
            .blocks
            .contains_key(encode_height_key(BLOCK_HEADER_PREFIX, height))?)
    }

    /// Queue removal of every key in `[prefix:from, prefix:to)`, committing
    /// full batches along the way. Returns the number of keys removed.
    fn remove_range(&self, batch: &mut Batch, prefix: &str, from: i64, to: i64) -> Result<u64> {
        let start = encode_height_key(prefix, from);
        let end = encode_height_key(prefix, to);

        let mut removed = 0;
        for item in self.blocks.range(start..end) {
            let (key, _) = item?;
            batch.remove(&self.blocks, key);
            removed += 1;

            if removed % BLOCK_PRUNE_BATCH == 0 {
                std::mem::replace(batch, self.keyspace.batch()).commit()?;
            }
        }
        Ok(removed)
    }
}

impl BlockArchive for FjallBlockArchive {
    fn base(&self) -> Result<i64> {
        read_i64(&self.meta, META_BASE)
    }

    fn height(&self) -> Result<i64> {
        read_i64(&self.meta, META_HEIGHT)
    }

    fn prune_blocks(&self, target: i64, state: &ArchiveState) -> Result<PrunedBlocks> {
        let base = self.base()?;
        let height = self.height()?;
        let evidence_point = state.evidence_point();

        if target <= base {
            debug!(target, base, "Block store already pruned to target");
            return Ok(PrunedBlocks {
                pruned: 0,
                evidence_point,
            });
        }
        if target > height {
            return Err(StorageError::PruneBeyondHeight { target, height });
        }

        let mut batch = self.keyspace.batch();
        let pruned = self.remove_range(&mut batch, BLOCK_BODY_PREFIX, base, target)?;
        // Headers at or above the evidence point are still needed to verify
        // evidence; older ones go, including leftovers from earlier runs.
        self.remove_range(&mut batch, BLOCK_HEADER_PREFIX, 0, target.min(evidence_point))?;
        batch.insert(&self.meta, encode_meta_key(META_BASE), encode_i64(target));
        batch.commit()?;

        debug!(base, target, pruned, evidence_point, "Pruned block range");
        Ok(PrunedBlocks {
            pruned,
            evidence_point,
        })
    }

    fn compact(&self) -> Result<()> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

/// Consensus state plus per-height validator, params and response records
pub struct FjallStateArchive {
    keyspace: Keyspace,
    states: PartitionHandle,
    meta: PartitionHandle,
}

impl FjallStateArchive {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening state store at: {}", path.display());

        let keyspace = open_keyspace(path)?;
        let states = keyspace.open_partition("states", PartitionCreateOptions::default())?;
        let meta = keyspace.open_partition("meta", PartitionCreateOptions::default())?;

        Ok(Self {
            keyspace,
            states,
            meta,
        })
    }

    pub fn save_state(&self, state: &ArchiveState) -> Result<()> {
        let value = serde_json::to_vec(state)?;
        self.meta.insert(encode_meta_key(META_STATE), value)?;
        Ok(())
    }

    /// Store validators, consensus params and block responses for one height
    pub fn save_records(
        &self,
        height: i64,
        validators: &[u8],
        params: &[u8],
        responses: &[u8],
    ) -> Result<()> {
        let mut batch = self.keyspace.batch();
        for (prefix, value) in STATE_RECORD_PREFIXES.iter().zip([validators, params, responses]) {
            batch.insert(&self.states, encode_height_key(prefix, height), value);
        }
        batch.commit()?;
        Ok(())
    }

    pub fn has_records(&self, height: i64) -> Result<bool> {
        for prefix in STATE_RECORD_PREFIXES {
            if self.states.contains_key(encode_height_key(prefix, height))? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl StateArchive for FjallStateArchive {
    fn base(&self) -> Result<i64> {
        read_i64(&self.meta, META_BASE)
    }

    fn load_state(&self) -> Result<ArchiveState> {
        let bytes = self
            .meta
            .get(encode_meta_key(META_STATE))?
            .ok_or_else(|| StorageError::ArchiveMetadata("no consensus state stored".to_string()))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::ArchiveMetadata(format!("malformed consensus state: {}", e)))
    }

    fn prune_states(&self, from: i64, to: i64, batch_size: u64) -> Result<u64> {
        let from = from.max(self.base()?);
        if to <= from {
            debug!(from, to, "State store already pruned to target");
            return Ok(0);
        }

        let mut batch = self.keyspace.batch();
        let mut pending = 0u64;
        for height in from..to {
            for prefix in STATE_RECORD_PREFIXES {
                let key = encode_height_key(prefix, height);
                if self.states.contains_key(&key)? {
                    batch.remove(&self.states, key);
                }
            }

            pending += 1;
            if batch_size > 0 && pending >= batch_size {
                std::mem::replace(&mut batch, self.keyspace.batch()).commit()?;
                pending = 0;
            }
        }
        batch.insert(&self.meta, encode_meta_key(META_BASE), encode_i64(to));
        batch.commit()?;

        let pruned = (to - from) as u64;
        debug!(from, to, pruned, "Pruned state range");
        Ok(pruned)
    }

    fn compact(&self) -> Result<()> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

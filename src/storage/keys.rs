/// Key layout and encoding utilities for fjall partitions
///
/// Application multi-store (one partition per store, `s_{name}`):
/// - `ver:{version:020}` -> empty marker, present while the version exists
/// - `node:{version:020}:{key}` -> value written at that version
/// - `metadata` partition: `meta:{key}` -> value
///
/// Block archive (`blocks` partition):
/// - `B:{height:020}` -> block body
/// - `H:{height:020}` -> block header
///
/// State archive (`states` partition):
/// - `validators:{height:020}`, `params:{height:020}`, `responses:{height:020}`
///
/// Versions and heights are zero-padded so lexicographic order matches
/// numeric order. Negative versions are never written.

use super::error::{Result, StorageError};

pub const VERSION_PREFIX: &str = "ver:";
pub const NODE_PREFIX: &str = "node:";
pub const BLOCK_BODY_PREFIX: &str = "B:";
pub const BLOCK_HEADER_PREFIX: &str = "H:";
pub const STATE_RECORD_PREFIXES: [&str; 3] = ["validators:", "params:", "responses:"];

/// Partition name for a mounted store
pub fn store_partition(name: &str) -> String {
    format!("s_{}", name)
}

/// Encode a version marker key: ver:{version:020}
pub fn encode_version_key(version: i64) -> Vec<u8> {
    format!("{}{:020}", VERSION_PREFIX, version).into_bytes()
}

/// Decode a version marker key: ver:{version:020} -> version
pub fn decode_version_key(key: &[u8]) -> Result<i64> {
    let key_str =
        std::str::from_utf8(key).map_err(|_| StorageError::InvalidKey(lossy(key)))?;
    key_str
        .strip_prefix(VERSION_PREFIX)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| StorageError::InvalidKey(key_str.to_string()))
}

/// Encode a node key: node:{version:020}:{key}
pub fn encode_node_key(version: i64, key: &[u8]) -> Vec<u8> {
    let mut out = encode_node_prefix(version);
    out.extend_from_slice(key);
    out
}

/// Prefix covering every node written at `version`
pub fn encode_node_prefix(version: i64) -> Vec<u8> {
    format!("{}{:020}:", NODE_PREFIX, version).into_bytes()
}

/// Encode a metadata key: meta:{key}
pub fn encode_meta_key(key: &str) -> Vec<u8> {
    format!("meta:{}", key).into_bytes()
}

/// Encode a height-indexed key: {prefix}{height:020}
pub fn encode_height_key(prefix: &str, height: i64) -> Vec<u8> {
    format!("{}{:020}", prefix, height).into_bytes()
}

pub fn encode_i64(value: i64) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

pub fn decode_i64(bytes: &[u8]) -> Result<i64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StorageError::InvalidKey(format!("expected 8 bytes, got {}", bytes.len())))?;
    Ok(i64::from_be_bytes(raw))
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_key_encoding() {
        let key = encode_version_key(42);
        assert_eq!(key, b"ver:00000000000000000042");
        assert_eq!(decode_version_key(&key).unwrap(), 42);
    }

    #[test]
    fn test_version_keys_sort_numerically() {
        assert!(encode_version_key(9) < encode_version_key(10));
        assert!(encode_version_key(99) < encode_version_key(100));
    }

    #[test]
    fn test_decode_rejects_foreign_key() {
        assert!(decode_version_key(b"node:00000000000000000001:a").is_err());
        assert!(decode_version_key(b"ver:abc").is_err());
    }

    #[test]
    fn test_node_key_encoding() {
        let key = encode_node_key(7, b"balance");
        assert_eq!(key, b"node:00000000000000000007:balance");
        assert!(key.starts_with(&encode_node_prefix(7)));
    }

    #[test]
    fn test_height_keys_stay_within_prefix() {
        let body = encode_height_key(BLOCK_BODY_PREFIX, 500);
        assert_eq!(body, b"B:00000000000000000500");
        assert!(encode_height_key(BLOCK_BODY_PREFIX, 99) < body);
        assert!(!body.starts_with(BLOCK_HEADER_PREFIX.as_bytes()));
    }

    #[test]
    fn test_store_partition_name() {
        assert_eq!(store_partition("bank"), "s_bank");
    }

    #[test]
    fn test_i64_decoding_rejects_short_input() {
        assert_eq!(decode_i64(&encode_i64(-3)).unwrap(), -3);
        assert!(decode_i64(&[1, 2, 3]).is_err());
    }
}

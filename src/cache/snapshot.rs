//! Snapshot Module
//!
//! JSON wire format used to save a cache's items to a byte stream and read them back.
//!
//! Items are written as a list of records rather than a JSON object, so keys
//! only need to be `Serialize`, not strings.

use std::collections::HashMap;
use std::hash::Hash;
use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::cache::Item;
use crate::error::{CacheError, Result};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotOut<'a, K, V> {
    version: u32,
    items: Vec<RecordOut<'a, K, V>>,
}

#[derive(Serialize)]
struct RecordOut<'a, K, V> {
    key: &'a K,
    value: &'a V,
    hits: u64,
    expiration: i64,
}

#[derive(Deserialize)]
struct SnapshotIn<K, V> {
    version: u32,
    items: Vec<RecordIn<K, V>>,
}

#[derive(Deserialize)]
struct RecordIn<K, V> {
    key: K,
    value: V,
    hits: u64,
    expiration: i64,
}

// == Encode ==
/// Writes `items` to `writer`, expiration metadata included.
pub fn encode<K, V, W>(writer: W, items: &HashMap<K, Item<V>>) -> Result<()>
where
    K: Serialize,
    V: Serialize,
    W: Write,
{
    let snapshot = SnapshotOut {
        version: SNAPSHOT_VERSION,
        items: items
            .iter()
            .map(|(key, item)| RecordOut {
                key,
                value: &item.value,
                hits: item.hits,
                expiration: item.expiration,
            })
            .collect(),
    };

    serde_json::to_writer(writer, &snapshot).map_err(|e| CacheError::Encode(e.to_string()))
}

// == Decode ==
/// Reads a snapshot written by [`encode`].
pub fn decode<K, V, R>(reader: R) -> Result<HashMap<K, Item<V>>>
where
    K: DeserializeOwned + Eq + Hash,
    V: DeserializeOwned,
    R: Read,
{
    let snapshot: SnapshotIn<K, V> =
        serde_json::from_reader(reader).map_err(|e| CacheError::Decode(e.to_string()))?;

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(CacheError::Decode(format!(
            "unsupported snapshot version {}",
            snapshot.version
        )));
    }

    Ok(snapshot
        .items
        .into_iter()
        .map(|record| {
            (
                record.key,
                Item {
                    value: record.value,
                    hits: record.hits,
                    expiration: record.expiration,
                },
            )
        })
        .collect())
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_preserves_metadata() {
        let mut items = HashMap::new();
        items.insert(
            "a".to_string(),
            Item {
                value: 10i64,
                hits: 3,
                expiration: 0,
            },
        );
        items.insert(
            "b".to_string(),
            Item {
                value: -7i64,
                hits: 0,
                expiration: 1_900_000_000_000_000_000,
            },
        );

        let mut buf = Vec::new();
        encode(&mut buf, &items).unwrap();
        let decoded: HashMap<String, Item<i64>> = decode(buf.as_slice()).unwrap();

        assert_eq!(decoded, items);
    }

    #[test]
    fn test_snapshot_supports_non_string_keys() {
        let mut items = HashMap::new();
        items.insert((1u32, 2u32), Item::new("pair".to_string(), 0));

        let mut buf = Vec::new();
        encode(&mut buf, &items).unwrap();
        let decoded: HashMap<(u32, u32), Item<String>> = decode(buf.as_slice()).unwrap();

        assert_eq!(decoded[&(1, 2)].value, "pair");
    }

    #[test]
    fn test_decode_malformed_input() {
        let result: Result<HashMap<String, Item<i32>>> = decode(&b"{not json"[..]);
        assert!(matches!(result, Err(CacheError::Decode(_))));
    }

    #[test]
    fn test_decode_wrong_value_type() {
        let raw = br#"{"version":1,"items":[{"key":"a","value":"text","hits":0,"expiration":0}]}"#;
        let result: Result<HashMap<String, Item<i32>>> = decode(&raw[..]);
        assert!(matches!(result, Err(CacheError::Decode(_))));
    }

    #[test]
    fn test_decode_unknown_version() {
        let raw = br#"{"version":99,"items":[]}"#;
        let result: Result<HashMap<String, Item<i32>>> = decode(&raw[..]);
        assert!(matches!(result, Err(CacheError::Decode(msg)) if msg.contains("99")));
    }
}

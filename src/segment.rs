//! Immutable sorted segment files and their manifest descriptors.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::names;
use crate::record;

/// Manifest descriptor for one segment file: its name within the level
/// directory and the inclusive key range it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMeta {
    pub name: String,
    pub min_key: Vec<u8>,
    pub max_key: Vec<u8>,
}

impl SegmentMeta {
    /// Whether `key` falls inside this segment's range.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.min_key.as_slice() <= key && key <= self.max_key.as_slice()
    }

    /// Whether this segment's range intersects `[min, max]`.
    pub fn overlaps(&self, min: &[u8], max: &[u8]) -> bool {
        self.min_key.as_slice() <= max && self.max_key.as_slice() >= min
    }
}

/// Write sorted records into one or more segment files in `dir`, bounded by
/// `sst_max` encoded bytes each. A record is never split across segments; a
/// new segment starts only after the running byte total exceeds the limit,
/// so a segment may exceed it by at most one record.
///
/// Returns a descriptor per file, in creation order. Empty input produces no
/// files.
pub fn write_segments(
    dir: &Path,
    entries: &[(Vec<u8>, Vec<u8>)],
    sst_max: usize,
) -> Result<Vec<SegmentMeta>> {
    let mut metas = Vec::new();
    let stamp = names::now_millis();

    let mut buf: Vec<u8> = Vec::new();
    let mut min_key: Option<&[u8]> = None;
    let mut max_key: &[u8] = &[];

    for (key, value) in entries {
        buf.extend_from_slice(&record::encode(key, value));
        min_key.get_or_insert(key);
        max_key = key;

        if buf.len() > sst_max {
            metas.push(close_segment(dir, stamp, &buf, min_key.take().unwrap(), max_key)?);
            buf.clear();
        }
    }
    if let Some(min) = min_key {
        metas.push(close_segment(dir, stamp, &buf, min, max_key)?);
    }

    Ok(metas)
}

fn close_segment(
    dir: &Path,
    stamp: u64,
    data: &[u8],
    min_key: &[u8],
    max_key: &[u8],
) -> Result<SegmentMeta> {
    let name = names::unique_name(dir, stamp, "sst");
    fs::write(dir.join(&name), data)?;
    Ok(SegmentMeta {
        name,
        min_key: min_key.to_vec(),
        max_key: max_key.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rec(key: &str, value: &str) -> (Vec<u8>, Vec<u8>) {
        (key.as_bytes().to_vec(), value.as_bytes().to_vec())
    }

    #[test]
    fn test_contains_and_overlaps() {
        let meta = SegmentMeta {
            name: "1.sst".to_string(),
            min_key: b"b".to_vec(),
            max_key: b"m".to_vec(),
        };

        assert!(meta.contains(b"b"));
        assert!(meta.contains(b"h"));
        assert!(meta.contains(b"m"));
        assert!(!meta.contains(b"a"));
        assert!(!meta.contains(b"z"));

        assert!(meta.overlaps(b"a", b"c"));
        assert!(meta.overlaps(b"l", b"z"));
        // Range that fully contains the segment still overlaps.
        assert!(meta.overlaps(b"a", b"z"));
        // Segment that fully contains the range still overlaps.
        assert!(meta.overlaps(b"d", b"e"));
        assert!(!meta.overlaps(b"n", b"z"));
        assert!(!meta.overlaps(b"0", b"a"));
    }

    #[test]
    fn test_write_single_segment() {
        let dir = TempDir::new().unwrap();
        let entries = vec![rec("a", "1"), rec("b", "2"), rec("c", "3")];

        let metas = write_segments(dir.path(), &entries, 1024).unwrap();
        assert_eq!(metas.len(), 1);
        assert_eq!(metas[0].min_key, b"a");
        assert_eq!(metas[0].max_key, b"c");

        let map = record::read_map(&dir.path().join(&metas[0].name)).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(b"b".as_slice()).unwrap(), b"2");
    }

    #[test]
    fn test_write_partitions_by_size() {
        let dir = TempDir::new().unwrap();
        // Each record encodes to 4 bytes (1 + 1 + 1 + 1); with a 7-byte bound
        // a segment closes after its second record pushes the total to 8.
        let entries = vec![
            rec("a", "1"),
            rec("b", "2"),
            rec("c", "3"),
            rec("d", "4"),
            rec("e", "5"),
        ];

        let metas = write_segments(dir.path(), &entries, 7).unwrap();
        assert_eq!(metas.len(), 3);
        assert_eq!((metas[0].min_key.as_slice(), metas[0].max_key.as_slice()), (b"a".as_slice(), b"b".as_slice()));
        assert_eq!((metas[1].min_key.as_slice(), metas[1].max_key.as_slice()), (b"c".as_slice(), b"d".as_slice()));
        assert_eq!((metas[2].min_key.as_slice(), metas[2].max_key.as_slice()), (b"e".as_slice(), b"e".as_slice()));

        // Distinct files, each readable on its own.
        for meta in &metas {
            let map = record::read_map(&dir.path().join(&meta.name)).unwrap();
            assert!(map.contains_key(&meta.min_key));
            assert!(map.contains_key(&meta.max_key));
        }
    }

    #[test]
    fn test_oversized_record_gets_own_segment() {
        let dir = TempDir::new().unwrap();
        let entries = vec![
            rec("a", &"x".repeat(100)),
            rec("b", "1"),
        ];

        let metas = write_segments(dir.path(), &entries, 10).unwrap();
        assert_eq!(metas.len(), 2);
        assert_eq!(metas[0].min_key, metas[0].max_key);
        assert_eq!(metas[0].min_key, b"a");
    }

    #[test]
    fn test_empty_input_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let metas = write_segments(dir.path(), &[], 1024).unwrap();
        assert!(metas.is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

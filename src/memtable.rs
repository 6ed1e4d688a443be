use std::collections::HashMap;

/// In-memory table absorbing recent writes.
///
/// Unordered at runtime; keys are sorted only when the table is drained for
/// a flush. Tombstones are stored as ordinary values; resolution happens in
/// the read path. The byte counter that triggers flushing lives with the WAL,
/// which mirrors every entry here.
#[derive(Debug, Default)]
pub struct MemTable {
    entries: HashMap<Vec<u8>, Vec<u8>>,
}

impl MemTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a key.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.entries.insert(key, value);
    }

    /// Raw lookup; a returned tombstone still counts as a hit.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries.get(key).map(|v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drain into records sorted by key, ready for segment writing.
    pub fn into_sorted(self) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut entries: Vec<_> = self.entries.into_iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

impl FromIterator<(Vec<u8>, Vec<u8>)> for MemTable {
    fn from_iter<I: IntoIterator<Item = (Vec<u8>, Vec<u8>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_overwrites() {
        let mut table = MemTable::new();
        table.put(b"k".to_vec(), b"v1".to_vec());
        table.put(b"k".to_vec(), b"v2".to_vec());

        assert_eq!(table.len(), 1);
        assert_eq!(table.get(b"k"), Some(b"v2".as_slice()));
    }

    #[test]
    fn test_into_sorted_orders_by_key() {
        let mut table = MemTable::new();
        table.put(b"charlie".to_vec(), b"3".to_vec());
        table.put(b"alpha".to_vec(), b"1".to_vec());
        table.put(b"bravo".to_vec(), b"2".to_vec());

        let sorted = table.into_sorted();
        let keys: Vec<_> = sorted.iter().map(|(k, _)| k.as_slice()).collect();
        assert_eq!(keys, vec![b"alpha".as_slice(), b"bravo", b"charlie"]);
    }

    #[test]
    fn test_empty() {
        let table = MemTable::new();
        assert!(table.is_empty());
        assert_eq!(table.get(b"missing"), None);
    }
}

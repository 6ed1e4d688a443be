//! Line codec shared by the WAL and segment files.
//!
//! Every record is a single line: `key SEP value \n`, where `SEP` is the
//! unit-separator byte (0x1F). Keys must not contain `SEP` or `\n`; values
//! must not contain `\n` but may contain `SEP` (decoding splits at the first
//! separator). Deletions are stored as a put of the [`TOMBSTONE`] sentinel.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Reserved key/value separator byte (unit separator).
pub const SEP: u8 = 0x1f;

/// Sentinel value marking a key as deleted.
pub const TOMBSTONE: &[u8] = b"__DEL__";

/// Encoded size of one record line.
pub fn encoded_len(key: &[u8], value: &[u8]) -> usize {
    key.len() + 1 + value.len() + 1
}

/// Encode one record as a line.
pub fn encode(key: &[u8], value: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(encoded_len(key, value));
    buf.extend_from_slice(key);
    buf.push(SEP);
    buf.extend_from_slice(value);
    buf.push(b'\n');
    buf
}

/// Decode one line (without the trailing newline) into `(key, value)`.
///
/// Splits at the first separator so values may themselves contain `SEP`.
pub fn decode(line: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let sep = line
        .iter()
        .position(|&b| b == SEP)
        .ok_or_else(|| Error::Corruption("record line has no separator".to_string()))?;
    if sep == 0 {
        return Err(Error::Corruption("record line has empty key".to_string()));
    }
    Ok((line[..sep].to_vec(), line[sep + 1..].to_vec()))
}

/// Read a whole record file into a map, applying lines in file order so a
/// later record for the same key supersedes an earlier one. Used both for
/// WAL replay and for loading segment files.
pub fn read_map(path: &Path) -> Result<HashMap<Vec<u8>, Vec<u8>>> {
    let data = fs::read(path)?;
    let mut map = HashMap::new();
    for line in data.split(|&b| b == b'\n') {
        if line.is_empty() {
            continue;
        }
        let (key, value) = decode(line)?;
        map.insert(key, value);
    }
    Ok(map)
}

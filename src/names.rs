//! Timestamp-stamped file names for segments, manifest snapshots, and
//! rotated WAL files.
//!
//! Files are named `<millis>.<ext>`; when a name is taken (several files
//! created within one millisecond) a `_n` suffix disambiguates:
//! `<millis>_1.<ext>`, `<millis>_2.<ext>`, ... Ordering is by the parsed
//! `(stamp, suffix)` pair, never by raw string comparison.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Pick a file name `<stamp>[_n].<ext>` that does not yet exist in `dir`.
pub fn unique_name(dir: &Path, stamp: u64, ext: &str) -> String {
    let plain = format!("{}.{}", stamp, ext);
    if !dir.join(&plain).exists() {
        return plain;
    }
    let mut n = 1u32;
    loop {
        let name = format!("{}_{}.{}", stamp, n, ext);
        if !dir.join(&name).exists() {
            return name;
        }
        n += 1;
    }
}

/// Parse `<stamp>[_n].<ext>` back into its `(stamp, suffix)` ordering key.
/// Returns `None` for names this engine did not produce.
pub fn parse_stamp(name: &str) -> Option<(u64, u32)> {
    let stem = name.rsplit_once('.')?.0;
    match stem.split_once('_') {
        Some((stamp, suffix)) => Some((stamp.parse().ok()?, suffix.parse::<u32>().ok()?.checked_add(1)?)),
        None => Some((stem.parse().ok()?, 0)),
    }
}

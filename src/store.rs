//! The storage engine facade.
//!
//! `LsmStore` ties the pieces together: writes go WAL-first into the
//! memtable and spill into young-tier segments when the WAL grows past
//! `log_max`; reads walk the tiers newest to oldest and stop at the first
//! segment whose key range covers the key. A single owner drives the engine
//! through `&mut self`; reads borrow `&self`.

use std::fs;
use std::path::Path;

use crate::config::LsmConfig;
use crate::error::{Error, Result};
use crate::flush;
use crate::manifest::Manifest;
use crate::memtable::MemTable;
use crate::record::{self, SEP, TOMBSTONE};
use crate::wal::Wal;

pub struct LsmStore {
    config: LsmConfig,
    wal: Wal,
    memtable: MemTable,
    manifest: Manifest,
}

impl LsmStore {
    /// Open (or create) an engine at `dir` with default tuning.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(LsmConfig::new(dir.as_ref()))
    }

    /// Open (or create) an engine with explicit tuning. Replays any WAL left
    /// by a previous process and loads the newest manifest snapshot.
    pub fn open_with_config(config: LsmConfig) -> Result<Self> {
        fs::create_dir_all(&config.dir)?;

        let manifest = Manifest::load(&config)?;
        let memtable = Wal::replay(&config.dir)?;
        let wal = Wal::open(&config.dir)?;

        tracing::info!(
            dir = %config.dir.display(),
            replayed = memtable.len(),
            young = manifest.level(0).len(),
            levels = manifest.level_count(),
            "opened store"
        );

        Ok(Self {
            config,
            wal,
            memtable,
            manifest,
        })
    }

    /// Store `value` under `key`, WAL first. Triggers a flush once the WAL
    /// reaches `log_max` bytes. The tombstone sentinel is reserved; storing
    /// it through `put` is rejected rather than read back as a deletion.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        validate_key(key)?;
        if value.contains(&b'\n') {
            return Err(Error::InvalidValue("value must not contain newline"));
        }
        if value == TOMBSTONE {
            return Err(Error::InvalidValue("value is reserved for deletions"));
        }
        self.write(key, value)
    }

    /// Delete `key` by writing a tombstone. Deleting an absent key is
    /// indistinguishable from deleting a present one.
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        validate_key(key)?;
        self.write(key, TOMBSTONE)
    }

    fn write(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.wal.append(key, value)?;
        self.memtable.put(key.to_vec(), value.to_vec());

        if self.wal.size() >= self.config.log_max {
            self.flush()?;
        }
        Ok(())
    }

    /// Look up `key`, newest tier first: memtable, then young segments
    /// newest-first, then levels 1 and up.
    ///
    /// Within the young tier the newest segment whose range covers the key
    /// decides; within each level the first covering segment decides (level
    /// ranges are disjoint, so at most one can). A level with no segments
    /// ends the scan. A decided tombstone is an absence. A key outside every
    /// covered range is an absence.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(value) = self.memtable.get(key) {
            return Ok(resolve(value.to_vec()));
        }

        // Newest flush first. The deciding segment may itself lack the key,
        // in which case the search falls to the levels, not to older young
        // segments.
        for meta in self.manifest.level(0).iter().rev() {
            if meta.contains(key) {
                let map = self.load_segment(0, &meta.name)?;
                return match map.get(key) {
                    Some(value) => Ok(resolve(value.clone())),
                    None => self.get_from_levels(key),
                };
            }
        }
        self.get_from_levels(key)
    }

    fn get_from_levels(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        for level in 1..self.manifest.level_count() {
            let segments = self.manifest.level(level);
            // A level with no segments ends the scan; deeper levels are
            // not consulted.
            if segments.is_empty() {
                return Ok(None);
            }
            for meta in segments {
                if meta.contains(key) {
                    let map = self.load_segment(level, &meta.name)?;
                    if let Some(value) = map.get(key) {
                        return Ok(resolve(value.clone()));
                    }
                    break;
                }
            }
        }
        Ok(None)
    }

    fn load_segment(
        &self,
        level: usize,
        name: &str,
    ) -> Result<std::collections::HashMap<Vec<u8>, Vec<u8>>> {
        let path = self.manifest.segment_path(level, name);
        match record::read_map(&path) {
            Err(Error::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::SegmentMissing(name.to_string()))
            }
            other => other,
        }
    }

    /// Force the memtable out to young-tier segments. A no-op when there is
    /// nothing buffered.
    pub fn flush(&mut self) -> Result<()> {
        flush::run(
            &self.config,
            &mut self.wal,
            &mut self.memtable,
            &mut self.manifest,
        )
    }

    /// Sync the WAL and consume the store. Unflushed writes stay in the WAL
    /// and are replayed on the next open.
    pub fn close(mut self) -> Result<()> {
        self.wal.sync()
    }

    #[cfg(test)]
    pub(crate) fn manifest(&self) -> &Manifest {
        &self.manifest
    }
}

fn validate_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidKey("key must not be empty"));
    }
    if key.contains(&SEP) {
        return Err(Error::InvalidKey("key must not contain the separator byte"));
    }
    if key.contains(&b'\n') {
        return Err(Error::InvalidKey("key must not contain newline"));
    }
    Ok(())
}

/// Map a stored value to its visible form: tombstones read as absent.
fn resolve(value: Vec<u8>) -> Option<Vec<u8>> {
    if value == TOMBSTONE {
        None
    } else {
        Some(value)
    }
}

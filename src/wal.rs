//! Write-ahead log.
//!
//! One `current.log` is active per engine directory. Every accepted put
//! (tombstones included) is appended before the memtable is touched. At flush
//! time the file is renamed to `<stamp>.log` and a fresh `current.log` is
//! opened; the rotated file is deleted once its contents are durably recorded
//! in segment files. Writes go straight to the OS without fsync; durability
//! of the active WAL is best effort.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::memtable::MemTable;
use crate::names;
use crate::record;

pub const CURRENT_WAL: &str = "current.log";

pub struct Wal {
    dir: PathBuf,
    file: File,
    size: usize,
}

impl Wal {
    /// Open (or create) the active WAL for appending. The byte counter is
    /// recovered from the existing file length.
    pub fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(CURRENT_WAL);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let size = file.metadata()?.len() as usize;
        Ok(Self {
            dir: dir.to_path_buf(),
            file,
            size,
        })
    }

    /// Replay the active WAL into a fresh memtable, applying records in file
    /// order so the latest write to a key wins. Returns an empty table when
    /// no WAL exists.
    pub fn replay(dir: &Path) -> Result<MemTable> {
        let path = dir.join(CURRENT_WAL);
        if !path.exists() {
            return Ok(MemTable::new());
        }
        let map = record::read_map(&path)?;
        Ok(map.into_iter().collect())
    }

    /// Append one record.
    pub fn append(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let line = record::encode(key, value);
        self.file.write_all(&line)?;
        self.size += line.len();
        Ok(())
    }

    /// Accumulated byte size of the active WAL.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Rename the active WAL to a stamped name and open a fresh one.
    /// Returns the rotated path; the caller deletes it once the flushed
    /// segments are recorded in the manifest.
    pub fn rotate(&mut self) -> Result<PathBuf> {
        let rotated = self
            .dir
            .join(names::unique_name(&self.dir, names::now_millis(), "log"));
        fs::rename(self.dir.join(CURRENT_WAL), &rotated)?;

        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(CURRENT_WAL))?;
        self.size = 0;
        Ok(rotated)
    }

    /// Undo a rotation: move the rotated file back over the fresh
    /// `current.log` and resume appending to it. Only valid while nothing
    /// has been appended since the rotation.
    pub fn unrotate(&mut self, rotated: &Path) -> Result<()> {
        let path = self.dir.join(CURRENT_WAL);
        fs::rename(rotated, &path)?;
        self.file = OpenOptions::new().create(true).append(true).open(&path)?;
        self.size = self.file.metadata()?.len() as usize;
        Ok(())
    }

    /// Flush OS buffers to disk. Used at graceful shutdown only.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

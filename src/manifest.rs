//! Manifest: the authoritative index of segment files per tier.
//!
//! Levels are a single integer-indexed collection: level 0 is the `young`
//! tier (overlapping ranges, append order = flush order), levels 1.. are the
//! compacted tiers (non-overlapping ranges by construction). Each structural
//! change persists the whole manifest as a fresh JSON snapshot under
//! `<dir>/manifest/`; the newest snapshot is authoritative on open. Old
//! snapshots are pruned once the count exceeds a retention limit.
//!
//! A snapshot is written through a temp file and renamed into place, so a
//! torn write can never become the authoritative snapshot. If persisting
//! fails, the in-memory edit is rolled back and the previous snapshot stays
//! authoritative.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::LsmConfig;
use crate::error::Result;
use crate::names;
use crate::segment::SegmentMeta;

pub const MANIFEST_DIR: &str = "manifest";

/// Directory name for a level: `young` for level 0, `level<n>` above.
pub fn level_dir(level: usize) -> String {
    if level == 0 {
        "young".to_string()
    } else {
        format!("level{}", level)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ManifestData {
    levels: Vec<Vec<SegmentMeta>>,
}

pub struct Manifest {
    /// Engine directory; segment paths resolve against it.
    dir: PathBuf,
    snapshot_dir: PathBuf,
    data: ManifestData,
    snapshot_limit: usize,
    snapshot_retain: usize,
}

impl Manifest {
    /// Load the newest snapshot, or start empty when none exist.
    /// An unparseable newest snapshot fails the open; there is no fallback
    /// to older snapshots.
    pub fn load(config: &LsmConfig) -> Result<Self> {
        let snapshot_dir = config.dir.join(MANIFEST_DIR);
        fs::create_dir_all(&snapshot_dir)?;

        let data = match list_snapshots(&snapshot_dir)?.pop() {
            Some((_, path)) => {
                let content = fs::read(&path)?;
                serde_json::from_slice(&content)?
            }
            None => ManifestData::default(),
        };

        Ok(Self {
            dir: config.dir.clone(),
            snapshot_dir,
            data,
            snapshot_limit: config.snapshot_limit,
            snapshot_retain: config.snapshot_retain,
        })
    }

    /// Segments at a level, in registration order. Unknown levels are empty.
    pub fn level(&self, level: usize) -> &[SegmentMeta] {
        self.data
            .levels
            .get(level)
            .map(|l| l.as_slice())
            .unwrap_or(&[])
    }

    /// Number of tracked levels, the young tier included.
    pub fn level_count(&self) -> usize {
        self.data.levels.len()
    }

    /// Absolute path of a segment at a level.
    pub fn segment_path(&self, level: usize, name: &str) -> PathBuf {
        self.dir.join(level_dir(level)).join(name)
    }

    /// Append a segment descriptor to a level and persist a new snapshot.
    /// On persist failure the descriptor is not retained.
    pub fn register(&mut self, level: usize, meta: SegmentMeta) -> Result<()> {
        while self.data.levels.len() <= level {
            self.data.levels.push(Vec::new());
        }
        self.data.levels[level].push(meta);

        if let Err(e) = self.persist() {
            self.data.levels[level].pop();
            return Err(e);
        }
        self.trim()?;
        Ok(())
    }

    /// Erase the one descriptor matching `name` at `level`, persist, then
    /// delete the underlying segment file. Removing a name that is not
    /// present is a no-op, so no file is ever removed twice.
    pub fn remove(&mut self, level: usize, name: &str) -> Result<()> {
        let segments = match self.data.levels.get_mut(level) {
            Some(segments) => segments,
            None => return Ok(()),
        };
        let pos = match segments.iter().position(|m| m.name == name) {
            Some(pos) => pos,
            None => {
                tracing::warn!(level = level, name = name, "segment already removed");
                return Ok(());
            }
        };
        let meta = segments.remove(pos);

        if let Err(e) = self.persist() {
            self.data.levels[level].insert(pos, meta);
            return Err(e);
        }
        self.trim()?;

        let path = self.segment_path(level, name);
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() == std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), "segment file already gone");
            } else {
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Write the current state as a fresh snapshot (temp file + rename).
    fn persist(&self) -> Result<()> {
        let name = names::unique_name(&self.snapshot_dir, names::now_millis(), "json");
        let path = self.snapshot_dir.join(&name);
        let tmp = self.snapshot_dir.join(format!("{}.tmp", name));

        let content = serde_json::to_vec(&self.data)?;
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&content)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Delete the oldest snapshots once the count exceeds the limit, keeping
    /// the newest `snapshot_retain`.
    fn trim(&self) -> Result<()> {
        let snapshots = list_snapshots(&self.snapshot_dir)?;
        if snapshots.len() <= self.snapshot_limit {
            return Ok(());
        }
        // Saturating: a retain count above the limit trims nothing.
        let excess = snapshots.len().saturating_sub(self.snapshot_retain);
        for (_, path) in &snapshots[..excess] {
            fs::remove_file(path)?;
        }
        tracing::debug!(removed = excess, "trimmed manifest snapshots");
        Ok(())
    }

    /// Number of snapshot files currently on disk.
    pub fn snapshot_count(&self) -> Result<usize> {
        Ok(list_snapshots(&self.snapshot_dir)?.len())
    }
}

/// Snapshot files sorted oldest-first by parsed stamp. Foreign and temp
/// files are ignored.
fn list_snapshots(dir: &Path) -> Result<Vec<((u64, u32), PathBuf)>> {
    let mut snapshots = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let name = match file_name.to_str() {
            Some(name) if name.ends_with(".json") => name,
            _ => continue,
        };
        if let Some(key) = names::parse_stamp(name) {
            snapshots.push((key, entry.path()));
        }
    }
    snapshots.sort_unstable_by(|a, b| a.0.cmp(&b.0));
    Ok(snapshots)
}

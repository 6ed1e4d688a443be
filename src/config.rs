use std::path::PathBuf;

/// Configuration for the LSM store
#[derive(Debug, Clone)]
pub struct LsmConfig {
    /// Directory path for the database
    pub dir: PathBuf,

    /// WAL byte size that triggers a flush (default: 4MB)
    pub log_max: usize,

    /// Maximum encoded bytes per segment file; a segment may exceed this by
    /// at most one record (default: 1MB)
    pub sst_max: usize,

    /// Young-tier segment count that triggers compaction (default: 4)
    pub young_merge_threshold: usize,

    /// Manifest snapshot count that triggers retention trimming (default: 100)
    pub snapshot_limit: usize,

    /// Snapshots kept after a trim (default: 50)
    pub snapshot_retain: usize,

    /// Upper bound on numbered levels; caps the compaction cascade (default: 32)
    pub max_levels: usize,
}

impl Default for LsmConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./shaledb"),
            log_max: 4 * 1024 * 1024,
            sst_max: 1024 * 1024,
            young_merge_threshold: 4,
            snapshot_limit: 100,
            snapshot_retain: 50,
            max_levels: 32,
        }
    }
}

impl LsmConfig {
    /// Create a new config with the given directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Default::default()
        }
    }

    /// Set the WAL size that triggers a flush
    pub fn log_max(mut self, bytes: usize) -> Self {
        self.log_max = bytes;
        self
    }

    /// Set the per-segment byte bound
    pub fn sst_max(mut self, bytes: usize) -> Self {
        self.sst_max = bytes;
        self
    }

    /// Set the young-tier count that triggers compaction
    pub fn young_merge_threshold(mut self, count: usize) -> Self {
        self.young_merge_threshold = count;
        self
    }

    /// Set the snapshot count that triggers trimming
    pub fn snapshot_limit(mut self, count: usize) -> Self {
        self.snapshot_limit = count;
        self
    }

    /// Set the snapshot count kept after a trim
    pub fn snapshot_retain(mut self, count: usize) -> Self {
        self.snapshot_retain = count;
        self
    }

    /// Cap the number of numbered levels
    pub fn max_levels(mut self, count: usize) -> Self {
        self.max_levels = count;
        self
    }
}

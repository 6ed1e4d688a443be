//! Flush: drain the memtable into young-tier segments.

use std::fs;
use std::mem;

use crate::compaction;
use crate::config::LsmConfig;
use crate::error::Result;
use crate::manifest::{level_dir, Manifest};
use crate::memtable::MemTable;
use crate::segment;
use crate::wal::Wal;

/// Drain `memtable` into size-bounded segments under `young/`, register them,
/// drop the rotated WAL, and compact when the young tier is full.
///
/// Flushing an empty memtable is a no-op: no rotation, no files, no manifest
/// churn. If the young tier cannot be written, the memtable swap and the WAL
/// rotation are undone so every acknowledged write stays readable and
/// re-enters the next flush.
pub(crate) fn run(
    config: &LsmConfig,
    wal: &mut Wal,
    memtable: &mut MemTable,
    manifest: &mut Manifest,
) -> Result<()> {
    if memtable.is_empty() {
        return Ok(());
    }

    // New writes proceed against the fresh memtable and WAL while the old
    // data is written out below.
    let entries = mem::take(memtable).into_sorted();
    let records = entries.len();

    let rotated_wal = match wal.rotate() {
        Ok(path) => path,
        Err(e) => {
            *memtable = entries.into_iter().collect();
            return Err(e);
        }
    };

    let written = match write_young(config, manifest, &entries) {
        Ok(written) => written,
        Err(e) => {
            *memtable = entries.into_iter().collect();
            if let Err(undo) = wal.unrotate(&rotated_wal) {
                tracing::warn!(
                    path = %rotated_wal.display(),
                    error = %undo,
                    "rotated log could not be restored"
                );
            }
            return Err(e);
        }
    };

    // The records are durable in segments now; a leftover rotated log is
    // garbage that is never replayed.
    if let Err(e) = fs::remove_file(&rotated_wal) {
        tracing::warn!(
            path = %rotated_wal.display(),
            error = %e,
            "rotated log left behind"
        );
    }

    tracing::info!(
        records,
        segments = written,
        young_total = manifest.level(0).len(),
        "flushed memtable to young tier"
    );

    if manifest.level(0).len() >= config.young_merge_threshold {
        compaction::run(config, manifest)?;
    }
    Ok(())
}

fn write_young(
    config: &LsmConfig,
    manifest: &mut Manifest,
    entries: &[(Vec<u8>, Vec<u8>)],
) -> Result<usize> {
    let young_dir = config.dir.join(level_dir(0));
    fs::create_dir_all(&young_dir)?;

    let metas = segment::write_segments(&young_dir, entries, config.sst_max)?;
    let written = metas.len();
    for meta in metas {
        manifest.register(0, meta)?;
    }
    Ok(written)
}

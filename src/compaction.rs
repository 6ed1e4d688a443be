//! Leveled compaction.
//!
//! Young-tier segments are merged (newest flush winning on duplicate keys)
//! together with every overlapping level-1 segment into fresh,
//! non-overlapping, size-bounded level-1 segments. Whenever that pushes a
//! level past its capacity (`10^n` segments for level `n`), the overflow is
//! merged down into the next level, cascading until every level is back
//! under capacity.
//!
//! New segments are registered before the consumed ones are removed, so a
//! failure mid-way leaves the previous snapshots authoritative; the worst
//! outcome is an orphaned file, never a lost record.

use std::collections::{HashMap, HashSet};
use std::fs;

use crate::config::LsmConfig;
use crate::error::{Error, Result};
use crate::manifest::{level_dir, Manifest};
use crate::record;
use crate::segment::{self, SegmentMeta};

/// Segment count a level may hold before it overflows into the next.
fn level_capacity(level: usize) -> usize {
    10usize.checked_pow(level as u32).unwrap_or(usize::MAX)
}

/// Merge the whole young tier (plus overlapping level-1 segments) into
/// level 1, then cascade down the levels. No-op when the young tier is empty.
pub(crate) fn run(config: &LsmConfig, manifest: &mut Manifest) -> Result<()> {
    let young: Vec<SegmentMeta> = manifest.level(0).to_vec();
    if young.is_empty() {
        return Ok(());
    }

    tracing::info!(young = young.len(), "compacting young tier into level 1");
    merge_into_next(config, manifest, 0, &young)?;
    cascade(config, manifest)
}

/// Walk levels 1.. and merge each level's oldest overflow into the next
/// until every level is under capacity. Bounded by `max_levels`.
fn cascade(config: &LsmConfig, manifest: &mut Manifest) -> Result<()> {
    for level in 1..config.max_levels {
        let count = manifest.level(level).len();
        let capacity = level_capacity(level);
        if count <= capacity {
            break;
        }

        // Oldest first: manifest order is creation order.
        let take = count - capacity + 1;
        let victims: Vec<SegmentMeta> = manifest.level(level)[..take].to_vec();

        tracing::info!(
            level = level,
            count = count,
            capacity = capacity,
            merging = take,
            "level over capacity, cascading"
        );
        merge_into_next(config, manifest, level, &victims)?;
    }
    Ok(())
}

/// Merge `sources` (from `level`, in list order, later entries winning)
/// underneath with every overlapping segment of `level + 1`, write the
/// result as fresh segments into `level + 1`, then retire all inputs.
fn merge_into_next(
    config: &LsmConfig,
    manifest: &mut Manifest,
    level: usize,
    sources: &[SegmentMeta],
) -> Result<()> {
    let target = level + 1;

    // Newer data: sources applied oldest-first so later ones overwrite.
    let mut merged: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();
    let (mut min, mut max) = (sources[0].min_key.clone(), sources[0].max_key.clone());
    for meta in sources {
        merged.extend(load_segment(manifest, level, meta)?);
        if meta.min_key < min {
            min = meta.min_key.clone();
        }
        if meta.max_key > max {
            max = meta.max_key.clone();
        }
    }

    // Older data underneath: anything the sources wrote wins.
    let overlapping: Vec<SegmentMeta> = manifest
        .level(target)
        .iter()
        .filter(|meta| meta.overlaps(&min, &max))
        .cloned()
        .collect();
    let mut combined: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();
    for meta in &overlapping {
        combined.extend(load_segment(manifest, target, meta)?);
    }
    combined.extend(merged);

    let mut entries: Vec<(Vec<u8>, Vec<u8>)> = combined.into_iter().collect();
    entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));

    let target_dir = config.dir.join(level_dir(target));
    fs::create_dir_all(&target_dir)?;
    let metas = segment::write_segments(&target_dir, &entries, config.sst_max)?;
    let written = metas.len();
    for meta in metas {
        manifest.register(target, meta)?;
    }

    // Retire inputs only after their replacements are durably recorded.
    // Names are deduplicated so no file is ever removed twice.
    let mut retired: HashSet<String> = HashSet::new();
    for meta in sources {
        if retired.insert(meta.name.clone()) {
            manifest.remove(level, &meta.name)?;
        }
    }
    for meta in &overlapping {
        if retired.insert(meta.name.clone()) {
            manifest.remove(target, &meta.name)?;
        }
    }

    tracing::info!(
        from = level,
        to = target,
        consumed = retired.len(),
        produced = written,
        "compaction step complete"
    );
    Ok(())
}

fn load_segment(
    manifest: &Manifest,
    level: usize,
    meta: &SegmentMeta,
) -> Result<HashMap<Vec<u8>, Vec<u8>>> {
    let path = manifest.segment_path(level, &meta.name);
    match record::read_map(&path) {
        Err(Error::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(Error::SegmentMissing(meta.name.clone()))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> LsmConfig {
        // Tiny bounds so a handful of records spans several segments.
        LsmConfig::new(dir.path()).sst_max(32).young_merge_threshold(2)
    }

    fn write_young(config: &LsmConfig, manifest: &mut Manifest, entries: &[(&str, &str)]) {
        let young_dir = config.dir.join(level_dir(0));
        fs::create_dir_all(&young_dir).unwrap();
        let mut sorted: Vec<(Vec<u8>, Vec<u8>)> = entries
            .iter()
            .map(|(k, v)| (k.as_bytes().to_vec(), v.as_bytes().to_vec()))
            .collect();
        sorted.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        for meta in segment::write_segments(&young_dir, &sorted, config.sst_max).unwrap() {
            manifest.register(0, meta).unwrap();
        }
    }

    fn level_lookup(manifest: &Manifest, level: usize, key: &[u8]) -> Option<Vec<u8>> {
        for meta in manifest.level(level) {
            let map = record::read_map(&manifest.segment_path(level, &meta.name)).unwrap();
            if let Some(v) = map.get(key) {
                return Some(v.clone());
            }
        }
        None
    }

    #[test]
    fn test_level_capacity_powers_of_ten() {
        assert_eq!(level_capacity(1), 10);
        assert_eq!(level_capacity(2), 100);
        assert_eq!(level_capacity(3), 1000);
        // Saturates instead of overflowing for absurd levels.
        assert_eq!(level_capacity(40), usize::MAX);
    }

    #[test]
    fn test_young_merges_into_level1() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        let mut manifest = Manifest::load(&cfg).unwrap();

        write_young(&cfg, &mut manifest, &[("a", "1"), ("b", "2")]);
        write_young(&cfg, &mut manifest, &[("c", "3"), ("d", "4")]);

        run(&cfg, &mut manifest).unwrap();

        assert!(manifest.level(0).is_empty(), "young tier consumed");
        assert!(!manifest.level(1).is_empty());
        assert_eq!(level_lookup(&manifest, 1, b"a").unwrap(), b"1");
        assert_eq!(level_lookup(&manifest, 1, b"d").unwrap(), b"4");

        // Young files are gone from disk.
        let young_dir = cfg.dir.join(level_dir(0));
        assert_eq!(fs::read_dir(&young_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_newer_flush_wins_over_older() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        let mut manifest = Manifest::load(&cfg).unwrap();

        write_young(&cfg, &mut manifest, &[("k", "old")]);
        write_young(&cfg, &mut manifest, &[("k", "new")]);

        run(&cfg, &mut manifest).unwrap();
        assert_eq!(level_lookup(&manifest, 1, b"k").unwrap(), b"new");
    }

    #[test]
    fn test_young_wins_over_level1() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        let mut manifest = Manifest::load(&cfg).unwrap();

        // First round settles "k" into level 1.
        write_young(&cfg, &mut manifest, &[("k", "settled"), ("x", "1")]);
        run(&cfg, &mut manifest).unwrap();
        assert_eq!(level_lookup(&manifest, 1, b"k").unwrap(), b"settled");

        // Second round brings a younger value for the same key.
        write_young(&cfg, &mut manifest, &[("k", "fresh")]);
        run(&cfg, &mut manifest).unwrap();

        assert_eq!(level_lookup(&manifest, 1, b"k").unwrap(), b"fresh");
        // The untouched neighbour survives the rewrite.
        assert_eq!(level_lookup(&manifest, 1, b"x").unwrap(), b"1");
    }

    #[test]
    fn test_level1_ranges_non_overlapping() {
        let dir = TempDir::new().unwrap();
        // Bound small enough that the merged output spans several segments.
        let cfg = LsmConfig::new(dir.path()).sst_max(20).young_merge_threshold(2);
        let mut manifest = Manifest::load(&cfg).unwrap();

        // Overlapping young segments with enough data for several outputs.
        write_young(
            &cfg,
            &mut manifest,
            &[("apple", "1"), ("cherry", "2"), ("grape", "3")],
        );
        write_young(
            &cfg,
            &mut manifest,
            &[("banana", "4"), ("cherry", "5"), ("fig", "6")],
        );

        run(&cfg, &mut manifest).unwrap();

        let level1 = manifest.level(1);
        assert!(level1.len() > 1, "expected multiple level-1 segments");
        for a in 0..level1.len() {
            for b in a + 1..level1.len() {
                assert!(
                    !level1[a].overlaps(&level1[b].min_key, &level1[b].max_key),
                    "segments {} and {} overlap",
                    level1[a].name,
                    level1[b].name
                );
            }
        }

        // The duplicate key took the newer flush's value.
        assert_eq!(level_lookup(&manifest, 1, b"cherry").unwrap(), b"5");
    }

    #[test]
    fn test_cascade_moves_overflow_down() {
        let dir = TempDir::new().unwrap();
        // Capacity of level 1 is 10; single-record segments overflow fast.
        let cfg = LsmConfig::new(dir.path()).sst_max(1).young_merge_threshold(1);
        let mut manifest = Manifest::load(&cfg).unwrap();

        // Disjoint single-key young segments compact into single-record
        // level-1 segments, one per round.
        for i in 0..12 {
            let key = format!("key{:02}", i);
            write_young(&cfg, &mut manifest, &[(key.as_str(), "v")]);
            run(&cfg, &mut manifest).unwrap();
        }

        assert!(
            manifest.level(1).len() <= level_capacity(1),
            "level 1 stays under capacity"
        );
        assert!(!manifest.level(2).is_empty(), "overflow reached level 2");

        // Every record is still reachable from some level.
        for i in 0..12 {
            let key = format!("key{:02}", i);
            let found = level_lookup(&manifest, 1, key.as_bytes())
                .or_else(|| level_lookup(&manifest, 2, key.as_bytes()));
            assert!(found.is_some(), "{} lost in cascade", key);
        }
    }

    #[test]
    fn test_empty_young_is_noop() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        let mut manifest = Manifest::load(&cfg).unwrap();

        run(&cfg, &mut manifest).unwrap();
        assert_eq!(manifest.level_count(), 0);
    }

    #[test]
    fn test_missing_source_segment_errors() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        let mut manifest = Manifest::load(&cfg).unwrap();

        write_young(&cfg, &mut manifest, &[("a", "1")]);
        let name = manifest.level(0)[0].name.clone();
        fs::remove_file(manifest.segment_path(0, &name)).unwrap();

        assert!(matches!(
            run(&cfg, &mut manifest),
            Err(Error::SegmentMissing(_))
        ));
    }
}

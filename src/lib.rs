//! An embedded log-structured merge-tree key-value store.
//!
//! Writes land in a write-ahead log and an in-memory table; once the log
//! grows past a bound the table is flushed to sorted, immutable segment
//! files in a young tier. When the young tier fills up it is merged into
//! integer-indexed levels of non-overlapping segments, each level holding
//! ten times as many segments as the one above. A JSON manifest snapshot
//! records which segments exist after every structural change; the newest
//! snapshot is authoritative on open.
//!
//! The engine is synchronous and single-writer: one owner mutates the store
//! through `&mut self`, reads go through `&self`.
//!
//! ```no_run
//! use shaledb::LsmStore;
//!
//! # fn main() -> shaledb::Result<()> {
//! let mut store = LsmStore::open("./data")?;
//! store.put(b"name", b"ada")?;
//! assert_eq!(store.get(b"name")?, Some(b"ada".to_vec()));
//! store.delete(b"name")?;
//! assert_eq!(store.get(b"name")?, None);
//! store.close()?;
//! # Ok(())
//! # }
//! ```

mod compaction;
pub mod config;
pub mod error;
mod flush;
mod manifest;
mod memtable;
mod names;
mod record;
mod segment;
pub mod store;
mod wal;

pub use config::LsmConfig;
pub use error::{Error, Result};
pub use record::TOMBSTONE;
pub use store::LsmStore;

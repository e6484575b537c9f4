//! Engine Module
//!
//! The storage engine that owns the data file and the index.
//!
//! ## Responsibilities
//! - Rebuild the index from the data file on open
//! - Append puts and tombstones, then update the index
//! - Serve reads with one index lookup and one random-access read
//! - Compact the data file down to the live entries

use std::ffi::OsString;
use std::mem;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{CaskError, Result};
use crate::index::Index;
use crate::log::{check_key, Entry, LogFile, Recovery, RecoveryStats};

/// Suffix of the temporary file a compaction writes before the swap
const COMPACT_SUFFIX: &str = ".compact";

/// Outcome of a compaction pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionStats {
    /// Data file size before the rewrite
    pub bytes_before: u64,

    /// Data file size after the rewrite
    pub bytes_after: u64,

    /// Entries copied into the new file
    pub live_entries: u64,
}

/// State guarded by the engine lock
struct Inner {
    file: LogFile,
    index: Index,
}

/// The main storage engine
///
/// ## Concurrency Model
///
/// A single `Mutex` guards both the index and the data file. Every operation,
/// reads included, takes it. `get` reads the file at an offset taken from the
/// index, and compaction swaps the file and rewrites every offset, so a read
/// may never overlap a compaction.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Index + data file
    inner: Mutex<Inner>,
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Open/create the data file (parent directories included)
    /// 2. Replay it to rebuild the index
    /// 3. Compact (unless disabled in the config)
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        // Step 1: Open the data file
        let mut file = LogFile::open(&config.path, config.sync_strategy)?;

        // Step 2: Rebuild the index
        let mut index = Index::new();
        let stats = Recovery::replay(&mut file, &mut index)?;

        info!(
            path = %config.path.display(),
            entries = stats.entries_scanned,
            live_keys = stats.live_keys,
            "recovered data file"
        );

        let engine = Self {
            config,
            inner: Mutex::new(Inner { file, index }),
        };

        // Step 3: Compact
        if engine.config.compact_on_open {
            engine.compact()?;
        }

        Ok(engine)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data file
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::builder().path(path.as_ref()).build();
        Self::open(config)
    }

    /// Store `value` under `key`, superseding any previous value
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        check_key(key)?;
        let entry = Entry::new(Bytes::copy_from_slice(key), Bytes::copy_from_slice(value))?;

        let mut inner = self.inner.lock();
        let offset = inner.file.append(&entry)?;
        inner.index.set(key.to_vec(), offset);

        Ok(())
    }

    /// Whether `key` currently has a live value
    ///
    /// Oversized keys are reported as absent.
    pub fn exists(&self, key: &[u8]) -> bool {
        if check_key(key).is_err() {
            return false;
        }
        self.inner.lock().index.contains(key)
    }

    /// Fetch the live value for `key`
    pub fn get(&self, key: &[u8]) -> Result<Bytes> {
        check_key(key)?;

        let mut inner = self.inner.lock();
        let position = inner.index.locate(key).ok_or(CaskError::KeyNotFound)?;
        let entry = inner.file.read_position(position)?;
        debug_assert_eq!(entry.key().as_ref(), key);

        Ok(entry.into_value())
    }

    /// Delete `key` by appending a tombstone
    ///
    /// Fails with `KeyNotFound` if the key has no live value.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        check_key(key)?;

        let mut inner = self.inner.lock();
        if !inner.index.contains(key) {
            return Err(CaskError::KeyNotFound);
        }

        let tombstone = Entry::tombstone(Bytes::copy_from_slice(key))?;
        inner.file.append(&tombstone)?;
        inner.index.remove(key);

        Ok(())
    }

    /// Rewrite the data file so it holds only live entries
    ///
    /// Runs with the engine lock held for its whole duration.
    pub fn compact(&self) -> Result<CompactionStats> {
        let mut inner = self.inner.lock();
        self.compact_locked(&mut inner)
    }

    /// Compaction body (called with the engine lock held)
    ///
    /// Steps:
    /// 1. Create an empty file at `{path}.compact` with the next epoch
    /// 2. Copy every indexed entry, in ascending old offset order
    /// 3. Sync the new file and build a fresh index from it
    /// 4. Rename the new file over the database path
    /// 5. Install the new file and index together, then close the old file
    ///
    /// If steps 1-4 fail the temporary file is removed and the engine keeps
    /// serving from the old file with the index untouched. Nothing after the
    /// rename can fail, so the installed file and index always share an epoch.
    fn compact_locked(&self, inner: &mut Inner) -> Result<CompactionStats> {
        let bytes_before = inner.file.len();
        let compact_path = self.compact_path();

        // Steps 1-4
        let (new_file, new_index, replayed) = match self.write_compacted(inner, &compact_path) {
            Ok(parts) => parts,
            Err(e) => {
                if compact_path.exists() {
                    if let Err(remove_err) = std::fs::remove_file(&compact_path) {
                        warn!(error = %remove_err, path = %compact_path.display(), "failed to remove compaction file");
                    }
                }
                return Err(e);
            }
        };

        // Step 5
        let old_file = mem::replace(&mut inner.file, new_file);
        inner.index = new_index;
        if let Err(e) = old_file.close() {
            warn!(error = %e, "failed to close pre-compaction data file");
        }

        let stats = CompactionStats {
            bytes_before,
            bytes_after: inner.file.len(),
            live_entries: replayed.entries_scanned,
        };

        info!(
            path = %self.config.path.display(),
            bytes_before = stats.bytes_before,
            bytes_after = stats.bytes_after,
            live_entries = stats.live_entries,
            epoch = inner.file.epoch(),
            "compacted data file"
        );

        Ok(stats)
    }

    fn write_compacted(
        &self,
        inner: &mut Inner,
        compact_path: &Path,
    ) -> Result<(LogFile, Index, RecoveryStats)> {
        let next_epoch = inner.file.epoch() + 1;
        let mut new_file = LogFile::create(compact_path, self.config.sync_strategy, next_epoch)?;

        for offset in inner.index.sorted_offsets() {
            let entry = inner.file.read_at(offset)?.ok_or(CaskError::OffsetOutOfBounds {
                offset,
                len: inner.file.len(),
            })?;
            new_file.append(&entry)?;
        }

        new_file.sync()?;

        let mut new_index = Index::new();
        let replayed = Recovery::replay(&mut new_file, &mut new_index)?;

        if let Err(e) = new_file.rename_to(&self.config.path) {
            // The rename itself went through and only the directory sync
            // failed: the new file is already the database, so install it.
            if new_file.path() != self.config.path.as_path() {
                return Err(e);
            }
            warn!(error = %e, "compacted file renamed but directory sync failed");
        }

        Ok((new_file, new_index, replayed))
    }

    /// Close the engine, syncing the data file
    ///
    /// The index is dropped with the engine.
    pub fn close(self) -> Result<()> {
        let inner = self.inner.into_inner();
        inner.file.close()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the data file path
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.inner.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().index.is_empty()
    }

    /// Current size of the data file in bytes
    pub fn file_size(&self) -> u64 {
        self.inner.lock().file.len()
    }

    /// Generation of the current data file (bumped by each compaction)
    pub fn epoch(&self) -> u64 {
        self.inner.lock().file.epoch()
    }

    fn compact_path(&self) -> PathBuf {
        let mut name: OsString = self.config.path.clone().into_os_string();
        name.push(COMPACT_SUFFIX);
        PathBuf::from(name)
    }
}

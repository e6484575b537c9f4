//! Log Recovery
//!
//! Rebuilds the index by replaying the data file from offset 0.

use std::ops::ControlFlow;
use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::index::Index;

use super::LogFile;

/// Replays the data file into an index
pub struct Recovery;

/// Result of a replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Number of records read, live and tombstone
    pub entries_scanned: u64,

    /// Number of tombstones among them
    pub tombstones: u64,

    /// Keys left in the index once the replay finished
    pub live_keys: u64,

    /// Bytes consumed by the scan (equals file length on success)
    pub bytes_scanned: u64,
}

impl Recovery {
    /// Clear `index` and rebuild it from `file`
    ///
    /// Entries are applied in file order: a live entry sets the key's offset,
    /// a tombstone removes the key. Later records therefore always win. The
    /// index is tagged with the file's epoch.
    ///
    /// Any corrupted record aborts the replay with its error.
    pub fn replay(file: &mut LogFile, index: &mut Index) -> Result<RecoveryStats> {
        index.clear();
        index.set_epoch(file.epoch());

        let mut stats = RecoveryStats::default();
        file.scan(|entry, offset| {
            stats.entries_scanned += 1;
            stats.bytes_scanned += entry.encoded_len();
            if entry.is_tombstone() {
                stats.tombstones += 1;
                index.remove(entry.key());
            } else {
                index.set(entry.key().to_vec(), offset);
            }
            ControlFlow::Continue(())
        })?;
        stats.live_keys = index.len() as u64;

        debug!(
            path = %file.path().display(),
            entries = stats.entries_scanned,
            tombstones = stats.tombstones,
            live_keys = stats.live_keys,
            "replayed data file"
        );

        Ok(stats)
    }

    /// Check a data file without modifying it
    ///
    /// Performs the same scan as `replay` against a read-only handle and
    /// discards the resulting index.
    pub fn verify(path: &Path) -> Result<RecoveryStats> {
        let mut file = LogFile::open_read_only(path)?;
        let mut index = Index::new();
        Self::replay(&mut file, &mut index)
    }
}

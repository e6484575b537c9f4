//! Append-only data file
//!
//! Wraps the single file handle and tracks the end-of-file write offset.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use bytes::BytesMut;
use tracing::{debug, error, warn};

use crate::config::SyncStrategy;
use crate::error::{CaskError, Result};

use super::entry::{Entry, Header, HEADER_SIZE};

/// Location of an entry: the file generation plus the byte offset within it
///
/// Compaction replaces the file and bumps the epoch, so a position minted
/// before a compaction is rejected instead of being read from the new file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub epoch: u64,
    pub offset: u64,
}

/// The append-only data file
///
/// ## Invariant
/// `write_offset` always equals the file length. Appends land at
/// `write_offset` and advance it by the exact encoded size; existing bytes
/// are never rewritten.
pub struct LogFile {
    /// Current location on disk (changes when compaction renames the file)
    path: PathBuf,

    /// Read/append handle
    file: File,

    /// End of file, where the next append is placed
    write_offset: u64,

    /// File generation, bumped by every compaction
    epoch: u64,

    /// When to fsync after appends
    sync_strategy: SyncStrategy,

    /// Appends since the last fsync
    unsynced: usize,

    /// Set when a failed append could not be rolled back
    poisoned: bool,
}

impl LogFile {
    /// Open or create the data file at epoch 0
    pub fn open(path: &Path, sync_strategy: SyncStrategy) -> Result<Self> {
        Self::open_with_epoch(path, sync_strategy, 0)
    }

    /// Open or create the data file with an explicit generation number
    ///
    /// Creates parent directories as needed and positions the write offset
    /// at the current end of file.
    pub fn open_with_epoch(path: &Path, sync_strategy: SyncStrategy, epoch: u64) -> Result<Self> {
        if path.is_dir() {
            return Err(CaskError::PathIsDirectory {
                path: path.to_path_buf(),
            });
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;
        let write_offset = file.seek(SeekFrom::End(0))?;

        debug!(path = %path.display(), write_offset, epoch, "opened data file");

        Ok(Self {
            path: path.to_path_buf(),
            file,
            write_offset,
            epoch,
            sync_strategy,
            unsynced: 0,
            poisoned: false,
        })
    }

    /// Create an empty data file, discarding whatever is at `path`
    pub fn create(path: &Path, sync_strategy: SyncStrategy, epoch: u64) -> Result<Self> {
        if path.is_file() {
            warn!(path = %path.display(), "discarding existing file");
            fs::remove_file(path)?;
        }
        Self::open_with_epoch(path, sync_strategy, epoch)
    }

    /// Open an existing data file for reading only
    ///
    /// Appends through this handle fail with an I/O error.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        if path.is_dir() {
            return Err(CaskError::PathIsDirectory {
                path: path.to_path_buf(),
            });
        }

        let mut file = OpenOptions::new().read(true).open(path)?;
        let write_offset = file.seek(SeekFrom::End(0))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            write_offset,
            epoch: 0,
            sync_strategy: SyncStrategy::OsManaged,
            unsynced: 0,
            poisoned: false,
        })
    }

    // =========================================================================
    // Write Path
    // =========================================================================

    /// Append an entry and return the offset it starts at
    ///
    /// On failure the file is truncated back to the previous end so that a
    /// partial record never stays behind a live one. If that truncation also
    /// fails the file is poisoned: `RollbackFailed` is returned and every
    /// later append fails with `LogPoisoned`.
    pub fn append(&mut self, entry: &Entry) -> Result<u64> {
        if self.poisoned {
            return Err(CaskError::LogPoisoned {
                path: self.path.clone(),
            });
        }

        let bytes = entry.encode();
        let offset = self.write_offset;

        if let Err(e) = self.file.write_all(&bytes) {
            self.rollback(offset)?;
            return Err(e.into());
        }

        if let Err(e) = self.sync_after_append() {
            self.rollback(offset)?;
            return Err(e);
        }

        self.write_offset += bytes.len() as u64;
        Ok(offset)
    }

    fn sync_after_append(&mut self) -> Result<()> {
        self.unsynced += 1;
        let due = match self.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNEntries { count } => self.unsynced >= count,
            SyncStrategy::OsManaged => false,
        };
        if due {
            self.sync()?;
        }
        Ok(())
    }

    /// Cut the file back to `offset` after a failed append
    fn rollback(&mut self, offset: u64) -> Result<()> {
        let len = match self.file.metadata() {
            Ok(meta) => meta.len(),
            Err(source) => return Err(self.poison(offset, source)),
        };
        if len == offset {
            return Ok(());
        }

        warn!(path = %self.path.display(), offset, len, "append failed, truncating partial record");
        if let Err(source) = self.file.set_len(offset) {
            return Err(self.poison(offset, source));
        }
        Ok(())
    }

    fn poison(&mut self, offset: u64, source: io::Error) -> CaskError {
        error!(path = %self.path.display(), offset, error = %source, "could not roll back failed append");
        self.poisoned = true;
        CaskError::RollbackFailed { offset, source }
    }

    /// Flush file data to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Move the file on disk and keep using the same handle
    ///
    /// The destination directory is synced so the rename survives a crash.
    /// When only that sync fails the error is returned with `path()` already
    /// pointing at the new location.
    pub fn rename_to(&mut self, path: &Path) -> Result<()> {
        fs::rename(&self.path, path)?;
        debug!(from = %self.path.display(), to = %path.display(), "renamed data file");
        self.path = path.to_path_buf();
        sync_parent_dir(path)
    }

    /// Sync everything and release the handle
    pub fn close(self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    // =========================================================================
    // Read Path
    // =========================================================================

    /// Read the entry starting at `offset`
    ///
    /// Returns `Ok(None)` when `offset` is at or past the end of file.
    pub fn read_at(&mut self, offset: u64) -> Result<Option<Entry>> {
        if offset >= self.write_offset {
            return Ok(None);
        }

        self.file.seek(SeekFrom::Start(offset))?;
        let available = self.write_offset - offset;
        read_entry(&mut self.file, offset, available).map(Some)
    }

    /// Read the entry at `position`, rejecting positions from another epoch
    pub fn read_position(&mut self, position: Position) -> Result<Entry> {
        if position.epoch != self.epoch {
            return Err(CaskError::StaleOffset {
                expected_epoch: self.epoch,
                found_epoch: position.epoch,
                offset: position.offset,
            });
        }

        self.read_at(position.offset)?
            .ok_or(CaskError::OffsetOutOfBounds {
                offset: position.offset,
                len: self.write_offset,
            })
    }

    /// Visit every entry from offset 0 in file order
    ///
    /// The visitor receives each entry with its starting offset and may stop
    /// the scan early with `ControlFlow::Break`. The file cursor is left at
    /// end of file afterwards.
    pub fn scan<F>(&mut self, mut visit: F) -> Result<()>
    where
        F: FnMut(Entry, u64) -> ControlFlow<()>,
    {
        let len = self.write_offset;
        self.file.seek(SeekFrom::Start(0))?;

        let result = {
            let mut reader = BufReader::new(&self.file);
            let mut offset = 0;
            loop {
                if offset >= len {
                    break Ok(());
                }
                match read_entry(&mut reader, offset, len - offset) {
                    Ok(entry) => {
                        let size = entry.encoded_len();
                        if visit(entry, offset).is_break() {
                            break Ok(());
                        }
                        offset += size;
                    }
                    Err(e) => break Err(e),
                }
            }
        };

        self.file.seek(SeekFrom::End(0))?;
        result
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current length of the file (next append offset)
    pub fn len(&self) -> u64 {
        self.write_offset
    }

    pub fn is_empty(&self) -> bool {
        self.write_offset == 0
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Build a position in this file's epoch
    pub fn position(&self, offset: u64) -> Position {
        Position {
            epoch: self.epoch,
            offset,
        }
    }
}

/// Read one record whose header starts at `offset`, with `available` bytes
/// left in the file from there
fn read_entry<R: Read>(reader: &mut R, offset: u64, available: u64) -> Result<Entry> {
    let header_corrupted = |actual: usize| CaskError::HeaderCorrupted {
        offset,
        expected: HEADER_SIZE,
        actual,
    };

    if available < HEADER_SIZE as u64 {
        return Err(header_corrupted(available as usize));
    }

    let mut raw = [0u8; HEADER_SIZE];
    reader.read_exact(&mut raw).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => header_corrupted(0),
        _ => CaskError::Io(e),
    })?;
    let header = Header::from_bytes(&raw);

    let body_len = header.body_len();
    let remaining = available - HEADER_SIZE as u64;
    if remaining < body_len {
        return Err(CaskError::EntryCorrupted {
            offset,
            expected: body_len,
            actual: remaining,
        });
    }

    let mut body = BytesMut::zeroed(body_len as usize);
    reader.read_exact(&mut body).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => CaskError::EntryCorrupted {
            offset,
            expected: body_len,
            actual: 0,
        },
        _ => CaskError::Io(e),
    })?;

    Ok(Entry::from_parts(header, body.freeze()))
}

/// Fsync the directory holding `path` so a rename into it is durable
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    File::open(dir)?.sync_all()?;
    Ok(())
}

/// Directory handles cannot be synced here; the rename is left to the OS
#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> Result<()> {
    Ok(())
}

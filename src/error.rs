//! Error types for CaskDB
//!
//! Provides a unified error type for all operations. Variants carry the
//! context of the failing call (key length, file offset, byte counts).

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using CaskError
pub type Result<T> = std::result::Result<T, CaskError>;

/// Unified error type for CaskDB operations
#[derive(Debug, Error)]
pub enum CaskError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Path is a directory: {}", .path.display())]
    PathIsDirectory { path: PathBuf },

    #[error("Failed append left a partial record at offset {offset} that could not be truncated: {source}")]
    RollbackFailed {
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("Data file {} has an untruncated partial record; refusing further appends", .path.display())]
    LogPoisoned { path: PathBuf },

    // -------------------------------------------------------------------------
    // Argument Errors (raised before any I/O)
    // -------------------------------------------------------------------------
    #[error("Key too large: {len} bytes (max {})", u16::MAX)]
    KeyTooLarge { len: usize },

    #[error("Value too large: {len} bytes (max {})", u32::MAX)]
    ValueTooLarge { len: usize },

    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Log Corruption Errors
    // -------------------------------------------------------------------------
    #[error("Header corrupted at offset {offset}: expected {expected} bytes, got {actual}")]
    HeaderCorrupted {
        offset: u64,
        expected: usize,
        actual: usize,
    },

    #[error("Entry corrupted at offset {offset}: expected {expected} body bytes, got {actual}")]
    EntryCorrupted {
        offset: u64,
        expected: u64,
        actual: u64,
    },

    // -------------------------------------------------------------------------
    // Position Errors
    // -------------------------------------------------------------------------
    #[error("Stale offset {offset}: position from epoch {found_epoch}, file is at epoch {expected_epoch}")]
    StaleOffset {
        expected_epoch: u64,
        found_epoch: u64,
        offset: u64,
    },

    #[error("Offset {offset} out of bounds (file length {len})")]
    OffsetOutOfBounds { offset: u64, len: u64 },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CaskError {
    /// True for errors that indicate damaged bytes in the data file
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            CaskError::HeaderCorrupted { .. } | CaskError::EntryCorrupted { .. }
        )
    }
}

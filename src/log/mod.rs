//! Append-Only Log Module
//!
//! The single data file that holds every write the store has accepted.
//!
//! ## Responsibilities
//! - Encode entries into a fixed header plus key/value bytes
//! - Append entries and hand back their starting offset
//! - Random-access reads by offset
//! - Sequential replay from offset 0 to rebuild the index
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ Entry 1                                              │
//! │ ┌──────────────┬────────────┬───────────┬─────┬─────┐ │
//! │ │ ValueLen (4) │ KeyLen (2) │ Flags (2) │ Key │ Val │ │
//! │ └──────────────┴────────────┴───────────┴─────┴─────┘ │
//! ├──────────────────────────────────────────────────────┤
//! │ Entry 2                                              │
//! │ ┌──────────────┬────────────┬───────────┬─────┬─────┐ │
//! │ │ ValueLen (4) │ KeyLen (2) │ Flags (2) │ Key │ Val │ │
//! │ └──────────────┴────────────┴───────────┴─────┴─────┘ │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. Flags bit 0 marks a tombstone; the other
//! bits are written as zero. There is no magic, checksum or footer: record
//! boundaries come only from the length fields.

mod entry;
mod file;
mod recovery;

pub use entry::{
    check_key, Entry, Header, FLAG_TOMBSTONE, HEADER_SIZE, MAX_KEY_SIZE, MAX_VALUE_SIZE,
};
pub use file::{LogFile, Position};
pub use recovery::{Recovery, RecoveryStats};

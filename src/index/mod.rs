//! Index Module
//!
//! In-memory map from key to the offset of its latest live entry.
//!
//! ## Responsibilities
//! - Answer "where is the current value for this key" without touching disk
//! - Track which data file generation the offsets belong to
//!
//! ## Data Structure Choice
//! A `HashMap<Vec<u8>, u64>`: lookups are by exact key only and no ordering
//! is ever needed. Compaction sorts offsets itself when it copies entries.
//! The index holds integer offsets only, never references into the file.
//! It is not synchronized; the engine's lock guards it.

mod table;

pub use table::Index;

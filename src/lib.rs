//! # CaskDB
//!
//! A log-structured key-value store with:
//! - A single append-only data file
//! - An in-memory index from key to byte offset
//! - Crash recovery by sequential replay
//! - Compaction that rewrites the file down to the live entries
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Engine                              │
//! │        put / get / delete / exists / compact / close        │
//! │                  (one Mutex, all operations)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │    Index    │          │   LogFile   │
//!   │ key → offset│          │  (Append)   │
//!   └──────▲──────┘          └──────┬──────┘
//!          │                        │
//!          └──────── Recovery ◄─────┘
//!                 (replay from 0)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use caskdb::Engine;
//!
//! let engine = Engine::open_path("./data/cask.db")?;
//! engine.put(b"a", b"1")?;
//! assert_eq!(engine.get(b"a")?.as_ref(), b"1");
//! engine.delete(b"a")?;
//! assert!(!engine.exists(b"a"));
//! engine.close()?;
//! # Ok::<(), caskdb::CaskError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod log;
pub mod index;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CaskError, Result};
pub use config::{Config, SyncStrategy};
pub use engine::{CompactionStats, Engine};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of CaskDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

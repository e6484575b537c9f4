//! Tests for compaction
//!
//! These tests verify:
//! - Live state is identical before and after compaction
//! - File size shrinks to exactly the encoded live entries
//! - Epoch bump on every compaction
//! - Compaction on open (and opting out of it)
//! - Leftover temporary files from an interrupted compaction

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use bytes::Bytes;
use caskdb::config::{Config, SyncStrategy};
use caskdb::engine::Engine;
use caskdb::log::{Entry, Recovery};
use caskdb::CaskError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn db_path(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().join("compact.db")
}

fn compact_path(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().join("compact.db.compact")
}

fn open(path: &PathBuf, compact_on_open: bool) -> Engine {
    let config = Config::builder()
        .path(path)
        .sync_strategy(SyncStrategy::EveryWrite)
        .compact_on_open(compact_on_open)
        .build();
    Engine::open(config).unwrap()
}

fn encoded_len(key: &[u8], value: &[u8]) -> u64 {
    Entry::new(key.to_vec(), value.to_vec()).unwrap().encoded_len()
}

/// Apply a deterministic mix of puts, overwrites and deletes.
/// Returns the expected live state.
fn churn(engine: &Engine) -> HashMap<Vec<u8>, Vec<u8>> {
    let mut expected = HashMap::new();
    for round in 0..5 {
        for i in 0..50 {
            let key = format!("key{}", i).into_bytes();
            if (i + round) % 7 == 0 && expected.contains_key(&key) {
                engine.delete(&key).unwrap();
                expected.remove(&key);
            } else {
                let value = format!("value{}-{}", i, round).into_bytes();
                engine.put(&key, &value).unwrap();
                expected.insert(key, value);
            }
        }
    }
    expected
}

fn assert_state(engine: &Engine, expected: &HashMap<Vec<u8>, Vec<u8>>) {
    assert_eq!(engine.len(), expected.len());
    for i in 0..50 {
        let key = format!("key{}", i).into_bytes();
        match expected.get(&key) {
            Some(value) => {
                assert!(engine.exists(&key));
                assert_eq!(engine.get(&key).unwrap().as_ref(), &value[..]);
            }
            None => {
                assert!(!engine.exists(&key));
                assert!(matches!(engine.get(&key), Err(CaskError::KeyNotFound)));
            }
        }
    }
}

// =============================================================================
// Live State Tests
// =============================================================================

#[test]
fn test_compaction_preserves_live_state() {
    let temp_dir = TempDir::new().unwrap();
    let engine = open(&db_path(&temp_dir), true);
    let expected = churn(&engine);
    assert_state(&engine, &expected);

    engine.compact().unwrap();

    assert_state(&engine, &expected);
}

#[test]
fn test_compaction_size_equals_live_entries() {
    let temp_dir = TempDir::new().unwrap();
    let path = db_path(&temp_dir);
    let engine = open(&path, true);
    let expected = churn(&engine);
    let size_before = engine.file_size();

    let stats = engine.compact().unwrap();

    let live_size: u64 = expected.iter().map(|(k, v)| encoded_len(k, v)).sum();
    assert!(stats.bytes_after <= size_before);
    assert_eq!(stats.bytes_before, size_before);
    assert_eq!(stats.bytes_after, live_size);
    assert_eq!(stats.live_entries, expected.len() as u64);
    assert_eq!(engine.file_size(), live_size);
    assert_eq!(fs::metadata(&path).unwrap().len(), live_size);
}

#[test]
fn test_compaction_drops_tombstones() {
    let temp_dir = TempDir::new().unwrap();
    let path = db_path(&temp_dir);
    let engine = open(&path, true);
    engine.put(b"a", b"1").unwrap();
    engine.put(b"b", b"2").unwrap();
    engine.delete(b"a").unwrap();

    engine.compact().unwrap();
    engine.close().unwrap();

    let stats = Recovery::verify(&path).unwrap();
    assert_eq!(stats.entries_scanned, 1);
    assert_eq!(stats.tombstones, 0);
    assert_eq!(stats.live_keys, 1);
}

#[test]
fn test_compaction_of_empty_store() {
    let temp_dir = TempDir::new().unwrap();
    let engine = open(&db_path(&temp_dir), true);

    let stats = engine.compact().unwrap();

    assert_eq!(stats.bytes_after, 0);
    assert_eq!(stats.live_entries, 0);
    assert!(engine.is_empty());
}

#[test]
fn test_compaction_is_idempotent_on_size() {
    let temp_dir = TempDir::new().unwrap();
    let engine = open(&db_path(&temp_dir), true);
    churn(&engine);

    let first = engine.compact().unwrap();
    let second = engine.compact().unwrap();

    assert_eq!(second.bytes_before, first.bytes_after);
    assert_eq!(second.bytes_after, first.bytes_after);
}

#[test]
fn test_writes_after_compaction() {
    let temp_dir = TempDir::new().unwrap();
    let path = db_path(&temp_dir);
    {
        let engine = open(&path, true);
        engine.put(b"a", b"1").unwrap();
        engine.put(b"a", b"2").unwrap();
        engine.compact().unwrap();

        engine.put(b"b", b"3").unwrap();
        engine.delete(b"a").unwrap();
        engine.close().unwrap();
    }

    let engine = open(&path, false);

    assert!(!engine.exists(b"a"));
    assert_eq!(engine.get(b"b").unwrap(), Bytes::from_static(b"3"));
}

// =============================================================================
// Epoch Tests
// =============================================================================

#[test]
fn test_compaction_bumps_epoch() {
    let temp_dir = TempDir::new().unwrap();
    let engine = open(&db_path(&temp_dir), false);
    assert_eq!(engine.epoch(), 0);

    engine.compact().unwrap();
    engine.compact().unwrap();

    assert_eq!(engine.epoch(), 2);
}

#[test]
fn test_reads_resolve_against_new_epoch_after_each_compaction() {
    let temp_dir = TempDir::new().unwrap();
    let engine = open(&db_path(&temp_dir), false);
    let mut expected = churn(&engine);

    for round in 1..=3u64 {
        let stats = engine.compact().unwrap();

        assert_eq!(engine.epoch(), round);
        assert_eq!(stats.live_entries, expected.len() as u64);
        // A stale index would surface here as StaleOffset
        assert_state(&engine, &expected);

        let key = format!("key{}", round).into_bytes();
        let value = format!("after-compaction-{}", round).into_bytes();
        engine.put(&key, &value).unwrap();
        expected.insert(key, value);
        assert_state(&engine, &expected);
    }
}

#[test]
fn test_failed_compaction_keeps_serving_old_file() {
    let temp_dir = TempDir::new().unwrap();
    let engine = open(&db_path(&temp_dir), false);
    let mut expected = churn(&engine);
    let size_before = engine.file_size();

    // A directory squatting on the temporary path makes step 1 fail
    fs::create_dir(compact_path(&temp_dir)).unwrap();

    let result = engine.compact();

    assert!(matches!(result, Err(CaskError::PathIsDirectory { .. })));
    assert_eq!(engine.epoch(), 0);
    assert_eq!(engine.file_size(), size_before);
    assert_state(&engine, &expected);

    engine.put(b"key0", b"still-writable").unwrap();
    expected.insert(b"key0".to_vec(), b"still-writable".to_vec());
    assert_state(&engine, &expected);

    // Once the path is clear compaction succeeds and moves to the next epoch
    fs::remove_dir(compact_path(&temp_dir)).unwrap();
    engine.compact().unwrap();
    assert_eq!(engine.epoch(), 1);
    assert_state(&engine, &expected);
}

// =============================================================================
// Open-time Compaction Tests
// =============================================================================

#[test]
fn test_open_compacts_by_default() {
    let temp_dir = TempDir::new().unwrap();
    let path = db_path(&temp_dir);
    {
        let engine = open(&path, false);
        engine.put(b"k", b"v1").unwrap();
        engine.put(b"k", b"v2").unwrap();
        engine.put(b"gone", b"x").unwrap();
        engine.delete(b"gone").unwrap();
        engine.close().unwrap();
    }
    let size_before = fs::metadata(&path).unwrap().len();

    let engine = open(&path, true);

    assert_eq!(engine.epoch(), 1);
    assert_eq!(engine.file_size(), encoded_len(b"k", b"v2"));
    assert!(engine.file_size() < size_before);
    assert_eq!(engine.get(b"k").unwrap(), Bytes::from_static(b"v2"));
}

#[test]
fn test_open_without_compaction_keeps_history() {
    let temp_dir = TempDir::new().unwrap();
    let path = db_path(&temp_dir);
    {
        let engine = open(&path, false);
        engine.put(b"k", b"v1").unwrap();
        engine.put(b"k", b"v2").unwrap();
        engine.close().unwrap();
    }
    let size_before = fs::metadata(&path).unwrap().len();

    let engine = open(&path, false);

    assert_eq!(engine.epoch(), 0);
    assert_eq!(engine.file_size(), size_before);
}

// =============================================================================
// Temporary File Tests
// =============================================================================

#[test]
fn test_compaction_leaves_no_temporary_file() {
    let temp_dir = TempDir::new().unwrap();
    let engine = open(&db_path(&temp_dir), true);
    engine.put(b"a", b"1").unwrap();

    engine.compact().unwrap();

    assert!(!compact_path(&temp_dir).exists());
    assert!(db_path(&temp_dir).exists());
}

#[test]
fn test_leftover_compaction_file_is_discarded() {
    let temp_dir = TempDir::new().unwrap();
    let path = db_path(&temp_dir);
    {
        let engine = open(&path, true);
        engine.put(b"a", b"1").unwrap();
        engine.close().unwrap();
    }
    // Simulate a crash mid-compaction that left garbage behind
    fs::write(compact_path(&temp_dir), b"partial garbage from a crashed compaction").unwrap();

    let engine = open(&path, true);

    assert!(!compact_path(&temp_dir).exists());
    assert_eq!(engine.len(), 1);
    assert_eq!(engine.file_size(), encoded_len(b"a", b"1"));
    assert_eq!(engine.get(b"a").unwrap(), Bytes::from_static(b"1"));
}

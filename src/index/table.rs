//! Index implementation

use std::collections::HashMap;

use crate::log::Position;

/// Key → offset of the key's most recent live entry
#[derive(Debug, Default)]
pub struct Index {
    offsets: HashMap<Vec<u8>, u64>,

    /// Epoch of the data file these offsets point into
    epoch: u64,
}

impl Index {
    /// Create a new empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest offset for `key`, returning the one it supersedes
    pub fn set(&mut self, key: Vec<u8>, offset: u64) -> Option<u64> {
        self.offsets.insert(key, offset)
    }

    /// Forget `key`, returning its last offset
    pub fn remove(&mut self, key: &[u8]) -> Option<u64> {
        self.offsets.remove(key)
    }

    pub fn get(&self, key: &[u8]) -> Option<u64> {
        self.offsets.get(key).copied()
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.offsets.contains_key(key)
    }

    /// Offset of `key` tagged with this index's epoch
    pub fn locate(&self, key: &[u8]) -> Option<Position> {
        self.get(key).map(|offset| Position {
            epoch: self.epoch,
            offset,
        })
    }

    /// Drop every key (epoch is kept)
    pub fn clear(&mut self) {
        self.offsets.clear();
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn set_epoch(&mut self, epoch: u64) {
        self.epoch = epoch;
    }

    /// Iterate over `(key, offset)` pairs in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], u64)> + '_ {
        self.offsets.iter().map(|(key, &offset)| (key.as_slice(), offset))
    }

    /// All live offsets, ascending
    pub fn sorted_offsets(&self) -> Vec<u64> {
        let mut offsets: Vec<u64> = self.offsets.values().copied().collect();
        offsets.sort_unstable();
        offsets
    }
}

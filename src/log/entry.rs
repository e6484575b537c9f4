//! Log entry definitions
//!
//! Defines the fixed-size header and the encode/decode pair for a single
//! record in the data file.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CaskError, Result};

/// Header size: ValueLen (4) + KeyLen (2) + Flags (2) = 8 bytes
pub const HEADER_SIZE: usize = 8;

/// Largest key the 16-bit length field can describe
pub const MAX_KEY_SIZE: usize = u16::MAX as usize;

/// Largest value the 32-bit length field can describe
pub const MAX_VALUE_SIZE: usize = u32::MAX as usize;

/// Flags bit marking a deletion
pub const FLAG_TOMBSTONE: u16 = 1 << 0;

/// Reject keys the header cannot describe
pub fn check_key(key: &[u8]) -> Result<()> {
    if key.len() > MAX_KEY_SIZE {
        return Err(CaskError::KeyTooLarge { len: key.len() });
    }
    Ok(())
}

fn check_value(value: &[u8]) -> Result<()> {
    if value.len() > MAX_VALUE_SIZE {
        return Err(CaskError::ValueTooLarge { len: value.len() });
    }
    Ok(())
}

// =============================================================================
// Header
// =============================================================================

/// Fixed-width record header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub value_len: u32,
    pub key_len: u16,
    pub flags: u16,
}

impl Header {
    /// Parse a header from exactly `HEADER_SIZE` bytes
    pub fn from_bytes(raw: &[u8; HEADER_SIZE]) -> Self {
        let mut buf = &raw[..];
        Self {
            value_len: buf.get_u32_le(),
            key_len: buf.get_u16_le(),
            flags: buf.get_u16_le(),
        }
    }

    /// Parse a header, failing if the buffer is not exactly `HEADER_SIZE` wide
    ///
    /// `offset` is where `bytes` starts in the data file and is only used to
    /// label the error.
    pub fn decode(bytes: &[u8], offset: u64) -> Result<Self> {
        let raw: &[u8; HEADER_SIZE] = bytes.try_into().map_err(|_| CaskError::HeaderCorrupted {
            offset,
            expected: HEADER_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self::from_bytes(raw))
    }

    pub fn encode_to(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.value_len);
        buf.put_u16_le(self.key_len);
        buf.put_u16_le(self.flags);
    }

    /// Combined key + value length that follows the header
    pub fn body_len(&self) -> u64 {
        self.key_len as u64 + self.value_len as u64
    }

    /// Total on-disk size of the record this header describes
    pub fn entry_len(&self) -> u64 {
        HEADER_SIZE as u64 + self.body_len()
    }

    pub fn is_tombstone(&self) -> bool {
        self.flags & FLAG_TOMBSTONE != 0
    }
}

// =============================================================================
// Entry
// =============================================================================

/// A single record in the data file
///
/// Entries are built for one put/delete, appended, and dropped. They are only
/// read back by offset (get, compaction) or during a sequential replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    header: Header,
    key: Bytes,
    value: Bytes,
}

impl Entry {
    /// Build a live entry
    pub fn new(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Result<Self> {
        let key = key.into();
        let value = value.into();
        check_key(&key)?;
        check_value(&value)?;

        Ok(Self {
            header: Header {
                value_len: value.len() as u32,
                key_len: key.len() as u16,
                flags: 0,
            },
            key,
            value,
        })
    }

    /// Build a tombstone for `key` (empty value, delete bit set)
    pub fn tombstone(key: impl Into<Bytes>) -> Result<Self> {
        let key = key.into();
        check_key(&key)?;

        Ok(Self {
            header: Header {
                value_len: 0,
                key_len: key.len() as u16,
                flags: FLAG_TOMBSTONE,
            },
            key,
            value: Bytes::new(),
        })
    }

    /// Assemble an entry from a parsed header and its body bytes.
    /// The caller guarantees `body.len() == header.body_len()`.
    pub(crate) fn from_parts(header: Header, mut body: Bytes) -> Self {
        debug_assert_eq!(body.len() as u64, header.body_len());
        let key = body.split_to(header.key_len as usize);
        Self {
            header,
            key,
            value: body,
        }
    }

    /// Serialize as `header || key || value`
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len() as usize);
        self.header.encode_to(&mut buf);
        buf.put_slice(&self.key);
        buf.put_slice(&self.value);
        buf.freeze()
    }

    /// Parse one complete record
    ///
    /// Fails with `HeaderCorrupted` when fewer than `HEADER_SIZE` bytes are
    /// supplied, and with `EntryCorrupted` when the body length does not match
    /// what the header declares. Both errors carry `offset`, the position of
    /// `bytes` in the data file.
    pub fn decode(bytes: &[u8], offset: u64) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(CaskError::HeaderCorrupted {
                offset,
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }
        let header = Header::decode(&bytes[..HEADER_SIZE], offset)?;
        let body = &bytes[HEADER_SIZE..];
        if body.len() as u64 != header.body_len() {
            return Err(CaskError::EntryCorrupted {
                offset,
                expected: header.body_len(),
                actual: body.len() as u64,
            });
        }
        Ok(Self::from_parts(header, Bytes::copy_from_slice(body)))
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn key(&self) -> &Bytes {
        &self.key
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    pub fn into_value(self) -> Bytes {
        self.value
    }

    pub fn is_tombstone(&self) -> bool {
        self.header.is_tombstone()
    }

    /// On-disk size: header + key + value
    pub fn encoded_len(&self) -> u64 {
        self.header.entry_len()
    }
}

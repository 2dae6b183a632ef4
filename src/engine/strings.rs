//! Interned string table
//!
//! Entries are `u16` length-prefixed UTF-8. In eager mode every entry is
//! decoded while opening; in lazy mode only the entry offsets are recorded
//! and text is decoded on first request. Either way a decoded string is
//! cached for the lifetime of the file.

use crate::config::StringMode;
use crate::cursor::BinaryCursor;
use crate::error::{NxError, Result};
use crate::header::Header;
use crate::reader::{Reader, SharedReader};
use crate::stats::Counters;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

pub(crate) struct StringTable {
    mode: StringMode,

    /// Start of each entry's length prefix (lazy mode only)
    offsets: Vec<u64>,

    /// Decoded strings
    slots: Box<[OnceLock<Arc<str>>]>,
}

impl StringTable {
    /// Read the table described by `header`
    pub fn build(
        cursor: &mut BinaryCursor,
        header: &Header,
        mode: StringMode,
        counters: &Counters,
    ) -> Result<Self> {
        let count = header.string_count as usize;
        let slots: Box<[OnceLock<Arc<str>>]> = (0..count).map(|_| OnceLock::new()).collect();

        cursor.seek(header.string_offset)?;

        let mut offsets = Vec::new();
        match mode {
            StringMode::Eager => {
                for (id, slot) in slots.iter().enumerate() {
                    let bytes = cursor.read_prefixed_bytes()?;
                    slot.get_or_init(|| decode(id, bytes));
                    counters.string_decoded();
                }
            }
            StringMode::Lazy => {
                offsets.reserve_exact(count);
                let mut offset = header.string_offset;
                for _ in 0..count {
                    let len = cursor.read_u16()?;
                    offsets.push(offset);
                    cursor.skip(len as usize)?;
                    offset += len as u64 + 2;
                }
            }
        }

        debug!("Built {:?} string table with {} entries", mode, count);

        Ok(StringTable {
            mode,
            offsets,
            slots,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn mode(&self) -> StringMode {
        self.mode
    }

    /// Already decoded string, without locking
    pub fn cached(&self, id: u32) -> Result<Option<Arc<str>>> {
        Ok(self.slot(id)?.get().cloned())
    }

    /// Get a string, taking the file lock only if it still has to be decoded
    pub fn get(&self, id: u32, lock: &SharedReader, counters: &Counters) -> Result<Arc<str>> {
        if let Some(s) = self.cached(id)? {
            return Ok(s);
        }
        let mut reader = lock.lock();
        self.get_locked(id, &mut reader, counters)
    }

    /// Get a string while the caller already holds the file lock
    ///
    /// The cursor position is restored afterwards, so this is safe to call
    /// in the middle of a sequential read.
    pub fn get_locked(&self, id: u32, reader: &mut Reader, counters: &Counters) -> Result<Arc<str>> {
        let slot = self.slot(id)?;
        if let Some(s) = slot.get() {
            return Ok(s.clone());
        }

        let offset = self
            .offsets
            .get(id as usize)
            .copied()
            .ok_or_else(|| NxError::NotFound(format!("string {}", id)))?;

        let cursor = reader.data()?;
        let saved = cursor.position();
        let read = cursor
            .seek(offset)
            .and_then(|_| cursor.read_prefixed_bytes());
        cursor.seek(saved)?;
        let bytes = read?;

        counters.string_decoded();
        Ok(slot.get_or_init(|| decode(id as usize, bytes)).clone())
    }

    fn slot(&self, id: u32) -> Result<&OnceLock<Arc<str>>> {
        self.slots
            .get(id as usize)
            .ok_or_else(|| NxError::NotFound(format!("string {}", id)))
    }
}

/// Strict UTF-8 decode; invalid entries become the empty string
fn decode(id: usize, bytes: Vec<u8>) -> Arc<str> {
    match String::from_utf8(bytes) {
        Ok(s) => Arc::from(s),
        Err(e) => {
            warn!("String {} is not valid UTF-8 ({}), using empty string", id, e.utf8_error());
            Arc::from("")
        }
    }
}

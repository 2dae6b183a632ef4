//! Blob offset tables
//!
//! Bitmaps and audio clips are addressed through a table of absolute `u64`
//! file offsets, one per blob id. A table is read the first time one of its
//! blobs is requested and kept for the lifetime of the file.

use crate::error::{NxError, Result};
use crate::reader::SharedReader;
use crate::stats::Counters;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Which blob table an id refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobKind {
    Bitmap,
    Audio,
}

impl fmt::Display for BlobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobKind::Bitmap => write!(f, "bitmap"),
            BlobKind::Audio => write!(f, "audio"),
        }
    }
}

pub(crate) struct OffsetTable {
    kind: BlobKind,
    count: u32,
    start: u64,
    offsets: OnceLock<Box<[u64]>>,
}

impl OffsetTable {
    pub fn new(kind: BlobKind, count: u32, start: u64) -> Self {
        OffsetTable {
            kind,
            count,
            start,
            offsets: OnceLock::new(),
        }
    }

    pub fn is_built(&self) -> bool {
        self.offsets.get().is_some()
    }

    /// Absolute file offset of blob `id`
    ///
    /// The bounds check rejects `id > count`, matching existing readers of
    /// the format; `id == count` passes it but has no table entry and is
    /// reported as missing as well.
    pub fn get(&self, id: u32, lock: &SharedReader, counters: &Counters) -> Result<u64> {
        if self.count == 0 || id > self.count {
            return Err(self.missing(id));
        }
        self.ensure(lock, counters)?
            .get(id as usize)
            .copied()
            .ok_or_else(|| self.missing(id))
    }

    fn ensure(&self, lock: &SharedReader, counters: &Counters) -> Result<&[u64]> {
        if let Some(offsets) = self.offsets.get() {
            return Ok(&offsets[..]);
        }

        let mut reader = lock.lock();
        if let Some(offsets) = self.offsets.get() {
            return Ok(&offsets[..]);
        }

        let cursor = reader.data()?;
        cursor.seek(self.start)?;
        let offsets = (0..self.count)
            .map(|_| cursor.read_u64())
            .collect::<Result<Box<[u64]>>>()?;

        debug!("Built {} offset table with {} entries", self.kind, self.count);
        counters.offset_table_built();
        Ok(&self.offsets.get_or_init(|| offsets)[..])
    }

    fn missing(&self, id: u32) -> NxError {
        NxError::NotFound(format!("{} {} (table holds {})", self.kind, id, self.count))
    }
}

/// Offset table plus an optional per-id cache of decoded payloads
pub(crate) struct BlobStore<T: ?Sized> {
    table: OffsetTable,
    cache: Option<Box<[OnceLock<Arc<T>>]>>,
}

impl<T: ?Sized> BlobStore<T> {
    pub fn new(kind: BlobKind, count: u32, start: u64, cache: bool) -> Self {
        let cache = cache.then(|| (0..count).map(|_| OnceLock::new()).collect());
        BlobStore {
            table: OffsetTable::new(kind, count, start),
            cache,
        }
    }

    pub fn table(&self) -> &OffsetTable {
        &self.table
    }

    /// Cached payload for `id`, if caching is enabled and it was decoded
    pub fn cached(&self, id: u32) -> Option<Arc<T>> {
        self.cache
            .as_ref()
            .and_then(|cache| cache.get(id as usize))
            .and_then(|slot| slot.get().cloned())
    }

    /// Remember a decoded payload; returns the cached instance
    pub fn store(&self, id: u32, value: Arc<T>) -> Arc<T> {
        match self.cache.as_ref().and_then(|cache| cache.get(id as usize)) {
            Some(slot) => slot.get_or_init(|| value).clone(),
            None => value,
        }
    }
}

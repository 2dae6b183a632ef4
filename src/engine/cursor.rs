//! Little-endian, seekable cursor over an NX byte region
//!
//! The cursor owns its backing bytes (a read-only mapping or an owned
//! buffer) and a single read position. It is not synchronized: every
//! multi-step read must happen while the owning file's lock is held.

use crate::error::{NxError, Result};
use memmap2::Mmap;
use std::ops::Deref;

/// Bytes a cursor reads from
pub enum Backing {
    /// Read-only memory mapping of the file
    Mapped(Mmap),
    /// Owned buffer (in-memory images, preloaded node table)
    Owned(Vec<u8>),
}

impl Deref for Backing {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Backing::Mapped(map) => map,
            Backing::Owned(buf) => buf,
        }
    }
}

impl std::fmt::Debug for Backing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backing::Mapped(map) => write!(f, "Mapped({} bytes)", map.len()),
            Backing::Owned(buf) => write!(f, "Owned({} bytes)", buf.len()),
        }
    }
}

/// Seekable little-endian reader
#[derive(Debug)]
pub struct BinaryCursor {
    data: Backing,
    pos: usize,
}

macro_rules! read_le {
    ($name:ident, $ty:ty) => {
        #[doc = concat!("Read a little-endian `", stringify!($ty), "`")]
        #[inline]
        pub fn $name(&mut self) -> Result<$ty> {
            Ok(<$ty>::from_le_bytes(self.array()?))
        }
    };
}

impl BinaryCursor {
    /// Create a cursor positioned at offset 0
    pub fn new(data: Backing) -> Self {
        BinaryCursor { data, pos: 0 }
    }

    /// Total length of the region
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the region is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current read position
    pub fn position(&self) -> u64 {
        self.pos as u64
    }

    /// Whole backing region, independent of the position
    pub fn buffer(&self) -> &[u8] {
        &self.data
    }

    /// Move to an absolute offset
    ///
    /// Seeking to exactly the end of the region is allowed; any read from
    /// there fails with [`NxError::Truncated`].
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        match usize::try_from(offset) {
            Ok(pos) if pos <= self.data.len() => {
                self.pos = pos;
                Ok(())
            }
            _ => Err(NxError::OutOfRange(offset)),
        }
    }

    /// Advance the position by `n` bytes
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    /// Borrow the next `len` bytes and advance past them
    fn take(&mut self, len: usize) -> Result<&[u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(NxError::Truncated {
                offset: self.pos as u64,
                len: len as u64,
            })?;
        let start = self.pos;
        self.pos = end;
        Ok(&self.data[start..end])
    }

    #[inline]
    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    read_le!(read_u8, u8);
    read_le!(read_i8, i8);
    read_le!(read_u16, u16);
    read_le!(read_i16, i16);
    read_le!(read_u32, u32);
    read_le!(read_i32, i32);
    read_le!(read_u64, u64);
    read_le!(read_i64, i64);
    read_le!(read_f32, f32);
    read_le!(read_f64, f64);

    /// Read `len` raw bytes
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        Ok(self.take(len)?.to_vec())
    }

    /// Read `len` bytes as strict UTF-8
    pub fn read_utf8(&mut self, len: usize) -> Result<String> {
        let offset = self.pos;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|e| NxError::Decode(format!("at offset {}: {}", offset, e)))
    }

    /// Read a `u16` length prefix followed by that many raw bytes
    pub fn read_prefixed_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_u16()?;
        self.read_bytes(len as usize)
    }

    /// Read a `u16`-length-prefixed strict UTF-8 string
    pub fn read_prefixed_string(&mut self) -> Result<String> {
        let len = self.read_u16()?;
        self.read_utf8(len as usize)
    }
}

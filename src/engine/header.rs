use crate::cursor::BinaryCursor;
use crate::error::{NxError, Result};
use serde::{Deserialize, Serialize};

pub const MAGIC: [u8; 4] = *b"PKG3";

/// Size of the fixed header record in bytes
pub const HEADER_SIZE: usize = 52;

/// NX file header
///
/// Fixed record at offset 0 locating the node table and the three
/// auxiliary tables. All fields are little-endian.
///
/// ```text
/// [0x00] magic          "PKG3"
/// [0x04] node_count     u32
/// [0x08] node_offset    u64
/// [0x10] string_count   u32
/// [0x14] string_offset  u64
/// [0x1C] bitmap_count   u32
/// [0x20] bitmap_offset  u64
/// [0x28] audio_count    u32
/// [0x2C] audio_offset   u64
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Magic number: "PKG3"
    pub magic: [u8; 4],

    /// Number of 20-byte node records
    pub node_count: u32,

    /// Absolute offset of the node table
    pub node_offset: u64,

    /// Number of interned strings
    pub string_count: u32,

    /// Absolute offset of the string table
    pub string_offset: u64,

    /// Number of bitmap blobs
    pub bitmap_count: u32,

    /// Absolute offset of the bitmap offset table
    pub bitmap_offset: u64,

    /// Number of audio blobs
    pub audio_count: u32,

    /// Absolute offset of the audio offset table
    pub audio_offset: u64,
}

impl Header {
    /// Parse the header from the start of the region
    pub fn parse(cursor: &mut BinaryCursor) -> Result<Self> {
        cursor.seek(0)?;

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&cursor.read_bytes(4)?);
        if magic != MAGIC {
            return Err(NxError::InvalidFormat(format!(
                "bad magic {:?}, expected \"PKG3\"",
                String::from_utf8_lossy(&magic)
            )));
        }

        Ok(Header {
            magic,
            node_count: cursor.read_u32()?,
            node_offset: cursor.read_u64()?,
            string_count: cursor.read_u32()?,
            string_offset: cursor.read_u64()?,
            bitmap_count: cursor.read_u32()?,
            bitmap_offset: cursor.read_u64()?,
            audio_count: cursor.read_u32()?,
            audio_offset: cursor.read_u64()?,
        })
    }

    /// Byte length of the node table
    pub fn node_table_len(&self) -> u64 {
        self.node_count as u64 * crate::node::NODE_SIZE as u64
    }

    /// Check that every table fits in a region of `len` bytes
    ///
    /// Strings are counted at their minimum size (the `u16` length prefix),
    /// so a passing header can still hold a truncated string table. Empty
    /// tables are not checked.
    pub fn validate(&self, len: u64) -> Result<()> {
        let tables = [
            ("node", self.node_count, self.node_offset, crate::node::NODE_SIZE as u64),
            ("string", self.string_count, self.string_offset, 2),
            ("bitmap", self.bitmap_count, self.bitmap_offset, 8),
            ("audio", self.audio_count, self.audio_offset, 8),
        ];
        for (table, count, offset, entry) in tables {
            if count == 0 {
                continue;
            }
            let fits = offset
                .checked_add(count as u64 * entry)
                .is_some_and(|end| end <= len);
            if !fits {
                return Err(NxError::InvalidFormat(format!(
                    "{} table of {} entries at offset {} exceeds {} byte file",
                    table, count, offset, len
                )));
            }
        }
        Ok(())
    }
}

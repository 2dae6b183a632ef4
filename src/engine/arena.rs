//! Node arena
//!
//! Decoded nodes are stored by record index, so a [`NodeId`] is both the
//! node's position in the on-disk table and its handle here. Storage is
//! split into fixed-size chunks allocated on first touch: a file with
//! millions of records only pays for the regions that were visited.
//!
//! Slots are write-once ([`OnceLock`]), so reading a materialized node never
//! takes the file lock.

use crate::error::{NxError, Result};
use crate::node::{NodeEntry, NodeId};
use std::sync::OnceLock;

const CHUNK_SIZE: usize = 1024;

type Chunk = Box<[OnceLock<NodeEntry>]>;

pub(crate) struct NodeArena {
    chunks: Box<[OnceLock<Chunk>]>,
    len: u32,
}

impl NodeArena {
    pub fn new(len: u32) -> Self {
        let chunk_count = (len as usize).div_ceil(CHUNK_SIZE);
        NodeArena {
            chunks: (0..chunk_count).map(|_| OnceLock::new()).collect(),
            len,
        }
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    /// Slot for `id`, allocating its chunk if needed
    pub fn slot(&self, id: NodeId) -> Result<&OnceLock<NodeEntry>> {
        if id.0 >= self.len {
            return Err(NxError::OutOfRange(id.0 as u64));
        }
        let index = id.0 as usize;
        let chunk = self.chunks[index / CHUNK_SIZE]
            .get_or_init(|| (0..CHUNK_SIZE).map(|_| OnceLock::new()).collect());
        Ok(&chunk[index % CHUNK_SIZE])
    }

    /// Node `id` if it has been decoded
    pub fn get(&self, id: NodeId) -> Option<&NodeEntry> {
        let index = id.0 as usize;
        self.chunks
            .get(index / CHUNK_SIZE)?
            .get()?
            .get(index % CHUNK_SIZE)?
            .get()
    }

    /// Number of chunks allocated so far
    pub fn chunks_allocated(&self) -> usize {
        self.chunks.iter().filter(|c| c.get().is_some()).count()
    }
}

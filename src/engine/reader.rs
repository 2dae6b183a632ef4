//! Cursor state guarded by the file lock
//!
//! An NX file has one logical read position. [`Reader`] holds the cursor
//! over the whole file plus, when the node table was preloaded, a second
//! cursor over that private copy. Both live behind one
//! [`parking_lot::Mutex`]; nested steps (a child decode resolving a lazy
//! string) receive the held guard as `&mut Reader` instead of locking again.

use crate::cursor::{Backing, BinaryCursor};
use crate::error::{NxError, Result};
use crate::header::Header;
use crate::node::{NodeId, NODE_SIZE};
use parking_lot::Mutex;

pub(crate) type SharedReader = Mutex<Reader>;

#[derive(Debug)]
pub(crate) struct Reader {
    /// Cursor over the whole file; `None` once closed
    data: Option<BinaryCursor>,

    /// Cursor over the preloaded node table (not in low-memory mode)
    nodes: Option<BinaryCursor>,

    node_offset: u64,
    node_count: u32,
}

impl Reader {
    pub fn new(data: BinaryCursor, header: &Header) -> Self {
        Reader {
            data: Some(data),
            nodes: None,
            node_offset: header.node_offset,
            node_count: header.node_count,
        }
    }

    /// Copy the node table out of the file so node decoding gets its own
    /// cursor
    pub fn preload_nodes(&mut self) -> Result<usize> {
        let len = self.node_count as u64 * NODE_SIZE as u64;
        let len = usize::try_from(len).map_err(|_| NxError::OutOfRange(len))?;
        let node_offset = self.node_offset;

        let data = self.data()?;
        data.seek(node_offset)?;
        let table = data.read_bytes(len)?;

        self.nodes = Some(BinaryCursor::new(Backing::Owned(table)));
        Ok(len)
    }

    /// Cursor over the whole file
    pub fn data(&mut self) -> Result<&mut BinaryCursor> {
        self.data.as_mut().ok_or(NxError::Closed)
    }

    /// Cursor positioned at the start of node record `id`
    pub fn node_stream(&mut self, id: NodeId) -> Result<&mut BinaryCursor> {
        if id.0 >= self.node_count {
            return Err(NxError::OutOfRange(id.0 as u64));
        }
        let relative = id.0 as u64 * NODE_SIZE as u64;

        let node_offset = self.node_offset;
        let data = self.data.as_mut().ok_or(NxError::Closed)?;
        match self.nodes.as_mut() {
            Some(nodes) => {
                nodes.seek(relative)?;
                Ok(nodes)
            }
            None => {
                data.seek(node_offset + relative)?;
                Ok(data)
            }
        }
    }

    /// Drop both cursors, releasing the mapping
    pub fn close(&mut self) {
        self.nodes = None;
        self.data = None;
    }
}

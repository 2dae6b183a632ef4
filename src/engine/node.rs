//! Node records and the navigable node view
//!
//! ## Record layout (20 bytes)
//! ```text
//! [0x00] name_id      u32   string table id
//! [0x04] child_count  u16
//! [0x06] type         u16
//! [0x08] payload      8 bytes, layout depends on type
//! [0x10] first_child  u32   record index of the first child
//! ```
//!
//! `first_child` trails the typed payload, so a node's kind is known before
//! the location of its subtree. Children of a node are stored as
//! `child_count` consecutive records starting at `first_child`.
//!
//! | type | payload               | kind                |
//! |------|-----------------------|---------------------|
//! | 0    | unused                | [`NodeKind::Empty`] |
//! | 1    | u32 value, 4 unused   | [`NodeKind::Integer`] |
//! | 2    | f64 value             | [`NodeKind::Double`] |
//! | 3    | i32 string id, 4 unused | [`NodeKind::String`] |
//! | 4    | i32 x, i32 y          | [`NodeKind::Vector`] |
//! | 5    | i32 bitmap id, 4 unused | [`NodeKind::Bitmap`] |
//! | 6    | i32 audio id, 4 unused  | [`NodeKind::Audio`] |
//! | other | skipped              | [`NodeKind::Unknown`] |

use crate::blob::Bitmap;
use crate::cursor::BinaryCursor;
use crate::error::{NxError, Result};
use crate::file::NxFile;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::warn;

/// Size of one node record in bytes
pub const NODE_SIZE: usize = 20;

/// Record index of the root node
pub const ROOT: NodeId = NodeId(0);

/// Handle to a node: its record index in the node table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Typed payload of a node
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeKind {
    Empty,
    Integer(u32),
    Double(f64),
    /// String table id
    String(i32),
    Vector(i32, i32),
    /// Bitmap table id
    Bitmap(i32),
    /// Audio table id
    Audio(i32),
    /// Unrecognized type tag; payload skipped
    Unknown(u16),
}

impl NodeKind {
    /// On-disk type tag
    pub fn type_tag(&self) -> u16 {
        match self {
            NodeKind::Empty => 0,
            NodeKind::Integer(_) => 1,
            NodeKind::Double(_) => 2,
            NodeKind::String(_) => 3,
            NodeKind::Vector(..) => 4,
            NodeKind::Bitmap(_) => 5,
            NodeKind::Audio(_) => 6,
            NodeKind::Unknown(tag) => *tag,
        }
    }
}

/// One decoded 20-byte record, before its name is resolved
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeRecord {
    pub name_id: u32,
    pub child_count: u16,
    pub kind: NodeKind,
    pub first_child: u32,
}

impl NodeRecord {
    /// Decode the record at the cursor position
    pub fn read(cursor: &mut BinaryCursor) -> Result<Self> {
        let name_id = cursor.read_u32()?;
        let child_count = cursor.read_u16()?;
        let tag = cursor.read_u16()?;

        let kind = match tag {
            0 => {
                cursor.skip(8)?;
                NodeKind::Empty
            }
            1 => {
                let value = cursor.read_u32()?;
                cursor.skip(4)?;
                NodeKind::Integer(value)
            }
            2 => NodeKind::Double(cursor.read_f64()?),
            3 => {
                let id = cursor.read_i32()?;
                cursor.skip(4)?;
                NodeKind::String(id)
            }
            4 => {
                let x = cursor.read_i32()?;
                let y = cursor.read_i32()?;
                NodeKind::Vector(x, y)
            }
            5 => {
                let id = cursor.read_i32()?;
                cursor.skip(4)?;
                NodeKind::Bitmap(id)
            }
            6 => {
                let id = cursor.read_i32()?;
                cursor.skip(4)?;
                NodeKind::Audio(id)
            }
            other => {
                warn!("Unknown node type {} (name id {})", other, name_id);
                cursor.skip(8)?;
                NodeKind::Unknown(other)
            }
        };

        // Attached after the payload: the subtree location comes last
        let first_child = cursor.read_u32()?;

        Ok(NodeRecord {
            name_id,
            child_count,
            kind,
            first_child,
        })
    }
}

/// Children of one node: ordered, keyed by name
///
/// A repeated name keeps its first position and points at the last record
/// carrying it.
#[derive(Debug, Default)]
pub(crate) struct ChildMap {
    order: Vec<NodeId>,
    index: HashMap<Arc<str>, usize>,
}

impl ChildMap {
    pub fn with_capacity(n: usize) -> Self {
        ChildMap {
            order: Vec::with_capacity(n),
            index: HashMap::with_capacity(n),
        }
    }

    pub fn insert(&mut self, name: Arc<str>, id: NodeId) {
        match self.index.get(&name) {
            Some(&pos) => self.order[pos] = id,
            None => {
                self.index.insert(name, self.order.len());
                self.order.push(id);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).map(|&pos| self.order[pos])
    }

    pub fn ids(&self) -> &[NodeId] {
        &self.order
    }
}

/// Stored node: shared envelope plus kind
pub(crate) struct NodeEntry {
    pub name: Arc<str>,
    pub parent: Option<NodeId>,
    pub child_count: u16,
    pub first_child: u32,
    pub kind: NodeKind,
    pub children: OnceLock<ChildMap>,
}

impl NodeEntry {
    pub fn new(name: Arc<str>, parent: Option<NodeId>, record: NodeRecord) -> Self {
        NodeEntry {
            name,
            parent,
            child_count: record.child_count,
            first_child: record.first_child,
            kind: record.kind,
            children: OnceLock::new(),
        }
    }
}

/// Resolved value of a node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeValue {
    None,
    Integer(u32),
    Double(f64),
    String(Arc<str>),
    Vector(i32, i32),
    Bitmap(Arc<Bitmap>),
    Audio(Arc<[u8]>),
}

/// Borrowed view of a decoded node
#[derive(Clone, Copy)]
pub struct Node<'a> {
    file: &'a NxFile,
    id: NodeId,
    entry: &'a NodeEntry,
}

impl<'a> Node<'a> {
    pub(crate) fn new(file: &'a NxFile, id: NodeId, entry: &'a NodeEntry) -> Self {
        Node { file, id, entry }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &'a str {
        &self.entry.name
    }

    pub fn kind(&self) -> NodeKind {
        self.entry.kind
    }

    pub fn child_count(&self) -> u16 {
        self.entry.child_count
    }

    /// Record index of the first child
    pub fn first_child(&self) -> NodeId {
        NodeId(self.entry.first_child)
    }

    pub fn file(&self) -> &'a NxFile {
        self.file
    }

    /// Parent node; `None` for the root
    pub fn parent(&self) -> Option<Node<'a>> {
        self.entry.parent.and_then(|id| self.file.node(id))
    }

    /// Slash-separated names from below the root down to this node
    pub fn path(&self) -> String {
        let mut names = Vec::new();
        let mut current = Some(*self);
        while let Some(node) = current {
            let parent = node.parent();
            if parent.is_some() {
                names.push(node.name());
            }
            current = parent;
        }
        names.reverse();
        names.join("/")
    }

    /// Child named `name`
    pub fn child(&self, name: &str) -> Result<Option<Node<'a>>> {
        self.file.ensure_open()?;
        if self.entry.child_count == 0 {
            return Ok(None);
        }
        let children = self.file.children_of(self.id, self.entry)?;
        Ok(children.get(name).and_then(|id| self.file.node(id)))
    }

    pub fn has_child(&self, name: &str) -> Result<bool> {
        Ok(self.child(name)?.is_some())
    }

    /// Children in on-disk order
    pub fn children(&self) -> Result<Children<'a>> {
        self.file.ensure_open()?;
        if self.entry.child_count == 0 {
            return Ok(Children {
                file: self.file,
                ids: <&[NodeId]>::default().iter(),
            });
        }
        let children = self.file.children_of(self.id, self.entry)?;
        Ok(Children {
            file: self.file,
            ids: children.ids().iter(),
        })
    }

    /// Resolve the node's value, decoding strings and blobs as needed
    pub fn value(&self) -> Result<NodeValue> {
        self.file.ensure_open()?;
        Ok(match self.entry.kind {
            NodeKind::Empty | NodeKind::Unknown(_) => NodeValue::None,
            NodeKind::Integer(v) => NodeValue::Integer(v),
            NodeKind::Double(v) => NodeValue::Double(v),
            NodeKind::Vector(x, y) => NodeValue::Vector(x, y),
            NodeKind::String(id) => NodeValue::String(self.file.string(table_id(id, "string")?)?),
            NodeKind::Bitmap(id) => NodeValue::Bitmap(self.file.bitmap(table_id(id, "bitmap")?)?),
            NodeKind::Audio(id) => NodeValue::Audio(self.file.audio(table_id(id, "audio")?)?),
        })
    }

    /// Decoded bitmap if this is a bitmap node
    pub fn bitmap(&self) -> Result<Option<Arc<Bitmap>>> {
        match self.entry.kind {
            NodeKind::Bitmap(id) => Ok(Some(self.file.bitmap(table_id(id, "bitmap")?)?)),
            _ => Ok(None),
        }
    }

    /// Raw clip bytes if this is an audio node
    pub fn audio(&self) -> Result<Option<Arc<[u8]>>> {
        match self.entry.kind {
            NodeKind::Audio(id) => Ok(Some(self.file.audio(table_id(id, "audio")?)?)),
            _ => Ok(None),
        }
    }
}

fn table_id(id: i32, table: &str) -> Result<u32> {
    u32::try_from(id).map_err(|_| NxError::NotFound(format!("{} {}", table, id)))
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.file, other.file) && self.id == other.id
    }
}

impl Eq for Node<'_> {}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("kind", &self.entry.kind)
            .field("child_count", &self.entry.child_count)
            .finish()
    }
}

impl fmt::Display for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Iterator over a node's children
#[derive(Debug)]
pub struct Children<'a> {
    file: &'a NxFile,
    ids: std::slice::Iter<'a, NodeId>,
}

impl<'a> Iterator for Children<'a> {
    type Item = Node<'a>;

    fn next(&mut self) -> Option<Node<'a>> {
        let file = self.file;
        self.ids.by_ref().find_map(|&id| file.node(id))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.ids.len()))
    }
}

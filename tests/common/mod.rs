//! Synthetic NX image writer shared by the integration tests
//!
//! Trees are laid out breadth-first so every node's children occupy
//! consecutive records, the way NX writers emit them.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use tempfile::TempDir;

pub const HEADER_SIZE: usize = 52;
pub const NODE_SIZE: usize = 20;

#[derive(Debug, Clone)]
pub enum Value {
    Empty,
    Int(u32),
    Double(f64),
    Str(String),
    /// String node pointing at a raw table id
    StrId(i32),
    Vector(i32, i32),
    Bitmap(i32),
    Audio(i32),
    /// Arbitrary type tag and payload
    Raw(u16, [u8; 8]),
}

#[derive(Debug, Clone)]
pub struct Tree {
    pub name: String,
    pub value: Value,
    pub children: Vec<Tree>,
}

pub fn leaf(name: &str, value: Value) -> Tree {
    Tree {
        name: name.to_string(),
        value,
        children: Vec::new(),
    }
}

pub fn dir(name: &str, children: Vec<Tree>) -> Tree {
    Tree {
        name: name.to_string(),
        value: Value::Empty,
        children,
    }
}

/// Where each table landed in the written image
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub node_offset: u64,
    pub node_count: u32,
    pub string_offset: u64,
    pub bitmap_table: u64,
    pub audio_table: u64,
    pub bitmap_blobs: Vec<u64>,
    pub audio_blobs: Vec<u64>,
}

#[derive(Debug, Clone)]
pub struct NxImage {
    root: Tree,
    strings: Vec<Vec<u8>>,
    bitmaps: Vec<Vec<u8>>,
    audio: Vec<Vec<u8>>,
}

impl NxImage {
    pub fn new(root: Tree) -> Self {
        NxImage {
            root,
            strings: Vec::new(),
            bitmaps: Vec::new(),
            audio: Vec::new(),
        }
    }

    /// Reserve a raw string table entry (may be invalid UTF-8)
    ///
    /// Raw entries take ids `0..n` in call order, ahead of interned names.
    pub fn raw_string(mut self, bytes: &[u8]) -> Self {
        self.strings.push(bytes.to_vec());
        self
    }

    /// Bitmap whose payload is stored as-is (for the identity decompressor)
    pub fn raw_bitmap(mut self, width: u16, height: u16, payload: &[u8]) -> Self {
        self.bitmaps.push(bitmap_blob(width, height, payload));
        self
    }

    /// Bitmap with an LZ4 block payload
    pub fn lz4_bitmap(mut self, width: u16, height: u16, bgra: &[u8]) -> Self {
        let compressed = lz4_flex::block::compress(bgra);
        self.bitmaps.push(bitmap_blob(width, height, &compressed));
        self
    }

    pub fn audio(mut self, bytes: &[u8]) -> Self {
        let mut blob = (bytes.len() as u32).to_le_bytes().to_vec();
        blob.extend_from_slice(bytes);
        self.audio.push(blob);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        self.build_with_layout().0
    }

    pub fn build_with_layout(&self) -> (Vec<u8>, Layout) {
        let mut strings = self.strings.clone();
        let mut interned: HashMap<String, u32> = HashMap::new();
        let mut intern = |s: &str| -> u32 {
            *interned.entry(s.to_string()).or_insert_with(|| {
                strings.push(s.as_bytes().to_vec());
                (strings.len() - 1) as u32
            })
        };

        // Breadth-first: children of each node are consecutive
        let mut order: Vec<&Tree> = vec![&self.root];
        let mut first_child = Vec::new();
        let mut i = 0;
        while i < order.len() {
            let tree = order[i];
            first_child.push(order.len() as u32);
            order.extend(tree.children.iter());
            i += 1;
        }

        let mut records = Vec::with_capacity(order.len() * NODE_SIZE);
        for (tree, &first) in order.iter().zip(&first_child) {
            let name_id = intern(&tree.name);
            let (tag, payload) = match &tree.value {
                Value::Empty => (0u16, [0u8; 8]),
                Value::Int(v) => (1, pair(*v as i32, 0)),
                Value::Double(v) => (2, v.to_le_bytes()),
                Value::Str(s) => (3, pair(intern(s) as i32, 0)),
                Value::StrId(id) => (3, pair(*id, 0)),
                Value::Vector(x, y) => (4, pair(*x, *y)),
                Value::Bitmap(id) => (5, pair(*id, 0)),
                Value::Audio(id) => (6, pair(*id, 0)),
                Value::Raw(tag, payload) => (*tag, *payload),
            };
            records.extend_from_slice(&name_id.to_le_bytes());
            records.extend_from_slice(&(tree.children.len() as u16).to_le_bytes());
            records.extend_from_slice(&tag.to_le_bytes());
            records.extend_from_slice(&payload);
            records.extend_from_slice(&first.to_le_bytes());
        }

        let mut layout = Layout {
            node_offset: HEADER_SIZE as u64,
            node_count: order.len() as u32,
            ..Default::default()
        };
        let mut body = records;

        layout.string_offset = HEADER_SIZE as u64 + body.len() as u64;
        for entry in &strings {
            body.extend_from_slice(&(entry.len() as u16).to_le_bytes());
            body.extend_from_slice(entry);
        }

        layout.bitmap_table = HEADER_SIZE as u64 + body.len() as u64;
        body.resize(body.len() + self.bitmaps.len() * 8, 0);
        layout.audio_table = HEADER_SIZE as u64 + body.len() as u64;
        body.resize(body.len() + self.audio.len() * 8, 0);

        for blob in &self.bitmaps {
            layout.bitmap_blobs.push(HEADER_SIZE as u64 + body.len() as u64);
            body.extend_from_slice(blob);
        }
        for blob in &self.audio {
            layout.audio_blobs.push(HEADER_SIZE as u64 + body.len() as u64);
            body.extend_from_slice(blob);
        }

        for (i, offset) in layout.bitmap_blobs.iter().enumerate() {
            let at = (layout.bitmap_table - HEADER_SIZE as u64) as usize + i * 8;
            body[at..at + 8].copy_from_slice(&offset.to_le_bytes());
        }
        for (i, offset) in layout.audio_blobs.iter().enumerate() {
            let at = (layout.audio_table - HEADER_SIZE as u64) as usize + i * 8;
            body[at..at + 8].copy_from_slice(&offset.to_le_bytes());
        }

        let mut bytes = b"PKG3".to_vec();
        bytes.extend_from_slice(&layout.node_count.to_le_bytes());
        bytes.extend_from_slice(&layout.node_offset.to_le_bytes());
        bytes.extend_from_slice(&(strings.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&layout.string_offset.to_le_bytes());
        bytes.extend_from_slice(&(self.bitmaps.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&layout.bitmap_table.to_le_bytes());
        bytes.extend_from_slice(&(self.audio.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&layout.audio_table.to_le_bytes());
        assert_eq!(bytes.len(), HEADER_SIZE);
        bytes.extend_from_slice(&body);

        (bytes, layout)
    }

    /// Write the image to a temp file; keep the `TempDir` alive while reading
    pub fn write_temp(&self, name: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, self.build()).unwrap();
        (dir, path)
    }
}

fn pair(a: i32, b: i32) -> [u8; 8] {
    let mut out = [0u8; 8];
    out[..4].copy_from_slice(&a.to_le_bytes());
    out[4..].copy_from_slice(&b.to_le_bytes());
    out
}

fn bitmap_blob(width: u16, height: u16, payload: &[u8]) -> Vec<u8> {
    let mut blob = width.to_le_bytes().to_vec();
    blob.extend_from_slice(&height.to_le_bytes());
    blob.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    blob.extend_from_slice(payload);
    blob
}

/// A small map-like tree used across the tests
///
/// ```text
/// (root)
/// ├── Back
/// │   ├── grassySoil
/// │   │   ├── 0        bitmap 0
/// │   │   └── origin   vector (12, -4)
/// │   └── count        int 7
/// ├── Sound
/// │   └── bgm          audio 0
/// └── info
///     ├── name         "Henesys"
///     ├── scale        double 1.5
///     └── empty
/// ```
pub fn sample_tree() -> Tree {
    dir(
        "",
        vec![
            dir(
                "Back",
                vec![
                    dir(
                        "grassySoil",
                        vec![
                            leaf("0", Value::Bitmap(0)),
                            leaf("origin", Value::Vector(12, -4)),
                        ],
                    ),
                    leaf("count", Value::Int(7)),
                ],
            ),
            dir("Sound", vec![leaf("bgm", Value::Audio(0))]),
            dir(
                "info",
                vec![
                    leaf("name", Value::Str("Henesys".into())),
                    leaf("scale", Value::Double(1.5)),
                    leaf("empty", Value::Empty),
                ],
            ),
        ],
    )
}

/// 2x1 BGRA pixels: blue-ish then red-ish
pub const SAMPLE_BGRA: [u8; 8] = [0x10, 0x20, 0x30, 0xFF, 0x40, 0x50, 0x60, 0x80];

pub fn sample_image() -> NxImage {
    NxImage::new(sample_tree())
        .lz4_bitmap(2, 1, &SAMPLE_BGRA)
        .audio(b"ID3-fake-mp3")
}

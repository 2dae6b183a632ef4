//! NX file handle
//!
//! [`NxFile`] owns the mapped bytes, the lock around the shared cursor, the
//! header, the string table, both blob stores and the node arena. It is the
//! single entry point for reading an NX file and is `Send + Sync`: wrap it
//! in an `Arc` or borrow it across scoped threads.

use crate::arena::NodeArena;
use crate::blob::{self, Bitmap};
use crate::compression::{Decompressor, Lz4Decompressor};
use crate::config::NxOptions;
use crate::cursor::{Backing, BinaryCursor};
use crate::error::{NxError, Result};
use crate::header::Header;
use crate::node::{ChildMap, Node, NodeEntry, NodeId, NodeRecord, ROOT};
use crate::offsets::{BlobKind, BlobStore};
use crate::reader::{Reader, SharedReader};
use crate::stats::{Counters, NxStats};
use crate::strings::StringTable;
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Open NX file
pub struct NxFile {
    path: Option<PathBuf>,
    options: NxOptions,
    header: Header,
    reader: SharedReader,
    closed: AtomicBool,
    strings: StringTable,
    nodes: NodeArena,
    bitmaps: BlobStore<Bitmap>,
    audio: BlobStore<[u8]>,
    decompressor: Box<dyn Decompressor>,
    counters: Counters,
}

impl NxFile {
    /// Memory-map and open the NX file at `path`
    pub fn open<P: AsRef<Path>>(path: P, options: NxOptions) -> Result<Self> {
        Self::open_with(path, options, Box::new(Lz4Decompressor))
    }

    /// Open with default options (eager strings, preloaded node table)
    pub fn open_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(path, NxOptions::default())
    }

    /// Open with a custom bitmap decompressor
    pub fn open_with<P: AsRef<Path>>(
        path: P,
        options: NxOptions,
        decompressor: Box<dyn Decompressor>,
    ) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening NX file {:?}", path);

        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and owned by this handle; NX files
        // are not modified while open.
        let map = unsafe { Mmap::map(&file)? };

        let mut nx = Self::from_backing(Backing::Mapped(map), options, decompressor)?;
        nx.path = Some(path.to_path_buf());
        Ok(nx)
    }

    /// Open an in-memory NX image
    pub fn from_bytes(bytes: Vec<u8>, options: NxOptions) -> Result<Self> {
        Self::from_backing(Backing::Owned(bytes), options, Box::new(Lz4Decompressor))
    }

    /// Open an in-memory NX image with a custom bitmap decompressor
    pub fn from_bytes_with(
        bytes: Vec<u8>,
        options: NxOptions,
        decompressor: Box<dyn Decompressor>,
    ) -> Result<Self> {
        Self::from_backing(Backing::Owned(bytes), options, decompressor)
    }

    fn from_backing(
        backing: Backing,
        options: NxOptions,
        decompressor: Box<dyn Decompressor>,
    ) -> Result<Self> {
        let mut cursor = BinaryCursor::new(backing);
        let header = Header::parse(&mut cursor)?;
        header.validate(cursor.len() as u64)?;
        debug!(
            "NX header: {} nodes, {} strings, {} bitmaps, {} audio clips",
            header.node_count, header.string_count, header.bitmap_count, header.audio_count
        );

        let counters = Counters::default();
        let strings = StringTable::build(
            &mut cursor,
            &header,
            options.effective_string_mode(),
            &counters,
        )?;

        let mut reader = Reader::new(cursor, &header);
        if options.preload_nodes() {
            let len = reader.preload_nodes()?;
            debug!("Preloaded {} byte node table", len);
        }

        let cache = options.caches_blobs();
        Ok(NxFile {
            path: None,
            header,
            reader: SharedReader::new(reader),
            closed: AtomicBool::new(false),
            strings,
            nodes: NodeArena::new(header.node_count),
            bitmaps: BlobStore::new(
                BlobKind::Bitmap,
                header.bitmap_count,
                header.bitmap_offset,
                cache,
            ),
            audio: BlobStore::new(
                BlobKind::Audio,
                header.audio_count,
                header.audio_offset,
                cache,
            ),
            decompressor,
            counters,
            options,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn options(&self) -> &NxOptions {
        &self.options
    }

    /// Path the file was opened from (`None` for in-memory images)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn stats(&self) -> NxStats {
        self.counters.snapshot()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(NxError::Closed)
        } else {
            Ok(())
        }
    }

    /// Root node, decoded on first call
    pub fn root(&self) -> Result<Node<'_>> {
        self.ensure_open()?;
        if let Some(entry) = self.nodes.get(ROOT) {
            return Ok(Node::new(self, ROOT, entry));
        }
        if self.header.node_count == 0 {
            return Err(NxError::InvalidFormat("node table is empty".into()));
        }

        let mut reader = self.reader.lock();
        if let Some(entry) = self.nodes.get(ROOT) {
            return Ok(Node::new(self, ROOT, entry));
        }
        let record = NodeRecord::read(reader.node_stream(ROOT)?)?;
        self.counters.node_decoded();
        let entry = self.install(&mut reader, ROOT, None, record)?;
        Ok(Node::new(self, ROOT, entry))
    }

    /// Walk `path` from the root, one child name per segment
    ///
    /// An empty path resolves to the root.
    pub fn resolve_path<S: AsRef<str>>(&self, path: &[S]) -> Result<Node<'_>> {
        let mut node = self.root()?;
        for (depth, segment) in path.iter().enumerate() {
            node = node.child(segment.as_ref())?.ok_or_else(|| {
                let walked: Vec<&str> = path[..=depth].iter().map(AsRef::as_ref).collect();
                NxError::NotFound(format!("path {}", walked.join("/")))
            })?;
        }
        Ok(node)
    }

    /// Resolve a slash-separated path such as `"Map/Back/0"`
    pub fn resolve(&self, path: &str) -> Result<Node<'_>> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        self.resolve_path(&segments)
    }

    /// Already decoded node by handle
    pub fn node(&self, id: NodeId) -> Option<Node<'_>> {
        self.nodes.get(id).map(|entry| Node::new(self, id, entry))
    }

    /// Interned string `id`
    pub fn string(&self, id: u32) -> Result<Arc<str>> {
        self.ensure_open()?;
        self.strings.get(id, &self.reader, &self.counters)
    }

    /// Absolute file offset of bitmap `id`
    pub fn bitmap_offset(&self, id: u32) -> Result<u64> {
        self.ensure_open()?;
        self.bitmaps.table().get(id, &self.reader, &self.counters)
    }

    /// Absolute file offset of audio clip `id`
    pub fn audio_offset(&self, id: u32) -> Result<u64> {
        self.ensure_open()?;
        self.audio.table().get(id, &self.reader, &self.counters)
    }

    /// Decoded bitmap `id`
    pub fn bitmap(&self, id: u32) -> Result<Arc<Bitmap>> {
        self.ensure_open()?;
        if let Some(bitmap) = self.bitmaps.cached(id) {
            self.counters.blob_cache_hit();
            return Ok(bitmap);
        }

        let offset = self.bitmaps.table().get(id, &self.reader, &self.counters)?;
        let mut reader = self.reader.lock();
        if let Some(bitmap) = self.bitmaps.cached(id) {
            self.counters.blob_cache_hit();
            return Ok(bitmap);
        }
        let bitmap = blob::read_bitmap(reader.data()?, offset, self.decompressor.as_ref())?;
        trace!(
            "Decoded bitmap {} ({}x{}) at offset {}",
            id,
            bitmap.width(),
            bitmap.height(),
            offset
        );
        self.counters.blob_decoded();
        Ok(self.bitmaps.store(id, Arc::new(bitmap)))
    }

    /// Raw bytes of audio clip `id`
    pub fn audio(&self, id: u32) -> Result<Arc<[u8]>> {
        self.ensure_open()?;
        if let Some(clip) = self.audio.cached(id) {
            self.counters.blob_cache_hit();
            return Ok(clip);
        }

        let offset = self.audio.table().get(id, &self.reader, &self.counters)?;
        let mut reader = self.reader.lock();
        if let Some(clip) = self.audio.cached(id) {
            self.counters.blob_cache_hit();
            return Ok(clip);
        }
        let clip = blob::read_audio(reader.data()?, offset)?;
        trace!("Read {} byte audio clip {} at offset {}", clip.len(), id, offset);
        self.counters.blob_decoded();
        Ok(self.audio.store(id, Arc::from(clip)))
    }

    /// Release the mapping; later operations fail with [`NxError::Closed`]
    ///
    /// Calling `close` again is a no-op.
    pub fn close(&self) {
        let mut reader = self.reader.lock();
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        reader.close();
        info!("Closed NX file {:?}", self.path);
    }

    /// Children of `id`, materialized on first use
    pub(crate) fn children_of<'a>(&'a self, id: NodeId, entry: &'a NodeEntry) -> Result<&'a ChildMap> {
        if let Some(children) = entry.children.get() {
            return Ok(children);
        }

        let mut reader = self.reader.lock();
        if let Some(children) = entry.children.get() {
            return Ok(children);
        }
        let children = self.materialize(&mut reader, id, entry)?;
        Ok(entry.children.get_or_init(|| children))
    }

    fn materialize(&self, reader: &mut Reader, id: NodeId, entry: &NodeEntry) -> Result<ChildMap> {
        let count = entry.child_count as u32;
        let first = entry.first_child;
        let end = first
            .checked_add(count)
            .filter(|&end| end <= self.header.node_count)
            .ok_or(NxError::OutOfRange(first as u64 + count as u64))?;

        let stream = reader.node_stream(NodeId(first))?;
        let mut records = Vec::with_capacity(count as usize);
        for _ in 0..count {
            records.push(NodeRecord::read(stream)?);
            self.counters.node_decoded();
        }

        let mut children = ChildMap::with_capacity(records.len());
        for (child, record) in (first..end).map(NodeId).zip(records) {
            let child_entry = self.install(reader, child, Some(id), record)?;
            children.insert(child_entry.name.clone(), child);
        }

        trace!("Materialized {} children of node {}", count, id);
        self.counters.children_materialized();
        Ok(children)
    }

    /// Store a decoded record in the arena, resolving its name
    fn install(
        &self,
        reader: &mut Reader,
        id: NodeId,
        parent: Option<NodeId>,
        record: NodeRecord,
    ) -> Result<&NodeEntry> {
        let slot = self.nodes.slot(id)?;
        if let Some(existing) = slot.get() {
            return Ok(existing);
        }
        let name = self.strings.get_locked(record.name_id, reader, &self.counters)?;
        Ok(slot.get_or_init(|| NodeEntry::new(name, parent, record)))
    }
}

impl std::fmt::Debug for NxFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NxFile")
            .field("path", &self.path)
            .field("header", &self.header)
            .field("options", &self.options)
            .field("string_mode", &self.strings.mode())
            .field("strings", &self.strings.len())
            .field("nodes", &self.nodes.len())
            .field("node_chunks", &self.nodes.chunks_allocated())
            .field("bitmap_table_built", &self.bitmaps.table().is_built())
            .field("audio_table_built", &self.audio.table().is_built())
            .field("closed", &self.is_closed())
            .finish()
    }
}

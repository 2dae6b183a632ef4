//! # nx-rs - Read-only engine for NX (PKG3) files
//!
//! NX is a single-file hierarchical container: a tree of named nodes whose
//! leaves carry integers, doubles, strings, 2D vectors, bitmaps or audio
//! clips. `nx-rs` maps the file and decodes it lazily:
//!
//! - **Memory-mapped** reads; node records are decoded only when visited
//! - **Interned strings** decoded at open (eager) or on first use (lazy)
//! - **LZ4 bitmaps** decoded to RGBA on request, optionally cached
//! - **Thread-safe**: one lock serializes cursor access, cached reads are lock-free
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nx_rs::{NodeValue, NxFile, Result};
//!
//! # fn main() -> Result<()> {
//! let nx = NxFile::open_default("Map.nx")?;
//!
//! // Walk the tree by name
//! let node = nx.resolve_path(&["Back", "grassySoil", "0"])?;
//! if let NodeValue::Bitmap(bitmap) = node.value()? {
//!     println!("{}x{}", bitmap.width(), bitmap.height());
//! }
//!
//! // Iterate children in file order
//! for child in nx.root()?.children()? {
//!     println!("{}", child.name());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Advanced Usage
//!
//! ```rust,no_run
//! use nx_rs::{NxFileBuilder, Result};
//!
//! # fn main() -> Result<()> {
//! // Minimal resident memory: lazy strings, no node preload, no blob cache
//! let nx = NxFileBuilder::new()
//!     .low_memory()
//!     .open("Sound.nx")?;
//!
//! let clip = nx.resolve("Bgm00/GoPicnic")?.audio()?;
//! # Ok(())
//! # }
//! ```

pub mod engine;

// Re-export engine modules internally so crate:: paths in the engine resolve
pub(crate) use engine::{
    arena, blob, compression, config, cursor, error, file, header, node, offsets, reader, stats,
    strings,
};

pub use crate::engine::{
    blob::{Bitmap, Rgba},
    compression::{Decompressor, IdentityDecompressor, Lz4Decompressor},
    config::{NxOptions, StringMode},
    error::{NxError, Result},
    file::NxFile,
    header::{Header, HEADER_SIZE, MAGIC},
    node::{Children, Node, NodeId, NodeKind, NodeValue, NODE_SIZE},
    offsets::BlobKind,
    stats::NxStats,
};

use std::path::Path;
use tracing::debug;

/// Builder for opening NX files with non-default options
///
/// # Examples
///
/// ```rust,no_run
/// use nx_rs::{IdentityDecompressor, NxFileBuilder};
///
/// # fn main() -> nx_rs::Result<()> {
/// let nx = NxFileBuilder::new()
///     .lazy_strings()
///     .cache_blobs(false)
///     .decompressor(IdentityDecompressor)
///     .open("Character.nx")?;
/// # Ok(())
/// # }
/// ```
pub struct NxFileBuilder {
    options: NxOptions,
    decompressor: Box<dyn Decompressor>,
}

impl NxFileBuilder {
    /// Create a builder with default options and LZ4 bitmaps
    pub fn new() -> Self {
        NxFileBuilder {
            options: NxOptions::default(),
            decompressor: Box::new(Lz4Decompressor),
        }
    }

    /// Replace all options at once
    pub fn options(mut self, options: NxOptions) -> Self {
        self.options = options;
        self
    }

    pub fn string_mode(mut self, mode: StringMode) -> Self {
        self.options.string_mode = mode;
        self
    }

    /// Decode strings on first use instead of at open
    pub fn lazy_strings(self) -> Self {
        self.string_mode(StringMode::Lazy)
    }

    /// Skip the node preload and blob caches (forces lazy strings)
    pub fn low_memory(mut self) -> Self {
        self.options.low_memory = true;
        self
    }

    pub fn cache_blobs(mut self, enabled: bool) -> Self {
        self.options.cache_blobs = enabled;
        self
    }

    /// Use a custom bitmap decompressor
    pub fn decompressor<D: Decompressor + 'static>(mut self, decompressor: D) -> Self {
        self.decompressor = Box::new(decompressor);
        self
    }

    /// Map and open the file at `path`
    pub fn open<P: AsRef<Path>>(self, path: P) -> Result<NxFile> {
        debug!("Opening {:?} with {:?}", path.as_ref(), self.options);
        NxFile::open_with(path, self.options, self.decompressor)
    }

    /// Open an in-memory image
    pub fn open_bytes(self, bytes: Vec<u8>) -> Result<NxFile> {
        debug!("Opening {} byte image with {:?}", bytes.len(), self.options);
        NxFile::from_bytes_with(bytes, self.options, self.decompressor)
    }
}

impl Default for NxFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

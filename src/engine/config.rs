//! Open-time options for NX files
//!
//! Options can be built in code or loaded from TOML:
//!
//! ```toml
//! string_mode = "lazy"
//! low_memory = false
//! cache_blobs = true
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// When interned strings are decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StringMode {
    /// Decode every string while opening
    #[default]
    Eager,
    /// Record entry offsets while opening, decode on first request
    Lazy,
}

/// NX open options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NxOptions {
    /// String decoding strategy
    pub string_mode: StringMode,

    /// Skip the node-table preload and blob caches, re-seeking the mapping
    /// instead. Forces lazy strings.
    pub low_memory: bool,

    /// Keep decoded bitmaps and audio clips for reuse
    pub cache_blobs: bool,
}

impl Default for NxOptions {
    fn default() -> Self {
        NxOptions {
            string_mode: StringMode::Eager,
            low_memory: false,
            cache_blobs: true,
        }
    }
}

impl NxOptions {
    /// Eager strings, preloaded node table, blob caching
    pub fn eager() -> Self {
        Self::default()
    }

    /// Lazy strings, preloaded node table, blob caching
    pub fn lazy() -> Self {
        NxOptions {
            string_mode: StringMode::Lazy,
            ..Default::default()
        }
    }

    /// Minimal resident memory
    pub fn low_memory() -> Self {
        NxOptions {
            string_mode: StringMode::Lazy,
            low_memory: true,
            cache_blobs: false,
        }
    }

    /// Parse options from a TOML document; missing keys take defaults
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Effective string mode after applying low-memory mode
    pub fn effective_string_mode(&self) -> StringMode {
        if self.low_memory {
            StringMode::Lazy
        } else {
            self.string_mode
        }
    }

    /// Whether the node table is copied out of the mapping at open
    pub fn preload_nodes(&self) -> bool {
        !self.low_memory
    }

    /// Whether decoded blobs are cached
    pub fn caches_blobs(&self) -> bool {
        self.cache_blobs && !self.low_memory
    }
}

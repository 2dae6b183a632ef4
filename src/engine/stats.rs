//! Decode counters
//!
//! Every lazy structure is built at most once; these counters make that
//! observable.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of an NX file's decode activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NxStats {
    /// Node records decoded from the node table
    pub nodes_decoded: u64,
    /// Child maps built
    pub children_materialized: u64,
    /// Strings decoded from the string table
    pub strings_decoded: u64,
    /// Offset tables built (bitmap and audio)
    pub offset_tables_built: u64,
    /// Bitmaps and audio clips decoded
    pub blobs_decoded: u64,
    /// Blob requests served from the cache
    pub blob_cache_hits: u64,
}

impl NxStats {
    /// Blob cache hit rate as a percentage
    pub fn blob_hit_rate(&self) -> f64 {
        let total = self.blob_cache_hits + self.blobs_decoded;
        if total == 0 {
            0.0
        } else {
            (self.blob_cache_hits as f64 / total as f64) * 100.0
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    nodes_decoded: AtomicU64,
    children_materialized: AtomicU64,
    strings_decoded: AtomicU64,
    offset_tables_built: AtomicU64,
    blobs_decoded: AtomicU64,
    blob_cache_hits: AtomicU64,
}

impl Counters {
    pub fn node_decoded(&self) {
        self.nodes_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn children_materialized(&self) {
        self.children_materialized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn string_decoded(&self) {
        self.strings_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn offset_table_built(&self) {
        self.offset_tables_built.fetch_add(1, Ordering::Relaxed);
    }

    pub fn blob_decoded(&self) {
        self.blobs_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn blob_cache_hit(&self) {
        self.blob_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> NxStats {
        NxStats {
            nodes_decoded: self.nodes_decoded.load(Ordering::Relaxed),
            children_materialized: self.children_materialized.load(Ordering::Relaxed),
            strings_decoded: self.strings_decoded.load(Ordering::Relaxed),
            offset_tables_built: self.offset_tables_built.load(Ordering::Relaxed),
            blobs_decoded: self.blobs_decoded.load(Ordering::Relaxed),
            blob_cache_hits: self.blob_cache_hits.load(Ordering::Relaxed),
        }
    }
}

//! NX read engine
//!
//! Layered bottom-up: [`cursor`] reads little-endian primitives from the
//! mapping, [`header`] and [`node`] decode the fixed-size records, the
//! lazily built tables (`strings`, [`offsets`], `arena`) sit on top, and
//! [`file`] ties them together behind a single lock.

pub(crate) mod arena;
pub mod blob;
pub mod compression;
pub mod config;
pub mod cursor;
pub mod error;
pub mod file;
pub mod header;
pub mod node;
pub mod offsets;
pub(crate) mod reader;
pub mod stats;
pub(crate) mod strings;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NxError {
    #[error("Invalid NX file: {0}")]
    InvalidFormat(String),

    #[error("Truncated read: {len} bytes at offset {offset}")]
    Truncated { offset: u64, len: u64 },

    #[error("Offset out of range: {0}")]
    OutOfRange(u64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("NX file already closed")]
    Closed,

    #[error("Invalid UTF-8 string: {0}")]
    Decode(String),

    #[error("Decompression failed: {0}")]
    Decompression(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid options: {0}")]
    Config(#[from] toml::de::Error),
}

impl NxError {
    /// True for lookups that missed (paths, blob ids, string ids)
    pub fn is_not_found(&self) -> bool {
        matches!(self, NxError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, NxError>;

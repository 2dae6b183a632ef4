//! Bitmap payload decompression
//!
//! Bitmap blobs carry compressed BGRA pixel data. The codec is a pluggable
//! primitive with the shape
//! `decompress(src, src_offset, src_len, dst, dst_offset)`; the reader hands
//! it the whole file region and the location of the compressed bytes.
//!
//! - [`Lz4Decompressor`] - raw LZ4 block (default, what NX writers emit)
//! - [`IdentityDecompressor`] - payload is already raw BGRA

use crate::error::{NxError, Result};

/// Decompression primitive for bitmap payloads
pub trait Decompressor: Send + Sync {
    /// Decompress `src[src_offset..src_offset + src_len]` into
    /// `dst[dst_offset..]`, returning the number of bytes written
    fn decompress(
        &self,
        src: &[u8],
        src_offset: usize,
        src_len: usize,
        dst: &mut [u8],
        dst_offset: usize,
    ) -> Result<usize>;
}

/// LZ4 block decompression (no size prefix)
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Decompressor;

/// Copies the payload unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityDecompressor;

fn ranges<'s, 'd>(
    src: &'s [u8],
    src_offset: usize,
    src_len: usize,
    dst: &'d mut [u8],
    dst_offset: usize,
) -> Result<(&'s [u8], &'d mut [u8])> {
    let input = src_offset
        .checked_add(src_len)
        .and_then(|end| src.get(src_offset..end))
        .ok_or(NxError::Truncated {
            offset: src_offset as u64,
            len: src_len as u64,
        })?;
    let dst_len = dst.len();
    let output = dst.get_mut(dst_offset..).ok_or_else(|| {
        NxError::Decompression(format!(
            "output offset {} exceeds buffer of {} bytes",
            dst_offset, dst_len
        ))
    })?;
    Ok((input, output))
}

impl Decompressor for Lz4Decompressor {
    fn decompress(
        &self,
        src: &[u8],
        src_offset: usize,
        src_len: usize,
        dst: &mut [u8],
        dst_offset: usize,
    ) -> Result<usize> {
        let (input, output) = ranges(src, src_offset, src_len, dst, dst_offset)?;
        lz4_flex::block::decompress_into(input, output)
            .map_err(|e| NxError::Decompression(format!("LZ4 decompression failed: {}", e)))
    }
}

impl Decompressor for IdentityDecompressor {
    fn decompress(
        &self,
        src: &[u8],
        src_offset: usize,
        src_len: usize,
        dst: &mut [u8],
        dst_offset: usize,
    ) -> Result<usize> {
        let (input, output) = ranges(src, src_offset, src_len, dst, dst_offset)?;
        if input.len() > output.len() {
            return Err(NxError::Decompression(format!(
                "{} byte payload does not fit {} byte output",
                input.len(),
                output.len()
            )));
        }
        output[..input.len()].copy_from_slice(input);
        Ok(input.len())
    }
}

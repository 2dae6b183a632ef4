//! Bitmap and audio payload decoding
//!
//! ```text
//! bitmap: [u16 width][u16 height][u32 compressed_len][compressed BGRA...]
//! audio:  [u32 len][raw bytes...]
//! ```

use crate::compression::Decompressor;
use crate::cursor::BinaryCursor;
use crate::error::{NxError, Result};

/// One RGBA pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    /// Packed `0xAARRGGBB`
    pub fn to_argb(self) -> u32 {
        u32::from_be_bytes([self.a, self.r, self.g, self.b])
    }
}

/// Decoded bitmap with row-major RGBA pixels
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u16,
    height: u16,
    pixels: Vec<u8>,
}

impl Bitmap {
    /// Build from decompressed BGRA bytes (4 per pixel, row-major)
    pub fn from_bgra(width: u16, height: u16, mut bgra: Vec<u8>) -> Self {
        for px in bgra.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
        Bitmap {
            width,
            height,
            pixels: bgra,
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// RGBA bytes, row-major
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Pixel at (`x`, `y`), `None` outside the image
    pub fn pixel(&self, x: u16, y: u16) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.pixels.get(i..i + 4)?;
        Some(Rgba {
            r: px[0],
            g: px[1],
            b: px[2],
            a: px[3],
        })
    }

    /// Pixel at (`x`, `y`) packed as `0xAARRGGBB`
    pub fn argb(&self, x: u16, y: u16) -> Option<u32> {
        self.pixel(x, y).map(Rgba::to_argb)
    }
}

impl std::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Decode the bitmap stored at `offset`
pub fn read_bitmap(
    cursor: &mut BinaryCursor,
    offset: u64,
    decompressor: &dyn Decompressor,
) -> Result<Bitmap> {
    cursor.seek(offset)?;
    let width = cursor.read_u16()?;
    let height = cursor.read_u16()?;
    let compressed_len = cursor.read_u32()? as usize;
    let src_offset = cursor.position() as usize;
    // Payload must be present before the pixel buffer is sized from the header
    cursor.skip(compressed_len)?;

    let mut bgra = vec![0u8; width as usize * height as usize * 4];
    let written = decompressor.decompress(cursor.buffer(), src_offset, compressed_len, &mut bgra, 0)?;
    if written != bgra.len() {
        return Err(NxError::Decompression(format!(
            "{}x{} bitmap at offset {} decoded to {} bytes, expected {}",
            width,
            height,
            offset,
            written,
            bgra.len()
        )));
    }

    Ok(Bitmap::from_bgra(width, height, bgra))
}

/// Read the audio clip stored at `offset`
pub fn read_audio(cursor: &mut BinaryCursor, offset: u64) -> Result<Vec<u8>> {
    cursor.seek(offset)?;
    let len = cursor.read_u32()? as usize;
    cursor.read_bytes(len)
}

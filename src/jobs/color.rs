//! Dominant-color extraction over decoded RGBA pixels.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pixels with alpha below this are ignored.
pub const ALPHA_THRESHOLD: u8 = 128;

const BUCKET_BITS: u8 = 4;
const BUCKETS: usize = 1 << (3 * BUCKET_BITS);

/// An opaque 8-bit sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// Build a color from its channels.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Upper-case `#RRGGBB` form.
    #[must_use]
    pub fn to_hex(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Errors from [`dominant_color`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    /// The buffer does not hold exactly `width * height` RGBA pixels.
    #[error("pixel buffer is {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    BufferSize {
        /// Bytes received.
        actual: usize,
        /// Bytes implied by the dimensions.
        expected: usize,
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
    },
    /// `width * height` RGBA pixels do not fit in memory.
    #[error("{width}x{height} RGBA image is too large to address")]
    DimensionsTooLarge {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
    },
    /// Every pixel is below [`ALPHA_THRESHOLD`], or the image is empty.
    #[error("image has no opaque pixels")]
    NoOpaquePixels,
}

#[derive(Clone, Copy, Default)]
struct Bucket {
    count: u64,
    r: u64,
    g: u64,
    b: u64,
}

impl Bucket {
    fn mean(&self) -> Rgb {
        let channel = |sum: u64| u8::try_from(sum / self.count).unwrap_or(u8::MAX);
        Rgb::new(channel(self.r), channel(self.g), channel(self.b))
    }
}

/// Most common color of an RGBA image.
///
/// Pixels are quantized to 4 bits per channel; the most populated bucket
/// wins, ties going to the lowest bucket index, and the result is the mean
/// of the original pixels in that bucket.
///
/// # Errors
///
/// Returns [`ColorError::DimensionsTooLarge`] when the dimensions overflow,
/// [`ColorError::BufferSize`] when `rgba` does not match them, and
/// [`ColorError::NoOpaquePixels`] when nothing is visible.
pub fn dominant_color(rgba: &[u8], width: u32, height: u32) -> Result<Rgb, ColorError> {
    let expected = u64::from(width)
        .checked_mul(u64::from(height))
        .and_then(|pixels| pixels.checked_mul(4))
        .and_then(|bytes| usize::try_from(bytes).ok())
        .ok_or(ColorError::DimensionsTooLarge { width, height })?;
    if rgba.len() != expected {
        return Err(ColorError::BufferSize {
            actual: rgba.len(),
            expected,
            width,
            height,
        });
    }

    let mut buckets = vec![Bucket::default(); BUCKETS];
    for px in rgba.chunks_exact(4) {
        if px[3] < ALPHA_THRESHOLD {
            continue;
        }
        let index = (usize::from(px[0] >> BUCKET_BITS) << (2 * BUCKET_BITS))
            | (usize::from(px[1] >> BUCKET_BITS) << BUCKET_BITS)
            | usize::from(px[2] >> BUCKET_BITS);
        let bucket = &mut buckets[index];
        bucket.count += 1;
        bucket.r += u64::from(px[0]);
        bucket.g += u64::from(px[1]);
        bucket.b += u64::from(px[2]);
    }

    let mut best: Option<&Bucket> = None;
    for bucket in &buckets {
        if bucket.count > best.map_or(0, |b| b.count) {
            best = Some(bucket);
        }
    }
    best.map(Bucket::mean).ok_or(ColorError::NoOpaquePixels)
}

//! Image format sniffing, header probing and upload policy checks.
//!
//! Only container headers are read; pixel data is never decoded here.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Image container formats accepted by the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Portable Network Graphics.
    Png,
    /// JPEG/JFIF.
    Jpeg,
    /// GIF87a or GIF89a.
    Gif,
    /// RIFF WebP (lossy, lossless, or extended).
    WebP,
    /// Windows bitmap.
    Bmp,
}

impl ImageFormat {
    /// Every supported format.
    pub const ALL: [Self; 5] = [Self::Png, Self::Jpeg, Self::Gif, Self::WebP, Self::Bmp];

    /// Identify a format from its magic bytes.
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Self::WebP)
        } else if bytes.starts_with(b"BM") {
            Some(Self::Bmp)
        } else {
            None
        }
    }

    /// MIME type for this format.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
            Self::Bmp => "image/bmp",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::WebP => "webp",
            Self::Bmp => "bmp",
        };
        f.write_str(name)
    }
}

/// Size, dimension and format limits for uploaded images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagePolicy {
    /// Largest accepted buffer, in bytes.
    pub max_bytes: usize,
    /// Largest accepted width, in pixels.
    pub max_width: u32,
    /// Largest accepted height, in pixels.
    pub max_height: u32,
    /// Formats that may be submitted.
    pub allowed_formats: Vec<ImageFormat>,
}

impl Default for ImagePolicy {
    fn default() -> Self {
        Self {
            max_bytes: 8 * 1024 * 1024,
            max_width: 4096,
            max_height: 4096,
            allowed_formats: ImageFormat::ALL.to_vec(),
        }
    }
}

/// What validation learned about an accepted image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Detected container format.
    pub format: ImageFormat,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Buffer size in bytes.
    pub byte_len: usize,
}

/// Reasons an image is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageRejection {
    /// The buffer is empty.
    #[error("image buffer is empty")]
    Empty,
    /// The buffer exceeds `max_bytes`.
    #[error("image is {size} bytes, limit is {max}")]
    TooLarge {
        /// Actual size.
        size: usize,
        /// Policy limit.
        max: usize,
    },
    /// No known magic bytes.
    #[error("unrecognized image format")]
    UnknownFormat,
    /// Recognized but not allowed by the policy.
    #[error("{0} images are not accepted")]
    FormatNotAllowed(ImageFormat),
    /// Header too short or inconsistent to read dimensions.
    #[error("malformed {0} header")]
    MalformedHeader(ImageFormat),
    /// Header reports a zero-sized image.
    #[error("image has zero width or height")]
    ZeroDimensions,
    /// Dimensions exceed the policy limits.
    #[error("image is {width}x{height}, limit is {max_width}x{max_height}")]
    DimensionsTooLarge {
        /// Actual width.
        width: u32,
        /// Actual height.
        height: u32,
        /// Policy width limit.
        max_width: u32,
        /// Policy height limit.
        max_height: u32,
    },
}

/// Check an image buffer against `policy`.
///
/// # Errors
///
/// Returns the first [`ImageRejection`] that applies, checked in order:
/// size, format, header, dimensions.
pub fn validate_image(bytes: &[u8], policy: &ImagePolicy) -> Result<ImageInfo, ImageRejection> {
    if bytes.is_empty() {
        return Err(ImageRejection::Empty);
    }
    if bytes.len() > policy.max_bytes {
        return Err(ImageRejection::TooLarge {
            size: bytes.len(),
            max: policy.max_bytes,
        });
    }

    let format = ImageFormat::sniff(bytes).ok_or(ImageRejection::UnknownFormat)?;
    if !policy.allowed_formats.contains(&format) {
        return Err(ImageRejection::FormatNotAllowed(format));
    }

    let (width, height) =
        probe_dimensions(bytes, format).ok_or(ImageRejection::MalformedHeader(format))?;
    if width == 0 || height == 0 {
        return Err(ImageRejection::ZeroDimensions);
    }
    if width > policy.max_width || height > policy.max_height {
        return Err(ImageRejection::DimensionsTooLarge {
            width,
            height,
            max_width: policy.max_width,
            max_height: policy.max_height,
        });
    }

    Ok(ImageInfo {
        format,
        width,
        height,
        byte_len: bytes.len(),
    })
}

/// Read `(width, height)` from the container header of `bytes`.
#[must_use]
pub fn probe_dimensions(bytes: &[u8], format: ImageFormat) -> Option<(u32, u32)> {
    match format {
        ImageFormat::Png => probe_png(bytes),
        ImageFormat::Jpeg => probe_jpeg(bytes),
        ImageFormat::Gif => Some((
            u32::from(le_u16(bytes, 6)?),
            u32::from(le_u16(bytes, 8)?),
        )),
        ImageFormat::WebP => probe_webp(bytes),
        ImageFormat::Bmp => probe_bmp(bytes),
    }
}

fn probe_png(bytes: &[u8]) -> Option<(u32, u32)> {
    // The first chunk must be IHDR.
    if bytes.get(12..16)? != b"IHDR" {
        return None;
    }
    Some((be_u32(bytes, 16)?, be_u32(bytes, 20)?))
}

fn probe_jpeg(bytes: &[u8]) -> Option<(u32, u32)> {
    let mut pos = 2;
    loop {
        if *bytes.get(pos)? != 0xFF {
            return None;
        }
        let marker = *bytes.get(pos + 1)?;
        match marker {
            // Fill byte.
            0xFF => pos += 1,
            // Standalone markers carry no length.
            0x01 | 0xD0..=0xD8 => pos += 2,
            // End of image or start of scan before any frame header.
            0xD9 | 0xDA => return None,
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                let height = be_u16(bytes, pos + 5)?;
                let width = be_u16(bytes, pos + 7)?;
                return Some((u32::from(width), u32::from(height)));
            }
            _ => {
                let len = usize::from(be_u16(bytes, pos + 2)?);
                if len < 2 {
                    return None;
                }
                pos += 2 + len;
            }
        }
    }
}

fn probe_webp(bytes: &[u8]) -> Option<(u32, u32)> {
    match bytes.get(12..16)? {
        b"VP8 " => {
            if bytes.get(23..26)? != [0x9D, 0x01, 0x2A] {
                return None;
            }
            let width = le_u16(bytes, 26)? & 0x3FFF;
            let height = le_u16(bytes, 28)? & 0x3FFF;
            Some((u32::from(width), u32::from(height)))
        }
        b"VP8L" => {
            if *bytes.get(20)? != 0x2F {
                return None;
            }
            let bits = le_u32(bytes, 21)?;
            Some(((bits & 0x3FFF) + 1, ((bits >> 14) & 0x3FFF) + 1))
        }
        b"VP8X" => Some((le_u24(bytes, 24)? + 1, le_u24(bytes, 27)? + 1)),
        _ => None,
    }
}

fn probe_bmp(bytes: &[u8]) -> Option<(u32, u32)> {
    let header_size = le_u32(bytes, 14)?;
    if header_size == 12 {
        // BITMAPCOREHEADER
        return Some((u32::from(le_u16(bytes, 18)?), u32::from(le_u16(bytes, 20)?)));
    }
    let width = i32::from_le_bytes(bytes.get(18..22)?.try_into().ok()?);
    // Negative height marks a top-down bitmap.
    let height = i32::from_le_bytes(bytes.get(22..26)?.try_into().ok()?);
    Some((width.unsigned_abs(), height.unsigned_abs()))
}

fn be_u16(bytes: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_be_bytes(bytes.get(at..at + 2)?.try_into().ok()?))
}

fn le_u16(bytes: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_le_bytes(bytes.get(at..at + 2)?.try_into().ok()?))
}

fn be_u32(bytes: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_be_bytes(bytes.get(at..at + 4)?.try_into().ok()?))
}

fn le_u32(bytes: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_le_bytes(bytes.get(at..at + 4)?.try_into().ok()?))
}

fn le_u24(bytes: &[u8], at: usize) -> Option<u32> {
    let raw = bytes.get(at..at + 3)?;
    Some(u32::from(raw[0]) | (u32::from(raw[1]) << 8) | (u32::from(raw[2]) << 16))
}

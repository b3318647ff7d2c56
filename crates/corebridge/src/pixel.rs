//! Conversion from the packed framebuffer encodings a core may select into
//! interleaved RGBA8888.

use core::fmt;
use std::ffi::c_uint;

use crate::raw;

/// Framebuffer encodings a core can request with `SET_PIXEL_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// 16-bit packed RGB using 5 bits per channel (0RRRRRGGGGGBBBBB).
    Rgb1555,
    /// 32-bit XRGB, native endian; the top byte is ignored.
    Xrgb8888,
    /// 16-bit packed RGB using 5/6/5 bits (RRRRRGGGGGGBBBBB).
    #[default]
    Rgb565,
}

impl PixelFormat {
    /// Returns the number of bytes a single source pixel occupies.
    #[inline]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb1555 | PixelFormat::Rgb565 => 2,
            PixelFormat::Xrgb8888 => 4,
        }
    }

    pub fn from_raw(value: raw::retro_pixel_format) -> Option<Self> {
        match value {
            raw::RETRO_PIXEL_FORMAT_0RGB1555 => Some(PixelFormat::Rgb1555),
            raw::RETRO_PIXEL_FORMAT_XRGB8888 => Some(PixelFormat::Xrgb8888),
            raw::RETRO_PIXEL_FORMAT_RGB565 => Some(PixelFormat::Rgb565),
            _ => None,
        }
    }

    pub const fn to_raw(self) -> c_uint {
        match self {
            PixelFormat::Rgb1555 => raw::RETRO_PIXEL_FORMAT_0RGB1555,
            PixelFormat::Xrgb8888 => raw::RETRO_PIXEL_FORMAT_XRGB8888,
            PixelFormat::Rgb565 => raw::RETRO_PIXEL_FORMAT_RGB565,
        }
    }

    /// Decodes one source pixel into `[r, g, b]`.
    ///
    /// `px` must hold at least [`bytes_per_pixel`](Self::bytes_per_pixel) bytes.
    #[inline]
    pub fn decode(self, px: &[u8]) -> [u8; 3] {
        match self {
            PixelFormat::Xrgb8888 => {
                let v = u32::from_ne_bytes([px[0], px[1], px[2], px[3]]);
                [(v >> 16) as u8, (v >> 8) as u8, v as u8]
            }
            PixelFormat::Rgb565 => {
                let v = u16::from_ne_bytes([px[0], px[1]]);
                [
                    expand5(((v >> 11) & 0x1F) as u8),
                    expand6(((v >> 5) & 0x3F) as u8),
                    expand5((v & 0x1F) as u8),
                ]
            }
            PixelFormat::Rgb1555 => {
                let v = u16::from_ne_bytes([px[0], px[1]]);
                [
                    expand5(((v >> 10) & 0x1F) as u8),
                    expand5(((v >> 5) & 0x1F) as u8),
                    expand5((v & 0x1F) as u8),
                ]
            }
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PixelFormat::Rgb1555 => "0rgb1555",
            PixelFormat::Xrgb8888 => "xrgb8888",
            PixelFormat::Rgb565 => "rgb565",
        };
        f.write_str(s)
    }
}

/// Widens a 5-bit channel to 8 bits; the low bits replicate the high bits so
/// that full intensity maps to 255.
#[inline]
const fn expand5(c: u8) -> u8 {
    (c << 3) | (c >> 2)
}

#[inline]
const fn expand6(c: u8) -> u8 {
    (c << 2) | (c >> 4)
}

/// Why a raw frame could not be converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertError {
    /// `pitch` is smaller than one row of pixels.
    PitchTooSmall { pitch: usize, min: usize },
    /// The source slice ends before the last row does.
    SourceTooShort { len: usize, required: usize },
    /// The frame's byte size does not fit in memory.
    TooLarge { width: usize, height: usize, pitch: usize },
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::PitchTooSmall { pitch, min } => {
                write!(f, "pitch {pitch} is smaller than a row ({min} bytes)")
            }
            ConvertError::SourceTooShort { len, required } => {
                write!(f, "source holds {len} bytes, frame needs {required}")
            }
            ConvertError::TooLarge {
                width,
                height,
                pitch,
            } => write!(f, "{width}x{height} frame with pitch {pitch} overflows"),
        }
    }
}

impl std::error::Error for ConvertError {}

/// Number of source bytes a `width x height` frame with `pitch` spans.
///
/// The final row only needs `width * bpp` bytes; padding after it is optional.
/// `None` if the span overflows or exceeds `isize::MAX`.
pub fn source_len(format: PixelFormat, width: usize, height: usize, pitch: usize) -> Option<usize> {
    if width == 0 || height == 0 {
        return Some(0);
    }
    pitch
        .checked_mul(height - 1)?
        .checked_add(width.checked_mul(format.bytes_per_pixel())?)
        .filter(|&len| len <= isize::MAX as usize)
}

/// Converts a packed frame into RGBA8888 with alpha forced to 255.
///
/// `dst` is resized to `width * height * 4`; its row stride is always
/// `width * 4` regardless of the source `pitch`.
pub fn convert_frame(
    format: PixelFormat,
    src: &[u8],
    width: usize,
    height: usize,
    pitch: usize,
    dst: &mut Vec<u8>,
) -> Result<(), ConvertError> {
    let too_large = ConvertError::TooLarge {
        width,
        height,
        pitch,
    };
    let bpp = format.bytes_per_pixel();
    let row_bytes = width.checked_mul(bpp).ok_or(too_large)?;
    let dst_len = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(4))
        .ok_or(too_large)?;
    if pitch < row_bytes {
        return Err(ConvertError::PitchTooSmall {
            pitch,
            min: row_bytes,
        });
    }
    let required = source_len(format, width, height, pitch).ok_or(too_large)?;
    if src.len() < required {
        return Err(ConvertError::SourceTooShort {
            len: src.len(),
            required,
        });
    }

    dst.clear();
    dst.resize(dst_len, 0);
    if width == 0 || height == 0 {
        return Ok(());
    }

    for (y, out_row) in dst.chunks_exact_mut(width * 4).enumerate() {
        let row = &src[y * pitch..y * pitch + row_bytes];
        for (px, out) in row.chunks_exact(bpp).zip(out_row.chunks_exact_mut(4)) {
            let [r, g, b] = format.decode(px);
            out.copy_from_slice(&[r, g, b, 0xFF]);
        }
    }
    Ok(())
}

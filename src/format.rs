use std::sync::Arc;

use image::{Pixel, Rgba};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Colour table of an indexed surface.  Shared by every tile of the surface.
pub type ColorTable = Arc<[Rgba<u8>]>;

/// Raw bytes of a single encoded pixel (at most 4).
pub type PixelBytes = SmallVec<[u8; 4]>;

/// Storage layout of a surface's tile buffers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 8-bit straight-alpha RGBA.
    #[default]
    Rgba8,
    /// 8-bit RGB, implicitly opaque.
    Rgb8,
    /// 8-bit luma, implicitly opaque.
    Gray8,
    /// 8-bit coverage only (masks, selections).
    Alpha8,
    /// 8-bit index into the surface colour table.
    Indexed8,
}

impl PixelFormat {
    pub const fn bits_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8 => 32,
            PixelFormat::Rgb8 => 24,
            PixelFormat::Gray8 | PixelFormat::Alpha8 | PixelFormat::Indexed8 => 8,
        }
    }

    pub const fn bytes_per_pixel(self) -> usize {
        self.bits_per_pixel() / 8
    }

    pub const fn is_indexed(self) -> bool {
        matches!(self, PixelFormat::Indexed8)
    }

    pub const fn has_alpha(self) -> bool {
        matches!(self, PixelFormat::Rgba8 | PixelFormat::Alpha8 | PixelFormat::Indexed8)
    }

    /// Encode a colour into this format's raw bytes.
    pub fn encode(self, color: Rgba<u8>, table: &[Rgba<u8>]) -> PixelBytes {
        let Rgba([r, g, b, a]) = color;
        match self {
            PixelFormat::Rgba8 => SmallVec::from_slice(&[r, g, b, a]),
            PixelFormat::Rgb8 => SmallVec::from_slice(&[r, g, b]),
            PixelFormat::Gray8 => SmallVec::from_slice(&[color.to_luma()[0]]),
            PixelFormat::Alpha8 => SmallVec::from_slice(&[a]),
            PixelFormat::Indexed8 => SmallVec::from_slice(&[nearest_index(color, table)]),
        }
    }

    /// Decode raw bytes (at least `bytes_per_pixel` long) back to RGBA.
    pub fn decode(self, bytes: &[u8], table: &[Rgba<u8>]) -> Rgba<u8> {
        match self {
            PixelFormat::Rgba8 => Rgba([bytes[0], bytes[1], bytes[2], bytes[3]]),
            PixelFormat::Rgb8 => Rgba([bytes[0], bytes[1], bytes[2], 255]),
            PixelFormat::Gray8 => Rgba([bytes[0], bytes[0], bytes[0], 255]),
            PixelFormat::Alpha8 => Rgba([0, 0, 0, bytes[0]]),
            PixelFormat::Indexed8 => table
                .get(bytes[0] as usize)
                .copied()
                .unwrap_or(Rgba([0, 0, 0, 0])),
        }
    }
}

/// Closest table entry by squared RGBA distance.  Empty tables map to 0.
fn nearest_index(color: Rgba<u8>, table: &[Rgba<u8>]) -> u8 {
    let dist = |c: &Rgba<u8>| -> u32 {
        c.0.iter()
            .zip(color.0.iter())
            .map(|(&a, &b)| {
                let d = a as i32 - b as i32;
                (d * d) as u32
            })
            .sum()
    };
    table
        .iter()
        .take(256)
        .enumerate()
        .min_by_key(|(_, c)| dist(c))
        .map(|(i, _)| i as u8)
        .unwrap_or(0)
}

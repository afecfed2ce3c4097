use std::sync::Arc;

use image::{ImageBuffer, Rgba, RgbaImage};

use crate::format::{ColorTable, PixelFormat};
use crate::geometry::{Point, Rect};

/// Side length of every tile, in pixels.
pub const TILE_SIDE_LENGTH: i32 = 256;

const SIDE: usize = TILE_SIDE_LENGTH as usize;

// Row padding and alignment assume the side is a multiple of 32 pixels.
const _: () = assert!(TILE_SIDE_LENGTH % 32 == 0);

/// Byte length of one tile buffer in `format`.
pub const fn buffer_length(format: PixelFormat) -> usize {
    (SIDE * SIDE / 8) * format.bits_per_pixel()
}

/// Truncate a pixel offset to the grid cell containing it.
#[inline]
pub(crate) fn grid_cell_of(offset: Point) -> Point {
    Point::new(
        offset.x.div_euclid(TILE_SIDE_LENGTH),
        offset.y.div_euclid(TILE_SIDE_LENGTH),
    )
}

/// A square portion of a surface, managed as implicitly shared data.
///
/// Cloning a tile only bumps reference counts.  Pixel data is allocated on
/// the first mutable access and copied ("detached") when written while
/// another tile still references it, via `Arc::make_mut`.
///
/// A default-constructed tile is *null*: it has no format, no position and
/// no buffer, and stands for an unpopulated grid cell.
#[derive(Clone, Default)]
pub struct RasterTile {
    data: Option<TileData>,
}

#[derive(Clone)]
struct TileData {
    grid_offset: Point,
    format: PixelFormat,
    color_table: ColorTable,
    buffer: Option<Arc<Vec<u8>>>,
}

impl RasterTile {
    /// Create an empty (unbuffered) tile at pixel offset `offset`.
    /// Non-aligned offsets are truncated to the containing tile.
    pub fn new(format: PixelFormat, offset: Point, color_table: ColorTable) -> Self {
        warn_if_unaligned(offset);
        Self {
            data: Some(TileData {
                grid_offset: grid_cell_of(offset),
                format,
                color_table,
                buffer: None,
            }),
        }
    }

    /// Null tile.
    pub const fn null() -> Self {
        Self { data: None }
    }

    pub fn is_null(&self) -> bool {
        self.data.is_none()
    }

    // ---- position -----------------------------------------------------------

    /// Pixel-space position of the top-left corner.  Always tile-aligned.
    pub fn offset(&self) -> Point {
        self.grid_offset().scaled(TILE_SIDE_LENGTH)
    }

    pub fn grid_offset(&self) -> Point {
        self.data.as_ref().map(|d| d.grid_offset).unwrap_or_default()
    }

    pub fn x(&self) -> i32 { self.offset().x }
    pub fn y(&self) -> i32 { self.offset().y }

    /// Canvas rect covered by this tile (empty for a null tile).
    pub fn rect(&self) -> Rect {
        if self.is_null() {
            return Rect::default();
        }
        Rect::from_point_size(self.offset(), TILE_SIDE_LENGTH, TILE_SIDE_LENGTH)
    }

    pub fn set_offset(&mut self, offset: Point) {
        let Some(data) = self.data.as_mut() else {
            log_err!("RasterTile::set_offset: called on a null tile");
            debug_assert!(false, "set_offset on a null tile");
            return;
        };
        warn_if_unaligned(offset);
        data.grid_offset = grid_cell_of(offset);
    }

    // ---- metadata -----------------------------------------------------------

    /// Storage format.  Null tiles report the default format.
    pub fn format(&self) -> PixelFormat {
        self.data.as_ref().map(|d| d.format).unwrap_or_default()
    }

    pub fn color_table(&self) -> &[Rgba<u8>] {
        self.data.as_ref().map(|d| &*d.color_table).unwrap_or(&[])
    }

    // ---- buffer -------------------------------------------------------------

    pub fn has_buffer(&self) -> bool {
        self.data.as_ref().is_some_and(|d| d.buffer.is_some())
    }

    /// Byte length of the buffer, 0 without one.
    pub fn buffer_length(&self) -> usize {
        match &self.data {
            Some(TileData { buffer: Some(_), format, .. }) => buffer_length(*format),
            _ => 0,
        }
    }

    /// Number of tiles currently sharing this tile's buffer.
    pub fn buffer_ref_count(&self) -> usize {
        self.data
            .as_ref()
            .and_then(|d| d.buffer.as_ref())
            .map(Arc::strong_count)
            .unwrap_or(0)
    }

    pub fn is_shared(&self) -> bool {
        self.buffer_ref_count() > 1
    }

    /// Read-only raw bytes.  Never allocates.
    pub fn buffer(&self) -> Option<&[u8]> {
        self.data.as_ref()?.buffer.as_deref().map(Vec::as_slice)
    }

    /// Mutable raw bytes, allocating a zeroed buffer if there is none and
    /// detaching a shared one.  `None` only for a null tile.
    pub fn buffer_mut(&mut self) -> Option<&mut [u8]> {
        let data = self.data.as_mut()?;
        Some(data.detach_buffer().as_mut_slice())
    }

    /// Allocate a buffer for a caller that will overwrite every byte.
    ///
    /// The contents are unspecified.  The tile must be non-null and must not
    /// have a buffer yet.
    pub fn init_raw_buffer(&mut self) {
        match self.data.as_mut() {
            Some(data) if data.buffer.is_none() => {
                let len = buffer_length(data.format);
                let mut raw = Vec::with_capacity(len);
                raw.resize(len, 0u8);
                data.buffer = Some(Arc::new(raw));
            }
            Some(_) => {
                log_err!("RasterTile::init_raw_buffer: tile already has a buffer");
                debug_assert!(false, "init_raw_buffer on a buffered tile");
            }
            None => {
                log_err!("RasterTile::init_raw_buffer: called on a null tile");
                debug_assert!(false, "init_raw_buffer on a null tile");
            }
        }
    }

    /// Drop this tile's reference to its pixel data.  Returns whether there
    /// was a buffer to drop.
    pub fn discard_buffer(&mut self) -> bool {
        self.data.as_mut().is_some_and(|d| d.buffer.take().is_some())
    }

    // ---- image views --------------------------------------------------------

    /// Read-only view of the pixels.  `None` if the tile has no buffer.
    pub fn as_image(&self) -> Option<TileImage<'_>> {
        let data = self.data.as_ref()?;
        let bytes = data.buffer.as_deref()?;
        Some(TileImage {
            bytes: bytes.as_slice(),
            format: data.format,
            color_table: &data.color_table[..],
            offset: data.grid_offset.scaled(TILE_SIDE_LENGTH),
        })
    }

    /// Writable view of the pixels (allocates / detaches as `buffer_mut`).
    pub fn as_image_mut(&mut self) -> Option<TileImageMut<'_>> {
        let data = self.data.as_mut()?;
        let offset = data.grid_offset.scaled(TILE_SIDE_LENGTH);
        let format = data.format;
        let color_table = Arc::clone(&data.color_table);
        let bytes = data.detach_buffer().as_mut_slice();
        Some(TileImageMut { bytes, format, color_table, offset })
    }
}

impl TileData {
    /// Ensure an exclusively owned buffer exists and return it.
    fn detach_buffer(&mut self) -> &mut Vec<u8> {
        let format = self.format;
        let arc = self
            .buffer
            .get_or_insert_with(|| Arc::new(vec![0u8; buffer_length(format)]));
        Arc::make_mut(arc)
    }
}

impl std::fmt::Debug for RasterTile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.data {
            None => f.write_str("RasterTile(null)"),
            Some(d) => f
                .debug_struct("RasterTile")
                .field("offset", &self.offset())
                .field("format", &d.format)
                .field("buffer", &d.buffer.as_ref().map(Arc::strong_count))
                .finish(),
        }
    }
}

/// Mutable access to a tile that stays in its grid slot.
///
/// Pixel data may be written, allocated or dropped, but the position can
/// not change and the tile can not be replaced, so the slot and the tile's
/// offset always agree.  Read-only tile methods are reached through `Deref`.
pub struct TileMut<'a> {
    tile: &'a mut RasterTile,
}

impl<'a> TileMut<'a> {
    pub(crate) fn new(tile: &'a mut RasterTile) -> Self {
        Self { tile }
    }

    /// See [`RasterTile::buffer_mut`].
    pub fn buffer_mut(&mut self) -> Option<&mut [u8]> {
        self.tile.buffer_mut()
    }

    /// See [`RasterTile::as_image_mut`].
    pub fn as_image_mut(&mut self) -> Option<TileImageMut<'_>> {
        self.tile.as_image_mut()
    }

    /// Like [`as_image_mut`](Self::as_image_mut), keeping the full borrow.
    pub fn into_image_mut(self) -> Option<TileImageMut<'a>> {
        self.tile.as_image_mut()
    }

    pub fn init_raw_buffer(&mut self) {
        self.tile.init_raw_buffer();
    }

    pub fn discard_buffer(&mut self) -> bool {
        self.tile.discard_buffer()
    }
}

impl std::ops::Deref for TileMut<'_> {
    type Target = RasterTile;

    fn deref(&self) -> &RasterTile {
        self.tile
    }
}

impl std::fmt::Debug for TileMut<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&*self.tile, f)
    }
}

fn warn_if_unaligned(offset: Point) {
    if offset.x % TILE_SIDE_LENGTH != 0 || offset.y % TILE_SIDE_LENGTH != 0 {
        log_warn!("Non-aligned tile offset ({}, {}) will be truncated.", offset.x, offset.y);
    }
}

// ============================================================================
// TILE IMAGE VIEWS
// ============================================================================

/// Borrowed read-only view of a tile's pixels in tile-local coordinates.
#[derive(Clone, Copy)]
pub struct TileImage<'a> {
    bytes: &'a [u8],
    format: PixelFormat,
    color_table: &'a [Rgba<u8>],
    offset: Point,
}

impl<'a> TileImage<'a> {
    pub fn width(&self) -> u32 { TILE_SIDE_LENGTH as u32 }
    pub fn height(&self) -> u32 { TILE_SIDE_LENGTH as u32 }
    pub fn stride(&self) -> usize { SIDE * self.format.bytes_per_pixel() }
    pub fn format(&self) -> PixelFormat { self.format }
    pub fn offset(&self) -> Point { self.offset }
    pub fn bytes(&self) -> &'a [u8] { self.bytes }

    /// Raw bytes of the pixel at tile-local `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> &'a [u8] {
        let bpp = self.format.bytes_per_pixel();
        let start = pixel_index(x, y, bpp);
        &self.bytes[start..start + bpp]
    }

    pub fn pixel_rgba(&self, x: u32, y: u32) -> Rgba<u8> {
        self.format.decode(self.pixel(x, y), self.color_table)
    }

    /// Zero-copy `image` view, only for `Rgba8` tiles.
    pub fn as_rgba_image(&self) -> Option<ImageBuffer<Rgba<u8>, &'a [u8]>> {
        if self.format != PixelFormat::Rgba8 {
            return None;
        }
        ImageBuffer::from_raw(self.width(), self.height(), self.bytes)
    }

    /// Owned RGBA copy, converting from the tile's format.
    pub fn to_rgba_image(&self) -> RgbaImage {
        if let Some(view) = self.as_rgba_image() {
            return RgbaImage::from_raw(self.width(), self.height(), view.into_raw().to_vec())
                .unwrap_or_else(|| RgbaImage::new(self.width(), self.height()));
        }
        let bpp = self.format.bytes_per_pixel();
        let mut out = RgbaImage::new(self.width(), self.height());
        for (dst, src) in out.pixels_mut().zip(self.bytes.chunks_exact(bpp)) {
            *dst = self.format.decode(src, self.color_table);
        }
        out
    }
}

/// Borrowed writable view of a tile's pixels in tile-local coordinates.
/// Holding one implies the tile owns its buffer exclusively.
pub struct TileImageMut<'a> {
    bytes: &'a mut [u8],
    format: PixelFormat,
    color_table: ColorTable,
    offset: Point,
}

impl<'a> TileImageMut<'a> {
    pub fn width(&self) -> u32 { TILE_SIDE_LENGTH as u32 }
    pub fn height(&self) -> u32 { TILE_SIDE_LENGTH as u32 }
    pub fn stride(&self) -> usize { SIDE * self.format.bytes_per_pixel() }
    pub fn format(&self) -> PixelFormat { self.format }
    pub fn offset(&self) -> Point { self.offset }
    pub fn color_table(&self) -> &[Rgba<u8>] { &self.color_table }
    pub fn bytes(&self) -> &[u8] { self.bytes }
    pub fn bytes_mut(&mut self) -> &mut [u8] { self.bytes }

    pub fn as_image(&self) -> TileImage<'_> {
        TileImage {
            bytes: &*self.bytes,
            format: self.format,
            color_table: &self.color_table[..],
            offset: self.offset,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        let start = pixel_index(x, y, bpp);
        &self.bytes[start..start + bpp]
    }

    pub fn pixel_mut(&mut self, x: u32, y: u32) -> &mut [u8] {
        let bpp = self.format.bytes_per_pixel();
        let start = pixel_index(x, y, bpp);
        &mut self.bytes[start..start + bpp]
    }

    pub fn pixel_rgba(&self, x: u32, y: u32) -> Rgba<u8> {
        self.format.decode(self.pixel(x, y), &self.color_table)
    }

    /// Write raw bytes (must be `bytes_per_pixel` long).
    pub fn put_pixel(&mut self, x: u32, y: u32, raw: &[u8]) {
        self.pixel_mut(x, y).copy_from_slice(raw);
    }

    pub fn put_rgba(&mut self, x: u32, y: u32, color: Rgba<u8>) {
        let raw = self.format.encode(color, &self.color_table);
        self.put_pixel(x, y, &raw);
    }

    /// Fill the whole tile.
    pub fn fill(&mut self, color: Rgba<u8>) {
        let raw = self.format.encode(color, &self.color_table);
        if let [r, g, b, a] = raw[..] {
            // 4-byte pixels are filled as whole words.
            let pixels: &mut [[u8; 4]] = bytemuck::cast_slice_mut(self.bytes);
            pixels.fill([r, g, b, a]);
        } else {
            for px in self.bytes.chunks_exact_mut(raw.len()) {
                px.copy_from_slice(&raw);
            }
        }
    }

    /// Fill the tile-local `rect`, clipped to the tile.
    pub fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>) {
        let r = rect.intersected(&Rect::new(0, 0, TILE_SIDE_LENGTH, TILE_SIDE_LENGTH));
        if r.is_empty() {
            return;
        }
        let raw = self.format.encode(color, &self.color_table);
        let bpp = raw.len();
        let stride = self.stride();
        for y in r.top()..r.bottom() {
            let row = y as usize * stride;
            let span = &mut self.bytes[row + r.left() as usize * bpp..row + r.right() as usize * bpp];
            for px in span.chunks_exact_mut(bpp) {
                px.copy_from_slice(&raw);
            }
        }
    }

    /// Zero-copy mutable `image` view, only for `Rgba8` tiles.
    pub fn as_rgba_image_mut(&mut self) -> Option<ImageBuffer<Rgba<u8>, &mut [u8]>> {
        if self.format != PixelFormat::Rgba8 {
            return None;
        }
        let (w, h) = (self.width(), self.height());
        ImageBuffer::from_raw(w, h, &mut *self.bytes)
    }
}

#[inline(always)]
fn pixel_index(x: u32, y: u32, bpp: usize) -> usize {
    debug_assert!(x < TILE_SIDE_LENGTH as u32 && y < TILE_SIDE_LENGTH as u32);
    (y as usize * SIDE + x as usize) * bpp
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba_tile(offset: Point) -> RasterTile {
        RasterTile::new(PixelFormat::Rgba8, offset, Arc::from(Vec::new()))
    }

    #[test]
    fn buffer_length_follows_format() {
        assert_eq!(buffer_length(PixelFormat::Rgba8), 256 * 256 * 4);
        assert_eq!(buffer_length(PixelFormat::Rgb8), 256 * 256 * 3);
        assert_eq!(buffer_length(PixelFormat::Alpha8), 256 * 256);
    }

    #[test]
    fn offsets_are_truncated_to_the_grid() {
        crate::logger::init_for_tests();
        let mut tile = rgba_tile(Point::new(300, 10));
        assert_eq!(tile.offset(), Point::new(256, 0));
        tile.set_offset(Point::new(-1, 513));
        assert_eq!(tile.offset(), Point::new(-256, 512));
        assert_eq!(tile.grid_offset(), Point::new(-1, 2));
        assert_eq!(tile.offset().x % TILE_SIDE_LENGTH, 0);
    }

    #[test]
    fn null_tile_has_nothing() {
        let mut tile = RasterTile::null();
        assert!(tile.is_null());
        assert!(!tile.has_buffer());
        assert!(tile.as_image().is_none());
        assert!(tile.as_image_mut().is_none());
        assert_eq!(tile.buffer_length(), 0);
        assert!(tile.rect().is_empty());
    }

    #[test]
    fn buffer_is_allocated_lazily_and_zeroed() {
        let mut tile = rgba_tile(Point::new(0, 0));
        assert!(!tile.has_buffer());
        assert!(tile.as_image().is_none());
        let bytes = tile.buffer_mut().expect("non-null tile");
        assert!(bytes.iter().all(|&b| b == 0));
        assert!(tile.has_buffer());
        assert_eq!(tile.buffer_length(), buffer_length(PixelFormat::Rgba8));
    }

    #[test]
    fn copy_on_write_keeps_the_original() {
        let mut original = rgba_tile(Point::new(0, 0));
        original.as_image_mut().unwrap().put_rgba(5, 5, Rgba([1, 2, 3, 4]));

        let mut copy = original.clone();
        assert_eq!(original.buffer_ref_count(), 2);
        assert!(copy.is_shared());

        copy.as_image_mut().unwrap().put_rgba(5, 5, Rgba([9, 9, 9, 9]));
        assert_eq!(original.buffer_ref_count(), 1);
        assert_eq!(copy.buffer_ref_count(), 1);
        assert_eq!(original.as_image().unwrap().pixel_rgba(5, 5), Rgba([1, 2, 3, 4]));
        assert_eq!(copy.as_image().unwrap().pixel_rgba(5, 5), Rgba([9, 9, 9, 9]));
    }

    #[test]
    fn shared_buffer_outlives_the_original() {
        let mut original = rgba_tile(Point::new(256, 256));
        original.as_image_mut().unwrap().fill(Rgba([7, 7, 7, 7]));
        let copy = original.clone();
        drop(original);
        assert_eq!(copy.buffer_ref_count(), 1);
        assert_eq!(copy.as_image().unwrap().pixel(255, 255), &[7, 7, 7, 7]);
    }

    #[test]
    fn init_raw_buffer_allocates_once() {
        let mut tile = RasterTile::new(PixelFormat::Gray8, Point::new(0, 0), Arc::from(Vec::new()));
        tile.init_raw_buffer();
        assert!(tile.has_buffer());
        assert_eq!(tile.buffer().map(<[u8]>::len), Some(256 * 256));
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "init_raw_buffer on a buffered tile")]
    fn init_raw_buffer_twice_asserts() {
        let mut tile = RasterTile::new(PixelFormat::Gray8, Point::new(0, 0), Arc::from(Vec::new()));
        tile.init_raw_buffer();
        tile.init_raw_buffer();
    }

    #[test]
    fn tile_mut_writes_pixels_in_place() {
        let mut tile = rgba_tile(Point::new(512, 0));
        {
            let mut slot = TileMut::new(&mut tile);
            assert_eq!(slot.offset(), Point::new(512, 0));
            slot.as_image_mut().unwrap().put_rgba(1, 1, Rgba([4, 4, 4, 4]));
            assert!(slot.has_buffer());
        }
        assert_eq!(tile.as_image().unwrap().pixel_rgba(1, 1), Rgba([4, 4, 4, 4]));
        assert!(TileMut::new(&mut tile).discard_buffer());
        assert!(!tile.has_buffer());
        assert_eq!(tile.offset(), Point::new(512, 0));
    }

    #[test]
    fn fill_rect_is_clipped() {
        let mut tile = RasterTile::new(PixelFormat::Rgb8, Point::new(0, 0), Arc::from(Vec::new()));
        let mut image = tile.as_image_mut().unwrap();
        image.fill_rect(Rect::new(250, -4, 20, 8), Rgba([10, 20, 30, 255]));
        assert_eq!(image.pixel(255, 3), &[10, 20, 30]);
        assert_eq!(image.pixel(249, 3), &[0, 0, 0]);
        assert_eq!(image.pixel(255, 4), &[0, 0, 0]);
    }

    #[test]
    fn rgba_views_are_zero_copy() {
        let mut tile = rgba_tile(Point::new(0, 0));
        {
            let mut image = tile.as_image_mut().unwrap();
            let mut view = image.as_rgba_image_mut().unwrap();
            view.put_pixel(3, 4, Rgba([200, 0, 0, 255]));
        }
        let image = tile.as_image().unwrap();
        assert_eq!(image.as_rgba_image().unwrap().get_pixel(3, 4), &Rgba([200, 0, 0, 255]));
        assert_eq!(image.to_rgba_image().get_pixel(3, 4), &Rgba([200, 0, 0, 255]));
    }
}

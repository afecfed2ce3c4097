use image::{Pixel, Rgba, RgbaImage};

use crate::geometry::{Point, Rect};
use crate::tile::TileImageMut;

/// How drawn pixels combine with what is already in the tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompositionMode {
    /// Alpha-blend over the destination.
    #[default]
    SourceOver,
    /// Replace the destination.
    Source,
}

/// Per-tile painter settings.  Lives for as long as a paint cursor stays on
/// the tile and is reset when it moves.
#[derive(Clone, Debug)]
pub struct PainterState {
    origin: Point,
    tile_rect: Rect,
    clip: Option<Rect>,
    composition: CompositionMode,
}

impl PainterState {
    pub(crate) fn begin(tile_rect: Rect) -> Self {
        Self {
            origin: tile_rect.top_left(),
            tile_rect,
            clip: None,
            composition: CompositionMode::default(),
        }
    }
}

/// Drawing context for a single tile.  Every coordinate is in canvas
/// pixels; the tile's own offset is applied internally and drawing outside
/// the tile (or the clip rect) is dropped.
pub struct TilePainter<'p> {
    image: TileImageMut<'p>,
    state: &'p mut PainterState,
}

impl<'p> TilePainter<'p> {
    pub(crate) fn new(image: TileImageMut<'p>, state: &'p mut PainterState) -> Self {
        Self { image, state }
    }

    /// Canvas rect of the tile being painted.
    pub fn tile_rect(&self) -> Rect {
        self.state.tile_rect
    }

    /// Canvas rect drawing is currently limited to.
    pub fn paint_rect(&self) -> Rect {
        match self.state.clip {
            Some(clip) => clip.intersected(&self.state.tile_rect),
            None => self.state.tile_rect,
        }
    }

    pub fn composition_mode(&self) -> CompositionMode {
        self.state.composition
    }

    pub fn set_composition_mode(&mut self, mode: CompositionMode) {
        self.state.composition = mode;
    }

    pub fn clip_rect(&self) -> Option<Rect> {
        self.state.clip
    }

    /// Limit drawing to a canvas rect (`None` removes the clip).
    pub fn set_clip_rect(&mut self, clip: Option<Rect>) {
        self.state.clip = clip;
    }

    /// The tile's pixels in tile-local coordinates.
    pub fn image(&self) -> &TileImageMut<'p> {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut TileImageMut<'p> {
        &mut self.image
    }

    /// Colour at canvas point `p`, `None` outside the tile.
    pub fn pixel(&self, p: Point) -> Option<Rgba<u8>> {
        if !self.state.tile_rect.contains_point(p) {
            return None;
        }
        let (x, y) = self.local(p);
        Some(self.image.pixel_rgba(x, y))
    }

    pub fn put_pixel(&mut self, p: Point, color: Rgba<u8>) {
        if !self.paint_rect().contains_point(p) {
            return;
        }
        let (x, y) = self.local(p);
        self.composite(x, y, color);
    }

    /// Fill a canvas rect with `color`.
    pub fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>) {
        let r = rect.intersected(&self.paint_rect());
        if r.is_empty() {
            return;
        }
        let replaces = self.state.composition == CompositionMode::Source || color[3] == 255;
        if replaces {
            let local = r.translated(-self.state.origin.x, -self.state.origin.y);
            self.image.fill_rect(local, color);
            return;
        }
        for cy in r.top()..r.bottom() {
            for cx in r.left()..r.right() {
                let (x, y) = self.local(Point::new(cx, cy));
                self.composite(x, y, color);
            }
        }
    }

    /// Draw `src` with its top-left corner at canvas point `at`.
    pub fn draw_image(&mut self, at: Point, src: &RgbaImage) {
        let src_rect = Rect::from_point_size(at, src.width() as i32, src.height() as i32);
        let r = src_rect.intersected(&self.paint_rect());
        for cy in r.top()..r.bottom() {
            for cx in r.left()..r.right() {
                let color = *src.get_pixel((cx - at.x) as u32, (cy - at.y) as u32);
                let (x, y) = self.local(Point::new(cx, cy));
                self.composite(x, y, color);
            }
        }
    }

    #[inline]
    fn local(&self, p: Point) -> (u32, u32) {
        ((p.x - self.state.origin.x) as u32, (p.y - self.state.origin.y) as u32)
    }

    fn composite(&mut self, x: u32, y: u32, color: Rgba<u8>) {
        match self.state.composition {
            CompositionMode::Source => self.image.put_rgba(x, y, color),
            CompositionMode::SourceOver => match color[3] {
                0 => {}
                255 => self.image.put_rgba(x, y, color),
                _ => {
                    let mut dst = self.image.pixel_rgba(x, y);
                    dst.blend(&color);
                    self.image.put_rgba(x, y, dst);
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::format::PixelFormat;
    use crate::tile::RasterTile;

    fn painted(offset: Point, f: impl FnOnce(&mut TilePainter<'_>)) -> RasterTile {
        let mut tile = RasterTile::new(PixelFormat::Rgba8, offset, Arc::from(Vec::new()));
        let mut state = PainterState::begin(tile.rect());
        {
            let image = tile.as_image_mut().unwrap();
            let mut painter = TilePainter::new(image, &mut state);
            f(&mut painter);
        }
        tile
    }

    #[test]
    fn coordinates_are_canvas_space() {
        let tile = painted(Point::new(256, -256), |p| {
            p.put_pixel(Point::new(260, -250), Rgba([1, 2, 3, 255]));
            // Outside this tile.
            p.put_pixel(Point::new(10, 10), Rgba([9, 9, 9, 255]));
        });
        let image = tile.as_image().unwrap();
        assert_eq!(image.pixel_rgba(4, 6), Rgba([1, 2, 3, 255]));
        assert_eq!(image.pixel_rgba(10, 10), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn clip_limits_fill() {
        let tile = painted(Point::new(0, 0), |p| {
            p.set_clip_rect(Some(Rect::new(0, 0, 10, 10)));
            p.fill_rect(Rect::new(5, 5, 100, 100), Rgba([0, 255, 0, 255]));
        });
        let image = tile.as_image().unwrap();
        assert_eq!(image.pixel_rgba(9, 9), Rgba([0, 255, 0, 255]));
        assert_eq!(image.pixel_rgba(10, 10), Rgba([0, 0, 0, 0]));
        assert_eq!(image.pixel_rgba(4, 4), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn source_over_blends_and_source_replaces() {
        let tile = painted(Point::new(0, 0), |p| {
            p.fill_rect(Rect::new(0, 0, 2, 1), Rgba([255, 0, 0, 255]));
            p.put_pixel(Point::new(0, 0), Rgba([0, 0, 255, 0]));
            p.set_composition_mode(CompositionMode::Source);
            p.put_pixel(Point::new(1, 0), Rgba([0, 0, 255, 0]));
        });
        let image = tile.as_image().unwrap();
        assert_eq!(image.pixel_rgba(0, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(image.pixel_rgba(1, 0), Rgba([0, 0, 255, 0]));
    }

    #[test]
    fn draw_image_is_offset_and_clipped() {
        let mut src = RgbaImage::new(4, 4);
        src.put_pixel(3, 3, Rgba([7, 7, 7, 255]));
        let tile = painted(Point::new(0, 0), |p| p.draw_image(Point::new(254, 254), &src));
        let image = tile.as_image().unwrap();
        assert_eq!(image.pixel_rgba(255, 255), Rgba([0, 0, 0, 0]));
        let tile = painted(Point::new(0, 0), |p| p.draw_image(Point::new(250, 250), &src));
        assert_eq!(tile.as_image().unwrap().pixel_rgba(253, 253), Rgba([7, 7, 7, 255]));
    }
}

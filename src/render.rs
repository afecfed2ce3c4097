use std::sync::{Arc, Weak};

use image::{Pixel, Rgba, RgbaImage};
use rayon::prelude::*;
use uuid::Uuid;

use crate::error::{RenderError, RenderResult};
use crate::format::PixelFormat;
use crate::geometry::{Point, Rect, Region};
use crate::surface::RasterSurface;
use crate::tile::{RasterTile, TILE_SIDE_LENGTH, TileMut};

impl RasterSurface {
    /// Composite canvas rect `rect` into a new RGBA image.  Unpopulated areas
    /// are transparent.
    pub fn snapshot(&self, rect: Rect) -> RgbaImage {
        if rect.is_empty() {
            return RgbaImage::new(0, 0);
        }
        let mut out = RgbaImage::new(rect.width as u32, rect.height as u32);
        let view = self.tiles_at(rect);
        let tiles: Vec<&RasterTile> = view.iter().collect();

        // Format conversion is the expensive part, so decode tiles in parallel.
        let decoded: Vec<(Point, RgbaImage)> = tiles
            .par_iter()
            .filter_map(|tile| {
                let image = tile.as_image()?;
                Some((tile.offset(), image.to_rgba_image()))
            })
            .collect();
        drop(tiles);
        drop(view);

        let out_width = out.width() as usize;
        for (offset, pixels) in &decoded {
            let tile_rect = Rect::from_point_size(*offset, TILE_SIDE_LENGTH, TILE_SIDE_LENGTH);
            let area = tile_rect.intersected(&rect);
            copy_rows(
                &mut out,
                Plane { width: out_width, origin: rect.top_left() },
                pixels,
                Plane { width: TILE_SIDE_LENGTH as usize, origin: *offset },
                area,
            );
        }
        out
    }

    /// Write `src` into the surface with its top-left corner at canvas point
    /// `at`, replacing what was there.
    ///
    /// Fully transparent chunks never allocate a tile buffer; chunks falling
    /// on an already populated tile are written regardless.
    pub fn import_rgba(&self, src: &RgbaImage, at: Point) {
        let src_rect = Rect::from_point_size(at, src.width() as i32, src.height() as i32);
        if src_rect.is_empty() {
            return;
        }
        let mut handle = self.edit_tiles(src_rect);
        let tiles: Vec<TileMut<'_>> = handle.iter_mut().collect();
        tiles
            .into_par_iter()
            .for_each(|tile| import_chunk(tile, src, src_rect));
    }

    /// Weak compositor adapter for this surface.
    pub fn render_entity(self: &Arc<Self>) -> RenderEntity {
        RenderEntity { surface: Arc::downgrade(self), id: self.id() }
    }
}

fn import_chunk(mut tile: TileMut<'_>, src: &RgbaImage, src_rect: Rect) {
    let area = tile.rect().intersected(&src_rect);
    if area.is_empty() {
        return;
    }
    let src_at = |x: i32, y: i32| *src.get_pixel((x - src_rect.x) as u32, (y - src_rect.y) as u32);
    let transparent = (area.top()..area.bottom())
        .all(|y| (area.left()..area.right()).all(|x| src_at(x, y)[3] == 0));
    if transparent && !tile.has_buffer() {
        return;
    }
    let Some(mut image) = tile.as_image_mut() else {
        return;
    };
    let origin = image.offset();
    if image.format() == PixelFormat::Rgba8 {
        copy_rows(
            image.bytes_mut(),
            Plane { width: TILE_SIDE_LENGTH as usize, origin },
            src,
            Plane { width: src.width() as usize, origin: src_rect.top_left() },
            area,
        );
        return;
    }
    for y in area.top()..area.bottom() {
        for x in area.left()..area.right() {
            image.put_rgba((x - origin.x) as u32, (y - origin.y) as u32, src_at(x, y));
        }
    }
}

/// Geometry of a packed RGBA8 pixel plane in canvas space.
#[derive(Clone, Copy)]
struct Plane {
    width: usize,
    origin: Point,
}

/// Copy canvas rect `area` (inside both planes) row by row.
fn copy_rows(dst: &mut [u8], dst_plane: Plane, src: &[u8], src_plane: Plane, area: Rect) {
    if area.is_empty() {
        return;
    }
    let row_len = area.width as usize * 4;
    for y in area.top()..area.bottom() {
        let d = offset_of(dst_plane, area.left(), y);
        let s = offset_of(src_plane, area.left(), y);
        dst[d..d + row_len].copy_from_slice(&src[s..s + row_len]);
    }
}

#[inline]
fn offset_of(plane: Plane, x: i32, y: i32) -> usize {
    ((y - plane.origin.y) as usize * plane.width + (x - plane.origin.x) as usize) * 4
}

// ----------------------------------------------------------------------------
// Render entity
// ----------------------------------------------------------------------------

/// Draws a surface onto an RGBA paint device.  Holds the surface weakly, so
/// a compositor never keeps a deleted layer alive.
#[derive(Clone, Debug)]
pub struct RenderEntity {
    surface: Weak<RasterSurface>,
    id: Uuid,
}

impl RenderEntity {
    /// Id of the surface this entity draws.
    pub fn surface_id(&self) -> Uuid {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        self.surface.strong_count() > 0
    }

    /// The surface's region, empty once it is gone.
    pub fn region(&self) -> Region {
        self.surface.upgrade().map(|s| s.region()).unwrap_or_default()
    }

    pub fn bounding_rect(&self) -> Rect {
        self.surface.upgrade().map(|s| s.bounding_rect()).unwrap_or_default()
    }

    /// Source-over blit of the surface's pixels inside `area` onto `dest`,
    /// whose pixel (0, 0) sits at canvas point `dest_origin`.
    pub fn draw(&self, dest: &mut RgbaImage, dest_origin: Point, area: &Region) -> RenderResult<()> {
        let surface = self.surface.upgrade().ok_or(RenderError::SurfaceDropped)?;
        let dest_rect = Rect::from_point_size(dest_origin, dest.width() as i32, dest.height() as i32);
        let bound = area.bounding_rect().intersected(&dest_rect);
        if bound.is_empty() {
            return Ok(());
        }

        let view = surface.tiles_at(bound);
        for tile in view.iter() {
            let Some(image) = tile.as_image() else {
                continue;
            };
            let origin = image.offset();
            for rect in area.rects() {
                let clip = rect.intersected(&dest_rect).intersected(&tile.rect());
                for y in clip.top()..clip.bottom() {
                    for x in clip.left()..clip.right() {
                        let src: Rgba<u8> = image.pixel_rgba((x - origin.x) as u32, (y - origin.y) as u32);
                        let dst = dest.get_pixel_mut((x - dest_origin.x) as u32, (y - dest_origin.y) as u32);
                        match src[3] {
                            0 => {}
                            255 => *dst = src,
                            _ => dst.blend(&src),
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect};
use crate::tile::{RasterTile, TILE_SIDE_LENGTH};

/// How the grid grows when an edit lands outside it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthPolicy {
    /// Grow to exactly cover the old grid and the request.
    Exact,
    /// Extend every violated side by at least the grid's current extent
    /// along that axis, so repeated small extensions amortise.
    #[default]
    Double,
}

/// Largest tile-aligned canvas coordinate.  Tiles cover exactly
/// `-CANVAS_EXTENT..CANVAS_EXTENT` on each axis, so every tile rect has
/// representable edges; pixels beyond are never stored.
pub const CANVAS_EXTENT: i32 = GRID_EXTENT * TILE_SIDE_LENGTH;

/// [`CANVAS_EXTENT`] in tiles.
pub const GRID_EXTENT: i32 = i32::MAX / TILE_SIDE_LENGTH;

/// Exclusive pixel edges of `rect`, clipped to the storable canvas.  `None`
/// if nothing is left.
fn clipped_edges(rect: Rect) -> Option<[i64; 4]> {
    if rect.is_empty() {
        return None;
    }
    let ext = CANVAS_EXTENT as i64;
    let left = (rect.x as i64).max(-ext);
    let top = (rect.y as i64).max(-ext);
    let right = (rect.x as i64 + rect.width as i64).min(ext);
    let bottom = (rect.y as i64 + rect.height as i64).min(ext);
    (left < right && top < bottom).then_some([left, top, right, bottom])
}

/// `rect` clipped to the storable canvas.
pub fn clip_to_canvas(rect: Rect) -> Rect {
    match clipped_edges(rect) {
        Some([l, t, r, b]) => Rect::new(l as i32, t as i32, (r - l) as i32, (b - t) as i32),
        None => Rect::default(),
    }
}

#[inline]
fn floor_div(v: i64) -> i32 {
    v.div_euclid(TILE_SIDE_LENGTH as i64) as i32
}

#[inline]
fn ceil_div(v: i64) -> i32 {
    let s = TILE_SIDE_LENGTH as i64;
    (v.div_euclid(s) + (v.rem_euclid(s) != 0) as i64) as i32
}

/// Pixel rect → covering grid rect (floor left/top, ceil right/bottom).
/// Pixels outside the storable canvas are ignored.
#[inline]
pub fn to_grid_rect(rect: Rect) -> Rect {
    let Some([left, top, right, bottom]) = clipped_edges(rect) else {
        return Rect::default();
    };
    Rect::from_edges(floor_div(left), floor_div(top), ceil_div(right), ceil_div(bottom))
}

/// Grid rect → pixel rect.  Exact inverse scaling of [`to_grid_rect`] for
/// tile-aligned rects; sizes wider than `i32` saturate.
#[inline]
pub fn to_canvas_rect(grid_rect: Rect) -> Rect {
    let s = TILE_SIDE_LENGTH;
    Rect::new(
        grid_rect.x * s,
        grid_rect.y * s,
        grid_rect.width.saturating_mul(s),
        grid_rect.height.saturating_mul(s),
    )
}

/// Grid rect of the tiles lying *entirely* inside a pixel rect.
pub fn to_inner_grid_rect(rect: Rect) -> Rect {
    let Some([left, top, right, bottom]) = clipped_edges(rect) else {
        return Rect::default();
    };
    Rect::from_edges(ceil_div(left), ceil_div(top), floor_div(right), floor_div(bottom))
}

/// Target grid rect for a grid at `current` that must cover `requested`.
pub fn grown_rect(current: Rect, requested: Rect, policy: GrowthPolicy) -> Rect {
    if current.is_empty() {
        return requested;
    }
    if requested.is_empty() || current.contains_rect(&requested) {
        return current;
    }
    let united = current.united(&requested);
    match policy {
        GrowthPolicy::Exact => united,
        GrowthPolicy::Double => {
            let mut left = united.left();
            let mut top = united.top();
            let mut right = united.right();
            let mut bottom = united.bottom();
            if requested.left() < current.left() {
                left = left.min(current.left() - current.width);
            }
            if requested.right() > current.right() {
                right = right.max(current.right() + current.width);
            }
            if requested.top() < current.top() {
                top = top.min(current.top() - current.height);
            }
            if requested.bottom() > current.bottom() {
                bottom = bottom.max(current.bottom() + current.height);
            }
            Rect::from_edges(
                left.max(-GRID_EXTENT),
                top.max(-GRID_EXTENT),
                right.min(GRID_EXTENT),
                bottom.min(GRID_EXTENT),
            )
        }
    }
}

/// Row-major array of tile slots covering the grid rect
/// `(offset, width × height)`.  Slots start null.
#[derive(Clone, Default)]
pub struct TileGrid {
    offset: Point,
    width: i32,
    height: i32,
    slots: Vec<RasterTile>,
}

impl TileGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grid-space rect covered by the slots.
    pub fn rect(&self) -> Rect {
        Rect::from_point_size(self.offset, self.width, self.height)
    }

    pub fn offset(&self) -> Point {
        self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn index_of(&self, grid_point: Point) -> Option<usize> {
        if !self.rect().contains_point(grid_point) {
            return None;
        }
        let col = (grid_point.x - self.offset.x) as usize;
        let row = (grid_point.y - self.offset.y) as usize;
        Some(row * self.width as usize + col)
    }

    #[inline]
    pub fn position_of(&self, index: usize) -> Point {
        let w = self.width.max(1) as usize;
        Point::new(
            self.offset.x + (index % w) as i32,
            self.offset.y + (index / w) as i32,
        )
    }

    pub fn get(&self, grid_point: Point) -> Option<&RasterTile> {
        self.index_of(grid_point).map(|i| &self.slots[i])
    }

    pub fn slot(&self, index: usize) -> Option<&RasterTile> {
        self.slots.get(index)
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut RasterTile> {
        self.slots.get_mut(index)
    }

    pub fn slots(&self) -> &[RasterTile] {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut [RasterTile] {
        &mut self.slots
    }

    /// Slot indices covering `grid_rect ∩ self.rect()`, in ascending
    /// (row-major) order.
    pub fn indices_in(&self, grid_rect: Rect) -> impl Iterator<Item = usize> + '_ {
        let r = grid_rect.intersected(&self.rect());
        let (ox, oy, w) = (self.offset.x, self.offset.y, self.width as usize);
        (r.top()..r.bottom()).flat_map(move |y| {
            let row = (y - oy) as usize * w;
            (r.left()..r.right()).map(move |x| row + (x - ox) as usize)
        })
    }

    /// Reallocate the slots to cover exactly `new_rect`, moving every slot
    /// inside both rects to its new relative position.  Slots falling
    /// outside `new_rect` are dropped, so callers must keep populated tiles
    /// inside it.
    pub fn rebase(&mut self, new_rect: Rect) {
        if new_rect == self.rect() {
            return;
        }
        if new_rect.is_empty() {
            self.clear();
            return;
        }

        let old_rect = self.rect();
        let mut old_slots = std::mem::take(&mut self.slots);
        let count = new_rect.width as usize * new_rect.height as usize;
        let mut slots = Vec::with_capacity(count);
        slots.resize_with(count, RasterTile::default);

        let keep = old_rect.intersected(&new_rect);
        let old_w = old_rect.width as usize;
        let new_w = new_rect.width as usize;
        for y in keep.top()..keep.bottom() {
            let from = (y - old_rect.y) as usize * old_w + (keep.x - old_rect.x) as usize;
            let to = (y - new_rect.y) as usize * new_w + (keep.x - new_rect.x) as usize;
            let n = keep.width as usize;
            for (dst, src) in slots[to..to + n].iter_mut().zip(old_slots[from..from + n].iter_mut()) {
                *dst = std::mem::take(src);
            }
        }

        tracing::debug!(
            "TileGrid::rebase: {:?} -> {:?} ({} slots)",
            old_rect,
            new_rect,
            count
        );

        self.slots = slots;
        self.offset = new_rect.top_left();
        self.width = new_rect.width;
        self.height = new_rect.height;
    }

    /// Release every slot and shrink to nothing.
    pub fn clear(&mut self) {
        self.slots = Vec::new();
        self.offset = Point::default();
        self.width = 0;
        self.height = 0;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::format::PixelFormat;

    #[test]
    fn grid_rect_conversion() {
        assert_eq!(to_grid_rect(Rect::new(300, 10, 20, 20)), Rect::new(1, 0, 1, 1));
        assert_eq!(to_grid_rect(Rect::new(250, 0, 20, 1)), Rect::new(0, 0, 2, 1));
        assert_eq!(to_grid_rect(Rect::new(-1, -257, 2, 1)), Rect::new(-1, -2, 2, 1));
        assert_eq!(to_grid_rect(Rect::new(0, 0, 256, 256)), Rect::new(0, 0, 1, 1));
        assert!(to_grid_rect(Rect::new(5, 5, 0, 3)).is_empty());
        assert_eq!(to_canvas_rect(Rect::new(-1, 2, 2, 1)), Rect::new(-256, 512, 512, 256));
    }

    #[test]
    fn conversion_near_the_i32_limits_does_not_overflow() {
        let edge = Rect::new(i32::MAX - 10, 0, 5, 5);
        assert!(to_grid_rect(edge).is_empty());
        assert!(to_inner_grid_rect(edge).is_empty());
        assert!(to_grid_rect(Rect::new(i32::MIN, i32::MIN, 10, 10)).is_empty());

        let straddling = Rect::new(CANVAS_EXTENT - 300, -5, 400, 10);
        assert_eq!(to_grid_rect(straddling), Rect::from_edges(GRID_EXTENT - 2, -1, GRID_EXTENT, 1));
        assert_eq!(clip_to_canvas(straddling), Rect::new(CANVAS_EXTENT - 300, -5, 300, 10));
        let last = to_canvas_rect(Rect::new(GRID_EXTENT - 1, 0, 1, 1));
        assert_eq!(last.right(), CANVAS_EXTENT);
    }

    #[test]
    fn doubling_growth_stays_inside_the_canvas() {
        let current = Rect::from_edges(GRID_EXTENT - 4, 0, GRID_EXTENT - 2, 1);
        let grown = grown_rect(current, Rect::new(GRID_EXTENT - 1, 0, 1, 1), GrowthPolicy::Double);
        assert_eq!(grown.right(), GRID_EXTENT);
    }

    #[test]
    fn inner_grid_rect_only_counts_whole_tiles() {
        assert_eq!(to_inner_grid_rect(Rect::new(0, 0, 512, 300)), Rect::new(0, 0, 2, 1));
        assert!(to_inner_grid_rect(Rect::new(10, 0, 300, 300)).is_empty());
    }

    #[test]
    fn doubling_growth_extends_violated_sides() {
        let current = Rect::new(0, 0, 4, 2);
        let grown = grown_rect(current, Rect::new(4, 0, 1, 1), GrowthPolicy::Double);
        assert_eq!(grown, Rect::new(0, 0, 8, 2));
        let grown = grown_rect(current, Rect::new(-1, -1, 1, 1), GrowthPolicy::Double);
        assert_eq!(grown, Rect::from_edges(-4, -2, 4, 2));
        let exact = grown_rect(current, Rect::new(-1, -1, 1, 1), GrowthPolicy::Exact);
        assert_eq!(exact, Rect::from_edges(-1, -1, 4, 2));
        assert_eq!(grown_rect(Rect::default(), Rect::new(3, 3, 1, 1), GrowthPolicy::Double), Rect::new(3, 3, 1, 1));
    }

    #[test]
    fn rebase_moves_slots_to_their_new_position() {
        let mut grid = TileGrid::new();
        grid.rebase(Rect::new(0, 0, 2, 2));
        let idx = grid.index_of(Point::new(1, 1)).unwrap();
        *grid.slot_mut(idx).unwrap() = RasterTile::new(PixelFormat::Rgba8, Point::new(256, 256), Arc::from(Vec::new()));

        grid.rebase(Rect::from_edges(-2, -1, 3, 2));
        assert_eq!(grid.rect(), Rect::from_edges(-2, -1, 3, 2));
        let moved = grid.get(Point::new(1, 1)).unwrap();
        assert!(!moved.is_null());
        assert_eq!(moved.offset(), Point::new(256, 256));
        assert!(grid.get(Point::new(0, 0)).unwrap().is_null());

        let idx = grid.index_of(Point::new(1, 1)).unwrap();
        assert_eq!(grid.position_of(idx), Point::new(1, 1));
    }

    #[test]
    fn indices_are_row_major_and_clipped() {
        let mut grid = TileGrid::new();
        grid.rebase(Rect::new(0, 0, 3, 3));
        let got: Vec<usize> = grid.indices_in(Rect::new(1, 1, 5, 5)).collect();
        assert_eq!(got, vec![4, 5, 7, 8]);
    }
}

use std::sync::RwLockWriteGuard;

use crate::geometry::Region;
use crate::painter::{PainterState, TilePainter};
use crate::surface::SurfaceData;
use crate::tile::{RasterTile, TileMut};

/// Completion callback bound to a handle.  Receives the handle's working set
/// exactly once.
pub type OnFinished<'a> = Box<dyn FnOnce(&mut WorkingSet<'a>) + 'a>;

/// The tiles a handle grants access to, together with the write lock on the
/// surface that owns them.
///
/// Slot indices are strictly ascending, which lets mutable iteration hand
/// out disjoint [`TileMut`]s without any unsafe code.
pub struct WorkingSet<'a> {
    data: Option<RwLockWriteGuard<'a, SurfaceData>>,
    tiles: Vec<usize>,
    /// Whether each working-set tile had a buffer when the handle was made.
    baseline: Vec<bool>,
    region_hint: Region,
}

impl<'a> WorkingSet<'a> {
    pub(crate) fn new(
        data: RwLockWriteGuard<'a, SurfaceData>,
        tiles: Vec<usize>,
        region_hint: Region,
    ) -> Self {
        debug_assert!(tiles.windows(2).all(|w| w[0] < w[1]));
        let baseline = tiles
            .iter()
            .map(|&i| data.grid.slot(i).is_some_and(RasterTile::has_buffer))
            .collect();
        Self { data: Some(data), tiles, baseline, region_hint }
    }

    /// A working set with no tiles and no surface behind it.
    pub fn detached(region_hint: Region) -> Self {
        Self { data: None, tiles: Vec::new(), baseline: Vec::new(), region_hint }
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn region_hint(&self) -> &Region {
        &self.region_hint
    }

    pub fn set_region_hint(&mut self, hint: Region) {
        self.region_hint = hint;
    }

    pub fn tile(&self, i: usize) -> Option<&RasterTile> {
        let idx = *self.tiles.get(i)?;
        self.data.as_ref()?.grid.slot(idx)
    }

    pub fn tile_mut(&mut self, i: usize) -> Option<TileMut<'_>> {
        self.slot_mut(i).map(TileMut::new)
    }

    fn slot_mut(&mut self, i: usize) -> Option<&mut RasterTile> {
        let idx = *self.tiles.get(i)?;
        self.data.as_mut()?.grid.slot_mut(idx)
    }

    pub fn iter(&self) -> Tiles<'_> {
        let slots: &[RasterTile] = match self.data.as_ref() {
            Some(d) => d.grid.slots(),
            None => &[],
        };
        Tiles { slots: slots.iter(), pending: self.tiles.iter(), cursor: 0 }
    }

    pub fn iter_mut(&mut self) -> TilesMut<'_> {
        let slots: &mut [RasterTile] = match self.data.as_mut() {
            Some(d) => d.grid.slots_mut(),
            None => &mut [],
        };
        TilesMut { slots: slots.iter_mut(), pending: self.tiles.iter(), cursor: 0 }
    }

    /// Fold every buffer gained or lost since the set was made into the
    /// surface's population counts.
    fn reconcile(&mut self) {
        let Some(data) = self.data.as_deref_mut() else {
            return;
        };
        for (&idx, had) in self.tiles.iter().zip(self.baseline.iter_mut()) {
            let has = data.grid.slot(idx).is_some_and(RasterTile::has_buffer);
            if has == *had {
                continue;
            }
            let cell = data.grid.position_of(idx);
            if has {
                data.population.increment(cell);
            } else {
                data.population.decrement(cell);
            }
            *had = has;
        }
    }

    /// Reconcile population and hand the surface lock to the caller.
    pub(crate) fn take_data(&mut self) -> Option<RwLockWriteGuard<'a, SurfaceData>> {
        self.reconcile();
        self.data.take()
    }

    fn release(&mut self) {
        self.reconcile();
        self.tiles.clear();
        self.baseline.clear();
        self.data = None;
    }
}

impl Drop for WorkingSet<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Iterator over the tiles of a working set.
pub struct Tiles<'s> {
    slots: std::slice::Iter<'s, RasterTile>,
    pending: std::slice::Iter<'s, usize>,
    cursor: usize,
}

impl<'s> Iterator for Tiles<'s> {
    type Item = &'s RasterTile;

    fn next(&mut self) -> Option<Self::Item> {
        let idx = *self.pending.next()?;
        let skip = idx - self.cursor;
        self.cursor = idx + 1;
        self.slots.nth(skip)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pending.size_hint()
    }
}

/// Mutable iterator over the tiles of a working set.
pub struct TilesMut<'s> {
    slots: std::slice::IterMut<'s, RasterTile>,
    pending: std::slice::Iter<'s, usize>,
    cursor: usize,
}

impl<'s> Iterator for TilesMut<'s> {
    type Item = TileMut<'s>;

    fn next(&mut self) -> Option<Self::Item> {
        let idx = *self.pending.next()?;
        let skip = idx - self.cursor;
        self.cursor = idx + 1;
        self.slots.nth(skip).map(TileMut::new)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pending.size_hint()
    }
}

// ----------------------------------------------------------------------------
// Shared handle core: exactly-once completion
// ----------------------------------------------------------------------------

struct HandleBase<'a> {
    set: WorkingSet<'a>,
    on_finished: Option<OnFinished<'a>>,
}

impl<'a> HandleBase<'a> {
    fn new(set: WorkingSet<'a>, on_finished: OnFinished<'a>) -> Self {
        Self { set, on_finished: Some(on_finished) }
    }

    fn inactive() -> Self {
        Self { set: WorkingSet::detached(Region::new()), on_finished: None }
    }

    fn finish(&mut self) {
        if let Some(on_finished) = self.on_finished.take() {
            on_finished(&mut self.set);
            self.set.release();
        }
    }

    fn deactivate(&mut self) {
        self.on_finished = None;
    }

    fn is_active(&self) -> bool {
        self.on_finished.is_some()
    }
}

impl Drop for HandleBase<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}

macro_rules! handle_common {
    ($handle:ident) => {
        impl<'a> $handle<'a> {
            /// Bind `set` to a completion callback.
            pub fn new(set: WorkingSet<'a>, on_finished: OnFinished<'a>) -> Self {
                Self { base: HandleBase::new(set, on_finished) }
            }

            /// Fire the completion callback now.  No-op once finished.
            pub fn finish(&mut self) {
                self.base.finish();
            }

            /// Drop the completion obligation without firing it.  The
            /// working set (and surface lock) stay held until drop.
            pub fn deactivate(&mut self) {
                self.base.deactivate();
            }

            pub fn is_active(&self) -> bool {
                self.base.is_active()
            }

            pub fn len(&self) -> usize {
                self.base.set.len()
            }

            pub fn is_empty(&self) -> bool {
                self.base.set.is_empty()
            }

            pub fn region_hint(&self) -> &Region {
                self.base.set.region_hint()
            }

            pub fn set_region_hint(&mut self, hint: Region) {
                self.base.set.set_region_hint(hint);
            }

            /// Read access to the working set in handle order.
            pub fn tiles(&self) -> Tiles<'_> {
                self.base.set.iter()
            }
        }

        impl Default for $handle<'_> {
            fn default() -> Self {
                Self { base: HandleBase::inactive() }
            }
        }
    };
}

// ----------------------------------------------------------------------------
// Edit handle
// ----------------------------------------------------------------------------

/// Direct read/write access to a working set of tiles.
///
/// The surface stays write-locked until the handle is finished or dropped;
/// query the surface only after that.
pub struct EditHandle<'a> {
    base: HandleBase<'a>,
}

handle_common!(EditHandle);

impl<'a> EditHandle<'a> {
    pub fn iter(&self) -> Tiles<'_> {
        self.base.set.iter()
    }

    pub fn iter_mut(&mut self) -> TilesMut<'_> {
        self.base.set.iter_mut()
    }

    pub fn get(&self, i: usize) -> Option<&RasterTile> {
        self.base.set.tile(i)
    }

    pub fn get_mut(&mut self, i: usize) -> Option<TileMut<'_>> {
        self.base.set.tile_mut(i)
    }
}

impl<'h, 'a> IntoIterator for &'h mut EditHandle<'a> {
    type Item = TileMut<'h>;
    type IntoIter = TilesMut<'h>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<'h, 'a> IntoIterator for &'h EditHandle<'a> {
    type Item = &'h RasterTile;
    type IntoIter = Tiles<'h>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ----------------------------------------------------------------------------
// Paint handle
// ----------------------------------------------------------------------------

/// Access to a working set of tiles through per-tile drawing contexts.
///
/// Painters are only built for tiles the caller actually dereferences, so
/// tiles enumerated by a conservative query but never drawn on stay
/// unbuffered.
pub struct PaintHandle<'a> {
    base: HandleBase<'a>,
}

handle_common!(PaintHandle);

impl<'a> PaintHandle<'a> {
    /// Cursor positioned on the first tile.
    pub fn cursor(&mut self) -> PaintCursor<'_, 'a> {
        PaintCursor { set: &mut self.base.set, pos: 0, state: None }
    }

    /// Run `f` with a painter for every tile in turn.
    pub fn for_each_painter(&mut self, mut f: impl FnMut(&mut TilePainter<'_>)) {
        let mut cursor = self.cursor();
        while !cursor.is_done() {
            if let Some(mut painter) = cursor.painter() {
                f(&mut painter);
            }
            cursor.advance();
        }
    }
}

/// Explicit iterator over a paint handle's tiles.
///
/// The painter for the current tile is built on the first call to
/// [`painter`](Self::painter) and cached until the cursor moves or
/// [`release`](Self::release) is called.
pub struct PaintCursor<'h, 'a> {
    set: &'h mut WorkingSet<'a>,
    pos: usize,
    state: Option<PainterState>,
}

impl<'h, 'a> PaintCursor<'h, 'a> {
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// True once the cursor has moved past the last tile.
    pub fn is_done(&self) -> bool {
        self.pos >= self.set.len()
    }

    /// The current tile, without building a painter.
    pub fn tile(&self) -> Option<&RasterTile> {
        self.set.tile(self.pos)
    }

    /// Whether a painter is currently cached.
    pub fn is_engaged(&self) -> bool {
        self.state.is_some()
    }

    /// Painter for the current tile, built on first use.
    pub fn painter(&mut self) -> Option<TilePainter<'_>> {
        let tile = self.set.slot_mut(self.pos)?;
        let tile_rect = tile.rect();
        let state = self.state.get_or_insert_with(|| PainterState::begin(tile_rect));
        let image = tile.as_image_mut()?;
        Some(TilePainter::new(image, state))
    }

    /// Drop the cached painter, if any.
    pub fn release(&mut self) {
        self.state = None;
    }

    /// Move to the next tile.  Returns false once past the end.
    pub fn advance(&mut self) -> bool {
        self.advance_by(1)
    }

    /// Move to the previous tile.  Returns false at the front.
    pub fn retreat(&mut self) -> bool {
        if self.pos == 0 {
            self.release();
            return false;
        }
        self.advance_by(-1)
    }

    /// Move by `n` tiles (clamped to `0..=len`).
    pub fn advance_by(&mut self, n: isize) -> bool {
        self.release();
        let target = (self.pos as isize + n).clamp(0, self.set.len() as isize);
        self.pos = target as usize;
        !self.is_done()
    }

    pub fn seek(&mut self, pos: usize) -> bool {
        self.release();
        self.pos = pos.min(self.set.len());
        !self.is_done()
    }
}

impl Drop for PaintCursor<'_, '_> {
    fn drop(&mut self) {
        self.release();
    }
}

//! Layout: a `TileGrid` of slots in tile units, a `PopulationTracker` of the
//! slots holding pixel buffers, and the canvas-space `Region` the surface has
//! been asked to cover.  All three live behind one `RwLock`.  Read queries
//! share it; structural changes and every live edit/paint handle hold it
//! exclusively.  Observers are notified after the lock is released.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, mpsc};

use image::Rgba;
use uuid::Uuid;

use crate::config::SurfaceConfig;
use crate::error::ConfigResult;
use crate::format::{ColorTable, PixelFormat};
use crate::geometry::{Path, Point, Rect, Region};
use crate::grid::{
    GrowthPolicy, TileGrid, clip_to_canvas, grown_rect, to_canvas_rect, to_grid_rect, to_inner_grid_rect,
};
use crate::handle::{EditHandle, OnFinished, PaintHandle, WorkingSet};
use crate::population::PopulationTracker;
use crate::tile::{RasterTile, TILE_SIDE_LENGTH, grid_cell_of};

/// Margin, in canvas pixels, added around a path's bounds by the `*_path`
/// queries when the caller has no better estimate (e.g. antialiasing).
pub const DEFAULT_PATH_MARGIN: u32 = 2;

static NULL_TILE: RasterTile = RasterTile::null();

/// Everything guarded by the surface lock.
#[derive(Clone, Default)]
pub(crate) struct SurfaceData {
    pub(crate) grid: TileGrid,
    pub(crate) population: PopulationTracker,
    pub(crate) region: Region,
}

// ----------------------------------------------------------------------------
// Change notification
// ----------------------------------------------------------------------------

/// Change notifications emitted by a [`RasterSurface`].
#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceEvent {
    /// Pixels inside `area` may have changed.
    RenderChanged { surface: Uuid, area: Region },
    /// The surface's region changed; `region` is the new value.
    RegionChanged { surface: Uuid, region: Region },
}

impl SurfaceEvent {
    pub fn surface(&self) -> Uuid {
        match self {
            SurfaceEvent::RenderChanged { surface, .. } | SurfaceEvent::RegionChanged { surface, .. } => *surface,
        }
    }
}

/// Receiver of [`SurfaceEvent`]s.  Called on the thread that triggered the
/// change, with no surface lock held.
pub trait SurfaceObserver: Send + Sync {
    fn on_event(&self, event: &SurfaceEvent);
}

/// Token returned by [`RasterSurface::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

struct FnObserver<F>(F);

impl<F> SurfaceObserver for FnObserver<F>
where
    F: Fn(&SurfaceEvent) + Send + Sync,
{
    fn on_event(&self, event: &SurfaceEvent) {
        (self.0)(event)
    }
}

struct ChannelObserver(mpsc::Sender<SurfaceEvent>);

impl SurfaceObserver for ChannelObserver {
    fn on_event(&self, event: &SurfaceEvent) {
        // A hung-up receiver just stops listening.
        let _ = self.0.send(event.clone());
    }
}

// ----------------------------------------------------------------------------
// Surface
// ----------------------------------------------------------------------------

/// A sparse, unbounded raster made of [`RasterTile`]s.
///
/// Tiles are only instantiated where an edit asks for them and only carry
/// pixel memory once something writes to them.  The grid grows on demand
/// and can be squeezed back to the populated area.
pub struct RasterSurface {
    id: Uuid,
    format: PixelFormat,
    color_table: ColorTable,
    growth: GrowthPolicy,
    data: RwLock<SurfaceData>,
    observers: RwLock<Vec<(ObserverId, Arc<dyn SurfaceObserver>)>>,
    next_observer: AtomicU64,
}

impl RasterSurface {
    pub fn new(format: PixelFormat) -> Self {
        if format.is_indexed() {
            log_warn!("RasterSurface::new: indexed surface without a color table");
        }
        Self::build(format, Arc::from(Vec::new()), GrowthPolicy::default())
    }

    pub fn with_config(config: &SurfaceConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::build(config.format, config.color_table_arc(), config.growth))
    }

    fn build(format: PixelFormat, color_table: ColorTable, growth: GrowthPolicy) -> Self {
        Self::with_data(format, color_table, growth, SurfaceData::default())
    }

    fn with_data(format: PixelFormat, color_table: ColorTable, growth: GrowthPolicy, data: SurfaceData) -> Self {
        Self {
            id: Uuid::new_v4(),
            format,
            color_table,
            growth,
            data: RwLock::new(data),
            observers: RwLock::new(Vec::new()),
            next_observer: AtomicU64::new(0),
        }
    }

    /// Independent copy under a new id.  Tile buffers stay shared until
    /// either side writes to them, so this costs one grid of reference
    /// bumps.  Observers are not carried over.
    pub fn duplicate(&self) -> RasterSurface {
        let data = self.read().clone();
        Self::with_data(self.format, Arc::clone(&self.color_table), self.growth, data)
    }

    // ---- metadata -----------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn color_table(&self) -> &[Rgba<u8>] {
        &self.color_table
    }

    pub fn growth_policy(&self) -> GrowthPolicy {
        self.growth
    }

    /// Canvas bounds of every populated tile.  Empty if nothing is populated.
    pub fn bounding_rect(&self) -> Rect {
        to_canvas_rect(self.read().population.populated_rect())
    }

    /// Exact union of the populated tiles' canvas rects.
    pub fn populated(&self) -> Region {
        let data = self.read();
        let grid = &data.grid;
        let populated: Region = grid
            .indices_in(data.population.populated_rect())
            .filter(|&i| grid.slot(i).is_some_and(RasterTile::has_buffer))
            .map(|i| cell_rect(grid.position_of(i)))
            .collect();
        populated
    }

    /// Canvas rect currently covered by grid slots.
    pub fn reserved(&self) -> Rect {
        to_canvas_rect(self.read().grid.rect())
    }

    /// Union of every area edited or reserved so far.
    pub fn region(&self) -> Region {
        self.read().region.clone()
    }

    /// Number of tiles holding a pixel buffer.
    pub fn populated_count(&self) -> usize {
        self.read().population.count()
    }

    // ---- observers ----------------------------------------------------------

    pub fn subscribe(&self, observer: Arc<dyn SurfaceObserver>) -> ObserverId {
        let id = ObserverId(self.next_observer.fetch_add(1, Ordering::Relaxed));
        write_recovered(&self.observers, "observers").push((id, observer));
        id
    }

    pub fn subscribe_fn<F>(&self, f: F) -> ObserverId
    where
        F: Fn(&SurfaceEvent) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(FnObserver(f)))
    }

    /// Subscribe a channel; events are delivered as owned clones.
    pub fn subscribe_channel(&self) -> mpsc::Receiver<SurfaceEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribe(Arc::new(ChannelObserver(tx)));
        rx
    }

    /// Returns whether `id` was subscribed.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut observers = write_recovered(&self.observers, "observers");
        let before = observers.len();
        observers.retain(|(oid, _)| *oid != id);
        observers.len() != before
    }

    fn emit(&self, event: SurfaceEvent) {
        // Snapshot so observers may (un)subscribe while being notified.
        let observers: Vec<Arc<dyn SurfaceObserver>> = read_recovered(&self.observers, "observers")
            .iter()
            .map(|(_, o)| Arc::clone(o))
            .collect();
        for observer in observers {
            observer.on_event(&event);
        }
    }

    fn emit_render_changed(&self, area: Region) {
        if !area.is_empty() {
            self.emit(SurfaceEvent::RenderChanged { surface: self.id, area });
        }
    }

    fn emit_region_changed(&self, region: Region) {
        self.emit(SurfaceEvent::RegionChanged { surface: self.id, region });
    }

    // ---- read queries -------------------------------------------------------

    /// Tile containing canvas point `p`.  Null if that tile is unpopulated
    /// or outside the grid.
    pub fn tile_at(&self, p: Point) -> RasterTile {
        let data = self.read();
        match data.grid.get(grid_cell_of(p)) {
            Some(tile) if tile.has_buffer() => tile.clone(),
            _ => RasterTile::null(),
        }
    }

    /// View of every populated tile.
    ///
    /// The view holds the surface's read lock: drop it before editing the
    /// surface from the same thread.
    pub fn tiles(&self) -> TilesView<'_> {
        let data = self.read();
        let rect = data.population.populated_rect();
        TilesView { data, rect }
    }

    /// View of the populated tiles overlapping canvas rect `rect`.
    pub fn tiles_at(&self, rect: Rect) -> TilesView<'_> {
        let data = self.read();
        let rect = to_grid_rect(rect).intersected(&data.population.populated_rect());
        TilesView { data, rect }
    }

    /// Populated tiles whose canvas rect intersects `region`.
    pub fn tiles_at_region(&self, region: &Region) -> Vec<RasterTile> {
        if region.is_empty() {
            return Vec::new();
        }
        let view = self.tiles_at(region.bounding_rect());
        view.iter().filter(|t| region.intersects_rect(&t.rect())).cloned().collect()
    }

    /// Populated tiles near `path`: its bounds grown by `margin` pixels.
    pub fn tiles_at_path(&self, path: &Path, margin: u32) -> Vec<RasterTile> {
        let bound = path_bound(path, margin);
        if bound.is_empty() {
            return Vec::new();
        }
        self.tiles_at(bound).to_vec()
    }

    // ---- edit / paint -------------------------------------------------------

    /// Edit access to every tile overlapping canvas rect `rect`, growing the
    /// grid as needed.
    ///
    /// The surface stays write-locked until the handle is finished or
    /// dropped.
    pub fn edit_tiles(&self, rect: Rect) -> EditHandle<'_> {
        match self.open_rect(rect) {
            Some(set) => EditHandle::new(set, self.completion()),
            None => EditHandle::default(),
        }
    }

    pub fn edit_tiles_region(&self, region: &Region) -> EditHandle<'_> {
        match self.open_region(region) {
            Some(set) => EditHandle::new(set, self.completion()),
            None => EditHandle::default(),
        }
    }

    pub fn edit_tiles_path(&self, path: &Path, margin: u32) -> EditHandle<'_> {
        self.edit_tiles(path_bound(path, margin))
    }

    /// Like [`edit_tiles`](Self::edit_tiles), but hands out painters.
    pub fn paint_tiles(&self, rect: Rect) -> PaintHandle<'_> {
        match self.open_rect(rect) {
            Some(set) => PaintHandle::new(set, self.completion()),
            None => PaintHandle::default(),
        }
    }

    pub fn paint_tiles_region(&self, region: &Region) -> PaintHandle<'_> {
        match self.open_region(region) {
            Some(set) => PaintHandle::new(set, self.completion()),
            None => PaintHandle::default(),
        }
    }

    pub fn paint_tiles_path(&self, path: &Path, margin: u32) -> PaintHandle<'_> {
        self.paint_tiles(path_bound(path, margin))
    }

    fn open_rect(&self, rect: Rect) -> Option<WorkingSet<'_>> {
        self.open(to_grid_rect(rect), |_| true, Region::from(clip_to_canvas(rect)))
    }

    fn open_region(&self, region: &Region) -> Option<WorkingSet<'_>> {
        let region = &clip_region(region);
        self.open(
            to_grid_rect(region.bounding_rect()),
            |tile_rect| region.intersects_rect(&tile_rect),
            region.clone(),
        )
    }

    /// Lock, grow to `grid_rect`, instantiate the selected slots and collect
    /// them into a working set.  `None` for an empty request.
    fn open(
        &self,
        grid_rect: Rect,
        select: impl Fn(Rect) -> bool,
        hint: Region,
    ) -> Option<WorkingSet<'_>> {
        if grid_rect.is_empty() || hint.is_empty() {
            return None;
        }
        let mut data = self.write();
        self.grow(&mut data, grid_rect);

        let indices: Vec<usize> = data
            .grid
            .indices_in(grid_rect)
            .filter(|&i| select(cell_rect(data.grid.position_of(i))))
            .collect();
        for &i in &indices {
            let cell = data.grid.position_of(i);
            if let Some(slot) = data.grid.slot_mut(i) {
                if slot.is_null() {
                    *slot = RasterTile::new(
                        self.format,
                        cell.scaled(TILE_SIDE_LENGTH),
                        Arc::clone(&self.color_table),
                    );
                }
            }
        }
        Some(WorkingSet::new(data, indices, hint))
    }

    fn completion(&self) -> OnFinished<'_> {
        Box::new(move |set: &mut WorkingSet<'_>| self.complete(set))
    }

    /// Handle completion: fold the hint into the region, unlock, notify.
    fn complete(&self, set: &mut WorkingSet<'_>) {
        let hint = set.region_hint().clone();
        // Releasing the set reconciles population with the buffers.
        let Some(mut data) = set.take_data() else {
            return;
        };
        let grew = !data.region.covers(&hint);
        if grew {
            data.region.unite(&hint);
        }
        let region = grew.then(|| data.region.clone());
        drop(data);

        self.emit_render_changed(hint);
        if let Some(region) = region {
            self.emit_region_changed(region);
        }
    }

    fn grow(&self, data: &mut SurfaceData, grid_rect: Rect) {
        let current = data.grid.rect();
        if current.contains_rect(&grid_rect) {
            return;
        }
        let target = grown_rect(current, grid_rect, self.growth);
        data.grid.rebase(target);
    }

    // ---- capacity -----------------------------------------------------------

    /// Make room for canvas rect `rect` without populating anything, and add
    /// it to the region.
    pub fn reserve(&self, rect: Rect) {
        let grid_rect = to_grid_rect(rect);
        if grid_rect.is_empty() {
            return;
        }
        let mut data = self.write();
        self.grow(&mut data, grid_rect);
        let added = Region::from(clip_to_canvas(rect));
        let grew = !data.region.covers(&added);
        if grew {
            data.region.unite(&added);
        }
        let region = grew.then(|| data.region.clone());
        drop(data);
        if let Some(region) = region {
            self.emit_region_changed(region);
        }
    }

    /// Shrink the grid to the populated tiles.  Pixels and region are kept.
    pub fn squeeze(&self) {
        let mut data = self.write();
        let populated = data.population.populated_rect();
        let before = data.grid.rect();
        if populated.is_empty() {
            data.grid.clear();
        } else {
            data.grid.rebase(populated);
        }
        tracing::debug!("RasterSurface::squeeze: {:?} -> {:?}", before, data.grid.rect());
    }

    /// Drop every tile and forget the region.
    pub fn clear(&self) {
        let mut data = self.write();
        let painted = to_canvas_rect(data.population.populated_rect());
        let old_region = std::mem::take(&mut data.region);
        data.grid.clear();
        data.population.clear();
        drop(data);

        self.emit_render_changed(Region::from(painted));
        if !old_region.is_empty() {
            self.emit_region_changed(Region::new());
        }
    }

    /// Release the pixel memory of every tile lying entirely inside canvas
    /// rect `rect`.  Partially covered tiles are left alone.
    pub fn discard(&self, rect: Rect) {
        let mut data = self.write();
        let inner = to_inner_grid_rect(rect).intersected(&data.grid.rect());
        if inner.is_empty() {
            return;
        }
        let indices: Vec<usize> = data.grid.indices_in(inner).collect();
        let mut area = Region::new();
        for i in indices {
            let cell = data.grid.position_of(i);
            let dropped = data.grid.slot_mut(i).is_some_and(RasterTile::discard_buffer);
            if dropped {
                data.population.decrement(cell);
                area.unite_rect(cell_rect(cell));
            }
        }
        drop(data);
        self.emit_render_changed(area);
    }

    // ---- locking ------------------------------------------------------------

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, SurfaceData> {
        read_recovered(&self.data, "surface")
    }

    fn write(&self) -> RwLockWriteGuard<'_, SurfaceData> {
        write_recovered(&self.data, "surface")
    }
}

impl Default for RasterSurface {
    fn default() -> Self {
        Self::new(PixelFormat::default())
    }
}

impl std::fmt::Debug for RasterSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterSurface")
            .field("id", &self.id)
            .field("format", &self.format)
            .field("growth", &self.growth)
            .finish_non_exhaustive()
    }
}

/// Canvas rect of grid cell `cell`.
fn cell_rect(cell: Point) -> Rect {
    Rect::from_point_size(cell.scaled(TILE_SIDE_LENGTH), TILE_SIDE_LENGTH, TILE_SIDE_LENGTH)
}

fn clip_region(region: &Region) -> Region {
    region.rects().iter().map(|r| clip_to_canvas(*r)).collect()
}

fn path_bound(path: &Path, margin: u32) -> Rect {
    if path.is_empty() {
        return Rect::default();
    }
    let margin = i32::try_from(margin).unwrap_or(i32::MAX / 4);
    path.bounding_rect().coarse_bound().expanded(margin)
}

fn read_recovered<'a, T>(lock: &'a RwLock<T>, what: &str) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| {
        log_err!("RasterSurface: {} lock poisoned, recovering", what);
        poisoned.into_inner()
    })
}

fn write_recovered<'a, T>(lock: &'a RwLock<T>, what: &str) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        log_err!("RasterSurface: {} lock poisoned, recovering", what);
        poisoned.into_inner()
    })
}

// ----------------------------------------------------------------------------
// Tiles view
// ----------------------------------------------------------------------------

/// Read-locked view of the populated tiles in a grid rect.
pub struct TilesView<'a> {
    data: RwLockReadGuard<'a, SurfaceData>,
    rect: Rect,
}

impl<'a> TilesView<'a> {
    /// Grid-space rect the view spans.
    pub fn grid_rect(&self) -> Rect {
        self.rect
    }

    /// Canvas-space rect the view spans.
    pub fn canvas_rect(&self) -> Rect {
        to_canvas_rect(self.rect)
    }

    /// Tile at grid position `cell`.  Null outside the view or when
    /// unpopulated.
    pub fn get(&self, cell: Point) -> &RasterTile {
        if !self.rect.contains_point(cell) {
            return &NULL_TILE;
        }
        match self.data.grid.get(cell) {
            Some(tile) if tile.has_buffer() => tile,
            _ => &NULL_TILE,
        }
    }

    /// Tile containing canvas point `p`.
    pub fn tile_at(&self, p: Point) -> &RasterTile {
        self.get(grid_cell_of(p))
    }

    /// Populated tiles, row-major.
    pub fn iter(&self) -> impl Iterator<Item = &RasterTile> + '_ {
        let grid = &self.data.grid;
        grid.indices_in(self.rect)
            .filter_map(move |i| grid.slot(i))
            .filter(|tile| tile.has_buffer())
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Owned copies of the populated tiles (buffers stay shared).
    pub fn to_vec(&self) -> Vec<RasterTile> {
        self.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PointF;

    fn fill(surface: &RasterSurface, rect: Rect, color: Rgba<u8>) {
        surface.paint_tiles(rect).for_each_painter(|p| p.fill_rect(rect, color));
    }

    #[test]
    fn empty_queries_do_not_grow() {
        let surface = RasterSurface::new(PixelFormat::Rgba8);
        assert!(!surface.edit_tiles(Rect::new(0, 0, 0, 10)).is_active());
        assert!(!surface.paint_tiles_region(&Region::new()).is_active());
        assert!(!surface.edit_tiles_path(&Path::new(), DEFAULT_PATH_MARGIN).is_active());
        assert!(surface.reserved().is_empty());
        assert!(surface.tiles_at_path(&Path::new(), 2).is_empty());
    }

    #[test]
    fn first_allocation_is_exact() {
        let surface = RasterSurface::new(PixelFormat::Rgba8);
        drop(surface.edit_tiles(Rect::new(300, 10, 20, 20)));
        assert_eq!(surface.reserved(), Rect::new(256, 0, 256, 256));
        assert_eq!(surface.populated_count(), 0);
    }

    #[test]
    fn untouched_edit_tiles_stay_unpopulated() {
        let surface = RasterSurface::new(PixelFormat::Rgba8);
        let handle = surface.edit_tiles(Rect::new(0, 0, 600, 300));
        assert_eq!(handle.len(), 6);
        assert!(handle.iter().all(|t| !t.is_null() && !t.has_buffer()));
        drop(handle);
        assert!(surface.bounding_rect().is_empty());
        assert!(surface.tile_at(Point::new(10, 10)).is_null());
        assert_eq!(surface.region().bounding_rect(), Rect::new(0, 0, 600, 300));
    }

    #[test]
    fn region_edit_skips_tiles_outside_the_region() {
        let surface = RasterSurface::new(PixelFormat::Rgba8);
        let mut region = Region::from(Rect::new(0, 0, 10, 10));
        region.unite_rect(Rect::new(600, 600, 10, 10));
        let handle = surface.edit_tiles_region(&region);
        let cells: Vec<Point> = handle.iter().map(RasterTile::grid_offset).collect();
        assert_eq!(cells, vec![Point::new(0, 0), Point::new(2, 2)]);
    }

    #[test]
    fn discard_drops_whole_tiles_only() {
        let surface = RasterSurface::new(PixelFormat::Rgba8);
        fill(&surface, Rect::new(0, 0, 512, 256), Rgba([1, 1, 1, 255]));
        assert_eq!(surface.populated_count(), 2);
        surface.discard(Rect::new(0, 0, 300, 256));
        assert_eq!(surface.populated_count(), 1);
        assert!(surface.tile_at(Point::new(0, 0)).is_null());
        assert_eq!(surface.bounding_rect(), Rect::new(256, 0, 256, 256));
    }

    #[test]
    fn path_queries_use_bounds_plus_margin() {
        let surface = RasterSurface::new(PixelFormat::Rgba8);
        fill(&surface, Rect::new(0, 0, 768, 256), Rgba([1, 1, 1, 255]));
        let path = Path::from_polygon([PointF::new(10.0, 10.0), PointF::new(254.5, 100.0)]);
        assert_eq!(surface.tiles_at_path(&path, 0).len(), 1);
        assert_eq!(surface.tiles_at_path(&path, DEFAULT_PATH_MARGIN).len(), 2);
    }

    #[test]
    fn duplicate_shares_tiles_until_written() {
        let surface = RasterSurface::new(PixelFormat::Rgba8);
        fill(&surface, Rect::new(0, 0, 4, 4), Rgba([1, 2, 3, 255]));
        surface.reserve(Rect::new(-300, 0, 10, 10));

        let copy = surface.duplicate();
        assert_ne!(copy.id(), surface.id());
        assert_eq!(copy.reserved(), surface.reserved());
        assert_eq!(copy.region(), surface.region());
        assert_eq!(copy.populated_count(), 1);
        // Source slot, copy slot and the returned clone.
        assert_eq!(surface.tile_at(Point::new(0, 0)).buffer_ref_count(), 3);

        fill(&copy, Rect::new(0, 0, 2, 2), Rgba([9, 9, 9, 255]));
        fill(&copy, Rect::new(600, 0, 1, 1), Rgba([9, 9, 9, 255]));
        let source = surface.tile_at(Point::new(0, 0));
        assert_eq!(source.buffer_ref_count(), 2);
        assert_eq!(source.as_image().unwrap().pixel_rgba(0, 0), Rgba([1, 2, 3, 255]));
        let copied = copy.tile_at(Point::new(0, 0));
        assert_eq!(copied.as_image().unwrap().pixel_rgba(0, 0), Rgba([9, 9, 9, 255]));
        assert_eq!(copied.as_image().unwrap().pixel_rgba(3, 3), Rgba([1, 2, 3, 255]));
        assert_eq!(surface.populated_count(), 1);
        assert_eq!(copy.populated_count(), 2);
        assert_eq!(surface.bounding_rect(), Rect::new(0, 0, 256, 256));
    }

    #[test]
    fn populated_is_the_exact_tile_union() {
        let surface = RasterSurface::new(PixelFormat::Rgba8);
        assert!(surface.populated().is_empty());
        fill(&surface, Rect::new(0, 0, 1, 1), Rgba([1, 1, 1, 255]));
        fill(&surface, Rect::new(600, 600, 1, 1), Rgba([1, 1, 1, 255]));
        drop(surface.edit_tiles(Rect::new(300, 0, 1, 1)));

        let populated = surface.populated();
        assert_eq!(populated.area(), 2 * 256 * 256);
        assert!(populated.contains_point(Point::new(255, 255)));
        assert!(populated.contains_point(Point::new(512, 512)));
        assert!(!populated.contains_point(Point::new(300, 0)));
        assert!(!populated.contains_point(Point::new(300, 300)));
        assert_eq!(populated.bounding_rect(), surface.bounding_rect());
    }

    #[test]
    fn view_reports_null_for_gaps() {
        let surface = RasterSurface::new(PixelFormat::Rgba8);
        fill(&surface, Rect::new(0, 0, 1, 1), Rgba([1, 1, 1, 255]));
        fill(&surface, Rect::new(512, 0, 1, 1), Rgba([1, 1, 1, 255]));
        let view = surface.tiles();
        assert_eq!(view.grid_rect(), Rect::new(0, 0, 3, 1));
        assert_eq!(view.len(), 2);
        assert!(view.get(Point::new(1, 0)).is_null());
        assert!(!view.tile_at(Point::new(600, 5)).is_null());
    }
}

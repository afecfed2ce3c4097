//! Sparse, tile-based raster storage.
//!
//! A [`RasterSurface`] is an unbounded canvas backed by a grid of 256×256
//! [`RasterTile`]s.  Tiles share their pixel buffers copy-on-write, are
//! only allocated where something is drawn, and are reached through scoped
//! [`EditHandle`]s and [`PaintHandle`]s that keep the surface's bookkeeping
//! (populated bounds, region, change notifications) up to date when they
//! finish.

#[macro_use]
pub mod logger;

pub mod config;
pub mod error;
pub mod format;
pub mod geometry;
pub mod grid;
pub mod handle;
pub mod painter;
pub mod population;
pub mod render;
pub mod surface;
pub mod tile;

pub use config::SurfaceConfig;
pub use error::{ConfigError, RenderError};
pub use format::{ColorTable, PixelFormat};
pub use geometry::{Path, Point, PointF, Rect, RectF, Region};
pub use grid::{CANVAS_EXTENT, GrowthPolicy};
pub use handle::{EditHandle, PaintCursor, PaintHandle, WorkingSet};
pub use painter::{CompositionMode, TilePainter};
pub use render::RenderEntity;
pub use surface::{DEFAULT_PATH_MARGIN, ObserverId, RasterSurface, SurfaceEvent, SurfaceObserver, TilesView};
pub use tile::{RasterTile, TILE_SIDE_LENGTH, TileImage, TileImageMut, TileMut};

#[doc(hidden)]
pub use tracing as __tracing;

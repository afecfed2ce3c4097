use crate::geometry::{Point, Rect};

/// Incrementally maintained counts of populated tiles per grid column and
/// per grid row.  Each list is kept sorted by coordinate and only holds
/// non-zero counts, so the populated bounds are read off the ends.
#[derive(Clone, Debug, Default)]
pub struct PopulationTracker {
    columns: Vec<(i32, u32)>,
    rows: Vec<(i32, u32)>,
    count: usize,
}

impl PopulationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of populated tiles.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn column_count(&self, grid_x: i32) -> u32 {
        lookup(&self.columns, grid_x)
    }

    pub fn row_count(&self, grid_y: i32) -> u32 {
        lookup(&self.rows, grid_y)
    }

    /// Record that the tile at `grid_point` gained a buffer.
    pub fn increment(&mut self, grid_point: Point) {
        bump(&mut self.columns, grid_point.x);
        bump(&mut self.rows, grid_point.y);
        self.count += 1;
    }

    /// Record that the tile at `grid_point` lost its buffer.
    pub fn decrement(&mut self, grid_point: Point) {
        if self.count == 0 {
            log_err!(
                "PopulationTracker::decrement: ({}, {}) with nothing populated",
                grid_point.x,
                grid_point.y
            );
            debug_assert!(false, "population decrement underflow");
            return;
        }
        let ok = drop_one(&mut self.columns, grid_point.x) & drop_one(&mut self.rows, grid_point.y);
        if !ok {
            log_err!(
                "PopulationTracker::decrement: ({}, {}) was not populated",
                grid_point.x,
                grid_point.y
            );
            debug_assert!(false, "population decrement of an unpopulated cell");
        }
        self.count -= 1;
    }

    /// Grid-space bounds of every populated tile.  Empty if none.
    pub fn populated_rect(&self) -> Rect {
        match (self.columns.first(), self.columns.last(), self.rows.first(), self.rows.last()) {
            (Some(&(x0, _)), Some(&(x1, _)), Some(&(y0, _)), Some(&(y1, _))) => {
                Rect::from_edges(x0, y0, x1 + 1, y1 + 1)
            }
            _ => Rect::default(),
        }
    }

    pub fn clear(&mut self) {
        self.columns.clear();
        self.rows.clear();
        self.count = 0;
    }
}

fn lookup(list: &[(i32, u32)], coord: i32) -> u32 {
    list.binary_search_by_key(&coord, |&(c, _)| c)
        .map(|i| list[i].1)
        .unwrap_or(0)
}

fn bump(list: &mut Vec<(i32, u32)>, coord: i32) {
    match list.binary_search_by_key(&coord, |&(c, _)| c) {
        Ok(i) => list[i].1 += 1,
        Err(i) => list.insert(i, (coord, 1)),
    }
}

fn drop_one(list: &mut Vec<(i32, u32)>, coord: i32) -> bool {
    match list.binary_search_by_key(&coord, |&(c, _)| c) {
        Ok(i) => {
            list[i].1 -= 1;
            if list[i].1 == 0 {
                list.remove(i);
            }
            true
        }
        Err(_) => false,
    }
}

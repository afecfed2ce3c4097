use smallvec::SmallVec;

/// Integer point. Used for both pixel (canvas) space and tile (grid) space;
/// which one is meant is always spelled out by the caller's naming.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub const fn scaled(self, factor: i32) -> Self {
        Self { x: self.x * factor, y: self.y * factor }
    }

    #[inline]
    pub const fn translated(self, dx: i32, dy: i32) -> Self {
        Self { x: self.x + dx, y: self.y + dy }
    }
}

/// Axis-aligned integer rectangle.  `right()` and `bottom()` are exclusive,
/// so a rect with zero width or height is empty.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Build from exclusive edges.  Inverted edges give an empty rect.
    pub fn from_edges(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            x: left,
            y: top,
            width: span(left, right),
            height: span(top, bottom),
        }
    }

    pub fn from_point_size(origin: Point, width: i32, height: i32) -> Self {
        Self::new(origin.x, origin.y, width, height)
    }

    #[inline] pub fn left(&self) -> i32 { self.x }
    #[inline] pub fn top(&self) -> i32 { self.y }
    // Saturating, so a rect hanging past `i32::MAX` ends there.
    #[inline] pub fn right(&self) -> i32 { self.x.saturating_add(self.width) }
    #[inline] pub fn bottom(&self) -> i32 { self.y.saturating_add(self.height) }
    #[inline] pub fn top_left(&self) -> Point { Point::new(self.x, self.y) }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn area(&self) -> i64 {
        if self.is_empty() { 0 } else { self.width as i64 * self.height as i64 }
    }

    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= self.left() && p.x < self.right() && p.y >= self.top() && p.y < self.bottom()
    }

    /// True if `other` lies entirely inside `self`.  An empty `other` is
    /// contained by anything.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        if other.is_empty() {
            return true;
        }
        !self.is_empty()
            && other.left() >= self.left()
            && other.top() >= self.top()
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !self.intersected(other).is_empty()
    }

    pub fn intersected(&self, other: &Rect) -> Rect {
        Rect::from_edges(
            self.left().max(other.left()),
            self.top().max(other.top()),
            self.right().min(other.right()),
            self.bottom().min(other.bottom()),
        )
    }

    /// Smallest rect covering both.  Empty operands are ignored.
    pub fn united(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Rect::from_edges(
            self.left().min(other.left()),
            self.top().min(other.top()),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    pub fn translated(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Same rect with its size cut back to what fits below `i32::MAX`.
    pub fn normalized(&self) -> Rect {
        Rect::from_edges(self.left(), self.top(), self.right(), self.bottom())
    }

    /// Grow (or shrink, for negative values) by `margin` on every side.
    pub fn expanded(&self, margin: i32) -> Rect {
        Rect::from_edges(
            self.left().saturating_sub(margin),
            self.top().saturating_sub(margin),
            self.right().saturating_add(margin),
            self.bottom().saturating_add(margin),
        )
    }

    /// `self` minus `other`, as up to four disjoint rects.
    pub fn subtracted(&self, other: &Rect) -> SmallVec<[Rect; 4]> {
        let mut out = SmallVec::new();
        if self.is_empty() {
            return out;
        }
        let cut = self.intersected(other);
        if cut.is_empty() {
            out.push(*self);
            return out;
        }
        // Bands above and below the cut span the full width, left/right
        // pieces only span the cut's height.
        let pieces = [
            Rect::from_edges(self.left(), self.top(), self.right(), cut.top()),
            Rect::from_edges(self.left(), cut.bottom(), self.right(), self.bottom()),
            Rect::from_edges(self.left(), cut.top(), cut.left(), cut.bottom()),
            Rect::from_edges(cut.right(), cut.top(), self.right(), cut.bottom()),
        ];
        out.extend(pieces.into_iter().filter(|r| !r.is_empty()));
        out
    }
}

/// Length of `from..to`, zero when inverted and capped at `i32::MAX`.
#[inline]
fn span(from: i32, to: i32) -> i32 {
    (to as i64 - from as i64).clamp(0, i32::MAX as i64) as i32
}

/// A set of canvas pixels stored as disjoint rectangles.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Region {
    rects: SmallVec<[Rect; 4]>,
}

impl Region {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    pub fn bounding_rect(&self) -> Rect {
        self.rects.iter().fold(Rect::default(), |acc, r| acc.united(r))
    }

    pub fn area(&self) -> i64 {
        self.rects.iter().map(Rect::area).sum()
    }

    pub fn contains_point(&self, p: Point) -> bool {
        self.rects.iter().any(|r| r.contains_point(p))
    }

    pub fn intersects_rect(&self, rect: &Rect) -> bool {
        self.rects.iter().any(|r| r.intersects(rect))
    }

    /// Add `rect` to the region.
    pub fn unite_rect(&mut self, rect: Rect) {
        let rect = rect.normalized();
        if rect.is_empty() || self.rects.iter().any(|r| r.contains_rect(&rect)) {
            return;
        }
        self.rects.push(rect);
        self.rects = banded(&self.rects);
    }

    pub fn unite(&mut self, other: &Region) {
        if other.is_empty() {
            return;
        }
        self.rects.extend(other.rects.iter().copied());
        self.rects = banded(&self.rects);
    }

    pub fn united(&self, other: &Region) -> Region {
        let mut out = self.clone();
        out.unite(other);
        out
    }

    /// Pixels of `self` not covered by `other`.
    pub fn subtracted(&self, other: &Region) -> Region {
        let mut rects: SmallVec<[Rect; 4]> = self.rects.clone();
        for cut in &other.rects {
            rects = rects.iter().flat_map(|r| r.subtracted(cut)).collect();
        }
        Region { rects: banded(&rects) }
    }

    /// True if every pixel of `other` is already in `self`.
    pub fn covers(&self, other: &Region) -> bool {
        other.subtracted(self).is_empty()
    }

    pub fn translated(&self, dx: i32, dy: i32) -> Region {
        Region { rects: self.rects.iter().map(|r| r.translated(dx, dy)).collect() }
    }
}

/// Rebuild `rects` in banded form: horizontal bands split at every
/// distinct top and bottom edge, each band holding sorted x spans that do
/// not touch, and vertically adjacent bands with identical spans merged.
/// The result is disjoint and does not fragment as overlapping rects pile
/// up.
fn banded(rects: &[Rect]) -> SmallVec<[Rect; 4]> {
    let mut ys: Vec<i32> = rects
        .iter()
        .filter(|r| !r.is_empty())
        .flat_map(|r| [r.top(), r.bottom()])
        .collect();
    ys.sort_unstable();
    ys.dedup();

    let mut out: SmallVec<[Rect; 4]> = SmallVec::new();
    // Spans of the last emitted band, its first index in `out`, its bottom.
    let mut last: Option<(Vec<(i32, i32)>, usize, i32)> = None;
    let mut spans: Vec<(i32, i32)> = Vec::new();
    for band in ys.windows(2) {
        let (y0, y1) = (band[0], band[1]);
        spans.clear();
        spans.extend(
            rects
                .iter()
                .filter(|r| !r.is_empty() && r.top() <= y0 && r.bottom() >= y1)
                .map(|r| (r.left(), r.right())),
        );
        spans.sort_unstable();
        let mut merged: Vec<(i32, i32)> = Vec::with_capacity(spans.len());
        for &(left, right) in &spans {
            match merged.last_mut() {
                Some(prev) if left <= prev.1 => prev.1 = prev.1.max(right),
                _ => merged.push((left, right)),
            }
        }
        if merged.is_empty() {
            last = None;
            continue;
        }

        let extends = matches!(&last, Some((prev, _, bottom)) if *bottom == y0 && *prev == merged);
        if extends {
            if let Some((_, start, bottom)) = last.as_mut() {
                for r in &mut out[*start..] {
                    r.height = y1 - r.y;
                }
                *bottom = y1;
            }
        } else {
            let start = out.len();
            out.extend(merged.iter().map(|&(left, right)| Rect::from_edges(left, y0, right, y1)));
            last = Some((merged, start, y1));
        }
    }
    out
}

impl FromIterator<Rect> for Region {
    fn from_iter<I: IntoIterator<Item = Rect>>(iter: I) -> Self {
        let rects: SmallVec<[Rect; 4]> = iter
            .into_iter()
            .map(|r| r.normalized())
            .filter(|r| !r.is_empty())
            .collect();
        Region { rects: banded(&rects) }
    }
}

impl From<Rect> for Region {
    fn from(rect: Rect) -> Self {
        let mut region = Region::new();
        region.unite_rect(rect);
        region
    }
}

/// Floating-point point, used for path vertices.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointF {
    pub x: f64,
    pub y: f64,
}

impl PointF {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Floating-point rect (exclusive right/bottom like [`Rect`]).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RectF {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RectF {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 { self.x + self.width }
    pub fn bottom(&self) -> f64 { self.y + self.height }

    /// Smallest integer rect containing this one.
    pub fn coarse_bound(&self) -> Rect {
        let left = self.x.floor() as i32;
        let top = self.y.floor() as i32;
        Rect::from_edges(left, top, self.right().ceil() as i32, self.bottom().ceil() as i32)
    }
}

/// A polyline / polygon in canvas space, as produced by brush strokes and
/// lasso selections.  Only its bounds matter to tile queries.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Path {
    points: Vec<PointF>,
    closed: bool,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_polygon(points: impl IntoIterator<Item = PointF>) -> Self {
        Self { points: points.into_iter().collect(), closed: true }
    }

    pub fn move_to(&mut self, p: PointF) {
        self.points.clear();
        self.closed = false;
        self.points.push(p);
    }

    pub fn line_to(&mut self, p: PointF) {
        self.points.push(p);
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[PointF] {
        &self.points
    }

    /// Bounds of all vertices.  A single-vertex path has zero size.
    pub fn bounding_rect(&self) -> RectF {
        let Some(first) = self.points.first() else {
            return RectF::default();
        };
        let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
        for p in &self.points[1..] {
            x0 = x0.min(p.x);
            y0 = y0.min(p.y);
            x1 = x1.max(p.x);
            y1 = y1.max(p.y);
        }
        RectF::new(x0, y0, x1 - x0, y1 - y0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersect_and_unite() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 10, 10);
        assert_eq!(a.intersected(&b), Rect::new(5, 5, 5, 5));
        assert_eq!(a.united(&b), Rect::new(0, 0, 15, 15));
        assert!(!a.intersects(&Rect::new(10, 0, 5, 5)));
        assert_eq!(Rect::default().united(&b), b);
    }

    #[test]
    fn subtract_leaves_disjoint_pieces() {
        let a = Rect::new(0, 0, 10, 10);
        let pieces = a.subtracted(&Rect::new(3, 3, 4, 4));
        assert_eq!(pieces.len(), 4);
        let total: i64 = pieces.iter().map(Rect::area).sum();
        assert_eq!(total, 100 - 16);
        for (i, p) in pieces.iter().enumerate() {
            for q in &pieces[i + 1..] {
                assert!(!p.intersects(q));
            }
        }
    }

    #[test]
    fn region_union_is_disjoint() {
        let mut region = Region::from(Rect::new(0, 0, 10, 10));
        region.unite_rect(Rect::new(5, 0, 10, 10));
        assert_eq!(region.area(), 150);
        assert_eq!(region.bounding_rect(), Rect::new(0, 0, 15, 10));
        assert!(region.covers(&Region::from(Rect::new(2, 2, 12, 3))));
        assert!(!region.covers(&Region::from(Rect::new(2, 2, 20, 3))));
    }

    #[test]
    fn overlapping_dabs_coalesce() {
        let mut region = Region::new();
        for y in (0..=96).step_by(4) {
            for x in (0..=96).step_by(4) {
                region.unite_rect(Rect::new(x, y, 9, 9));
            }
        }
        assert_eq!(region.rects(), &[Rect::new(0, 0, 105, 105)]);
    }

    #[test]
    fn swallowed_rects_are_dropped() {
        let mut region = Region::from(Rect::new(2, 2, 2, 2));
        region.unite_rect(Rect::new(10, 10, 2, 2));
        region.unite_rect(Rect::new(0, 0, 8, 8));
        assert_eq!(region.rects().len(), 2);
        assert_eq!(region.area(), 68);
        assert!(region.contains_point(Point::new(11, 11)));
    }

    #[test]
    fn union_matches_a_pixel_mask() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(42);
        let mut region = Region::new();
        let mut mask = vec![false; 64 * 64];
        for _ in 0..300 {
            let dab = Rect::new(rng.gen_range(0..56), rng.gen_range(0..56), rng.gen_range(1..9), rng.gen_range(1..9));
            region.unite_rect(dab);
            for y in dab.top()..dab.bottom() {
                for x in dab.left()..dab.right() {
                    mask[(y * 64 + x) as usize] = true;
                }
            }
        }
        let painted = mask.iter().filter(|&&m| m).count() as i64;
        assert_eq!(region.area(), painted);
        for (i, &m) in mask.iter().enumerate() {
            let p = Point::new(i as i32 % 64, i as i32 / 64);
            assert_eq!(region.contains_point(p), m, "{:?}", p);
        }
    }

    #[test]
    fn rects_past_i32_max_are_cut_at_the_limit() {
        let edge = Rect::new(i32::MAX - 10, 0, 20, 5);
        assert_eq!(edge.right(), i32::MAX);
        assert_eq!(edge.normalized(), Rect::new(i32::MAX - 10, 0, 10, 5));

        let region = Region::from(edge);
        assert_eq!(region.rects(), &[Rect::new(i32::MAX - 10, 0, 10, 5)]);
        assert_eq!(region.area(), 50);
        let collected: Region = [edge, Rect::new(0, i32::MAX - 2, 4, 9)].into_iter().collect();
        assert_eq!(collected.area(), 50 + 8);
    }

    #[test]
    fn region_ignores_empty_rects() {
        let mut region = Region::new();
        region.unite_rect(Rect::new(4, 4, 0, 10));
        assert!(region.is_empty());
        assert!(region.covers(&Region::new()));
    }

    #[test]
    fn coarse_bound_rounds_outward() {
        let r = RectF::new(-0.5, 1.25, 2.0, 2.0).coarse_bound();
        assert_eq!(r, Rect::from_edges(-1, 1, 2, 4));
    }

    #[test]
    fn path_bounds() {
        let mut path = Path::new();
        path.move_to(PointF::new(10.0, 20.0));
        path.line_to(PointF::new(-5.0, 40.0));
        path.line_to(PointF::new(3.0, 0.0));
        assert_eq!(path.bounding_rect(), RectF::new(-5.0, 0.0, 15.0, 40.0));
        assert!(Path::new().bounding_rect().coarse_bound().is_empty());
    }
}

//! Regions in percentage-of-image coordinates.
//!
//! A [`Region`] is either an axis-aligned [`RectRegion`] or a
//! [`PolygonRegion`]. Every consumer can treat a region as "a polygon,
//! possibly rectangular" through [`Region::polygon_points`], which falls back
//! to the four corners of the bounding rectangle.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Upper bound of the percentage coordinate space.
pub const PERCENT_MAX: f64 = 100.0;

/// Regions narrower or shorter than this (in percent) are accidental clicks.
pub const MIN_REGION_EXTENT: f64 = 2.0;

/// Minimum number of vertices for a polygon region.
pub const MIN_POLYGON_POINTS: usize = 3;

// ---------------------------------------------------------------------------
// Point
// ---------------------------------------------------------------------------

/// A point in percentage-of-image units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Clamp both coordinates into `[0, 100]`.
    pub fn clamped(self) -> Self {
        Self {
            x: clamp_percent(self.x),
            y: clamp_percent(self.y),
        }
    }

    /// Returns `true` when both coordinates are finite and within `[0, 100]`.
    pub fn is_in_range(&self) -> bool {
        in_range(self.x) && in_range(self.y)
    }
}

fn in_range(value: f64) -> bool {
    value.is_finite() && (0.0..=PERCENT_MAX).contains(&value)
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, PERCENT_MAX)
    }
}

// ---------------------------------------------------------------------------
// RectRegion
// ---------------------------------------------------------------------------

/// Axis-aligned region. Always satisfies `start <= end` on both axes with
/// every coordinate in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RectRecord")]
pub struct RectRegion {
    x_start: f64,
    y_start: f64,
    x_end: f64,
    y_end: f64,
}

#[derive(Deserialize)]
struct RectRecord {
    x_start: f64,
    y_start: f64,
    x_end: f64,
    y_end: f64,
}

impl TryFrom<RectRecord> for RectRegion {
    type Error = CoreError;

    fn try_from(r: RectRecord) -> Result<Self, Self::Error> {
        RectRegion::new(r.x_start, r.y_start, r.x_end, r.y_end)
    }
}

impl RectRegion {
    /// Build a rectangle, rejecting reversed or out-of-range coordinates.
    ///
    /// Use [`normalize_rect`] for raw pointer input.
    pub fn new(x_start: f64, y_start: f64, x_end: f64, y_end: f64) -> Result<Self, CoreError> {
        if ![x_start, y_start, x_end, y_end].into_iter().all(in_range) {
            return Err(CoreError::InvalidRegion(format!(
                "Rectangle coordinates must be within 0..=100, got \
                 ({x_start}, {y_start}) -> ({x_end}, {y_end})"
            )));
        }
        if x_start > x_end || y_start > y_end {
            return Err(CoreError::InvalidRegion(format!(
                "Rectangle start must not exceed end, got \
                 ({x_start}, {y_start}) -> ({x_end}, {y_end})"
            )));
        }
        Ok(Self {
            x_start,
            y_start,
            x_end,
            y_end,
        })
    }

    /// The whole image.
    pub fn full() -> Self {
        Self {
            x_start: 0.0,
            y_start: 0.0,
            x_end: PERCENT_MAX,
            y_end: PERCENT_MAX,
        }
    }

    pub fn x_start(&self) -> f64 {
        self.x_start
    }

    pub fn y_start(&self) -> f64 {
        self.y_start
    }

    pub fn x_end(&self) -> f64 {
        self.x_end
    }

    pub fn y_end(&self) -> f64 {
        self.y_end
    }

    pub fn width(&self) -> f64 {
        self.x_end - self.x_start
    }

    pub fn height(&self) -> f64 {
        self.y_end - self.y_start
    }

    /// Corners in clockwise order starting at the top-left.
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x_start, self.y_start),
            Point::new(self.x_end, self.y_start),
            Point::new(self.x_end, self.y_end),
            Point::new(self.x_start, self.y_end),
        ]
    }
}

/// Build a rectangle from two arbitrary drag points: swap so that
/// `start <= end` on each axis, then clamp into `[0, 100]`.
pub fn normalize_rect(p1: Point, p2: Point) -> RectRegion {
    let a = p1.clamped();
    let b = p2.clamped();
    RectRegion {
        x_start: a.x.min(b.x),
        y_start: a.y.min(b.y),
        x_end: a.x.max(b.x),
        y_end: a.y.max(b.y),
    }
}

/// Min/max reduction over a point set. Returns `None` for an empty slice.
///
/// The result is clamped so it always satisfies the rectangle invariant.
pub fn bounding_box_of(points: &[Point]) -> Option<RectRegion> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in &points[1..] {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some(normalize_rect(
        Point::new(min_x, min_y),
        Point::new(max_x, max_y),
    ))
}

// ---------------------------------------------------------------------------
// PolygonRegion
// ---------------------------------------------------------------------------

/// Polygon region with at least [`MIN_POLYGON_POINTS`] in-range vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PolygonRecord")]
pub struct PolygonRegion {
    points: Vec<Point>,
}

#[derive(Deserialize)]
struct PolygonRecord {
    points: Vec<Point>,
}

impl TryFrom<PolygonRecord> for PolygonRegion {
    type Error = CoreError;

    fn try_from(r: PolygonRecord) -> Result<Self, Self::Error> {
        PolygonRegion::new(r.points)
    }
}

impl PolygonRegion {
    pub fn new(points: Vec<Point>) -> Result<Self, CoreError> {
        if points.len() < MIN_POLYGON_POINTS {
            return Err(CoreError::InvalidRegion(format!(
                "Polygon needs at least {MIN_POLYGON_POINTS} points, got {}",
                points.len()
            )));
        }
        if let Some(bad) = points.iter().find(|p| !p.is_in_range()) {
            return Err(CoreError::InvalidRegion(format!(
                "Polygon point ({}, {}) is outside 0..=100",
                bad.x, bad.y
            )));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn bounding_box(&self) -> RectRegion {
        // Non-empty by construction.
        bounding_box_of(&self.points).unwrap_or_else(RectRegion::full)
    }
}

// ---------------------------------------------------------------------------
// Region
// ---------------------------------------------------------------------------

/// A rectangular or polygonal area of an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Region {
    Rect(RectRegion),
    Polygon(PolygonRegion),
}

impl Region {
    /// Rebuild a region from a stored bounding box and an optional vertex
    /// list. Fewer than three vertices degrades to the rectangle.
    pub fn from_parts(bounds: RectRegion, points: Vec<Point>) -> Result<Self, CoreError> {
        if points.len() >= MIN_POLYGON_POINTS {
            PolygonRegion::new(points).map(Region::Polygon)
        } else {
            Ok(Region::Rect(bounds))
        }
    }

    pub fn bounding_box(&self) -> RectRegion {
        match self {
            Region::Rect(rect) => *rect,
            Region::Polygon(polygon) => polygon.bounding_box(),
        }
    }

    /// The region as a vertex list; rectangles yield their four corners.
    pub fn polygon_points(&self) -> Vec<Point> {
        match self {
            Region::Rect(rect) => rect.corners().to_vec(),
            Region::Polygon(polygon) => polygon.points().to_vec(),
        }
    }

    pub fn is_degenerate(&self) -> bool {
        is_degenerate(self)
    }

    /// Fail with [`CoreError::InvalidRegion`] when the region is degenerate.
    pub fn ensure_usable(&self) -> Result<(), CoreError> {
        if self.is_degenerate() {
            let bounds = self.bounding_box();
            return Err(CoreError::InvalidRegion(format!(
                "Region is too small ({:.2}% x {:.2}%), minimum extent is {MIN_REGION_EXTENT}%",
                bounds.width(),
                bounds.height()
            )));
        }
        Ok(())
    }
}

impl From<RectRegion> for Region {
    fn from(rect: RectRegion) -> Self {
        Region::Rect(rect)
    }
}

impl From<PolygonRegion> for Region {
    fn from(polygon: PolygonRegion) -> Self {
        Region::Polygon(polygon)
    }
}

/// A region whose bounding box is under [`MIN_REGION_EXTENT`] on either axis.
pub fn is_degenerate(region: &Region) -> bool {
    let bounds = region.bounding_box();
    bounds.width() < MIN_REGION_EXTENT || bounds.height() < MIN_REGION_EXTENT
}

/// Even-odd ray casting test. `polygon` is a closed ring given without the
/// repeated first vertex; coordinates may be in any unit.
pub(crate) fn polygon_contains(polygon: &[(f64, f64)], x: f64, y: f64) -> bool {
    let n = polygon.len();
    if n < MIN_POLYGON_POINTS {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = polygon[i];
        let (xj, yj) = polygon[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

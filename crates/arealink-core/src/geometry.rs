//! Geometry kernel: rings, polygons with holes, bounding boxes and
//! point-in-polygon containment over WGS84 degree coordinates.
//!
//! Coordinates are treated as planar (`lon` = x, `lat` = y), matching the
//! planar GeoJSON the boundary datasets are published in.
//!
//! # Boundary rule
//!
//! A point lying exactly on an edge of the outer ring, or on an edge of a
//! hole, counts as inside the polygon. Edge hits are detected explicitly
//! (see [`Ring::locate`]) before the ray-casting parity test runs, so the
//! answer never depends on which side of a vertex a float rounds to.
//! Consequences:
//!
//! - every vertex of the outer ring is contained;
//! - a point on a hole's edge is *not* excluded by that hole;
//! - only points strictly inside a hole are excluded.

use serde::{Deserialize, Serialize};

/// Relative tolerance for the on-edge test.
const EDGE_EPSILON: f64 = 1e-12;

/// A WGS84 position in degrees. No altitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Build a coordinate from a GeoJSON position (`[lon, lat, ...]`).
    ///
    /// Returns `None` for positions with fewer than two values or with
    /// non-finite components. Any altitude is ignored.
    pub fn from_position(position: &[f64]) -> Option<Self> {
        match position {
            [lon, lat, ..] if lon.is_finite() && lat.is_finite() => Some(Self::new(*lat, *lon)),
            _ => None,
        }
    }
}

/// Where a point sits relative to a single ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingPosition {
    Inside,
    Boundary,
    Outside,
}

/// A closed loop of coordinates.
///
/// Rings are implicitly closed: a trailing point equal to the first one is
/// dropped on construction, and the closing edge (last → first) is always
/// part of [`edges`](Self::edges).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Coordinate>", into = "Vec<Coordinate>")]
pub struct Ring(Vec<Coordinate>);

impl Ring {
    pub fn new(mut points: Vec<Coordinate>) -> Self {
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        Self(points)
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fewer than three distinct vertices cannot enclose anything.
    pub fn is_degenerate(&self) -> bool {
        self.0.len() < 3
    }

    /// Edges of the ring, including the closing edge.
    pub fn edges(&self) -> impl Iterator<Item = (Coordinate, Coordinate)> + '_ {
        let n = self.0.len();
        (0..n).map(move |i| (self.0[i], self.0[(i + 1) % n]))
    }

    /// Twice the signed shoelace area (positive for counter-clockwise rings).
    fn doubled_signed_area(&self) -> f64 {
        self.edges()
            .map(|(a, b)| a.lon * b.lat - b.lon * a.lat)
            .sum()
    }

    /// Signed shoelace area in square degrees. Zero for degenerate rings.
    pub fn signed_area(&self) -> f64 {
        if self.is_degenerate() {
            return 0.0;
        }
        self.doubled_signed_area() / 2.0
    }

    /// Locate a point relative to this ring.
    ///
    /// Edge hits are reported as [`RingPosition::Boundary`]; otherwise the
    /// even-odd ray-casting rule decides. Degenerate rings contain nothing.
    pub fn locate(&self, point: Coordinate) -> RingPosition {
        if self.is_degenerate() {
            return RingPosition::Outside;
        }

        let mut inside = false;
        for (a, b) in self.edges() {
            if on_segment(point, a, b) {
                return RingPosition::Boundary;
            }
            // Half-open crossing rule: each edge counts for exactly one of its endpoints.
            if (a.lat > point.lat) != (b.lat > point.lat) {
                let cross_lon = a.lon + (point.lat - a.lat) / (b.lat - a.lat) * (b.lon - a.lon);
                if point.lon < cross_lon {
                    inside = !inside;
                }
            }
        }

        if inside {
            RingPosition::Inside
        } else {
            RingPosition::Outside
        }
    }
}

impl From<Vec<Coordinate>> for Ring {
    fn from(points: Vec<Coordinate>) -> Self {
        Self::new(points)
    }
}

impl From<Ring> for Vec<Coordinate> {
    fn from(ring: Ring) -> Self {
        ring.0
    }
}

fn on_segment(p: Coordinate, a: Coordinate, b: Coordinate) -> bool {
    let dx = b.lon - a.lon;
    let dy = b.lat - a.lat;
    let cross = dx * (p.lat - a.lat) - dy * (p.lon - a.lon);
    let scale = dx.abs().max(dy.abs()).max(1.0);
    if cross.abs() > EDGE_EPSILON * scale {
        return false;
    }
    p.lon >= a.lon.min(b.lon)
        && p.lon <= a.lon.max(b.lon)
        && p.lat >= a.lat.min(b.lat)
        && p.lat <= a.lat.max(b.lat)
}

/// Axis-aligned bounding box. Always satisfies `min <= max` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Smallest box covering every point. `None` for an empty iterator.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Coordinate>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bbox = Self {
            min_lat: first.lat,
            min_lon: first.lon,
            max_lat: first.lat,
            max_lon: first.lon,
        };
        for p in iter {
            bbox.min_lat = bbox.min_lat.min(p.lat);
            bbox.min_lon = bbox.min_lon.min(p.lon);
            bbox.max_lat = bbox.max_lat.max(p.lat);
            bbox.max_lon = bbox.max_lon.max(p.lon);
        }
        Some(bbox)
    }

    /// Inclusive containment on both axes.
    ///
    /// Over-approximates any non-rectangular shape: use it to discard
    /// candidates cheaply, never as the final containment answer.
    pub fn contains(&self, point: Coordinate) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lon >= self.min_lon
            && point.lon <= self.max_lon
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }
}

/// A polygon with holes: ring 0 is the outer boundary, the rest are holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    rings: Vec<Ring>,
}

impl Polygon {
    pub fn new(outer: Ring, holes: Vec<Ring>) -> Self {
        let mut rings = Vec::with_capacity(holes.len() + 1);
        rings.push(outer);
        rings.extend(holes);
        Self { rings }
    }

    /// Build from rings in GeoJSON order. `None` when there are no rings.
    pub fn from_rings(rings: Vec<Ring>) -> Option<Self> {
        if rings.is_empty() {
            return None;
        }
        Some(Self { rings })
    }

    pub fn outer(&self) -> &Ring {
        &self.rings[0]
    }

    pub fn holes(&self) -> &[Ring] {
        &self.rings[1..]
    }

    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }

    /// Box around every point of every ring.
    ///
    /// `None` when the outer ring has fewer than three points.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        if self.outer().is_degenerate() {
            return None;
        }
        BoundingBox::from_points(self.rings.iter().flat_map(|r| r.points()))
    }

    /// Point-in-polygon test honouring holes and the module's boundary rule.
    pub fn contains(&self, point: Coordinate) -> bool {
        match self.outer().locate(point) {
            RingPosition::Outside => false,
            RingPosition::Boundary => true,
            RingPosition::Inside => !self
                .holes()
                .iter()
                .any(|hole| hole.locate(point) == RingPosition::Inside),
        }
    }

    /// Area-weighted centroid of the outer ring (holes are ignored).
    ///
    /// `None` for a degenerate ring or when the signed area is exactly zero.
    pub fn centroid(&self) -> Option<Coordinate> {
        let outer = self.outer();
        if outer.is_degenerate() {
            return None;
        }

        let mut doubled_area = 0.0;
        let mut sum_lon = 0.0;
        let mut sum_lat = 0.0;
        for (a, b) in outer.edges() {
            let cross = a.lon * b.lat - b.lon * a.lat;
            doubled_area += cross;
            sum_lon += (a.lon + b.lon) * cross;
            sum_lat += (a.lat + b.lat) * cross;
        }

        if doubled_area == 0.0 {
            return None;
        }
        let factor = 3.0 * doubled_area;
        Some(Coordinate::new(sum_lat / factor, sum_lon / factor))
    }

    /// A representative point guaranteed to satisfy [`contains`](Self::contains).
    ///
    /// Tries, in order: the centroid (rejected when it falls in a hole or
    /// outside a concave outline), the bounding-box center, and finally the
    /// first vertex of the outer ring.
    pub fn interior_point(&self) -> Option<Coordinate> {
        let bbox = self.bounding_box()?;

        if let Some(centroid) = self.centroid()
            && self.contains(centroid)
        {
            return Some(centroid);
        }

        let center = bbox.center();
        if self.contains(center) {
            return Some(center);
        }

        self.outer().points().first().copied()
    }

    /// Absolute area of the outer ring minus its holes, in square degrees.
    pub fn area(&self) -> f64 {
        let holes: f64 = self.holes().iter().map(|h| h.signed_area().abs()).sum();
        (self.outer().signed_area().abs() - holes).max(0.0)
    }
}

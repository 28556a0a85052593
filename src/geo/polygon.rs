//! Simplified country boundary with fixed-point vertices.
//!
//! Containment is an axis-aligned bounding-box test, not true point-in-polygon.
//! Border distance is measured against the infinite lines through consecutive
//! vertices, and the closing edge (last vertex back to the first) is never tested.

use super::FixedPoint;

const MIN_CAPACITY: usize = 8;

/// A country outline as an ordered vertex list plus its running bounding box.
#[derive(Debug, Clone)]
pub struct CountryPolygon {
    pub country_code: String,
    vertices: Vec<FixedPoint>,
    min_lat: i32,
    max_lat: i32,
    min_lon: i32,
    max_lon: i32,
}

impl CountryPolygon {
    pub fn new(country_code: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into(),
            vertices: Vec::new(),
            min_lat: i32::MAX,
            max_lat: i32::MIN,
            min_lon: i32::MAX,
            max_lon: i32::MIN,
        }
    }

    /// Build a polygon from a vertex sequence in order.
    pub fn from_vertices(country_code: impl Into<String>, vertices: &[FixedPoint]) -> Self {
        let mut polygon = Self::new(country_code);
        for v in vertices {
            polygon.add_point(v.lat, v.lon);
        }
        polygon
    }

    /// Append a vertex and widen the bounding box.
    pub fn add_point(&mut self, lat: i32, lon: i32) {
        let len = self.vertices.len();
        if len == self.vertices.capacity() {
            // Power-of-two growth, never below MIN_CAPACITY.
            let target = (len + 1).next_power_of_two().max(MIN_CAPACITY);
            self.vertices.reserve_exact(target - len);
        }
        self.vertices.push(FixedPoint::new(lat, lon));

        self.min_lat = self.min_lat.min(lat);
        self.max_lat = self.max_lat.max(lat);
        self.min_lon = self.min_lon.min(lon);
        self.max_lon = self.max_lon.max(lon);
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.vertices.capacity()
    }

    pub fn vertices(&self) -> &[FixedPoint] {
        &self.vertices
    }

    /// (min_lat, min_lon, max_lat, max_lon), or None for an empty polygon.
    pub fn bounding_box(&self) -> Option<(i32, i32, i32, i32)> {
        if self.is_empty() {
            None
        } else {
            Some((self.min_lat, self.min_lon, self.max_lat, self.max_lon))
        }
    }

    /// Is the point inside the bounding box (edges inclusive)?
    pub fn contains_box(&self, lat: i32, lon: i32) -> bool {
        self.min_lat <= lat && lat <= self.max_lat && self.min_lon <= lon && lon <= self.max_lon
    }

    /// Is `other`'s bounding box nested inside this one on all four sides?
    pub fn contains_polygon_box(&self, other: &CountryPolygon) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.min_lat <= other.min_lat
            && other.max_lat <= self.max_lat
            && self.min_lon <= other.min_lon
            && other.max_lon <= self.max_lon
    }

    /// Minimum distance, in fixed-point units, from the point to the lines
    /// through each consecutive vertex pair. Fewer than two vertices gives infinity.
    pub fn minimum_distance_to_borders(&self, lat: i32, lon: i32) -> f64 {
        if self.vertices.len() < 2 {
            return f64::INFINITY;
        }
        self.vertices
            .windows(2)
            .map(|pair| point_line_distance(pair[0], pair[1], lat, lon))
            .fold(f64::INFINITY, f64::min)
    }
}

/// Distance from (lat, lon) to the infinite line through `a` and `b`.
/// Collapses to point distance when `a == b`.
fn point_line_distance(a: FixedPoint, b: FixedPoint, lat: i32, lon: i32) -> f64 {
    let (x1, y1) = (a.lon as f64, a.lat as f64);
    let (x2, y2) = (b.lon as f64, b.lat as f64);
    let (px, py) = (lon as f64, lat as f64);

    let dx = x2 - x1;
    let dy = y2 - y1;
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 {
        return ((px - x1).powi(2) + (py - y1).powi(2)).sqrt();
    }
    ((dx * (y1 - py)) - ((x1 - px) * dy)).abs() / len
}

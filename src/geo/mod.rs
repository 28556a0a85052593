//! Geometry primitives for the local reverse-geocoding indexes.
//!
//! Coordinates enter as degrees and are quantized to fixed-point integers
//! before any polygon test, so border comparisons never depend on float noise.

pub mod cities;
pub mod countries;
pub mod polygon;

pub use cities::{BuiltinCities, CityDataSource, CityEntry, CityIndex, JsonCityFile};
pub use countries::{country_display_name, BuiltinPolygons, CountryIndex, JsonPolygonFile, PolygonDataSource};
pub use polygon::CountryPolygon;

use serde::{Deserialize, Serialize};

/// Degrees are multiplied by this factor before rounding to an integer.
pub const FIXED_POINT_SCALE: f64 = 100_000.0;

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// True if latitude is within [-90, 90] and longitude within [-180, 180].
    /// NaN is never valid.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }

    pub fn to_fixed(&self) -> FixedPoint {
        FixedPoint::from_degrees(self.lat, self.lon)
    }

    /// Great-circle distance in metres (haversine).
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        distance_m(self.lat, self.lon, other.lat, other.lon)
    }
}

/// A coordinate scaled by [`FIXED_POINT_SCALE`] and rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixedPoint {
    pub lat: i32,
    pub lon: i32,
}

impl FixedPoint {
    pub fn new(lat: i32, lon: i32) -> Self {
        Self { lat, lon }
    }

    pub fn from_degrees(lat: f64, lon: f64) -> Self {
        Self {
            lat: (lat * FIXED_POINT_SCALE).round() as i32,
            lon: (lon * FIXED_POINT_SCALE).round() as i32,
        }
    }

    pub fn to_coordinate(&self) -> Coordinate {
        Coordinate::new(
            self.lat as f64 / FIXED_POINT_SCALE,
            self.lon as f64 / FIXED_POINT_SCALE,
        )
    }
}

/// Great-circle distance in metres between two points given in degrees.
pub fn distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Format coordinates as "21.4225°N, 39.8262°E".
pub fn format_coords(lat: f64, lon: f64) -> String {
    let ns = if lat >= 0.0 { 'N' } else { 'S' };
    let ew = if lon >= 0.0 { 'E' } else { 'W' };
    format!("{:.4}\u{00B0}{}, {:.4}\u{00B0}{}", lat.abs(), ns, lon.abs(), ew)
}

//! Country reverse lookup over the packaged polygon set.
//!
//! Lookup: Quantize → bbox matches (≤ 20) → one match wins, nested box wins,
//! otherwise nearest border (over the matches, or over everything when nothing matched).

use super::polygon::CountryPolygon;
use super::{Coordinate, FixedPoint};
use crate::location::types::LocationError;
use log::debug;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Upper bound on bbox matches collected per lookup.
const MAX_MATCHES: usize = 20;

/// Supplies the (country code, vertex sequence) list once at startup.
pub trait PolygonDataSource {
    fn polygons(&self) -> Result<Vec<(String, Vec<FixedPoint>)>, LocationError>;
}

/// Read-only country index, built once and shared.
#[derive(Debug, Default)]
pub struct CountryIndex {
    polygons: Vec<CountryPolygon>,
}

impl CountryIndex {
    pub fn from_polygons(polygons: Vec<CountryPolygon>) -> Self {
        Self { polygons }
    }

    /// Build the index from a data source.
    pub fn load(source: &dyn PolygonDataSource) -> Result<Self, LocationError> {
        let polygons: Vec<CountryPolygon> = source
            .polygons()?
            .into_iter()
            .map(|(code, vertices)| CountryPolygon::from_vertices(code, &vertices))
            .collect();
        debug!("Country index loaded with {} polygons", polygons.len());
        Ok(Self { polygons })
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Best-matching country polygon for a coordinate, or None only when the index is empty.
    pub fn find_country(&self, lat: f64, lon: f64) -> Option<&CountryPolygon> {
        let fp = Coordinate::new(lat, lon).to_fixed();

        let matches: Vec<&CountryPolygon> = self
            .polygons
            .iter()
            .filter(|p| p.contains_box(fp.lat, fp.lon))
            .take(MAX_MATCHES)
            .collect();

        match matches.len() {
            0 => nearest_border(self.polygons.iter(), fp),
            1 => Some(matches[0]),
            _ => nested_match(&matches).or_else(|| nearest_border(matches.iter().copied(), fp)),
        }
    }
}

/// Prefer an enclave: the first pair where one box sits inside the other yields the inner one.
fn nested_match<'a>(matches: &[&'a CountryPolygon]) -> Option<&'a CountryPolygon> {
    for (i, c) in matches.iter().enumerate() {
        for other in &matches[i + 1..] {
            if c.contains_polygon_box(other) {
                return Some(*other);
            }
            if other.contains_polygon_box(c) {
                return Some(*c);
            }
        }
    }
    None
}

fn nearest_border<'a>(
    polygons: impl Iterator<Item = &'a CountryPolygon>,
    fp: FixedPoint,
) -> Option<&'a CountryPolygon> {
    let mut best: Option<(&CountryPolygon, f64)> = None;
    for p in polygons {
        let d = p.minimum_distance_to_borders(fp.lat, fp.lon);
        match best {
            Some((_, best_d)) if d >= best_d => {}
            _ => best = Some((p, d)),
        }
    }
    best.map(|(p, _)| p)
}

// ─── JSON polygon file ──────────────────────────────────────────

#[derive(Deserialize)]
struct PolygonRecord {
    country: String,
    /// `[lat, lon]` pairs, already fixed-point.
    vertices: Vec<[i32; 2]>,
}

/// Polygons produced by the offline ingestion pipeline, as a JSON array of
/// `{"country": "IL", "vertices": [[lat, lon], ...]}`.
pub struct JsonPolygonFile {
    path: PathBuf,
}

impl JsonPolygonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PolygonDataSource for JsonPolygonFile {
    fn polygons(&self) -> Result<Vec<(String, Vec<FixedPoint>)>, LocationError> {
        let data = fs::read_to_string(&self.path)?;
        let records: Vec<PolygonRecord> = serde_json::from_str(&data)?;
        Ok(records
            .into_iter()
            .map(|r| {
                let vertices = r.vertices.iter().map(|[lat, lon]| FixedPoint::new(*lat, *lon)).collect();
                (r.country.to_uppercase(), vertices)
            })
            .collect())
    }
}

// ─── Built-in coarse outlines ───────────────────────────────────

/// Coarse outlines for a handful of countries, (lat, lon) degrees.
const BUILTIN_OUTLINES: &[(&str, &[(f64, f64)])] = &[
    ("IL", &[
        (33.28, 35.57), (33.09, 35.10), (32.00, 34.70), (31.30, 34.22),
        (29.50, 34.90), (31.00, 35.45), (32.40, 35.55), (32.75, 35.75),
    ]),
    ("JO", &[
        (32.30, 35.57), (32.75, 35.80), (32.30, 39.00), (31.50, 37.00),
        (29.20, 36.50), (29.35, 35.25), (31.20, 35.45),
    ]),
    ("EG", &[
        (31.60, 25.00), (31.30, 32.30), (31.30, 34.22), (29.50, 34.90),
        (22.00, 36.90), (22.00, 25.00),
    ]),
    ("SA", &[
        (29.20, 36.50), (31.50, 37.00), (31.70, 39.20), (29.10, 44.70),
        (28.50, 48.40), (24.00, 51.60), (22.70, 55.20), (19.00, 52.00),
        (16.40, 43.20), (21.00, 39.00), (28.00, 34.60),
    ]),
    ("SE", &[
        (55.30, 12.90), (56.10, 16.00), (59.00, 18.70), (63.50, 20.00),
        (65.80, 24.15), (69.05, 20.55), (63.00, 12.00), (59.00, 11.10),
    ]),
    ("NO", &[
        (58.00, 7.00), (59.00, 11.10), (63.00, 12.00), (69.05, 20.55),
        (69.70, 30.80), (71.10, 25.80), (68.00, 13.00), (62.00, 5.00),
    ]),
    ("GB", &[
        (50.00, -5.70), (51.20, 1.40), (52.90, 1.70), (55.80, -1.60),
        (58.60, -3.00), (58.50, -5.00), (55.30, -6.20), (53.40, -3.10),
    ]),
    ("FR", &[
        (51.10, 2.50), (49.00, 8.20), (47.50, 7.60), (46.10, 6.10),
        (43.70, 7.50), (42.40, 3.10), (43.40, -1.80), (48.60, -4.80),
    ]),
    ("IT", &[
        (46.50, 12.40), (45.80, 13.80), (41.80, 16.10), (40.00, 18.50),
        (38.00, 15.60), (41.20, 13.00), (43.70, 10.30), (44.10, 7.60),
        (45.90, 7.00),
    ]),
    ("VA", &[
        (41.9075, 12.4457), (41.9065, 12.4580), (41.9005, 12.4580), (41.9000, 12.4470),
    ]),
    ("ZA", &[
        (-22.10, 29.40), (-25.90, 32.90), (-34.80, 20.00), (-34.30, 18.40),
        (-28.60, 16.40), (-24.60, 20.00), (-25.40, 25.60),
    ]),
    ("LS", &[
        (-28.57, 28.65), (-29.50, 29.45), (-30.65, 28.10), (-29.60, 27.00),
    ]),
    ("US", &[
        (49.00, -123.30), (49.00, -95.15), (47.30, -67.80), (40.50, -74.00),
        (30.70, -81.40), (25.10, -80.40), (29.60, -94.70), (25.90, -97.15),
        (31.80, -106.50), (32.50, -117.10), (40.40, -124.40),
    ]),
];

/// The coarse outline table compiled into the binary.
pub struct BuiltinPolygons;

impl PolygonDataSource for BuiltinPolygons {
    fn polygons(&self) -> Result<Vec<(String, Vec<FixedPoint>)>, LocationError> {
        Ok(BUILTIN_OUTLINES
            .iter()
            .map(|(code, outline)| {
                let vertices = outline.iter().map(|(lat, lon)| FixedPoint::from_degrees(*lat, *lon)).collect();
                (code.to_string(), vertices)
            })
            .collect())
    }
}

/// English display name for an ISO 3166-1 alpha-2 code; unknown codes are returned as-is.
pub fn country_display_name(code: &str) -> &str {
    match code {
        "AE" => "United Arab Emirates",
        "AU" => "Australia",
        "BD" => "Bangladesh",
        "DE" => "Germany",
        "EG" => "Egypt",
        "FR" => "France",
        "GB" => "United Kingdom",
        "ID" => "Indonesia",
        "IL" => "Israel",
        "IN" => "India",
        "IQ" => "Iraq",
        "IR" => "Iran",
        "IT" => "Italy",
        "JO" => "Jordan",
        "JP" => "Japan",
        "KE" => "Kenya",
        "LS" => "Lesotho",
        "MA" => "Morocco",
        "MY" => "Malaysia",
        "NG" => "Nigeria",
        "NO" => "Norway",
        "PK" => "Pakistan",
        "RU" => "Russia",
        "SA" => "Saudi Arabia",
        "SE" => "Sweden",
        "TR" => "Turkey",
        "US" => "United States",
        "VA" => "Vatican City",
        "ZA" => "South Africa",
        other => other,
    }
}

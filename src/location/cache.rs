//! Append-only address cache at ~/.polaris/addresses.jsonl.
//!
//! Line 1 is a `{"schema_version": N}` header, every other line one row.
//! A different schema version drops the file and starts over.
//! Rows are never updated or deleted; concurrent writers only produce duplicates.
//! Open and write failures are logged and treated as an empty store.

use super::types::{LocationError, LocationSource, ResolvedAddress};
use crate::geo::Coordinate;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const SCHEMA_VERSION: u32 = 2;

/// Default matching radius for cached addresses, in metres.
pub const SAME_LOCATION_M: f64 = 250.0;

#[derive(Serialize, Deserialize)]
struct Header {
    schema_version: u32,
}

/// One persisted row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedRow {
    pub id: i64,
    pub query_lat: f64,
    pub query_lon: f64,
    pub lat: f64,
    pub lon: f64,
    /// None for elevation-only rows.
    #[serde(default)]
    pub formatted: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    pub timestamp: i64,
    #[serde(default)]
    pub elevation: Option<f64>,
    #[serde(default)]
    pub locality: Option<String>,
    #[serde(default)]
    pub admin_area: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub country_name: Option<String>,
}

impl CachedRow {
    fn matches(&self, at: &Coordinate, radius_m: f64) -> bool {
        at.distance_to(&Coordinate::new(self.query_lat, self.query_lon)) <= radius_m
            || at.distance_to(&Coordinate::new(self.lat, self.lon)) <= radius_m
    }

    fn to_address(&self) -> ResolvedAddress {
        let mut addr = ResolvedAddress::new(LocationSource::Cache).with_coordinates(self.lat, self.lon);
        if let Some(text) = &self.formatted {
            addr = addr.with_formatted(text.clone());
        }
        addr.id = self.id;
        addr.locale = self.language.clone();
        addr.elevation = self.elevation;
        addr.locality = self.locality.clone();
        addr.admin_area = self.admin_area.clone();
        addr.country_code = self.country_code.clone();
        addr.country_name = self.country_name.clone();
        addr
    }
}

/// A cached elevation near a query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevationSample {
    pub lat: f64,
    pub lon: f64,
    pub elevation: f64,
    /// Great-circle distance from the query point, metres.
    pub distance_m: f64,
}

/// The address cache.
pub struct AddressCache {
    path: Option<PathBuf>,
    rows: Vec<CachedRow>,
    next_id: i64,
}

impl AddressCache {
    /// Open the cache at the default location (~/.polaris/addresses.jsonl).
    pub fn open_default() -> Self {
        Self::open(Self::default_path())
    }

    /// Open (or create) the cache file. Never fails: an unreadable store has zero rows.
    pub fn open(path: PathBuf) -> Self {
        let rows = match Self::read_file(&path) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Address cache {} unavailable: {}", path.display(), e);
                Vec::new()
            }
        };
        let next_id = rows.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        debug!("Address cache {} opened with {} rows", path.display(), rows.len());
        Self { path: Some(path), rows, next_id }
    }

    /// A store with no backing file.
    pub fn detached() -> Self {
        Self { path: None, rows: Vec::new(), next_id: 1 }
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".polaris")
            .join("addresses.jsonl")
    }

    fn read_file(path: &Path) -> Result<Vec<CachedRow>, LocationError> {
        if !path.exists() {
            Self::recreate(path)?;
            return Ok(Vec::new());
        }

        // Bytes, not a String: one corrupt line must not make the whole file unreadable.
        let data = fs::read(path)?;
        let mut lines = data.split(|&b| b == b'\n');
        let version = lines
            .next()
            .and_then(|line| serde_json::from_slice::<Header>(line).ok())
            .map(|h| h.schema_version);

        if version != Some(SCHEMA_VERSION) {
            warn!(
                "Address cache schema {:?} != {}, dropping {}",
                version,
                SCHEMA_VERSION,
                path.display()
            );
            Self::recreate(path)?;
            return Ok(Vec::new());
        }

        let mut rows = Vec::new();
        for (n, line) in lines.enumerate() {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<CachedRow>(line) {
                Ok(row) => rows.push(row),
                Err(e) => warn!("Skipping malformed cache row {}: {}", n + 2, e),
            }
        }
        Ok(rows)
    }

    fn recreate(path: &Path) -> Result<(), LocationError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let header = serde_json::to_string(&Header { schema_version: SCHEMA_VERSION })?;
        fs::write(path, format!("{}\n", header))?;
        Ok(())
    }

    fn append(&self, row: &CachedRow) -> Result<(), LocationError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
        if needs_header {
            Self::recreate(path)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", serde_json::to_string(row)?)?;
        Ok(())
    }

    fn push(&mut self, mut row: CachedRow) -> i64 {
        row.id = self.next_id;
        self.next_id += 1;
        if let Err(e) = self.append(&row) {
            warn!("Failed to persist cache row {}: {}", row.id, e);
        }
        let id = row.id;
        self.rows.push(row);
        id
    }

    /// Persist a resolved address for `query`. Addresses that already carry an id
    /// are left alone, as are addresses without coordinates. Returns the row id.
    pub fn insert(&mut self, query: Coordinate, address: &mut ResolvedAddress) -> Option<i64> {
        if address.id != 0 {
            return Some(address.id);
        }
        let Some(result) = address.coordinate() else {
            debug!("Not caching address without coordinates: {}", address.formatted());
            return None;
        };

        let row = CachedRow {
            id: 0,
            query_lat: query.lat,
            query_lon: query.lon,
            lat: result.lat,
            lon: result.lon,
            formatted: Some(address.formatted().to_string()),
            language: address.locale.clone(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            elevation: address.elevation,
            locality: address.locality.clone(),
            admin_area: address.admin_area.clone(),
            country_code: address.country_code.clone(),
            country_name: address.country_name.clone(),
        };
        let id = self.push(row);
        address.id = id;
        Some(id)
    }

    /// Persist an elevation measured at `at`.
    pub fn insert_elevation(&mut self, at: Coordinate, elevation: f64) -> i64 {
        self.push(CachedRow {
            id: 0,
            query_lat: at.lat,
            query_lon: at.lon,
            lat: at.lat,
            lon: at.lon,
            formatted: None,
            language: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
            elevation: Some(elevation),
            locality: None,
            admin_area: None,
            country_code: None,
            country_name: None,
        })
    }

    /// Addresses whose query or result coordinate lies within `radius_m`,
    /// filtered by language when one is given.
    pub fn query_near(&self, at: Coordinate, language: Option<&str>, radius_m: f64) -> Vec<ResolvedAddress> {
        self.rows
            .iter()
            .filter(|r| r.formatted.is_some())
            .filter(|r| match language {
                Some(lang) => r.language.as_deref() == Some(lang),
                None => true,
            })
            .filter(|r| r.matches(&at, radius_m))
            .map(CachedRow::to_address)
            .collect()
    }

    /// Rows carrying an elevation within `radius_m`.
    pub fn query_elevation_near(&self, at: Coordinate, radius_m: f64) -> Vec<ElevationSample> {
        self.rows
            .iter()
            .filter(|r| r.matches(&at, radius_m))
            .filter_map(|r| {
                r.elevation.map(|elevation| ElevationSample {
                    lat: r.lat,
                    lon: r.lon,
                    elevation,
                    distance_m: at.distance_to(&Coordinate::new(r.lat, r.lon)),
                })
            })
            .collect()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_cache() -> (AddressCache, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("addresses.jsonl");
        (AddressCache::open(path), dir)
    }

    fn western_wall() -> ResolvedAddress {
        let mut addr = ResolvedAddress::new(LocationSource::Geocoder("Nominatim".into()))
            .with_coordinates(31.7767, 35.2345)
            .with_formatted("Western Wall, Jerusalem, Israel");
        addr.locale = Some("en".into());
        addr.locality = Some("Jerusalem".into());
        addr.country_code = Some("IL".into());
        addr
    }

    #[test]
    fn test_insert_query_round_trip() {
        let (mut cache, _dir) = test_cache();
        let query = Coordinate::new(31.778, 35.235);
        let mut addr = western_wall();

        let id = cache.insert(query, &mut addr).unwrap();
        assert_eq!(id, 1);
        assert_eq!(addr.id, 1);

        let found = cache.query_near(query, None, SAME_LOCATION_M);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].formatted(), "Western Wall, Jerusalem, Israel");
        assert_eq!(found[0].source, LocationSource::Cache);
        assert_eq!(found[0].id, 1);
        assert_eq!(found[0].locality.as_deref(), Some("Jerusalem"));
    }

    #[test]
    fn test_insert_persisted_address_is_noop() {
        let (mut cache, _dir) = test_cache();
        let query = Coordinate::new(31.778, 35.235);
        let mut addr = western_wall();
        cache.insert(query, &mut addr);
        cache.insert(query, &mut addr);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_duplicates_accumulate() {
        let (mut cache, _dir) = test_cache();
        let query = Coordinate::new(31.778, 35.235);
        cache.insert(query, &mut western_wall());
        cache.insert(query, &mut western_wall());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.query_near(query, None, SAME_LOCATION_M).len(), 2);
    }

    #[test]
    fn test_address_without_coordinates_not_cached() {
        let (mut cache, _dir) = test_cache();
        let mut addr = ResolvedAddress::new(LocationSource::Geocoder("X".into())).with_formatted("Somewhere");
        assert!(cache.insert(Coordinate::new(0.0, 0.0), &mut addr).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_language_filter() {
        let (mut cache, _dir) = test_cache();
        let query = Coordinate::new(31.778, 35.235);
        cache.insert(query, &mut western_wall());

        assert_eq!(cache.query_near(query, Some("en"), SAME_LOCATION_M).len(), 1);
        assert!(cache.query_near(query, Some("he"), SAME_LOCATION_M).is_empty());
    }

    #[test]
    fn test_matches_query_or_result_coordinate() {
        let (mut cache, _dir) = test_cache();
        // Query point 2 km away from the result point.
        let query = Coordinate::new(31.796, 35.235);
        cache.insert(query, &mut western_wall());

        assert_eq!(cache.query_near(query, None, SAME_LOCATION_M).len(), 1);
        assert_eq!(cache.query_near(Coordinate::new(31.7767, 35.2345), None, SAME_LOCATION_M).len(), 1);
        assert!(cache.query_near(Coordinate::new(31.75, 35.20), None, SAME_LOCATION_M).is_empty());
    }

    #[test]
    fn test_persistence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("addresses.jsonl");
        let query = Coordinate::new(31.778, 35.235);

        {
            let mut cache = AddressCache::open(path.clone());
            cache.insert(query, &mut western_wall());
            cache.insert_elevation(query, 754.0);
        }

        let cache = AddressCache::open(path);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.query_near(query, None, SAME_LOCATION_M).len(), 1);

        let mut addr = western_wall();
        let mut cache = cache;
        assert_eq!(cache.insert(query, &mut addr), Some(3));
    }

    #[test]
    fn test_schema_mismatch_drops_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("addresses.jsonl");
        fs::write(
            &path,
            "{\"schema_version\": 1}\n{\"id\":1,\"query_lat\":0.0,\"query_lon\":0.0,\"lat\":0.0,\"lon\":0.0,\"timestamp\":0}\n",
        )
        .unwrap();

        let cache = AddressCache::open(path.clone());
        assert!(cache.is_empty());
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains(&format!("{}", SCHEMA_VERSION)));
    }

    #[test]
    fn test_malformed_rows_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("addresses.jsonl");
        fs::write(
            &path,
            format!(
                "{{\"schema_version\": {}}}\nnot json\n{{\"id\":7,\"query_lat\":1.0,\"query_lon\":1.0,\"lat\":1.0,\"lon\":1.0,\"formatted\":\"X\",\"timestamp\":0}}\n",
                SCHEMA_VERSION
            ),
        )
        .unwrap();

        let mut cache = AddressCache::open(path);
        assert_eq!(cache.len(), 1);
        let id = cache.insert_elevation(Coordinate::new(1.0, 1.0), 10.0);
        assert_eq!(id, 8);
    }

    #[test]
    fn test_corrupt_bytes_recreate_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("addresses.jsonl");
        fs::write(&path, [0xff, 0xfe, b'\n']).unwrap();

        let query = Coordinate::new(31.778, 35.235);
        {
            let mut cache = AddressCache::open(path.clone());
            assert!(cache.is_empty());
            cache.insert(query, &mut western_wall());
        }

        let reopened = AddressCache::open(path);
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.query_near(query, None, SAME_LOCATION_M).len(), 1);
    }

    #[test]
    fn test_invalid_utf8_row_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("addresses.jsonl");
        let mut data = format!("{{\"schema_version\": {}}}\n", SCHEMA_VERSION).into_bytes();
        data.extend_from_slice(&[0xff, 0xfe, b'\n']);
        data.extend_from_slice(
            b"{\"id\":3,\"query_lat\":1.0,\"query_lon\":1.0,\"lat\":1.0,\"lon\":1.0,\"formatted\":\"X\",\"timestamp\":0}\n",
        );
        fs::write(&path, data).unwrap();

        let cache = AddressCache::open(path);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_unreadable_store_is_empty() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be: reads fail, writes fail.
        let path = dir.path().join("addresses.jsonl");
        fs::create_dir_all(&path).unwrap();

        let mut cache = AddressCache::open(path);
        assert!(cache.is_empty());
        // Writes still land in memory for this process.
        let id = cache.insert(Coordinate::new(31.778, 35.235), &mut western_wall());
        assert_eq!(id, Some(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_elevation_query() {
        let mut cache = AddressCache::detached();
        let here = Coordinate::new(31.778, 35.235);
        cache.insert_elevation(here, 754.0);
        cache.insert(here, &mut western_wall());

        let samples = cache.query_elevation_near(here, 1_000.0);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].elevation, 754.0);
        assert!(samples[0].distance_m < 1.0);

        // Elevation-only rows never show up as addresses.
        assert_eq!(cache.query_near(here, None, SAME_LOCATION_M).len(), 1);
    }
}

//! Nearest predefined city lookup.
//!
//! A linear scan over parallel columns. Table sizes are in the hundreds,
//! so no spatial index.

use super::distance_m;
use crate::location::types::LocationError;
use chrono_tz::Tz;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// One row of the city table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityEntry {
    pub name: String,
    pub country_code: String,
    pub lat: f64,
    pub lon: f64,
    pub timezone: String,
}

/// Supplies city rows once at startup.
pub trait CityDataSource {
    fn cities(&self) -> Result<Vec<CityEntry>, LocationError>;
}

/// Read-only city index, built once and shared.
#[derive(Debug, Default)]
pub struct CityIndex {
    names: Vec<String>,
    countries: Vec<String>,
    lats: Vec<f64>,
    lons: Vec<f64>,
    timezones: Vec<String>,
}

impl CityIndex {
    pub fn from_entries(entries: Vec<CityEntry>) -> Self {
        let mut index = Self::default();
        for entry in entries {
            let timezone = match entry.timezone.parse::<Tz>() {
                Ok(_) => entry.timezone,
                Err(_) => {
                    warn!("City '{}' has unknown timezone '{}', using UTC", entry.name, entry.timezone);
                    "UTC".to_string()
                }
            };
            index.names.push(entry.name);
            index.countries.push(entry.country_code.to_uppercase());
            index.lats.push(entry.lat);
            index.lons.push(entry.lon);
            index.timezones.push(timezone);
        }
        index
    }

    pub fn load(source: &dyn CityDataSource) -> Result<Self, LocationError> {
        let index = Self::from_entries(source.cities()?);
        debug!("City index loaded with {} cities", index.len());
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn entry(&self, i: usize) -> CityEntry {
        CityEntry {
            name: self.names[i].clone(),
            country_code: self.countries[i].clone(),
            lat: self.lats[i],
            lon: self.lons[i],
            timezone: self.timezones[i].clone(),
        }
    }

    /// The city with the smallest great-circle distance, with that distance in metres.
    pub fn nearest(&self, lat: f64, lon: f64) -> Option<(CityEntry, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for i in 0..self.len() {
            let d = distance_m(lat, lon, self.lats[i], self.lons[i]);
            match best {
                Some((_, best_d)) if d >= best_d => {}
                _ => best = Some((i, d)),
            }
        }
        best.map(|(i, d)| (self.entry(i), d))
    }

    /// Every row, in table order.
    pub fn entries(&self) -> Vec<CityEntry> {
        (0..self.len()).map(|i| self.entry(i)).collect()
    }
}

// ─── JSON city file ─────────────────────────────────────────────

/// Cities as a JSON array of [`CityEntry`] objects.
pub struct JsonCityFile {
    path: PathBuf,
}

impl JsonCityFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CityDataSource for JsonCityFile {
    fn cities(&self) -> Result<Vec<CityEntry>, LocationError> {
        let data = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

// ─── Built-in dataset ───────────────────────────────────────────

struct BuiltinCity {
    name: &'static str,
    lat: f64,
    lon: f64,
    tz: &'static str,
    country_code: &'static str,
}

const BUILTIN_CITIES: &[BuiltinCity] = &[
    BuiltinCity { name: "Mecca", lat: 21.4225, lon: 39.8262, tz: "Asia/Riyadh", country_code: "SA" },
    BuiltinCity { name: "Medina", lat: 24.4686, lon: 39.6142, tz: "Asia/Riyadh", country_code: "SA" },
    BuiltinCity { name: "Riyadh", lat: 24.7136, lon: 46.6753, tz: "Asia/Riyadh", country_code: "SA" },
    BuiltinCity { name: "Jerusalem", lat: 31.7683, lon: 35.2137, tz: "Asia/Jerusalem", country_code: "IL" },
    BuiltinCity { name: "Tel Aviv", lat: 32.0853, lon: 34.7818, tz: "Asia/Jerusalem", country_code: "IL" },
    BuiltinCity { name: "Haifa", lat: 32.7940, lon: 34.9896, tz: "Asia/Jerusalem", country_code: "IL" },
    BuiltinCity { name: "Amman", lat: 31.9539, lon: 35.9106, tz: "Asia/Amman", country_code: "JO" },
    BuiltinCity { name: "Cairo", lat: 30.0444, lon: 31.2357, tz: "Africa/Cairo", country_code: "EG" },
    BuiltinCity { name: "Istanbul", lat: 41.0082, lon: 28.9784, tz: "Europe/Istanbul", country_code: "TR" },
    BuiltinCity { name: "Baghdad", lat: 33.3152, lon: 44.3661, tz: "Asia/Baghdad", country_code: "IQ" },
    BuiltinCity { name: "Tehran", lat: 35.6892, lon: 51.3890, tz: "Asia/Tehran", country_code: "IR" },
    BuiltinCity { name: "Dubai", lat: 25.2048, lon: 55.2708, tz: "Asia/Dubai", country_code: "AE" },
    BuiltinCity { name: "Karachi", lat: 24.8607, lon: 67.0011, tz: "Asia/Karachi", country_code: "PK" },
    BuiltinCity { name: "Mumbai", lat: 19.0760, lon: 72.8777, tz: "Asia/Kolkata", country_code: "IN" },
    BuiltinCity { name: "Delhi", lat: 28.6139, lon: 77.2090, tz: "Asia/Kolkata", country_code: "IN" },
    BuiltinCity { name: "Dhaka", lat: 23.8103, lon: 90.4125, tz: "Asia/Dhaka", country_code: "BD" },
    BuiltinCity { name: "Kuala Lumpur", lat: 3.1390, lon: 101.6869, tz: "Asia/Kuala_Lumpur", country_code: "MY" },
    BuiltinCity { name: "Jakarta", lat: -6.2088, lon: 106.8456, tz: "Asia/Jakarta", country_code: "ID" },
    BuiltinCity { name: "Tokyo", lat: 35.6762, lon: 139.6503, tz: "Asia/Tokyo", country_code: "JP" },
    BuiltinCity { name: "Sydney", lat: -33.8688, lon: 151.2093, tz: "Australia/Sydney", country_code: "AU" },
    BuiltinCity { name: "Moscow", lat: 55.7558, lon: 37.6173, tz: "Europe/Moscow", country_code: "RU" },
    BuiltinCity { name: "Stockholm", lat: 59.3293, lon: 18.0686, tz: "Europe/Stockholm", country_code: "SE" },
    BuiltinCity { name: "Oslo", lat: 59.9139, lon: 10.7522, tz: "Europe/Oslo", country_code: "NO" },
    BuiltinCity { name: "Tromsø", lat: 69.6492, lon: 18.9553, tz: "Europe/Oslo", country_code: "NO" },
    BuiltinCity { name: "Longyearbyen", lat: 78.2232, lon: 15.6267, tz: "Arctic/Longyearbyen", country_code: "NO" },
    BuiltinCity { name: "London", lat: 51.5074, lon: -0.1278, tz: "Europe/London", country_code: "GB" },
    BuiltinCity { name: "Paris", lat: 48.8566, lon: 2.3522, tz: "Europe/Paris", country_code: "FR" },
    BuiltinCity { name: "Berlin", lat: 52.5200, lon: 13.4050, tz: "Europe/Berlin", country_code: "DE" },
    BuiltinCity { name: "Rome", lat: 41.9028, lon: 12.4964, tz: "Europe/Rome", country_code: "IT" },
    BuiltinCity { name: "Casablanca", lat: 33.5731, lon: -7.5898, tz: "Africa/Casablanca", country_code: "MA" },
    BuiltinCity { name: "Lagos", lat: 6.5244, lon: 3.3792, tz: "Africa/Lagos", country_code: "NG" },
    BuiltinCity { name: "Nairobi", lat: -1.2921, lon: 36.8219, tz: "Africa/Nairobi", country_code: "KE" },
    BuiltinCity { name: "Johannesburg", lat: -26.2041, lon: 28.0473, tz: "Africa/Johannesburg", country_code: "ZA" },
    BuiltinCity { name: "New York", lat: 40.7128, lon: -74.0060, tz: "America/New_York", country_code: "US" },
    BuiltinCity { name: "Los Angeles", lat: 34.0522, lon: -118.2437, tz: "America/Los_Angeles", country_code: "US" },
];

/// The city table compiled into the binary.
pub struct BuiltinCities;

impl CityDataSource for BuiltinCities {
    fn cities(&self) -> Result<Vec<CityEntry>, LocationError> {
        Ok(BUILTIN_CITIES
            .iter()
            .map(|c| CityEntry {
                name: c.name.to_string(),
                country_code: c.country_code.to_string(),
                lat: c.lat,
                lon: c.lon,
                timezone: c.tz.to_string(),
            })
            .collect())
    }
}

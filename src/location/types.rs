//! Core types for the location subsystem.

use crate::geo::{country_display_name, format_coords, Coordinate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

/// Which stage of the cascade produced an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationSource {
    Country,
    City,
    Cache,
    /// A geocoding provider, by name.
    Geocoder(String),
}

impl fmt::Display for LocationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Country => write!(f, "Country"),
            Self::City => write!(f, "City"),
            Self::Cache => write!(f, "Cache"),
            Self::Geocoder(name) => write!(f, "{}", name),
        }
    }
}

/// A resolved place description.
///
/// The formatted line is computed on first access and then frozen: later
/// edits to the component fields do not change it.
#[derive(Debug, Clone)]
pub struct ResolvedAddress {
    /// Language tag the address was produced in (e.g. "en", "he").
    pub locale: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub feature_name: Option<String>,
    pub thoroughfare: Option<String>,
    pub sub_locality: Option<String>,
    pub locality: Option<String>,
    pub sub_admin_area: Option<String>,
    pub admin_area: Option<String>,
    pub postal_code: Option<String>,
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    /// IANA timezone, known for city hits.
    pub timezone: Option<String>,
    pub elevation: Option<f64>,
    pub source: LocationSource,
    /// Cache row id; 0 while unpersisted.
    pub id: i64,
    formatted: OnceLock<String>,
}

impl ResolvedAddress {
    pub fn new(source: LocationSource) -> Self {
        Self {
            locale: None,
            lat: None,
            lon: None,
            feature_name: None,
            thoroughfare: None,
            sub_locality: None,
            locality: None,
            sub_admin_area: None,
            admin_area: None,
            postal_code: None,
            country_code: None,
            country_name: None,
            timezone: None,
            elevation: None,
            source,
            id: 0,
            formatted: OnceLock::new(),
        }
    }

    pub fn with_coordinates(mut self, lat: f64, lon: f64) -> Self {
        self.lat = Some(lat);
        self.lon = Some(lon);
        self
    }

    /// Use provider-supplied display text instead of composing it.
    /// Has no effect once the formatted text exists.
    pub fn with_formatted(self, text: impl Into<String>) -> Self {
        let _ = self.formatted.set(text.into());
        self
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
            _ => None,
        }
    }

    pub fn has_coordinates(&self) -> bool {
        self.coordinate().is_some()
    }

    /// The human-readable line, computed once.
    pub fn formatted(&self) -> &str {
        self.formatted.get_or_init(|| self.compose())
    }

    fn compose(&self) -> String {
        let country = self
            .country_name
            .clone()
            .or_else(|| self.country_code.as_deref().map(|cc| country_display_name(cc).to_string()));

        let head = self.feature_name.as_ref().or(self.thoroughfare.as_ref());
        let parts: Vec<&str> = [
            head,
            self.locality.as_ref().or(self.sub_locality.as_ref()),
            self.admin_area.as_ref().or(self.sub_admin_area.as_ref()),
            country.as_ref(),
        ]
        .into_iter()
        .flatten()
        .map(|s| s.as_str())
        .filter(|s| !s.is_empty())
        .fold(Vec::new(), |mut acc, s| {
            if acc.last() != Some(&s) {
                acc.push(s);
            }
            acc
        });

        if parts.is_empty() {
            match (self.lat, self.lon) {
                (Some(lat), Some(lon)) => format_coords(lat, lon),
                _ => String::new(),
            }
        } else {
            parts.join(", ")
        }
    }

    pub fn summary(&self) -> AddressSummary {
        AddressSummary {
            formatted: self.formatted().to_string(),
            lat: self.lat,
            lon: self.lon,
            locality: self.locality.clone(),
            admin_area: self.admin_area.clone(),
            country_code: self.country_code.clone(),
            country: self.country_name.clone().or_else(|| {
                self.country_code.as_deref().and_then(|cc| {
                    let name = country_display_name(cc);
                    if name == cc { None } else { Some(name.to_string()) }
                })
            }),
            timezone: self.timezone.clone(),
            elevation: self.elevation,
            locale: self.locale.clone(),
            source: self.source.to_string(),
            id: self.id,
        }
    }
}

/// Serializable view of a [`ResolvedAddress`] for the CLI and HTTP output.
#[derive(Debug, Clone, Serialize)]
pub struct AddressSummary {
    pub formatted: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_area: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    pub source: String,
    pub id: i64,
}

/// Location resolution errors.
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Invalid coordinates ({lat}, {lon}). Lat: -90..90, Lon: -180..180")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("No location found")]
    NotFound,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

//! Runtime configuration, read from ~/.polaris/atlas.json.
//!
//! Every field has a default, so a missing file or a partial file is fine.
//! Environment variables override the file; CLI flags override both.

use crate::geo::{BuiltinCities, BuiltinPolygons, CityIndex, CountryIndex, JsonCityFile, JsonPolygonFile};
use crate::location::cache::{AddressCache, SAME_LOCATION_M};
use crate::location::elevation::{SAME_CITY_M, SAME_PLATEAU_M};
use crate::location::providers::HttpSettings;
use crate::location::{LocationError, ResolverSettings};
use log::debug;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_GEONAMES_USER: &str = "POLARIS_GEONAMES_USER";
pub const ENV_CACHE_PATH: &str = "POLARIS_ATLAS_CACHE";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    /// Address cache file; defaults to ~/.polaris/addresses.jsonl.
    pub cache_path: Option<PathBuf>,
    /// Country polygons JSON; the built-in outlines when absent.
    pub polygons_path: Option<PathBuf>,
    /// City table JSON; the built-in cities when absent.
    pub cities_path: Option<PathBuf>,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub geonames_username: Option<String>,
    pub language: Option<String>,
    pub max_results: usize,
    pub offline: bool,
    pub same_location_m: f64,
    pub same_city_m: f64,
    pub same_plateau_m: f64,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            cache_path: None,
            polygons_path: None,
            cities_path: None,
            user_agent: HttpSettings::default().user_agent,
            timeout_secs: 10,
            geonames_username: None,
            language: None,
            max_results: 5,
            offline: false,
            same_location_m: SAME_LOCATION_M,
            same_city_m: SAME_CITY_M,
            same_plateau_m: SAME_PLATEAU_M,
        }
    }
}

impl AtlasConfig {
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".polaris")
            .join("atlas.json")
    }

    /// Load from the default path, then apply environment overrides.
    pub fn load() -> Result<Self, LocationError> {
        Self::load_from(&Self::default_path())
    }

    /// Load from `path` (missing file → defaults), then apply environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, LocationError> {
        let mut config = if path.exists() {
            let data = fs::read_to_string(path)?;
            serde_json::from_str(&data)
                .map_err(|e| LocationError::Config(format!("{}: {}", path.display(), e)))?
        } else {
            debug!("No config at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(user) = var(ENV_GEONAMES_USER).filter(|s| !s.is_empty()) {
            self.geonames_username = Some(user);
        }
        if let Some(cache) = var(ENV_CACHE_PATH).filter(|s| !s.is_empty()) {
            self.cache_path = Some(PathBuf::from(cache));
        }
    }

    pub fn cache_path(&self) -> PathBuf {
        self.cache_path.clone().unwrap_or_else(AddressCache::default_path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            same_location_m: self.same_location_m,
            same_city_m: self.same_city_m,
            same_plateau_m: self.same_plateau_m,
            max_results: self.max_results.max(1),
        }
    }

    /// Build the country index from the configured polygon file, or the built-in outlines.
    pub fn country_index(&self) -> Result<CountryIndex, LocationError> {
        match &self.polygons_path {
            Some(path) => CountryIndex::load(&JsonPolygonFile::new(path)),
            None => CountryIndex::load(&BuiltinPolygons),
        }
    }

    /// Build the city index from the configured city file, or the built-in table.
    pub fn city_index(&self) -> Result<CityIndex, LocationError> {
        match &self.cities_path {
            Some(path) => CityIndex::load(&JsonCityFile::new(path)),
            None => CityIndex::load(&BuiltinCities),
        }
    }
}

//! Network providers: reverse geocoders and elevation services.
//!
//! Every provider answers through one narrow trait and one candidate type, so the
//! resolver can walk them in order and tests can swap in mocks.

use super::types::{LocationError, LocationSource, ResolvedAddress};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Reverse geocoding capability.
pub trait GeocodeProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Candidate addresses for a coordinate, best-effort ordered by the service.
    fn resolve(
        &self,
        lat: f64,
        lon: f64,
        lang: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<ResolvedAddress>, LocationError>;
}

/// Elevation lookup capability.
pub trait ElevationProvider: Send + Sync {
    fn name(&self) -> &str;

    fn resolve(&self, lat: f64, lon: f64) -> Result<Option<f64>, LocationError>;
}

/// Shared HTTP settings.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: format!("PolarisAtlas/{} (reverse-geocoder)", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(10),
        }
    }
}

impl HttpSettings {
    /// A GET request with the agent headers set; `query` pairs are percent-encoded by ureq.
    fn request(&self, url: &str, query: &[(&str, &str)]) -> ureq::Request {
        query
            .iter()
            .fold(ureq::get(url), |req, (key, value)| req.query(key, value))
            .set("User-Agent", &self.user_agent)
            .timeout(self.timeout)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T, LocationError> {
        let request = self.request(url, query);
        debug!("GET {}", request.url());
        let response = request
            .call()
            .map_err(|e| LocationError::Network(e.to_string()))?;

        response
            .into_json()
            .map_err(|e| LocationError::InvalidResponse(e.to_string()))
    }
}

/// Services below this are reporting "no data" (ocean, voids).
const NO_DATA_ELEVATION: f64 = -9000.0;

fn usable_elevation(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > NO_DATA_ELEVATION)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

// ─── Nominatim ──────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct NominatimReverse {
    #[serde(default)]
    lat: Option<String>,
    #[serde(default)]
    lon: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    address: Option<NominatimAddress>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct NominatimAddress {
    road: Option<String>,
    house_number: Option<String>,
    suburb: Option<String>,
    neighbourhood: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    county: Option<String>,
    state: Option<String>,
    postcode: Option<String>,
    country: Option<String>,
    country_code: Option<String>,
}

/// OpenStreetMap Nominatim `/reverse`.
pub struct Nominatim {
    http: HttpSettings,
    base_url: String,
}

impl Nominatim {
    pub fn new(http: HttpSettings) -> Self {
        Self { http, base_url: "https://nominatim.openstreetmap.org".into() }
    }

    fn to_address(r: NominatimReverse, lang: Option<&str>) -> Option<ResolvedAddress> {
        let lat: f64 = r.lat.as_deref()?.parse().ok()?;
        let lon: f64 = r.lon.as_deref()?.parse().ok()?;
        let a = r.address.unwrap_or_default();

        let mut addr = ResolvedAddress::new(LocationSource::Geocoder("Nominatim".into())).with_coordinates(lat, lon);
        if let Some(text) = non_empty(r.display_name) {
            addr = addr.with_formatted(text);
        }
        addr.locale = lang.map(str::to_string);
        addr.feature_name = non_empty(r.name);
        addr.thoroughfare = match (a.road, a.house_number) {
            (Some(road), Some(number)) => Some(format!("{} {}", road, number)),
            (road, _) => road,
        };
        addr.sub_locality = a.suburb.or(a.neighbourhood);
        addr.locality = a.city.or(a.town).or(a.village);
        addr.sub_admin_area = a.county;
        addr.admin_area = a.state;
        addr.postal_code = a.postcode;
        addr.country_name = a.country;
        addr.country_code = a.country_code.map(|c| c.to_uppercase());
        Some(addr)
    }
}

impl GeocodeProvider for Nominatim {
    fn name(&self) -> &str {
        "Nominatim"
    }

    fn resolve(
        &self,
        lat: f64,
        lon: f64,
        lang: Option<&str>,
        _max_results: usize,
    ) -> Result<Vec<ResolvedAddress>, LocationError> {
        let (lat_s, lon_s) = (lat.to_string(), lon.to_string());
        let mut query = vec![("lat", lat_s.as_str()), ("lon", lon_s.as_str()), ("format", "jsonv2"), ("addressdetails", "1")];
        if let Some(lang) = lang {
            query.push(("accept-language", lang));
        }
        let url = format!("{}/reverse", self.base_url);
        let result: NominatimReverse = self.http.get_json(&url, &query)?;
        if let Some(err) = &result.error {
            debug!("Nominatim: {}", err);
            return Ok(Vec::new());
        }
        Ok(Self::to_address(result, lang).into_iter().collect())
    }
}

// ─── BigDataCloud ───────────────────────────────────────────────

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct BigDataCloudReverse {
    latitude: Option<f64>,
    longitude: Option<f64>,
    #[serde(default)]
    country_name: Option<String>,
    #[serde(default)]
    country_code: Option<String>,
    #[serde(default)]
    principal_subdivision: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    locality: Option<String>,
    #[serde(default)]
    postcode: Option<String>,
}

/// BigDataCloud key-less client endpoint.
pub struct BigDataCloud {
    http: HttpSettings,
}

impl BigDataCloud {
    pub fn new(http: HttpSettings) -> Self {
        Self { http }
    }
}

impl GeocodeProvider for BigDataCloud {
    fn name(&self) -> &str {
        "BigDataCloud"
    }

    fn resolve(
        &self,
        lat: f64,
        lon: f64,
        lang: Option<&str>,
        _max_results: usize,
    ) -> Result<Vec<ResolvedAddress>, LocationError> {
        let (lat_s, lon_s) = (lat.to_string(), lon.to_string());
        let query = [
            ("latitude", lat_s.as_str()),
            ("longitude", lon_s.as_str()),
            ("localityLanguage", lang.unwrap_or("en")),
        ];
        let r: BigDataCloudReverse = self
            .http
            .get_json("https://api.bigdatacloud.net/data/reverse-geocode-client", &query)?;

        let city = non_empty(r.city);
        let locality = non_empty(r.locality);
        let country_code = non_empty(r.country_code);
        if city.is_none() && locality.is_none() && country_code.is_none() {
            return Ok(Vec::new());
        }

        let mut addr = ResolvedAddress::new(LocationSource::Geocoder("BigDataCloud".into()));
        if let (Some(lat), Some(lon)) = (r.latitude, r.longitude) {
            addr = addr.with_coordinates(lat, lon);
        }
        addr.locale = lang.map(str::to_string);
        addr.locality = city.clone().or_else(|| locality.clone());
        addr.sub_locality = locality.filter(|l| Some(l) != city.as_ref());
        addr.admin_area = non_empty(r.principal_subdivision);
        addr.postal_code = non_empty(r.postcode);
        addr.country_name = non_empty(r.country_name);
        addr.country_code = country_code.map(|c| c.to_uppercase());
        Ok(vec![addr])
    }
}

// ─── GeoNames ───────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct GeoNamesStatus {
    message: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeoNamesPlace {
    name: String,
    lat: String,
    lng: String,
    #[serde(default)]
    country_code: Option<String>,
    #[serde(default)]
    country_name: Option<String>,
    #[serde(default)]
    admin_name1: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GeoNamesNearby {
    #[serde(default)]
    geonames: Vec<GeoNamesPlace>,
    #[serde(default)]
    status: Option<GeoNamesStatus>,
}

#[derive(Deserialize, Debug)]
struct GeoNamesSrtm {
    srtm3: Option<f64>,
    #[serde(default)]
    status: Option<GeoNamesStatus>,
}

/// GeoNames web services; needs a registered username.
pub struct GeoNames {
    http: HttpSettings,
    username: String,
}

impl GeoNames {
    pub fn new(http: HttpSettings, username: impl Into<String>) -> Self {
        Self { http, username: username.into() }
    }
}

impl GeocodeProvider for GeoNames {
    fn name(&self) -> &str {
        "GeoNames"
    }

    fn resolve(
        &self,
        lat: f64,
        lon: f64,
        lang: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<ResolvedAddress>, LocationError> {
        let (lat_s, lon_s, rows) = (lat.to_string(), lon.to_string(), max_results.max(1).to_string());
        let query = [
            ("lat", lat_s.as_str()),
            ("lng", lon_s.as_str()),
            ("lang", lang.unwrap_or("en")),
            ("maxRows", rows.as_str()),
            ("username", self.username.as_str()),
        ];
        let r: GeoNamesNearby = self.http.get_json("http://api.geonames.org/findNearbyPlaceNameJSON", &query)?;
        if let Some(status) = r.status {
            return Err(LocationError::InvalidResponse(status.message));
        }

        Ok(r.geonames
            .into_iter()
            .filter_map(|p| {
                let lat: f64 = p.lat.parse().ok()?;
                let lon: f64 = p.lng.parse().ok()?;
                let mut addr = ResolvedAddress::new(LocationSource::Geocoder("GeoNames".into())).with_coordinates(lat, lon);
                addr.locale = lang.map(str::to_string);
                addr.locality = Some(p.name);
                addr.admin_area = non_empty(p.admin_name1);
                addr.country_name = non_empty(p.country_name);
                addr.country_code = non_empty(p.country_code).map(|c| c.to_uppercase());
                Some(addr)
            })
            .collect())
    }
}

impl ElevationProvider for GeoNames {
    fn name(&self) -> &str {
        "GeoNames"
    }

    fn resolve(&self, lat: f64, lon: f64) -> Result<Option<f64>, LocationError> {
        let (lat_s, lon_s) = (lat.to_string(), lon.to_string());
        let query = [("lat", lat_s.as_str()), ("lng", lon_s.as_str()), ("username", self.username.as_str())];
        let r: GeoNamesSrtm = self.http.get_json("http://api.geonames.org/srtm3JSON", &query)?;
        if let Some(status) = r.status {
            return Err(LocationError::InvalidResponse(status.message));
        }
        Ok(usable_elevation(r.srtm3))
    }
}

// ─── Open-Elevation ─────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct OpenElevationResponse {
    results: Vec<OpenElevationResult>,
}

#[derive(Deserialize, Debug)]
struct OpenElevationResult {
    elevation: Option<f64>,
}

/// api.open-elevation.com lookup.
pub struct OpenElevation {
    http: HttpSettings,
}

impl OpenElevation {
    pub fn new(http: HttpSettings) -> Self {
        Self { http }
    }
}

impl ElevationProvider for OpenElevation {
    fn name(&self) -> &str {
        "Open-Elevation"
    }

    fn resolve(&self, lat: f64, lon: f64) -> Result<Option<f64>, LocationError> {
        let locations = format!("{},{}", lat, lon);
        let r: OpenElevationResponse = self
            .http
            .get_json("https://api.open-elevation.com/api/v1/lookup", &[("locations", locations.as_str())])?;
        Ok(usable_elevation(r.results.into_iter().next().and_then(|x| x.elevation)))
    }
}

// ─── OpenTopoData ───────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct OpenTopoDataResponse {
    #[serde(default)]
    results: Vec<OpenElevationResult>,
    status: String,
    #[serde(default)]
    error: Option<String>,
}

/// api.opentopodata.org, SRTM 90 m dataset.
pub struct OpenTopoData {
    http: HttpSettings,
}

impl OpenTopoData {
    pub fn new(http: HttpSettings) -> Self {
        Self { http }
    }
}

impl ElevationProvider for OpenTopoData {
    fn name(&self) -> &str {
        "OpenTopoData"
    }

    fn resolve(&self, lat: f64, lon: f64) -> Result<Option<f64>, LocationError> {
        let locations = format!("{},{}", lat, lon);
        let r: OpenTopoDataResponse = self
            .http
            .get_json("https://api.opentopodata.org/v1/srtm90m", &[("locations", locations.as_str())])?;
        if r.status != "OK" {
            return Err(LocationError::InvalidResponse(r.error.unwrap_or(r.status)));
        }
        Ok(usable_elevation(r.results.into_iter().next().and_then(|x| x.elevation)))
    }
}

// ─── Default chains ─────────────────────────────────────────────

/// Web geocoders in priority order. GeoNames joins only with a username.
pub fn default_geocoders(http: &HttpSettings, geonames_username: Option<&str>) -> Vec<Box<dyn GeocodeProvider>> {
    let mut chain: Vec<Box<dyn GeocodeProvider>> = vec![
        Box::new(Nominatim::new(http.clone())),
        Box::new(BigDataCloud::new(http.clone())),
    ];
    if let Some(user) = geonames_username {
        chain.push(Box::new(GeoNames::new(http.clone(), user)));
    }
    chain
}

/// Elevation services in priority order.
pub fn default_elevation_providers(
    http: &HttpSettings,
    geonames_username: Option<&str>,
) -> Vec<Box<dyn ElevationProvider>> {
    let mut chain: Vec<Box<dyn ElevationProvider>> = vec![
        Box::new(OpenElevation::new(http.clone())),
        Box::new(OpenTopoData::new(http.clone())),
    ];
    if let Some(user) = geonames_username {
        chain.push(Box::new(GeoNames::new(http.clone(), user)));
    }
    chain
}

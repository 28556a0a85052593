//! Address resolver: the fallback chain from packaged tables to network geocoders.
//!
//! Address flow:   Country → City → Cache → platform geocoder → web geocoders → City/Country fallback
//! Elevation flow: cached samples → elevation services
//!
//! Country and City always run and are reported as they are found; from Cache on,
//! the first stage that yields a candidate ends the cascade. Only a network result
//! is written back to the cache. Nothing but an invalid coordinate makes a stage fail
//! the request: store and provider errors are logged and treated as "no candidates".

use super::cache::{AddressCache, SAME_LOCATION_M};
use super::elevation::{ElevationEstimator, SAME_CITY_M, SAME_PLATEAU_M};
use super::providers::{self, ElevationProvider, GeocodeProvider, HttpSettings};
use super::types::{LocationSource, ResolvedAddress};
use crate::config::AtlasConfig;
use crate::geo::{country_display_name, CityIndex, Coordinate, CountryIndex};
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Radii and limits used by the cascade.
#[derive(Debug, Clone, Copy)]
pub struct ResolverSettings {
    pub same_location_m: f64,
    pub same_city_m: f64,
    pub same_plateau_m: f64,
    pub max_results: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            same_location_m: SAME_LOCATION_M,
            same_city_m: SAME_CITY_M,
            same_plateau_m: SAME_PLATEAU_M,
            max_results: 5,
        }
    }
}

/// The address resolver with its fallback pipeline.
pub struct AddressResolver {
    countries: Arc<CountryIndex>,
    cities: Arc<CityIndex>,
    cache: Mutex<AddressCache>,
    geocoders: Vec<Box<dyn GeocodeProvider>>,
    elevation_providers: Vec<Box<dyn ElevationProvider>>,
    settings: ResolverSettings,
    offline: bool,
}

impl AddressResolver {
    /// A resolver with local stages only; add providers with the `with_*` builders.
    pub fn new(countries: Arc<CountryIndex>, cities: Arc<CityIndex>, cache: AddressCache) -> Self {
        Self {
            countries,
            cities,
            cache: Mutex::new(cache),
            geocoders: Vec::new(),
            elevation_providers: Vec::new(),
            settings: ResolverSettings::default(),
            offline: false,
        }
    }

    /// A resolver wired to the configured cache and the default provider chains.
    pub fn from_config(config: &AtlasConfig, countries: Arc<CountryIndex>, cities: Arc<CityIndex>) -> Self {
        let http = HttpSettings {
            user_agent: config.user_agent.clone(),
            timeout: config.timeout(),
        };
        let username = config.geonames_username.as_deref();
        let mut resolver = Self::new(countries, cities, AddressCache::open(config.cache_path()))
            .with_geocoders(providers::default_geocoders(&http, username))
            .with_elevation_providers(providers::default_elevation_providers(&http, username))
            .with_settings(config.resolver_settings());
        resolver.set_offline(config.offline);
        resolver
    }

    pub fn with_geocoders(mut self, geocoders: Vec<Box<dyn GeocodeProvider>>) -> Self {
        self.geocoders = geocoders;
        self
    }

    /// Put a platform geocoder ahead of the web services.
    pub fn with_platform_geocoder(mut self, geocoder: Box<dyn GeocodeProvider>) -> Self {
        self.geocoders.insert(0, geocoder);
        self
    }

    pub fn with_elevation_providers(mut self, providers: Vec<Box<dyn ElevationProvider>>) -> Self {
        self.elevation_providers = providers;
        self
    }

    pub fn with_settings(mut self, settings: ResolverSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Offline mode skips every network provider.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    /// The address cache, locked. Held only for reads and appends, never
    /// across a provider call.
    pub fn cache(&self) -> MutexGuard<'_, AddressCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve a coordinate to its best address.
    pub fn resolve(&self, lat: f64, lon: f64, lang: Option<&str>) -> Option<ResolvedAddress> {
        self.resolve_with(lat, lon, lang, |_| {})
    }

    /// Resolve, reporting each better candidate to `on_candidate` as it is found.
    /// The return value is the last candidate reported.
    pub fn resolve_with<F>(&self, lat: f64, lon: f64, lang: Option<&str>, mut on_candidate: F) -> Option<ResolvedAddress>
    where
        F: FnMut(&ResolvedAddress),
    {
        let query = Coordinate::new(lat, lon);
        if !query.is_valid() {
            debug!("Rejecting invalid coordinate ({}, {})", lat, lon);
            return None;
        }

        // 1. Country
        let country = self.find_country(lat, lon, lang);
        if let Some(c) = &country {
            debug!("Country stage: {}", c.formatted());
            on_candidate(c);
        }

        // 2. City
        let city = self.find_city(lat, lon, lang);
        if let Some(c) = &city {
            debug!("City stage: {}", c.formatted());
            on_candidate(c);
        }

        // 3. Cache
        let cached = select_best(self.cache().query_near(query, lang, self.settings.same_location_m), query);
        if let Some(best) = cached {
            debug!("Cache hit: {}", best.formatted());
            on_candidate(&best);
            return Some(best);
        }

        // 4. Geocoders, in order; the winner goes back into the cache.
        if let Some(mut best) = self.query_geocoders(lat, lon, lang) {
            if best.locale.is_none() {
                best.locale = lang.map(str::to_string);
            }
            self.cache().insert(query, &mut best);
            info!("Resolved ({}, {}) via {}: {}", lat, lon, best.source, best.formatted());
            on_candidate(&best);
            return Some(best);
        }

        // 5. Local fallback
        city.or(country)
    }

    fn query_geocoders(&self, lat: f64, lon: f64, lang: Option<&str>) -> Option<ResolvedAddress> {
        if self.offline {
            return None;
        }
        let query = Coordinate::new(lat, lon);
        for geocoder in &self.geocoders {
            match geocoder.resolve(lat, lon, lang, self.settings.max_results) {
                Ok(candidates) if !candidates.is_empty() => {
                    debug!("{} returned {} candidates", geocoder.name(), candidates.len());
                    return select_best(candidates, query);
                }
                Ok(_) => debug!("{} returned nothing", geocoder.name()),
                Err(e) => warn!("{} failed: {}", geocoder.name(), e),
            }
        }
        None
    }

    /// Country stage on its own.
    pub fn find_country(&self, lat: f64, lon: f64, lang: Option<&str>) -> Option<ResolvedAddress> {
        let polygon = self.countries.find_country(lat, lon)?;
        let mut addr = ResolvedAddress::new(LocationSource::Country).with_coordinates(lat, lon);
        addr.locale = lang.map(str::to_string);
        addr.country_name = Some(country_display_name(&polygon.country_code).to_string());
        addr.country_code = Some(polygon.country_code.clone());
        Some(addr)
    }

    /// City stage on its own.
    pub fn find_city(&self, lat: f64, lon: f64, lang: Option<&str>) -> Option<ResolvedAddress> {
        let (city, distance) = self.cities.nearest(lat, lon)?;
        debug!("Nearest city {} at {:.0} m", city.name, distance);
        let mut addr = ResolvedAddress::new(LocationSource::City).with_coordinates(city.lat, city.lon);
        addr.locale = lang.map(str::to_string);
        addr.locality = Some(city.name);
        addr.country_name = Some(country_display_name(&city.country_code).to_string());
        addr.country_code = Some(city.country_code);
        addr.timezone = Some(city.timezone);
        Some(addr)
    }

    /// Elevation for a coordinate: cached estimate first, then the elevation services.
    pub fn resolve_elevation(&self, lat: f64, lon: f64) -> Option<f64> {
        let at = Coordinate::new(lat, lon);
        if !at.is_valid() {
            return None;
        }

        let estimate = ElevationEstimator::new(&self.cache())
            .with_radii(self.settings.same_plateau_m, self.settings.same_city_m)
            .estimate(lat, lon);
        if estimate.is_some() {
            return estimate;
        }

        if self.offline {
            return None;
        }
        for provider in &self.elevation_providers {
            match provider.resolve(lat, lon) {
                Ok(Some(elevation)) => {
                    info!("Elevation at ({}, {}) via {}: {} m", lat, lon, provider.name(), elevation);
                    self.cache().insert_elevation(at, elevation);
                    return Some(elevation);
                }
                Ok(None) => debug!("{} has no elevation here", provider.name()),
                Err(e) => warn!("{} failed: {}", provider.name(), e),
            }
        }
        None
    }
}

/// Pick one candidate: the only one; else the nearest to `at` among those with
/// coordinates (first wins ties); else the most specific by field.
pub fn select_best(mut candidates: Vec<ResolvedAddress>, at: Coordinate) -> Option<ResolvedAddress> {
    if candidates.len() <= 1 {
        return candidates.pop();
    }

    let mut nearest: Option<(usize, f64)> = None;
    for (i, c) in candidates.iter().enumerate() {
        if let Some(p) = c.coordinate() {
            let d = at.distance_to(&p);
            match nearest {
                Some((_, best_d)) if d >= best_d => {}
                _ => nearest = Some((i, d)),
            }
        }
    }

    let index = match nearest {
        Some((i, _)) => i,
        None => most_specific(&candidates),
    };
    Some(candidates.swap_remove(index))
}

/// Specificity order: feature > locality > sub-locality > admin > sub-admin > country > first.
fn most_specific(candidates: &[ResolvedAddress]) -> usize {
    let has: [fn(&ResolvedAddress) -> bool; 6] = [
        |a| a.feature_name.is_some(),
        |a| a.locality.is_some(),
        |a| a.sub_locality.is_some(),
        |a| a.admin_area.is_some(),
        |a| a.sub_admin_area.is_some(),
        |a| a.country_name.is_some(),
    ];
    has.iter()
        .find_map(|field| candidates.iter().position(|c| field(c)))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{BuiltinCities, CountryPolygon, FixedPoint};
    use crate::location::types::LocationError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    struct MockGeocoder {
        name: &'static str,
        calls: Arc<AtomicUsize>,
        result: Result<Vec<ResolvedAddress>, String>,
    }

    impl MockGeocoder {
        fn boxed(name: &'static str, result: Result<Vec<ResolvedAddress>, String>) -> (Box<dyn GeocodeProvider>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (Box::new(Self { name, calls: calls.clone(), result }), calls)
        }
    }

    impl GeocodeProvider for MockGeocoder {
        fn name(&self) -> &str {
            self.name
        }

        fn resolve(&self, _lat: f64, _lon: f64, _lang: Option<&str>, _max: usize) -> Result<Vec<ResolvedAddress>, LocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone().map_err(LocationError::Network)
        }
    }

    /// Signals when a call starts, then blocks until released.
    struct GatedGeocoder {
        entered: Mutex<Sender<()>>,
        release: Mutex<Receiver<()>>,
    }

    impl GeocodeProvider for GatedGeocoder {
        fn name(&self) -> &str {
            "Gated"
        }

        fn resolve(&self, lat: f64, lon: f64, _lang: Option<&str>, _max: usize) -> Result<Vec<ResolvedAddress>, LocationError> {
            let _ = self.entered.lock().unwrap().send(());
            let _ = self.release.lock().unwrap().recv();
            Ok(vec![web_address("Slow Street", lat, lon)])
        }
    }

    struct MockElevation {
        calls: Arc<AtomicUsize>,
        value: Option<f64>,
    }

    impl ElevationProvider for MockElevation {
        fn name(&self) -> &str {
            "MockElevation"
        }

        fn resolve(&self, _lat: f64, _lon: f64) -> Result<Option<f64>, LocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.value)
        }
    }

    fn il_polygon() -> CountryPolygon {
        CountryPolygon::from_vertices(
            "IL",
            &[
                FixedPoint::from_degrees(29.5, 34.2),
                FixedPoint::from_degrees(29.5, 35.9),
                FixedPoint::from_degrees(33.3, 35.9),
                FixedPoint::from_degrees(33.3, 34.2),
            ],
        )
    }

    fn resolver(dir: &TempDir) -> AddressResolver {
        let countries = Arc::new(CountryIndex::from_polygons(vec![il_polygon()]));
        let cities = Arc::new(CityIndex::load(&BuiltinCities).unwrap());
        AddressResolver::new(countries, cities, AddressCache::open(dir.path().join("addresses.jsonl")))
    }

    fn web_address(text: &str, lat: f64, lon: f64) -> ResolvedAddress {
        let mut addr = ResolvedAddress::new(LocationSource::Geocoder("Mock".into()))
            .with_coordinates(lat, lon)
            .with_formatted(text);
        addr.locality = Some("Jerusalem".into());
        addr
    }

    #[test]
    fn test_invalid_coordinate_returns_none_without_callback() {
        let dir = TempDir::new().unwrap();
        let (geo, calls) = MockGeocoder::boxed("A", Ok(vec![web_address("X", 0.0, 0.0)]));
        let r = resolver(&dir).with_geocoders(vec![geo]);

        for (lat, lon) in [(91.0, 0.0), (-90.5, 10.0), (0.0, 180.1), (0.0, -200.0)] {
            let mut emitted = 0;
            assert!(r.resolve_with(lat, lon, None, |_| emitted += 1).is_none());
            assert_eq!(emitted, 0);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(r.cache().is_empty());
    }

    #[test]
    fn test_country_stage_jerusalem() {
        let dir = TempDir::new().unwrap();
        let r = resolver(&dir);
        let country = r.find_country(31.778, 35.235, None).unwrap();
        assert_eq!(country.country_code.as_deref(), Some("IL"));
        assert_eq!(country.source, LocationSource::Country);
    }

    #[test]
    fn test_offline_falls_back_to_city_then_country() {
        let dir = TempDir::new().unwrap();
        let mut r = resolver(&dir);
        r.set_offline(true);

        let mut emitted = Vec::new();
        let best = r.resolve_with(31.778, 35.235, Some("en"), |c| emitted.push(c.source.clone())).unwrap();
        assert_eq!(emitted, vec![LocationSource::Country, LocationSource::City]);
        assert_eq!(best.source, LocationSource::City);
        assert_eq!(best.locality.as_deref(), Some("Jerusalem"));
        assert_eq!(best.timezone.as_deref(), Some("Asia/Jerusalem"));

        let countries = Arc::new(CountryIndex::from_polygons(vec![il_polygon()]));
        let country_only = AddressResolver::new(countries, Arc::new(CityIndex::default()), AddressCache::detached());
        let best = country_only.resolve(31.778, 35.235, None).unwrap();
        assert_eq!(best.source, LocationSource::Country);
    }

    #[test]
    fn test_nothing_anywhere_is_none() {
        let r = AddressResolver::new(
            Arc::new(CountryIndex::default()),
            Arc::new(CityIndex::default()),
            AddressCache::detached(),
        );
        let mut emitted = 0;
        assert!(r.resolve_with(10.0, 10.0, None, |_| emitted += 1).is_none());
        assert_eq!(emitted, 0);
    }

    #[test]
    fn test_web_result_persisted_and_returned() {
        let dir = TempDir::new().unwrap();
        let (a, a_calls) = MockGeocoder::boxed("A", Ok(vec![]));
        let (b, b_calls) = MockGeocoder::boxed("B", Ok(vec![web_address("Old City, Jerusalem", 31.7767, 35.2345)]));
        let (c, c_calls) = MockGeocoder::boxed("C", Ok(vec![web_address("Never", 31.7767, 35.2345)]));
        let r = resolver(&dir).with_geocoders(vec![a, b, c]);

        let mut emitted = Vec::new();
        let best = r
            .resolve_with(31.778, 35.235, Some("en"), |c| emitted.push(c.formatted().to_string()))
            .unwrap();

        assert_eq!(best.formatted(), "Old City, Jerusalem");
        assert_ne!(best.id, 0);
        assert_eq!(best.locale.as_deref(), Some("en"));
        assert_eq!(emitted.len(), 3);
        assert_eq!(emitted.last().map(String::as_str), Some("Old City, Jerusalem"));
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
        assert_eq!(c_calls.load(Ordering::SeqCst), 0);
        assert_eq!(r.cache().len(), 1);
    }

    #[test]
    fn test_cache_hit_short_circuits_providers() {
        let dir = TempDir::new().unwrap();
        let (first, first_calls) = MockGeocoder::boxed("A", Ok(vec![web_address("Old City, Jerusalem", 31.7767, 35.2345)]));
        let r = resolver(&dir).with_geocoders(vec![first]);
        r.resolve(31.778, 35.235, Some("en")).unwrap();
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);

        // Fresh resolver over the same cache file, with counting mocks.
        let (a, a_calls) = MockGeocoder::boxed("A", Ok(vec![web_address("Web", 31.7767, 35.2345)]));
        let (b, b_calls) = MockGeocoder::boxed("B", Ok(vec![web_address("Web", 31.7767, 35.2345)]));
        let (platform, platform_calls) = MockGeocoder::boxed("Platform", Ok(vec![web_address("OS", 31.7767, 35.2345)]));
        let r = resolver(&dir).with_geocoders(vec![a, b]).with_platform_geocoder(platform);

        let best = r.resolve(31.778, 35.235, Some("en")).unwrap();
        assert_eq!(best.source, LocationSource::Cache);
        assert_eq!(best.formatted(), "Old City, Jerusalem");
        assert_eq!(platform_calls.load(Ordering::SeqCst), 0);
        assert_eq!(a_calls.load(Ordering::SeqCst), 0);
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
        assert_eq!(r.cache().len(), 1);
    }

    #[test]
    fn test_cache_language_mismatch_escalates() {
        let dir = TempDir::new().unwrap();
        let (first, _) = MockGeocoder::boxed("A", Ok(vec![web_address("Old City", 31.7767, 35.2345)]));
        let r = resolver(&dir).with_geocoders(vec![first]);
        r.resolve(31.778, 35.235, Some("en")).unwrap();

        let (he, he_calls) = MockGeocoder::boxed("A", Ok(vec![web_address("העיר העתיקה", 31.7767, 35.2345)]));
        let r = resolver(&dir).with_geocoders(vec![he]);
        let best = r.resolve(31.778, 35.235, Some("he")).unwrap();
        assert_eq!(best.formatted(), "העיר העתיקה");
        assert_eq!(he_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_provider_failure_continues_cascade() {
        let dir = TempDir::new().unwrap();
        let (platform, platform_calls) = MockGeocoder::boxed("Platform", Err("offline".into()));
        let (a, a_calls) = MockGeocoder::boxed("A", Err("HTTP 503".into()));
        let (b, _) = MockGeocoder::boxed("B", Ok(vec![web_address("From B", 31.7767, 35.2345)]));
        let r = resolver(&dir).with_geocoders(vec![a, b]).with_platform_geocoder(platform);

        let best = r.resolve(31.778, 35.235, None).unwrap();
        assert_eq!(best.formatted(), "From B");
        assert_eq!(platform_calls.load(Ordering::SeqCst), 1);
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_all_providers_fail_returns_city() {
        let dir = TempDir::new().unwrap();
        let (a, _) = MockGeocoder::boxed("A", Err("timeout".into()));
        let r = resolver(&dir).with_geocoders(vec![a]);
        let best = r.resolve(31.778, 35.235, None).unwrap();
        assert_eq!(best.source, LocationSource::City);
        assert!(r.cache().is_empty());
    }

    #[test]
    fn test_offline_skips_providers() {
        let dir = TempDir::new().unwrap();
        let (a, a_calls) = MockGeocoder::boxed("A", Ok(vec![web_address("Web", 31.7767, 35.2345)]));
        let mut r = resolver(&dir).with_geocoders(vec![a]);
        r.set_offline(true);
        r.resolve(31.778, 35.235, None).unwrap();
        assert_eq!(a_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_select_best_nearest() {
        let at = Coordinate::new(31.778, 35.235);
        // Offsets of roughly 10 m, 5 m and 50 m north.
        let m = 1.0 / 111_195.0;
        let candidates = vec![
            web_address("ten", 31.778 + 10.0 * m, 35.235),
            web_address("five", 31.778 + 5.0 * m, 35.235),
            web_address("fifty", 31.778 + 50.0 * m, 35.235),
        ];
        assert_eq!(select_best(candidates, at).unwrap().formatted(), "five");
    }

    #[test]
    fn test_select_best_tie_keeps_first() {
        let at = Coordinate::new(0.0, 0.0);
        let candidates = vec![web_address("first", 0.001, 0.0), web_address("second", -0.001, 0.0)];
        assert_eq!(select_best(candidates, at).unwrap().formatted(), "first");
    }

    #[test]
    fn test_select_best_by_specificity() {
        let at = Coordinate::new(0.0, 0.0);
        let mut country = ResolvedAddress::new(LocationSource::Cache);
        country.country_name = Some("Israel".into());
        let mut admin = ResolvedAddress::new(LocationSource::Cache);
        admin.admin_area = Some("Jerusalem District".into());
        let mut locality = ResolvedAddress::new(LocationSource::Cache);
        locality.locality = Some("Jerusalem".into());

        let best = select_best(vec![country.clone(), admin.clone(), locality], at).unwrap();
        assert_eq!(best.locality.as_deref(), Some("Jerusalem"));

        let best = select_best(vec![country.clone(), admin], at).unwrap();
        assert_eq!(best.admin_area.as_deref(), Some("Jerusalem District"));

        let bare = ResolvedAddress::new(LocationSource::Cache).with_formatted("bare");
        let best = select_best(vec![bare.clone(), bare], at).unwrap();
        assert_eq!(best.formatted(), "bare");

        assert!(select_best(Vec::new(), at).is_none());
    }

    #[test]
    fn test_elevation_cascade() {
        let dir = TempDir::new().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let r = resolver(&dir).with_elevation_providers(vec![
            Box::new(MockElevation { calls: calls.clone(), value: None }),
            Box::new(MockElevation { calls: calls.clone(), value: Some(754.0) }),
        ]);

        assert_eq!(r.resolve_elevation(31.778, 35.235), Some(754.0));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Second lookup nearby comes from the cache.
        assert_eq!(r.resolve_elevation(31.78, 35.24), Some(754.0));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert_eq!(r.resolve_elevation(95.0, 0.0), None);
    }

    #[test]
    fn test_slow_geocoder_does_not_block_cache_hits() {
        let dir = TempDir::new().unwrap();
        let cached_at = Coordinate::new(31.778, 35.235);
        {
            let mut cache = AddressCache::open(dir.path().join("addresses.jsonl"));
            cache.insert(cached_at, &mut web_address("Western Wall", 31.7767, 35.2345));
        }

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let gated = GatedGeocoder { entered: Mutex::new(entered_tx), release: Mutex::new(release_rx) };
        let r = Arc::new(resolver(&dir).with_geocoders(vec![Box::new(gated)]));

        // Haifa has no cached row, so this lookup parks inside the geocoder.
        let slow = {
            let r = r.clone();
            thread::spawn(move || r.resolve(32.794, 34.9896, None))
        };
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        {
            let r = r.clone();
            thread::spawn(move || {
                let _ = done_tx.send(r.resolve(cached_at.lat, cached_at.lon, None));
            });
        }
        let hit = done_rx.recv_timeout(Duration::from_secs(5));
        release_tx.send(()).unwrap();

        let hit = hit.unwrap().unwrap();
        assert_eq!(hit.source, LocationSource::Cache);
        assert_eq!(hit.formatted(), "Western Wall");

        let slow = slow.join().unwrap().unwrap();
        assert_eq!(slow.formatted(), "Slow Street");
        assert_eq!(r.cache().len(), 2);
    }
}

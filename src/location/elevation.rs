//! Elevation estimate from cached samples.
//!
//! One sample close enough to count as the same city is returned as-is.
//! Two or more samples are blended with weight `1 - d²/Σd²` (d = distance),
//! then divided by `n - 1`.

use super::cache::{AddressCache, ElevationSample};
use crate::geo::Coordinate;
use log::debug;

/// Samples further than this are ignored, metres.
pub const SAME_PLATEAU_M: f64 = 50_000.0;

/// A lone sample within this distance is taken verbatim, metres.
pub const SAME_CITY_M: f64 = 15_000.0;

/// Interpolates elevation from the cache.
pub struct ElevationEstimator<'a> {
    cache: &'a AddressCache,
    plateau_m: f64,
    city_m: f64,
}

impl<'a> ElevationEstimator<'a> {
    pub fn new(cache: &'a AddressCache) -> Self {
        Self { cache, plateau_m: SAME_PLATEAU_M, city_m: SAME_CITY_M }
    }

    pub fn with_radii(mut self, plateau_m: f64, city_m: f64) -> Self {
        self.plateau_m = plateau_m;
        self.city_m = city_m;
        self
    }

    pub fn estimate(&self, lat: f64, lon: f64) -> Option<f64> {
        let samples = self.cache.query_elevation_near(Coordinate::new(lat, lon), self.plateau_m);
        let estimate = estimate_from_samples(&samples, self.city_m);
        debug!("Elevation estimate at ({}, {}) from {} samples: {:?}", lat, lon, samples.len(), estimate);
        estimate
    }
}

/// The interpolation itself, independent of the store.
pub fn estimate_from_samples(samples: &[ElevationSample], city_m: f64) -> Option<f64> {
    match samples {
        [] => None,
        [only] if only.distance_m <= city_m => Some(only.elevation),
        [_] => None,
        _ => {
            let n = samples.len() as f64;
            let squared: Vec<f64> = samples.iter().map(|s| s.distance_m * s.distance_m).collect();
            let total: f64 = squared.iter().sum();

            if total == 0.0 {
                // Every sample sits on the query point.
                return Some(samples.iter().map(|s| s.elevation).sum::<f64>() / n);
            }

            let weighted: f64 = samples
                .iter()
                .zip(&squared)
                .map(|(s, d)| (1.0 - d / total) * s.elevation)
                .sum();
            Some(weighted / (n - 1.0))
        }
    }
}

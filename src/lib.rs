//! Polaris Atlas: reverse geocoding for Polaris.
//!
//! Given a coordinate, produce the best available place description (country,
//! city or full address) and an elevation estimate, preferring packaged tables
//! and the local cache over any network call.
//!
//! ```no_run
//! use polaris_atlas::config::AtlasConfig;
//! use polaris_atlas::location::AddressResolver;
//! use std::sync::Arc;
//!
//! let config = AtlasConfig::default();
//! let countries = Arc::new(config.country_index().unwrap());
//! let cities = Arc::new(config.city_index().unwrap());
//! let resolver = AddressResolver::from_config(&config, countries, cities);
//!
//! if let Some(address) = resolver.resolve(31.778, 35.235, Some("en")) {
//!     println!("{}", address.formatted());
//! }
//! ```

pub mod config;
pub mod geo;
pub mod location;
pub mod server;

//! Address resolution subsystem for Polaris Atlas.
//!
//! Turns a coordinate into the best available place description, consulting
//! local indexes and the address cache before any network geocoder, and
//! estimates elevation from cached samples.

pub mod cache;
pub mod elevation;
pub mod providers;
pub mod resolver;
pub mod types;

pub use cache::AddressCache;
pub use elevation::ElevationEstimator;
pub use providers::{ElevationProvider, GeocodeProvider, HttpSettings};
pub use resolver::{select_best, AddressResolver, ResolverSettings};
pub use types::{AddressSummary, LocationError, LocationSource, ResolvedAddress};

//! Address geocoding subsystem.
//!
//! Resolves raw Taiwanese addresses to WGS84 coordinates through a
//! persistent JSON cache and an external provider, with one retry on a
//! simplified address.

pub mod cache;
pub mod provider;
pub mod resolver;
pub mod types;

pub use cache::GeocodeCache;
pub use provider::{GeocodeProvider, GoogleGeocoder};
pub use resolver::GeocodeResolver;
pub use types::{CacheError, Coordinate, GeocodeError, Resolution};

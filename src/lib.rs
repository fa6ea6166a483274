//! Guardian Light: geospatial core for a Taipei night-safety map.
//!
//! Resolves Taiwanese addresses to coordinates through a persistent cache,
//! classifies convenience-store brands, measures great-circle distances,
//! reprojects TWD97 grid coordinates and aggregates point layers into heat
//! maps. The `server` module exposes all of it over HTTP.

pub mod brand;
pub mod config;
pub mod dataset;
pub mod distance;
pub mod geocode;
pub mod grid;
pub mod normalize;
pub mod server;
pub mod twd97;

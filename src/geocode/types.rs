//! Core types for the geocoding subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    /// Build a coordinate, rejecting non-finite or out-of-range values.
    pub fn checked(lat: f64, lng: f64) -> Option<Self> {
        let valid = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);
        valid.then_some(Self { lat, lng })
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.lat, self.lng)
    }
}

/// Outcome of resolving one address.
///
/// `ServiceUnavailable` means "try again later": no credential, or the
/// provider failed at the transport/service level on every attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    Resolved(Coordinate),
    NotFound,
    ServiceUnavailable,
}

impl Resolution {
    /// Fold both failure kinds into `None`.
    pub fn coordinate(self) -> Option<Coordinate> {
        match self {
            Self::Resolved(c) => Some(c),
            Self::NotFound | Self::ServiceUnavailable => None,
        }
    }

    pub fn status(self) -> &'static str {
        match self {
            Self::Resolved(_) => "resolved",
            Self::NotFound => "not_found",
            Self::ServiceUnavailable => "service_unavailable",
        }
    }
}

/// Provider-side failures. Never escape the resolver.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Geocoder returned status {0}")]
    Status(String),

    #[error("Invalid geocoder response: {0}")]
    InvalidResponse(String),
}

/// Cache persistence failures. Logged, never fatal.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

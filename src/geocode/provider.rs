//! Geocoding providers: the provider seam and the Google Geocoding client.

use super::types::{Coordinate, GeocodeError};
use serde::Deserialize;
use std::time::Duration;

pub const GOOGLE_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Something that can turn one address into a coordinate.
///
/// `Ok(None)` is an authoritative "no such address"; `Err` is a transport or
/// service failure.
pub trait GeocodeProvider: Send + Sync {
    fn lookup(&self, address: &str) -> Result<Option<Coordinate>, GeocodeError>;
}

// ─── Google Geocoding ───────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct GoogleResponse {
    status: String,
    #[serde(default)]
    results: Vec<GoogleResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GoogleResult {
    geometry: GoogleGeometry,
}

#[derive(Deserialize, Debug)]
struct GoogleGeometry {
    location: GoogleLocation,
}

#[derive(Deserialize, Debug)]
struct GoogleLocation {
    lat: f64,
    lng: f64,
}

/// Google Geocoding API restricted to Taiwan, answering in Traditional Chinese.
pub struct GoogleGeocoder {
    agent: ureq::Agent,
    api_key: String,
    endpoint: String,
}

impl GoogleGeocoder {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
        Self::with_endpoint(api_key, timeout, GOOGLE_GEOCODE_URL)
    }

    /// Point the client at a different base URL (proxies, tests).
    pub fn with_endpoint(api_key: impl Into<String>, timeout: Duration, endpoint: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("GuardianLight/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            api_key: api_key.into(),
            endpoint: endpoint.to_string(),
        }
    }
}

impl GeocodeProvider for GoogleGeocoder {
    fn lookup(&self, address: &str) -> Result<Option<Coordinate>, GeocodeError> {
        let response = self
            .agent
            .get(&self.endpoint)
            .query("address", address)
            .query("key", &self.api_key)
            .query("language", "zh-TW")
            .query("region", "tw")
            .query("components", "country:TW")
            .call()
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => GeocodeError::Status(format!("HTTP {}", code)),
                other => GeocodeError::Network(other.to_string()),
            })?;

        let body: GoogleResponse = response
            .into_json()
            .map_err(|e| GeocodeError::InvalidResponse(e.to_string()))?;

        parse_google(body)
    }
}

fn parse_google(body: GoogleResponse) -> Result<Option<Coordinate>, GeocodeError> {
    match body.status.as_str() {
        "OK" => {
            let Some(first) = body.results.first() else {
                return Ok(None);
            };
            let loc = &first.geometry.location;
            Coordinate::checked(loc.lat, loc.lng)
                .map(Some)
                .ok_or_else(|| {
                    GeocodeError::InvalidResponse(format!("coordinate out of range: {}, {}", loc.lat, loc.lng))
                })
        }
        "ZERO_RESULTS" => Ok(None),
        other => {
            let detail = match body.error_message {
                Some(msg) => format!("{} ({})", other, msg),
                None => other.to_string(),
            };
            Err(GeocodeError::Status(detail))
        }
    }
}

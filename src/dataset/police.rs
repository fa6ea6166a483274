//! Police stations from the Taipei open-data portal.
//!
//! The portal is fetched once at startup. A successful fetch is snapshotted
//! to `police.json` so the next start can still serve stations when the
//! portal is down.

use super::{strip_bom, write_atomic, DatasetError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PoliceStation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub poi_addr: Option<String>,
    #[serde(default)]
    pub display_addr: Option<String>,
}

impl PoliceStation {
    /// Street address, preferring `poi_addr` over `display_addr`.
    pub fn address(&self) -> Option<&str> {
        [self.poi_addr.as_deref(), self.display_addr.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|a| !a.is_empty())
    }
}

#[derive(Deserialize, Default)]
struct OpenDataEnvelope {
    #[serde(default)]
    result: OpenDataResult,
}

#[derive(Deserialize, Default)]
struct OpenDataResult {
    #[serde(default)]
    results: Vec<PoliceStation>,
}

/// Extract the station list from an open-data response body.
pub fn parse_police(body: &[u8]) -> Result<Vec<PoliceStation>, DatasetError> {
    let envelope: OpenDataEnvelope = serde_json::from_slice(strip_bom(body))?;
    Ok(envelope.result.results)
}

/// Fetch the current station list.
pub fn fetch_police(url: &str, timeout: Duration) -> Result<Vec<PoliceStation>, DatasetError> {
    let agent = ureq::AgentBuilder::new().timeout(timeout).build();
    let response = agent.get(url).call().map_err(|e| match e {
        ureq::Error::Status(code, _) => DatasetError::Http(format!("HTTP {} from {}", code, url)),
        other => DatasetError::Http(other.to_string()),
    })?;
    let body = response.into_string()?;
    parse_police(body.as_bytes())
}

/// Fetch stations, falling back to the last snapshot, then to nothing.
pub fn load_police(url: &str, timeout: Duration, snapshot: &Path) -> Vec<PoliceStation> {
    match fetch_police(url, timeout) {
        Ok(stations) => {
            info!(count = stations.len(), "loaded police stations from open data");
            match serde_json::to_vec_pretty(&stations) {
                Ok(json) => {
                    if let Err(e) = write_atomic(snapshot, &json) {
                        warn!(path = %snapshot.display(), error = %e, "failed to write police snapshot");
                    }
                }
                Err(e) => warn!(error = %e, "failed to serialize police snapshot"),
            }
            stations
        }
        Err(e) => {
            warn!(error = %e, "police open data unavailable, trying local snapshot");
            match read_snapshot(snapshot) {
                Ok(stations) => {
                    info!(count = stations.len(), path = %snapshot.display(), "loaded police snapshot");
                    stations
                }
                Err(e) => {
                    warn!(path = %snapshot.display(), error = %e, "no usable police snapshot, serving no stations");
                    Vec::new()
                }
            }
        }
    }
}

fn read_snapshot(path: &Path) -> Result<Vec<PoliceStation>, DatasetError> {
    let raw = fs::read(path)?;
    Ok(serde_json::from_slice(strip_bom(&raw))?)
}

//! Heat-map point layers (traffic accidents, street lights).
//!
//! Layer files come from different open-data exports, so coordinate columns
//! are found by header name. WGS84 columns win over TWD97 ones when a file
//! has both.

use super::{strip_bom, DatasetError};
use crate::geocode::Coordinate;
use crate::grid::WeightedPoint;
use crate::normalize::normalize;
use crate::twd97::twd97_to_wgs84;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

const LAT_HEADERS: &[&str] = &["lat", "latitude", "緯度"];
const LNG_HEADERS: &[&str] = &["lng", "lon", "longitude", "經度"];
const X_HEADERS: &[&str] = &["x", "twd97x", "座標x", "坐標x"];
const Y_HEADERS: &[&str] = &["y", "twd97y", "座標y", "坐標y"];
const WEIGHT_HEADERS: &[&str] = &["weight", "權重"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HeatLayer {
    Accidents,
    Streetlights,
}

impl HeatLayer {
    pub const ALL: [HeatLayer; 2] = [HeatLayer::Accidents, HeatLayer::Streetlights];

    pub fn name(self) -> &'static str {
        match self {
            Self::Accidents => "accidents",
            Self::Streetlights => "streetlights",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Accidents => "accidents.csv",
            Self::Streetlights => "streetlights.csv",
        }
    }
}

impl fmt::Display for HeatLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for HeatLayer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accidents" | "accident" => Ok(Self::Accidents),
            "streetlights" | "streetlight" | "lights" => Ok(Self::Streetlights),
            other => Err(format!("Unknown heat-map layer '{}' (expected accidents or streetlights)", other)),
        }
    }
}

enum Columns {
    Wgs84 { lat: usize, lng: usize },
    Twd97 { x: usize, y: usize },
}

fn find_column(headers: &[String], names: &[&str]) -> Option<usize> {
    headers.iter().position(|h| names.contains(&h.as_str()))
}

fn parse_field(record: &csv::StringRecord, idx: usize) -> Option<f64> {
    record.get(idx)?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a layer from CSV. `source` names the input in errors.
pub fn read_points<R: Read>(reader: R, source: &str) -> Result<Vec<WeightedPoint>, DatasetError> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = rdr.headers()?.iter().map(normalize).collect();

    let columns = match (
        find_column(&headers, LAT_HEADERS),
        find_column(&headers, LNG_HEADERS),
        find_column(&headers, X_HEADERS),
        find_column(&headers, Y_HEADERS),
    ) {
        (Some(lat), Some(lng), _, _) => Columns::Wgs84 { lat, lng },
        (_, _, Some(x), Some(y)) => Columns::Twd97 { x, y },
        _ => return Err(DatasetError::MissingColumns { path: source.to_string() }),
    };
    let weight_col = find_column(&headers, WEIGHT_HEADERS);

    let mut points = Vec::new();
    let mut skipped = 0usize;

    for result in rdr.records() {
        let Ok(record) = result else {
            skipped += 1;
            continue;
        };

        let coordinate = match columns {
            Columns::Wgs84 { lat, lng } => match (parse_field(&record, lat), parse_field(&record, lng)) {
                (Some(lat), Some(lng)) => Coordinate::checked(lat, lng),
                _ => None,
            },
            Columns::Twd97 { x, y } => match (parse_field(&record, x), parse_field(&record, y)) {
                (Some(x), Some(y)) => {
                    let c = twd97_to_wgs84(x, y);
                    Coordinate::checked(c.lat, c.lng)
                }
                _ => None,
            },
        };

        // An empty weight cell means the default weight.
        let weight = match weight_col.and_then(|i| record.get(i)).map(str::trim) {
            None | Some("") => Some(1.0),
            Some(raw) => raw.parse::<f64>().ok().filter(|w| w.is_finite() && *w >= 0.0),
        };

        match (coordinate, weight) {
            (Some(c), Some(w)) => points.push(WeightedPoint::with_weight(c.lat, c.lng, w)),
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(source, skipped, "skipped heat-map rows without usable coordinates");
    }
    Ok(points)
}

/// Load a layer file. A missing file is an empty layer.
pub fn load_points(path: &Path) -> Result<Vec<WeightedPoint>, DatasetError> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "heat-map layer not present, using an empty layer");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };
    let points = read_points(strip_bom(&raw), &path.display().to_string())?;
    info!(path = %path.display(), points = points.len(), "loaded heat-map layer");
    Ok(points)
}

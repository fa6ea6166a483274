//! Metric grid aggregation for heat maps.
//!
//! Points are binned into cells of roughly `cell_size_m` on a side. The
//! longitude step is widened by `1 / cos(lat)` at each point's own latitude so
//! cells stay about square on the ground. Cell weights are normalized to the
//! densest cell.

use crate::geocode::Coordinate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

/// Meters per degree of latitude (and of longitude at the equator).
const METERS_PER_DEGREE: f64 = 111_320.0;

/// One input point with its base weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedPoint {
    pub lat: f64,
    pub lng: f64,
    pub weight: f64,
}

impl WeightedPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng, weight: 1.0 }
    }

    pub fn with_weight(lat: f64, lng: f64, weight: f64) -> Self {
        Self { lat, lng, weight }
    }
}

impl From<Coordinate> for WeightedPoint {
    fn from(c: Coordinate) -> Self {
        Self::new(c.lat, c.lng)
    }
}

/// One output cell: a representative position and its relative density.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeatCell {
    pub lat: f64,
    pub lng: f64,
    /// In `[0, 1]` relative to the heaviest cell.
    pub weight: f64,
}

#[derive(Debug, Clone, Copy)]
struct CellAccumulator {
    weight: f64,
    /// Last point binned here. Not a true centroid.
    lat: f64,
    lng: f64,
}

/// Integer grid index `(ix, iy)` for a point, or `None` when it cannot be binned.
pub fn cell_index(lat: f64, lng: f64, cell_size_m: f64) -> Option<(i64, i64)> {
    let lat_step = cell_size_m / METERS_PER_DEGREE;
    let lng_step = cell_size_m / (METERS_PER_DEGREE * lat.to_radians().cos());

    let ix = (lng / lng_step).round();
    let iy = (lat / lat_step).round();
    if !ix.is_finite() || !iy.is_finite() {
        return None;
    }
    Some((ix as i64, iy as i64))
}

/// Aggregate points into grid cells of `cell_size_m` meters.
///
/// Output is ordered by cell index, so it is stable for a given input; the
/// representative position of a cell depends on input order.
pub fn aggregate(points: &[WeightedPoint], cell_size_m: f64) -> Vec<HeatCell> {
    if !cell_size_m.is_finite() || cell_size_m <= 0.0 {
        warn!(cell_size_m, "invalid heat-map cell size, returning no cells");
        return Vec::new();
    }

    let mut cells: BTreeMap<(i64, i64), CellAccumulator> = BTreeMap::new();
    let mut skipped = 0usize;

    for p in points {
        if !p.lat.is_finite() || !p.lng.is_finite() || !p.weight.is_finite() || p.weight < 0.0 {
            skipped += 1;
            continue;
        }
        let Some(key) = cell_index(p.lat, p.lng, cell_size_m) else {
            skipped += 1;
            continue;
        };
        let cell = cells.entry(key).or_insert(CellAccumulator {
            weight: 0.0,
            lat: p.lat,
            lng: p.lng,
        });
        cell.weight += p.weight;
        cell.lat = p.lat;
        cell.lng = p.lng;
    }

    if skipped > 0 {
        warn!(skipped, "skipped heat-map points with invalid coordinates or weights");
    }

    let max = cells.values().map(|c| c.weight).fold(0.0_f64, f64::max);
    let norm = if max > 0.0 { max } else { 1.0 };

    cells
        .into_values()
        .map(|c| HeatCell {
            lat: c.lat,
            lng: c.lng,
            weight: c.weight / norm,
        })
        .collect()
}

//! TWD97 TM2 <-> WGS84 conversion.
//!
//! Taiwanese government open data publishes planar coordinates on the TWD97
//! TM2 grid: transverse Mercator on GRS80, central meridian 121°E, scale
//! factor 0.9999, false easting 250 000 m. Accuracy of the series used here
//! is well below a centimeter inside Taiwan. Inputs are not range-checked.

use crate::geocode::Coordinate;

/// GRS80 semi-major axis (m).
const A: f64 = 6378137.0;
/// GRS80 semi-minor axis (m).
const B: f64 = 6356752.314245;
const CENTRAL_MERIDIAN_DEG: f64 = 121.0;
const SCALE: f64 = 0.9999;
const FALSE_EASTING: f64 = 250000.0;
const FALSE_NORTHING: f64 = 0.0;

/// First eccentricity squared.
fn e2() -> f64 {
    1.0 - (B * B) / (A * A)
}

/// Convert a TWD97 TM2 `(x, y)` pair (meters) to WGS84.
pub fn twd97_to_wgs84(x: f64, y: f64) -> Coordinate {
    let (lat, lng) = inverse(x, y);
    Coordinate { lat, lng }
}

/// Convert WGS84 degrees to a TWD97 TM2 `(x, y)` pair in meters.
pub fn wgs84_to_twd97(lat: f64, lng: f64) -> (f64, f64) {
    let e2 = e2();
    let ep2 = e2 / (1.0 - e2);
    let phi = lat.to_radians();
    let lam = lng.to_radians();
    let lam0 = CENTRAL_MERIDIAN_DEG.to_radians();

    let (sin_phi, cos_phi) = phi.sin_cos();
    let n = A / (1.0 - e2 * sin_phi * sin_phi).sqrt();
    let t = phi.tan().powi(2);
    let c = ep2 * cos_phi * cos_phi;
    let a = (lam - lam0) * cos_phi;

    let m = A
        * ((1.0 - e2 / 4.0 - 3.0 * e2.powi(2) / 64.0 - 5.0 * e2.powi(3) / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e2.powi(2) / 32.0 + 45.0 * e2.powi(3) / 1024.0)
                * (2.0 * phi).sin()
            + (15.0 * e2.powi(2) / 256.0 + 45.0 * e2.powi(3) / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e2.powi(3) / 3072.0) * (6.0 * phi).sin());

    let x = FALSE_EASTING
        + SCALE
            * n
            * (a + (1.0 - t + c) * a.powi(3) / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0);

    let y = FALSE_NORTHING
        + SCALE
            * (m + n
                * phi.tan()
                * (a * a / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));

    (x, y)
}

/// Inverse Gauss-Krüger: footprint latitude, then the correction series.
fn inverse(x: f64, y: f64) -> (f64, f64) {
    let e2 = e2();
    let e = e2.sqrt();
    let x = x - FALSE_EASTING;
    let y = y - FALSE_NORTHING;

    // Meridian distance -> rectifying latitude
    let m = y / SCALE;
    let mu = m / (A * (1.0 - e2 / 4.0 - 3.0 * e.powi(4) / 64.0 - 5.0 * e.powi(6) / 256.0));

    // Footprint latitude, four-term series
    let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());
    let j1 = 3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0;
    let j2 = 21.0 * e1.powi(2) / 16.0 - 55.0 * e1.powi(4) / 32.0;
    let j3 = 151.0 * e1.powi(3) / 96.0;
    let j4 = 1097.0 * e1.powi(4) / 512.0;
    let fp = mu
        + j1 * (2.0 * mu).sin()
        + j2 * (4.0 * mu).sin()
        + j3 * (6.0 * mu).sin()
        + j4 * (8.0 * mu).sin();

    let ep2 = (e * A / B).powi(2);
    let (sin_fp, cos_fp) = fp.sin_cos();
    let c1 = ep2 * cos_fp * cos_fp;
    let t1 = fp.tan().powi(2);
    let r1 = A * (1.0 - e2) / (1.0 - e2 * sin_fp * sin_fp).powf(1.5);
    let n1 = A / (1.0 - e2 * sin_fp * sin_fp).sqrt();
    let d = x / (n1 * SCALE);

    let q1 = n1 * fp.tan() / r1;
    let q2 = d * d / 2.0;
    let q3 = (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0;
    let q4 = (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 3.0 * c1 * c1 - 252.0 * ep2)
        * d.powi(6)
        / 720.0;
    let lat = fp - q1 * (q2 - q3 + q4);

    let q5 = d;
    let q6 = (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0;
    let q7 = (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1)
        * d.powi(5)
        / 120.0;
    let lng = CENTRAL_MERIDIAN_DEG.to_radians() + (q5 - q6 + q7) / cos_fp;

    (lat.to_degrees(), lng.to_degrees())
}

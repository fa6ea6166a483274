//! Great-circle distance on a spherical Earth (haversine).
//!
//! Invalid input never errors: it comes back as `f64::INFINITY`, so callers
//! can drop bad rows with a plain `d <= radius` comparison.

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometers between two WGS84 points.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let d = EARTH_RADIUS_KM * 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    if d.is_finite() {
        d
    } else {
        f64::INFINITY
    }
}

/// Distance between two points given as text, e.g. straight from query
/// parameters or CSV cells. Any unparseable field yields infinity.
pub fn distance_km(lat1: &str, lng1: &str, lat2: &str, lng2: &str) -> f64 {
    let parsed = [lat1, lng1, lat2, lng2].map(|s| s.trim().parse::<f64>().ok());
    match parsed {
        [Some(a), Some(b), Some(c), Some(d)] => haversine_km(a, b, c, d),
        _ => f64::INFINITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_point_is_zero() {
        assert_eq!(haversine_km(25.0330, 121.5654, 25.0330, 121.5654), 0.0);
        assert_eq!(haversine_km(-89.0, -179.0, -89.0, -179.0), 0.0);
    }

    #[test]
    fn test_symmetric() {
        let ab = haversine_km(25.0478, 121.5170, 22.6273, 120.3014);
        let ba = haversine_km(22.6273, 120.3014, 25.0478, 121.5170);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn test_one_degree_latitude() {
        let d = haversine_km(24.0, 121.0, 25.0, 121.0);
        assert!((d - 111.0).abs() / 111.0 < 0.01, "got {}", d);
    }

    #[test]
    fn test_taipei_to_kaohsiung() {
        // Taipei Main Station to Kaohsiung Main Station, roughly 297 km.
        let d = haversine_km(25.0478, 121.5170, 22.6394, 120.3025);
        assert!(d > 290.0 && d < 305.0, "got {}", d);
    }

    #[test]
    fn test_text_input() {
        let d = distance_km("25.0", "121.0", " 26.0 ", "121.0");
        assert!((d - 111.19).abs() < 0.1);
    }

    #[test]
    fn test_text_parse_failure_is_infinite() {
        assert_eq!(distance_km("abc", "121.0", "25.0", "121.0"), f64::INFINITY);
        assert_eq!(distance_km("", "", "", ""), f64::INFINITY);
    }

    #[test]
    fn test_non_finite_is_infinite() {
        assert_eq!(haversine_km(f64::NAN, 121.0, 25.0, 121.0), f64::INFINITY);
        assert_eq!(distance_km("NaN", "121", "25", "121"), f64::INFINITY);
    }
}

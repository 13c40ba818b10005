//! Great-circle distance helpers for paths without provider distances.
//!
//! Straight-line estimates ignore roads, so they are only used when the
//! upstream response carries no distance or time of its own.

use crate::geo_key::Coordinate;

/// Assumed average driving speed for time estimation.
pub const DEFAULT_SPEED_KMH: f64 = 50.0;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two points in kilometers.
pub fn haversine_km(from: Coordinate, to: Coordinate) -> f64 {
    let lat1_rad = from.latitude.to_radians();
    let lat2_rad = to.latitude.to_radians();
    let delta_lat = (to.latitude - from.latitude).to_radians();
    let delta_lng = (to.longitude - from.longitude).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Sum of haversine distances over consecutive points. Zero for fewer than two.
pub fn path_length_km(points: &[Coordinate]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_km(pair[0], pair[1]))
        .sum()
}

/// Travel minutes for `km` at `speed_kmh`, rounded to the nearest minute.
pub fn estimate_minutes(km: f64, speed_kmh: f64) -> f64 {
    if speed_kmh <= 0.0 || !km.is_finite() {
        return 0.0;
    }
    (km / speed_kmh * 60.0).round()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lon: f64, lat: f64) -> Coordinate {
        Coordinate::new(lon, lat)
    }

    #[test]
    fn test_haversine_same_point() {
        let dist = haversine_km(c(-115.1, 36.1), c(-115.1, 36.1));
        assert!(dist < 0.001, "Same point should have ~0 distance");
    }

    #[test]
    fn test_haversine_known_distance() {
        // Las Vegas to Los Angeles is ~370 km
        let dist = haversine_km(c(-115.14, 36.17), c(-118.24, 34.05));
        assert!(dist > 350.0 && dist < 400.0, "LV to LA should be ~370km, got {}", dist);
    }

    #[test]
    fn test_haversine_symmetric() {
        let a = c(116.397, 39.909);
        let b = c(121.473, 31.230);
        assert!((haversine_km(a, b) - haversine_km(b, a)).abs() < 1e-9);
    }

    #[test]
    fn test_path_length_sums_legs() {
        let points = [c(0.0, 0.0), c(1.0, 0.0), c(2.0, 0.0)];
        let one_leg = haversine_km(points[0], points[1]);
        assert!((path_length_km(&points) - 2.0 * one_leg).abs() < 1e-9);
    }

    #[test]
    fn test_path_length_short_paths() {
        assert_eq!(path_length_km(&[]), 0.0);
        assert_eq!(path_length_km(&[c(1.0, 1.0)]), 0.0);
    }

    #[test]
    fn test_estimate_minutes() {
        // 25 km at 50 km/h = 30 minutes
        assert_eq!(estimate_minutes(25.0, DEFAULT_SPEED_KMH), 30.0);
        assert_eq!(estimate_minutes(0.4, DEFAULT_SPEED_KMH), 0.0);
        assert_eq!(estimate_minutes(10.0, 0.0), 0.0);
    }
}

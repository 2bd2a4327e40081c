// Flat-earth projection between the sim ground plane and map coordinates

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Meters per degree of latitude (good enough at dashboard scale)
pub const METERS_PER_DEG_LAT: f64 = 111_111.0;

/// GPS fix indicator shown on the map widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GpsStatus {
    Search,
    Live,
    Err,
}

/// Maps ground-plane positions to (lat, lon) around an anchor point.
///
/// The anchor starts at the configured default and may be replaced once by
/// a real GPS fix. A failed fix leaves the default in place; the status
/// only tells the map widget what to display.
#[derive(Debug, Clone)]
pub struct GeoProjector {
    base_lat: f64,
    base_lon: f64,
    status: GpsStatus,
}

impl GeoProjector {
    pub fn new(base_lat: f64, base_lon: f64) -> Self {
        Self {
            base_lat,
            base_lon,
            status: GpsStatus::Search,
        }
    }

    /// Adopt a real GPS fix as the new anchor.
    pub fn set_fix(&mut self, lat: f64, lon: f64) {
        self.base_lat = lat;
        self.base_lon = lon;
        self.status = GpsStatus::Live;
    }

    /// Record that fix acquisition failed. The default anchor stays.
    pub fn mark_unavailable(&mut self) {
        self.status = GpsStatus::Err;
    }

    pub fn status(&self) -> GpsStatus {
        self.status
    }

    pub fn anchor(&self) -> (f64, f64) {
        (self.base_lat, self.base_lon)
    }

    /// Project a ground-plane position (x, z) to (lat, lon).
    pub fn project(&self, position: &Vector2<f64>) -> (f64, f64) {
        let lat_offset = position.y / METERS_PER_DEG_LAT;
        let lon_offset =
            position.x / (METERS_PER_DEG_LAT * self.base_lat.to_radians().cos());
        (self.base_lat + lat_offset, self.base_lon + lon_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_projects_to_itself() {
        let geo = GeoProjector::new(37.7749, -122.4194);
        let (lat, lon) = geo.project(&Vector2::zeros());
        assert!((lat - 37.7749).abs() < 1e-12);
        assert!((lon + 122.4194).abs() < 1e-12);
    }

    #[test]
    fn test_projection_offsets() {
        let base_lat: f64 = 37.7749;
        let geo = GeoProjector::new(base_lat, -122.4194);
        let (lat, lon) = geo.project(&Vector2::new(100.0, 200.0));
        assert!((lat - (base_lat + 200.0 / METERS_PER_DEG_LAT)).abs() < 1e-12);
        let expected_lon =
            -122.4194 + 100.0 / (METERS_PER_DEG_LAT * base_lat.to_radians().cos());
        assert!((lon - expected_lon).abs() < 1e-12);
    }

    #[test]
    fn test_fix_lifecycle() {
        let mut geo = GeoProjector::new(37.7749, -122.4194);
        assert_eq!(geo.status(), GpsStatus::Search);

        geo.mark_unavailable();
        assert_eq!(geo.status(), GpsStatus::Err);
        assert_eq!(geo.anchor(), (37.7749, -122.4194));

        geo.set_fix(51.5074, -0.1278);
        assert_eq!(geo.status(), GpsStatus::Live);
        assert_eq!(geo.anchor(), (51.5074, -0.1278));
    }
}

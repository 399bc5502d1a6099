use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }

    /// Great-circle distance to `other` via the haversine formula.
    pub fn haversine_km(&self, other: &Coordinate) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lng = (other.lng - self.lng).to_radians();

        let a = (d_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_KM * c
    }

    /// Position at `fraction` of the straight line from `self` to `other`.
    ///
    /// Linear in lat/lng, which is accurate enough at city scale. The
    /// fraction is clamped to [0, 1].
    pub fn interpolate(&self, other: &Coordinate, fraction: f64) -> Coordinate {
        let f = fraction.clamp(0.0, 1.0);
        Coordinate {
            lat: self.lat + (other.lat - self.lat) * f,
            lng: self.lng + (other.lng - self.lng) * f,
        }
    }
}

/// A coordinate with an optional human-readable address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Location {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            address: None,
        }
    }

    pub fn with_address(lat: f64, lng: f64, address: impl Into<String>) -> Self {
        Self {
            lat,
            lng,
            address: Some(address.into()),
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            lat: self.lat,
            lng: self.lng,
        }
    }
}

impl From<Coordinate> for Location {
    fn from(c: Coordinate) -> Self {
        Location::new(c.lat, c.lng)
    }
}

/// Route geometry as returned by a route provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub distance_km: f64,
    pub duration_secs: u64,
    pub polyline: Vec<Coordinate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_known_distance() {
        // SF downtown to SF pier, roughly 3.9 km
        let a = Coordinate::new(37.7749, -122.4194);
        let b = Coordinate::new(37.8049, -122.3994);
        let d = a.haversine_km(&b);
        assert!((3.0..5.0).contains(&d), "unexpected distance: {d}");
    }

    #[test]
    fn haversine_zero_for_same_point() {
        let a = Coordinate::new(37.7749, -122.4194);
        assert!(a.haversine_km(&a) < 1e-9);
    }

    #[test]
    fn interpolation_endpoints_and_midpoint() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(10.0, 20.0);
        assert_eq!(a.interpolate(&b, 0.0), a);
        assert_eq!(a.interpolate(&b, 1.0), b);
        let mid = a.interpolate(&b, 0.5);
        assert!((mid.lat - 5.0).abs() < 1e-9);
        assert!((mid.lng - 10.0).abs() < 1e-9);
    }

    #[test]
    fn interpolation_stays_on_segment() {
        let a = Coordinate::new(37.0, -122.0);
        let b = Coordinate::new(38.0, -121.0);
        for i in 0..=10 {
            let f = i as f64 / 10.0;
            let p = a.interpolate(&b, f);
            // the segment has slope 1 in this frame
            let expected_lng = -122.0 + (p.lat - 37.0);
            assert!((p.lng - expected_lng).abs() < 1e-9);
        }
    }

    #[test]
    fn interpolation_clamps_fraction() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(1.0, 1.0);
        assert_eq!(a.interpolate(&b, -0.5), a);
        assert_eq!(a.interpolate(&b, 1.5), b);
    }

    #[test]
    fn coordinate_validation() {
        assert!(Coordinate::new(37.0, -122.0).is_valid());
        assert!(!Coordinate::new(91.0, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, -181.0).is_valid());
    }
}

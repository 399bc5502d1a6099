//! Driver selection. Strategies are pure: they look at a snapshot of the
//! available pool and pick, they never touch the pool itself.

use tracing::debug;

use ridehail_domain::Coordinate;

/// What a strategy sees of one available driver.
#[derive(Debug, Clone)]
pub struct DriverSnapshot {
    pub id: String,
    pub location: Coordinate,
    pub rating: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub driver_id: String,
    pub distance_km: f64,
    pub eta_secs: u64,
}

pub trait MatchingStrategy: Send + Sync {
    fn select_driver(
        &self,
        pickup: Coordinate,
        available: &[DriverSnapshot],
    ) -> Option<MatchOutcome>;

    fn name(&self) -> &str;
}

/// Nearest available driver by great-circle distance. Ties go to pool
/// iteration order; rating and profile are ignored entirely.
pub struct NearestDriverStrategy {
    average_speed_kmh: f64,
}

impl NearestDriverStrategy {
    pub fn new(average_speed_kmh: f64) -> Self {
        Self { average_speed_kmh }
    }
}

impl MatchingStrategy for NearestDriverStrategy {
    fn select_driver(
        &self,
        pickup: Coordinate,
        available: &[DriverSnapshot],
    ) -> Option<MatchOutcome> {
        if available.is_empty() {
            debug!("no available drivers to match");
            return None;
        }

        let mut best: Option<(&DriverSnapshot, f64)> = None;
        for candidate in available {
            let distance = pickup.haversine_km(&candidate.location);
            // strictly-less keeps the first driver on a tie
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((candidate, distance));
            }
        }

        best.map(|(driver, distance_km)| {
            let eta_secs = (distance_km / self.average_speed_kmh * 3600.0).round() as u64;
            debug!(
                driver_id = %driver.id,
                distance_km,
                eta_secs,
                "nearest driver selected"
            );
            MatchOutcome {
                driver_id: driver.id.clone(),
                distance_km,
                eta_secs,
            }
        })
    }

    fn name(&self) -> &str {
        "NearestDriver"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(id: &str, lat: f64, lng: f64, rating: f64) -> DriverSnapshot {
        DriverSnapshot {
            id: id.to_string(),
            location: Coordinate::new(lat, lng),
            rating,
        }
    }

    #[test]
    fn picks_minimum_haversine_distance() {
        let pickup = Coordinate::new(37.7749, -122.4194);
        let drivers = vec![
            snapshot("far", 37.9, -122.5, 5.0),
            snapshot("near", 37.7755, -122.4190, 3.1),
            snapshot("mid", 37.80, -122.43, 4.9),
        ];
        let outcome = NearestDriverStrategy::new(30.0)
            .select_driver(pickup, &drivers)
            .unwrap();
        assert_eq!(outcome.driver_id, "near");
    }

    #[test]
    fn rating_is_ignored() {
        let pickup = Coordinate::new(37.7749, -122.4194);
        // the closest driver has the worst rating
        let drivers = vec![
            snapshot("five-star", 37.85, -122.48, 5.0),
            snapshot("one-star", 37.7750, -122.4195, 1.0),
        ];
        let outcome = NearestDriverStrategy::new(30.0)
            .select_driver(pickup, &drivers)
            .unwrap();
        assert_eq!(outcome.driver_id, "one-star");
    }

    #[test]
    fn tie_goes_to_first_in_iteration_order() {
        let pickup = Coordinate::new(37.7749, -122.4194);
        let drivers = vec![
            snapshot("first", 37.7849, -122.4194, 4.0),
            snapshot("second", 37.7849, -122.4194, 4.0),
        ];
        let outcome = NearestDriverStrategy::new(30.0)
            .select_driver(pickup, &drivers)
            .unwrap();
        assert_eq!(outcome.driver_id, "first");
    }

    #[test]
    fn empty_pool_matches_nothing() {
        let pickup = Coordinate::new(37.7749, -122.4194);
        assert!(NearestDriverStrategy::new(30.0)
            .select_driver(pickup, &[])
            .is_none());
    }

    #[test]
    fn eta_is_distance_over_average_speed() {
        let pickup = Coordinate::new(37.7749, -122.4194);
        let drivers = vec![snapshot("only", 37.8049, -122.3994, 4.5)];
        let outcome = NearestDriverStrategy::new(30.0)
            .select_driver(pickup, &drivers)
            .unwrap();
        let expected = (outcome.distance_km / 30.0 * 3600.0).round() as u64;
        assert_eq!(outcome.eta_secs, expected);
    }
}

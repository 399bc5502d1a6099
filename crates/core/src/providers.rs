//! In-process implementations of the collaborator traits, good enough for
//! the simulation binary and for tests.

use async_trait::async_trait;
use tokio::sync::Mutex;

use ridehail_domain::{Coordinate, RideHailError, RideHailResult, RideSummary, RouteSummary};

use crate::traits::{Geocoder, RideHistorySink, RouteProvider};

/// Straight-line routing at a fixed average speed.
pub struct StraightLineRouteProvider {
    average_speed_kmh: f64,
}

impl StraightLineRouteProvider {
    pub fn new(average_speed_kmh: f64) -> Self {
        Self { average_speed_kmh }
    }
}

#[async_trait]
impl RouteProvider for StraightLineRouteProvider {
    async fn route(&self, from: Coordinate, to: Coordinate) -> RideHailResult<RouteSummary> {
        if !from.is_valid() || !to.is_valid() {
            return Err(RideHailError::route_calculation_failed(
                "route endpoints out of range",
            ));
        }
        let distance_km = from.haversine_km(&to);
        let duration_secs = (distance_km / self.average_speed_kmh * 3600.0).round() as u64;
        Ok(RouteSummary {
            distance_km,
            duration_secs,
            polyline: vec![from, to],
        })
    }
}

/// Geocoder that answers every lookup from a fixed city center, offset by a
/// hash of the address so distinct inputs land on distinct points.
pub struct FixedCityGeocoder {
    center: Coordinate,
}

impl FixedCityGeocoder {
    pub fn new(center: Coordinate) -> Self {
        Self { center }
    }

    fn offset_for(&self, address: &str) -> Coordinate {
        let mut hash: u64 = 5381;
        for byte in address.bytes() {
            hash = hash.wrapping_mul(33).wrapping_add(byte as u64);
        }
        // spread lookups over roughly a city-sized box
        let lat = self.center.lat + ((hash % 1000) as f64 / 1000.0 - 0.5) * 0.05;
        let lng = self.center.lng + (((hash / 1000) % 1000) as f64 / 1000.0 - 0.5) * 0.05;
        Coordinate::new(lat, lng)
    }
}

#[async_trait]
impl Geocoder for FixedCityGeocoder {
    async fn geocode(&self, address: &str) -> RideHailResult<(Coordinate, String)> {
        if address.trim().is_empty() {
            return Err(RideHailError::geocoding_failed("empty address"));
        }
        Ok((self.offset_for(address), address.trim().to_string()))
    }

    async fn reverse_geocode(&self, coordinate: Coordinate) -> RideHailResult<String> {
        if !coordinate.is_valid() {
            return Err(RideHailError::geocoding_failed("coordinate out of range"));
        }
        Ok(format!("{:.4}, {:.4}", coordinate.lat, coordinate.lng))
    }
}

/// Ride history kept in memory for the lifetime of the process.
#[derive(Default)]
pub struct InMemoryHistorySink {
    entries: Mutex<Vec<RideSummary>>,
}

impl InMemoryHistorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<RideSummary> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl RideHistorySink for InMemoryHistorySink {
    async fn append(&self, summary: RideSummary) -> RideHailResult<()> {
        self.entries.lock().await.push(summary);
        Ok(())
    }
}

//! Seams for the external collaborators the core does not depend on for
//! correctness: geocoding, route geometry, and completed-ride history.

use async_trait::async_trait;

use ridehail_domain::{Coordinate, RideHailResult, RideSummary, RouteSummary};

/// Forward and reverse geocoding.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve an address to a coordinate and a formatted address string.
    async fn geocode(&self, address: &str) -> RideHailResult<(Coordinate, String)>;

    async fn reverse_geocode(&self, coordinate: Coordinate) -> RideHailResult<String>;
}

/// Route geometry between two points.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    async fn route(&self, from: Coordinate, to: Coordinate) -> RideHailResult<RouteSummary>;
}

/// Persistence sink for completed rides. Display-only; losing entries never
/// affects an active ride.
#[async_trait]
pub trait RideHistorySink: Send + Sync {
    async fn append(&self, summary: RideSummary) -> RideHailResult<()>;
}

use serde::Serialize;

use ridehail_domain::{Coordinate, Ride, RideStatus};

/// Driver position snapshot pushed at the movement simulator's tick rate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverPositionUpdate {
    pub ride_id: String,
    pub driver: DriverPositionInfo,
    pub status: RideStatus,
    pub distance_remaining: f64,
    pub progress: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverPositionInfo {
    pub id: String,
    pub location: Coordinate,
}

/// Events published on the dispatcher's broadcast hub, in the exact shape
/// pushed over the streaming channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum RideEvent {
    RideUpdate(Ride),
    DriverPosition(DriverPositionUpdate),
}

impl RideEvent {
    /// The ride this event belongs to, for per-subscription filtering.
    pub fn ride_id(&self) -> &str {
        match self {
            RideEvent::RideUpdate(ride) => &ride.ride_id,
            RideEvent::DriverPosition(update) => &update.ride_id,
        }
    }
}

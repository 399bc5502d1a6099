use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::geo::Location;
use crate::models::driver::DriverInfo;

/// Server-side ride status as exchanged over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RideStatus {
    Searching,
    Assigned,
    EnRoute,
    Arriving,
    InProgress,
    ApproachingDestination,
    Completed,
    Cancelled,
}

impl RideStatus {
    /// A ride in a terminal status accepts no further updates.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RideStatus::Searching => "searching",
            RideStatus::Assigned => "assigned",
            RideStatus::EnRoute => "enRoute",
            RideStatus::Arriving => "arriving",
            RideStatus::InProgress => "inProgress",
            RideStatus::ApproachingDestination => "approachingDestination",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown ride status: {0}")]
pub struct RideStatusParseError(pub String);

impl FromStr for RideStatus {
    type Err = RideStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match s {
            "searching" => RideStatus::Searching,
            "assigned" => RideStatus::Assigned,
            "enRoute" => RideStatus::EnRoute,
            "arriving" => RideStatus::Arriving,
            "inProgress" => RideStatus::InProgress,
            "approachingDestination" => RideStatus::ApproachingDestination,
            "completed" => RideStatus::Completed,
            "cancelled" => RideStatus::Cancelled,
            other => return Err(RideStatusParseError(other.to_string())),
        };
        Ok(status)
    }
}

/// Why a ride ended up `cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    RiderRequested,
    NoDriversAvailable,
}

/// The dispatcher-owned ride record. Mutated only by the dispatcher;
/// clients always receive cloned snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ride {
    pub ride_id: String,
    pub pickup: Location,
    pub destination: Location,
    pub status: RideStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<DriverInfo>,
    /// Seconds until the driver reaches the current leg's target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_arrival: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<CancelReason>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ride {
    pub fn new(pickup: Location, destination: Location) -> Self {
        let now = Utc::now();
        Self {
            ride_id: uuid::Uuid::new_v4().to_string(),
            pickup,
            destination,
            status: RideStatus::Searching,
            driver: None,
            estimated_arrival: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_display() {
        let all = [
            RideStatus::Searching,
            RideStatus::Assigned,
            RideStatus::EnRoute,
            RideStatus::Arriving,
            RideStatus::InProgress,
            RideStatus::ApproachingDestination,
            RideStatus::Completed,
            RideStatus::Cancelled,
        ];
        for status in all {
            let parsed: RideStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn unknown_status_fails_to_parse() {
        assert!("teleporting".parse::<RideStatus>().is_err());
    }

    #[test]
    fn ride_serializes_camel_case() {
        let ride = Ride::new(
            Location::with_address(37.7749, -122.4194, "Market St"),
            Location::new(37.8049, -122.3994),
        );
        let json = serde_json::to_value(&ride).unwrap();
        assert_eq!(json["status"], "searching");
        assert!(json.get("rideId").is_some());
        assert!(json.get("createdAt").is_some());
        // unset optionals stay off the wire
        assert!(json.get("driver").is_none());
        assert!(json.get("estimatedArrival").is_none());
    }
}

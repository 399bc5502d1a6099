use serde::{Deserialize, Serialize};

use crate::geo::Location;
use crate::models::RideSummary;

/// Running totals shown on the driver's home screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverStats {
    pub rides_completed: u32,
    pub rating: f64,
    pub earnings: f64,
}

impl Default for DriverStats {
    fn default() -> Self {
        Self {
            rides_completed: 0,
            rating: 5.0,
            earnings: 0.0,
        }
    }
}

/// A ride offered to a driver, pending accept/decline.
#[derive(Debug, Clone, PartialEq)]
pub struct RideOffer {
    pub ride_id: String,
    pub pickup: Location,
    pub destination: Location,
    pub pickup_distance_km: f64,
}

/// The ride a driver is currently working.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveRide {
    pub ride_id: String,
    pub pickup: Location,
    pub destination: Location,
}

/// Driver-side duty lifecycle. Immutable like [`RideState`]; transitions
/// construct new values.
///
/// [`RideState`]: crate::state::ride_state::RideState
#[derive(Debug, Clone, PartialEq)]
pub enum DriverState {
    Offline,
    LoggingIn,
    Online {
        stats: DriverStats,
    },
    RideOffered {
        offer: RideOffer,
        stats: DriverStats,
    },
    HeadingToPickup {
        ride: ActiveRide,
        stats: DriverStats,
    },
    ArrivedAtPickup {
        ride: ActiveRide,
        stats: DriverStats,
    },
    RideInProgress {
        ride: ActiveRide,
        stats: DriverStats,
    },
    ApproachingDestination {
        ride: ActiveRide,
        stats: DriverStats,
    },
    RideCompleted {
        summary: RideSummary,
        stats: DriverStats,
    },
    Error {
        message: String,
        previous: Box<DriverState>,
    },
}

impl DriverState {
    pub fn phase(&self) -> &'static str {
        match self {
            DriverState::Offline => "offline",
            DriverState::LoggingIn => "loggingIn",
            DriverState::Online { .. } => "online",
            DriverState::RideOffered { .. } => "rideOffered",
            DriverState::HeadingToPickup { .. } => "headingToPickup",
            DriverState::ArrivedAtPickup { .. } => "arrivedAtPickup",
            DriverState::RideInProgress { .. } => "rideInProgress",
            DriverState::ApproachingDestination { .. } => "approachingDestination",
            DriverState::RideCompleted { .. } => "rideCompleted",
            DriverState::Error { .. } => "error",
        }
    }

    /// True while the driver is tied to a ride.
    pub fn on_ride(&self) -> bool {
        matches!(
            self,
            DriverState::HeadingToPickup { .. }
                | DriverState::ArrivedAtPickup { .. }
                | DriverState::RideInProgress { .. }
                | DriverState::ApproachingDestination { .. }
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DriverState::Offline)
    }

    pub fn stats(&self) -> Option<&DriverStats> {
        match self {
            DriverState::Online { stats }
            | DriverState::RideOffered { stats, .. }
            | DriverState::HeadingToPickup { stats, .. }
            | DriverState::ArrivedAtPickup { stats, .. }
            | DriverState::RideInProgress { stats, .. }
            | DriverState::ApproachingDestination { stats, .. }
            | DriverState::RideCompleted { stats, .. } => Some(stats),
            _ => None,
        }
    }
}

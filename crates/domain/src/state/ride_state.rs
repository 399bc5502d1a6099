use crate::errors::RideHailError;
use crate::geo::{Location, RouteSummary};
use crate::models::DriverInfo;

/// Rider-side ride lifecycle. One variant active at a time, each carrying
/// only the data meaningful to that phase. Instances are immutable: a
/// transition always constructs a new value.
#[derive(Debug, Clone, PartialEq)]
pub enum RideState {
    Idle,
    SelectingLocations {
        pickup: Option<Location>,
        destination: Option<Location>,
    },
    RouteReady {
        pickup: Location,
        destination: Location,
        route: RouteSummary,
    },
    SubmittingRequest {
        pickup: Location,
        destination: Location,
    },
    SearchingForDriver {
        ride_id: String,
        pickup: Location,
        destination: Location,
    },
    DriverAssigned {
        ride_id: String,
        driver: DriverInfo,
        pickup: Location,
        destination: Location,
    },
    DriverEnRoute {
        ride_id: String,
        driver: DriverInfo,
        eta_secs: u64,
        pickup: Location,
        destination: Location,
    },
    DriverArriving {
        ride_id: String,
        driver: DriverInfo,
        pickup: Location,
        destination: Location,
    },
    RideInProgress {
        ride_id: String,
        driver: DriverInfo,
        eta_secs: u64,
        pickup: Location,
        destination: Location,
    },
    ApproachingDestination {
        ride_id: String,
        driver: DriverInfo,
        pickup: Location,
        destination: Location,
    },
    RideCompleted {
        ride_id: String,
        driver: DriverInfo,
        pickup: Location,
        destination: Location,
    },
    Error {
        kind: RideHailError,
        previous: Option<Box<RideState>>,
    },
}

impl RideState {
    /// Short phase name used in logs and illegal-transition reports.
    pub fn phase(&self) -> &'static str {
        match self {
            RideState::Idle => "idle",
            RideState::SelectingLocations { .. } => "selectingLocations",
            RideState::RouteReady { .. } => "routeReady",
            RideState::SubmittingRequest { .. } => "submittingRequest",
            RideState::SearchingForDriver { .. } => "searchingForDriver",
            RideState::DriverAssigned { .. } => "driverAssigned",
            RideState::DriverEnRoute { .. } => "driverEnRoute",
            RideState::DriverArriving { .. } => "driverArriving",
            RideState::RideInProgress { .. } => "rideInProgress",
            RideState::ApproachingDestination { .. } => "approachingDestination",
            RideState::RideCompleted { .. } => "rideCompleted",
            RideState::Error { .. } => "error",
        }
    }

    /// The ride identifier, once one exists.
    pub fn ride_id(&self) -> Option<&str> {
        match self {
            RideState::SearchingForDriver { ride_id, .. }
            | RideState::DriverAssigned { ride_id, .. }
            | RideState::DriverEnRoute { ride_id, .. }
            | RideState::DriverArriving { ride_id, .. }
            | RideState::RideInProgress { ride_id, .. }
            | RideState::ApproachingDestination { ride_id, .. }
            | RideState::RideCompleted { ride_id, .. } => Some(ride_id),
            _ => None,
        }
    }

    /// True once a request has been submitted and the ride is still live.
    pub fn is_active_ride(&self) -> bool {
        matches!(
            self,
            RideState::SearchingForDriver { .. }
                | RideState::DriverAssigned { .. }
                | RideState::DriverEnRoute { .. }
                | RideState::DriverArriving { .. }
                | RideState::RideInProgress { .. }
                | RideState::ApproachingDestination { .. }
        )
    }

    /// States with no further user-initiated forward transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RideState::Idle | RideState::RideCompleted { .. })
    }
}

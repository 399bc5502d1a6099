pub mod errors;
pub mod geo;
pub mod models;
pub mod state;

pub use errors::{RideHailError, RideHailResult};
pub use geo::{Coordinate, Location, RouteSummary};
pub use models::{CancelReason, DriverInfo, Ride, RideStatus, RideSummary};
pub use state::driver_state::{ActiveRide, DriverState, DriverStats, RideOffer};
pub use state::ride_state::RideState;
pub use state::{driver_machine, ride_machine};

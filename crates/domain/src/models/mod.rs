pub mod driver;
pub mod ride;

pub use driver::{DriverInfo, RideSummary};
pub use ride::{CancelReason, Ride, RideStatus};

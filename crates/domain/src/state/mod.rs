pub mod driver_machine;
pub mod driver_state;
pub mod ride_machine;
pub mod ride_state;

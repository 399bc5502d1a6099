pub mod events;
pub mod matching;
pub mod movement;
pub mod pool;
pub mod service;

pub use events::{DriverPositionUpdate, RideEvent};
pub use matching::{DriverSnapshot, MatchOutcome, MatchingStrategy, NearestDriverStrategy};
pub use movement::{LegProgress, MovementSimulator};
pub use pool::{DriverListing, DriverPool};
pub use service::{Dispatcher, DispatcherStats};

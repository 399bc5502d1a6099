pub mod config;
pub mod logging;
pub mod providers;
pub mod traits;

pub use config::AppConfig;
pub use ridehail_domain::{RideHailError, RideHailResult};

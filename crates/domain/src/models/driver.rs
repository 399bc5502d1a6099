use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::{Coordinate, Location};

/// Public driver profile attached to a ride once matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverInfo {
    pub id: String,
    pub name: String,
    pub vehicle: String,
    pub rating: f64,
    pub location: Coordinate,
}

/// Record of a finished ride, fed to the history sink and the driver's
/// completion screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideSummary {
    pub ride_id: String,
    pub pickup: Location,
    pub destination: Location,
    pub distance_km: f64,
    pub duration_secs: u64,
    pub completed_at: DateTime<Utc>,
}

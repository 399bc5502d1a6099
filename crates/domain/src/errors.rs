use thiserror::Error;

/// Unified error taxonomy for the ride-hailing flow.
///
/// Variants are `Clone` so they can travel inside state-machine payloads
/// (the rider-side `error` state keeps the cause around for display).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RideHailError {
    #[error("current location unavailable: {0}")]
    LocationUnavailable(String),
    #[error("geocoding failed: {0}")]
    GeocodingFailed(String),
    #[error("route calculation failed: {0}")]
    RouteCalculationFailed(String),
    #[error("invalid pickup location: {0}")]
    InvalidPickup(String),
    #[error("invalid destination: {0}")]
    InvalidDestination(String),
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),
    #[error("ride request failed: {0}")]
    RideRequestFailed(String),
    #[error("no driver available")]
    NoDriverAvailable,
    #[error("ride not found: id={id}")]
    RideNotFound { id: String },
    #[error("driver not found: id={id}")]
    DriverNotFound { id: String },
    #[error("illegal state transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type RideHailResult<T> = Result<T, RideHailError>;

impl RideHailError {
    pub fn geocoding_failed<S: Into<String>>(msg: S) -> Self {
        Self::GeocodingFailed(msg.into())
    }
    pub fn route_calculation_failed<S: Into<String>>(msg: S) -> Self {
        Self::RouteCalculationFailed(msg.into())
    }
    pub fn invalid_pickup<S: Into<String>>(msg: S) -> Self {
        Self::InvalidPickup(msg.into())
    }
    pub fn invalid_destination<S: Into<String>>(msg: S) -> Self {
        Self::InvalidDestination(msg.into())
    }
    pub fn network_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::NetworkUnavailable(msg.into())
    }
    pub fn ride_request_failed<S: Into<String>>(msg: S) -> Self {
        Self::RideRequestFailed(msg.into())
    }
    pub fn ride_not_found<S: Into<String>>(id: S) -> Self {
        Self::RideNotFound { id: id.into() }
    }
    pub fn driver_not_found<S: Into<String>>(id: S) -> Self {
        Self::DriverNotFound { id: id.into() }
    }
    pub fn illegal_transition<S: Into<String>, T: Into<String>>(from: S, to: T) -> Self {
        Self::IllegalTransition {
            from: from.into(),
            to: to.into(),
        }
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Transient failures worth retrying at the transport layer.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RideHailError::NetworkUnavailable(_) | RideHailError::Timeout(_)
        )
    }

    pub fn user_message(&self) -> &str {
        match self {
            RideHailError::LocationUnavailable(_) => "We can't determine your location",
            RideHailError::GeocodingFailed(_) => "We couldn't find that address",
            RideHailError::RouteCalculationFailed(_) => "We couldn't calculate a route",
            RideHailError::InvalidPickup(_) => "The pickup location is invalid",
            RideHailError::InvalidDestination(_) => "The destination is invalid",
            RideHailError::NetworkUnavailable(_) => "Connection problem",
            RideHailError::RideRequestFailed(_) => "Your ride request could not be completed",
            RideHailError::NoDriverAvailable => "No drivers are available right now",
            RideHailError::RideNotFound { .. } => "That ride no longer exists",
            RideHailError::DriverNotFound { .. } => "That driver no longer exists",
            RideHailError::Timeout(_) => "The request timed out",
            _ => "Something went wrong",
        }
    }

    /// Suggested recovery action, where one applies.
    pub fn recovery_action(&self) -> Option<&str> {
        match self {
            RideHailError::LocationUnavailable(_) => {
                Some("Check location permissions and try again")
            }
            RideHailError::GeocodingFailed(_) => Some("Try a different address"),
            RideHailError::NetworkUnavailable(_) | RideHailError::Timeout(_) => {
                Some("Check your connection and retry")
            }
            RideHailError::NoDriverAvailable => Some("Try again in a few minutes"),
            RideHailError::RideRequestFailed(_) => Some("Try requesting again"),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for RideHailError {
    fn from(err: serde_json::Error) -> Self {
        RideHailError::Serialization(err.to_string())
    }
}

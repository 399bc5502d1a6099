use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use ridehail_domain::RideHailError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("ride-hailing error: {0}")]
    Domain(#[from] RideHailError),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message, suggestions) = match &self {
            ApiError::Domain(err) => {
                let status = match err {
                    RideHailError::RideNotFound { .. } | RideHailError::DriverNotFound { .. } => {
                        StatusCode::NOT_FOUND
                    }
                    RideHailError::InvalidPickup(_)
                    | RideHailError::InvalidDestination(_)
                    | RideHailError::IllegalTransition { .. } => StatusCode::BAD_REQUEST,
                    RideHailError::NoDriverAvailable => StatusCode::CONFLICT,
                    RideHailError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let suggestions: Vec<String> = err
                    .recovery_action()
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                (
                    status,
                    error_type_of(err),
                    err.user_message().to_string(),
                    suggestions,
                )
            }
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                msg.clone(),
                Vec::new(),
            ),
        };

        let body = Json(json!({
            "error": {
                "message": message,
                "type": error_type,
                "code": status.as_u16(),
                "suggestions": suggestions,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}

fn error_type_of(err: &RideHailError) -> &'static str {
    match err {
        RideHailError::LocationUnavailable(_) => "LOCATION_UNAVAILABLE",
        RideHailError::GeocodingFailed(_) => "GEOCODING_FAILED",
        RideHailError::RouteCalculationFailed(_) => "ROUTE_CALCULATION_FAILED",
        RideHailError::InvalidPickup(_) => "INVALID_PICKUP",
        RideHailError::InvalidDestination(_) => "INVALID_DESTINATION",
        RideHailError::NetworkUnavailable(_) => "NETWORK_UNAVAILABLE",
        RideHailError::RideRequestFailed(_) => "RIDE_REQUEST_FAILED",
        RideHailError::NoDriverAvailable => "NO_DRIVER_AVAILABLE",
        RideHailError::RideNotFound { .. } => "RIDE_NOT_FOUND",
        RideHailError::DriverNotFound { .. } => "DRIVER_NOT_FOUND",
        RideHailError::IllegalTransition { .. } => "ILLEGAL_TRANSITION",
        RideHailError::Timeout(_) => "TIMEOUT",
        RideHailError::Configuration(_) => "CONFIGURATION_ERROR",
        RideHailError::Serialization(_) => "SERIALIZATION_ERROR",
        RideHailError::Internal(_) => "INTERNAL_ERROR",
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ride_not_found_maps_to_404() {
        let response =
            ApiError::Domain(RideHailError::ride_not_found("ride-1")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_pickup_maps_to_400() {
        let response =
            ApiError::Domain(RideHailError::invalid_pickup("lat out of range")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_errors_map_to_500() {
        let response = ApiError::Domain(RideHailError::internal("boom")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use ridehail_domain::{Location, Ride};

use crate::error::{ApiError, ApiResult};
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct RideRequestBody {
    pub pickup: Location,
    pub destination: Location,
}

pub async fn request_ride(
    State(state): State<AppState>,
    Json(body): Json<RideRequestBody>,
) -> ApiResult<(StatusCode, Json<Ride>)> {
    let ride = state
        .dispatcher
        .request_ride(body.pickup, body.destination)
        .await
        .map_err(ApiError::Domain)?;
    Ok((StatusCode::CREATED, Json(ride)))
}

pub async fn get_ride(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Ride>> {
    let ride = state.dispatcher.ride(&id).await.map_err(ApiError::Domain)?;
    Ok(Json(ride))
}

pub async fn cancel_ride(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let ride = state
        .dispatcher
        .cancel_ride(&id)
        .await
        .map_err(ApiError::Domain)?;
    Ok(Json(json!({ "success": true, "ride": ride })))
}

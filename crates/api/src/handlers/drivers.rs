use axum::extract::State;
use axum::Json;

use ridehail_dispatcher::DriverListing;

use crate::routes::AppState;

/// Debug listing of the simulated driver pool.
pub async fn list_drivers(State(state): State<AppState>) -> Json<Vec<DriverListing>> {
    Json(state.dispatcher.drivers().await)
}

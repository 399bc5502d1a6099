use axum::extract::State;
use axum::Json;

use ridehail_dispatcher::DispatcherStats;

use crate::routes::AppState;

pub async fn get_stats(State(state): State<AppState>) -> Json<DispatcherStats> {
    Json(state.dispatcher.stats().await)
}

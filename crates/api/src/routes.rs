use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use ridehail_dispatcher::Dispatcher;

use crate::handlers::{
    drivers::list_drivers,
    health::health_check,
    rides::{cancel_ride, get_ride, request_ride},
    stats::get_stats,
    ws::ws_handler,
};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/rides/request", post(request_ride))
        .route("/rides/{id}", get(get_ride))
        .route("/rides/{id}/cancel", post(cancel_ride))
        .route("/drivers", get(list_drivers))
        .route("/stats", get(get_stats))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::{scheduling_routes, SchedulingState};

pub fn create_router(state: Arc<SchedulingState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .merge(scheduling_routes(state))
}

// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::SchedulingState;

pub fn scheduling_routes(state: Arc<SchedulingState>) -> Router {
    // Every scheduling operation requires authentication
    let protected_routes = Router::new()
        // Slots
        .route("/slots", post(handlers::create_slot))
        .route("/slots/search", get(handlers::search_slots))
        .route("/slots/{slot_id}", get(handlers::get_slot).delete(handlers::delete_slot))
        .route("/slots/{slot_id}/availability", patch(handlers::set_slot_availability))
        .route("/doctors/{doctor_id}/slots", get(handlers::list_doctor_slots))

        // Appointments
        .route("/appointments", post(handlers::book_appointment))
        .route(
            "/appointments/{appointment_id}",
            get(handlers::get_appointment).delete(handlers::delete_appointment),
        )
        .route("/appointments/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/appointments/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/patients/{patient_id}/appointments", get(handlers::list_patient_appointments))
        .route("/doctors/{doctor_id}/appointments", get(handlers::list_doctor_appointments))

        // Notification inbox
        .route("/notifications", get(handlers::list_notifications))
        .route("/notifications/{notification_id}/read", post(handlers::mark_notification_read))

        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}

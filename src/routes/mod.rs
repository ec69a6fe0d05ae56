use axum::{
    routing::{get, post},
    Router,
};

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{
    admin, checkout, events, health_check, reservations, tickets, waiting_room,
};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/events", get(events::list))
        .route("/events/:id", get(events::get))
        .route("/events/:id/availability", get(events::availability))
        .route("/events/:id/waiting-room/join", post(waiting_room::join))
        .route("/events/:id/waiting-room/status", get(waiting_room::status))
        .route(
            "/events/:id/reservations",
            post(reservations::create).get(reservations::lookup),
        )
        .route("/checkout/sessions", post(checkout::create_session))
        .route("/checkout/confirm", post(checkout::confirm))
        .route("/me/tickets", get(tickets::my_tickets))
        .route("/admin/events/:id/pause", post(admin::pause))
        .route("/admin/events/:id/resume", post(admin::resume))
        .route("/admin/events/:id/status", get(admin::status))
        .route(
            "/admin/events/:id/waiting-room/clear",
            post(admin::clear_waiting_room),
        )
        .layer(create_security_headers_layer())
        .layer(create_cors_layer())
        .with_state(state)
}

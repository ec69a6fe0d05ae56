use axum::response::Response;
use serde::Serialize;

use crate::utils::response::ok;

pub mod admin;
pub mod checkout;
pub mod events;
pub mod reservations;
pub mod tickets;
pub mod waiting_room;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    ok(HealthPayload {
        status: "ok",
        service: "boxoffice-api",
    })
}

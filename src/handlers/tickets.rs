use axum::extract::State;
use axum::response::Response;
use serde::Serialize;

use crate::db;
use crate::models::Ticket;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::UserId;
use crate::utils::response::ok;

#[derive(Serialize)]
pub struct TicketsResponse {
    pub tickets: Vec<Ticket>,
    pub count: usize,
}

pub async fn my_tickets(
    State(state): State<AppState>,
    user: UserId,
) -> Result<Response, AppError> {
    let tickets = db::tickets::list_for_user(&state.pool, &user.0).await?;
    let count = tickets.len();
    Ok(ok(TicketsResponse { tickets, count }))
}

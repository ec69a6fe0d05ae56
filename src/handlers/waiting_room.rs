use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::UserId;
use crate::utils::response::ok;

#[derive(Serialize)]
pub struct JoinResponse {
    pub token: String,
}

#[derive(Deserialize)]
pub struct StatusQuery {
    pub token: String,
}

/// Join the waiting room. Joiners are welcome before and during the sale;
/// only draft/absent events fail, since those do not exist to buyers.
pub async fn join(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    user: UserId,
) -> Result<Response, AppError> {
    let event = db::events::get_visible_event(&state.pool, event_id).await?;
    let token = state.waiting_room.join(event.id, &user.0).await?;
    Ok(ok(JoinResponse { token }))
}

/// Poll queue position. Driving the wave cursor and issuing admission
/// grants both happen inside this read.
pub async fn status(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Query(query): Query<StatusQuery>,
) -> Result<Response, AppError> {
    let event = db::events::get_visible_event(&state.pool, event_id).await?;
    let view = state.waiting_room.status(&event, &query.token).await?;
    Ok(ok(view))
}

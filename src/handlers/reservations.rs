use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::db;
use crate::db::reservations::ReserveRequest;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::UserId;
use crate::utils::response::{created, ok};

#[derive(Deserialize)]
pub struct CreateReservationRequest {
    pub tier_id: Uuid,
    pub quantity: i32,
    pub token: String,
}

#[derive(Deserialize)]
pub struct LookupQuery {
    pub token: String,
}

/// Place a hold. The waiting-room token must carry a live admission grant;
/// the grant is consumed once the hold commits.
pub async fn create(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    user: UserId,
    Json(body): Json<CreateReservationRequest>,
) -> Result<Response, AppError> {
    if body.quantity < 1 {
        return Err(AppError::Validation("quantity must be at least 1".to_string()));
    }

    if !state.waiting_room.has_grant(event_id, &body.token).await? {
        return Err(AppError::NotAdmitted);
    }

    let reservation = db::reservations::reserve(
        &state.pool,
        &state.config.sale,
        ReserveRequest {
            event_id,
            tier_id: body.tier_id,
            user_id: &user.0,
            quantity: body.quantity,
        },
    )
    .await?;

    if let Err(e) = state.waiting_room.consume_grant(event_id, &body.token).await {
        // The hold is committed; a lingering grant only dies at its TTL.
        tracing::warn!(error = ?e, event_id = %event_id, "failed to consume admission grant");
    }

    Ok(created(reservation))
}

/// Current active hold for this user on this event, joined with its tier.
pub async fn lookup(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    user: UserId,
    Query(query): Query<LookupQuery>,
) -> Result<Response, AppError> {
    if !state.waiting_room.token_exists(event_id, &query.token).await? {
        return Err(AppError::InvalidToken);
    }

    let view = db::reservations::lookup_active(&state.pool, event_id, &user.0)
        .await?
        .ok_or_else(|| AppError::NotFound("reservation".to_string()))?;
    Ok(ok(view))
}

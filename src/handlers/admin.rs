use axum::extract::{Path, State};
use axum::response::Response;
use serde::Serialize;
use uuid::Uuid;

use crate::db;
use crate::db::events::EventStats;
use crate::handlers::events::TierAvailabilityView;
use crate::models::Event;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::ok;

#[derive(Serialize)]
pub struct AdminStatusResponse {
    #[serde(flatten)]
    pub event: Event,
    pub queue_depth: u64,
    pub wave_end: Option<u64>,
    pub stats: EventStats,
    pub tiers: Vec<TierAvailabilityView>,
}

#[derive(Serialize)]
pub struct ClearResponse {
    pub dropped: u64,
}

/// Pausing forbids grants and new holds; queuers and live holds survive.
pub async fn pause(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = db::events::set_paused(&state.pool, event_id, true).await?;
    tracing::info!(event_id = %event_id, "sales paused");
    Ok(ok(event))
}

pub async fn resume(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = db::events::set_paused(&state.pool, event_id, false).await?;
    tracing::info!(event_id = %event_id, "sales resumed");
    Ok(ok(event))
}

pub async fn status(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = db::events::get_event(&state.pool, event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("event".to_string()))?;

    let (queue_depth, wave_end) = state.waiting_room.wave_state(event.id).await?;
    let stats = db::events::event_stats(&state.pool, event.id).await?;
    let tiers = db::events::availability(&state.pool, event.id)
        .await?
        .into_iter()
        .map(TierAvailabilityView::from)
        .collect();

    Ok(ok(AdminStatusResponse {
        event,
        queue_depth,
        wave_end,
        stats,
        tiers,
    }))
}

pub async fn clear_waiting_room(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = db::events::get_event(&state.pool, event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("event".to_string()))?;
    let dropped = state.waiting_room.clear(event.id).await?;
    Ok(ok(ClearResponse { dropped }))
}

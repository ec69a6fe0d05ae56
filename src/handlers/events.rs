use axum::extract::{Path, State};
use axum::response::Response;
use serde::Serialize;
use uuid::Uuid;

use crate::db;
use crate::db::events::TierAvailability;
use crate::models::{Event, Tier};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::ok;

#[derive(Serialize)]
pub struct EventDetail {
    #[serde(flatten)]
    pub event: Event,
    pub tiers: Vec<Tier>,
}

#[derive(Serialize)]
pub struct TierAvailabilityView {
    #[serde(flatten)]
    pub tier: TierAvailability,
    pub available: i64,
}

impl From<TierAvailability> for TierAvailabilityView {
    fn from(tier: TierAvailability) -> Self {
        let available = tier.available();
        Self { tier, available }
    }
}

#[derive(Serialize)]
pub struct AvailabilityResponse {
    pub event_id: Uuid,
    pub tiers: Vec<TierAvailabilityView>,
}

pub async fn list(State(state): State<AppState>) -> Result<Response, AppError> {
    let events = db::events::list_public_events(&state.pool).await?;
    Ok(ok(events))
}

pub async fn get(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = db::events::get_visible_event(&state.pool, event_id).await?;
    let tiers = db::events::list_tiers(&state.pool, event_id).await?;
    Ok(ok(EventDetail { event, tiers }))
}

pub async fn availability(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = db::events::get_visible_event(&state.pool, event_id).await?;
    let tiers = db::events::availability(&state.pool, event.id)
        .await?
        .into_iter()
        .map(TierAvailabilityView::from)
        .collect();
    Ok(ok(AvailabilityResponse {
        event_id: event.id,
        tiers,
    }))
}

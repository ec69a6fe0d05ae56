use std::time::Duration;

use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db;
use crate::models::{CheckoutSession, Order, Reservation, Ticket};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::{IdempotencyKey, RequestId, UserId};
use crate::utils::response::{created, ok};

const RATE_WINDOW: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    pub reservation_id: Uuid,
}

#[derive(Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub session: CheckoutSession,
    pub idempotent: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    Success,
    Fail,
}

#[derive(Deserialize)]
pub struct ConfirmRequest {
    pub checkout_id: Uuid,
    pub simulate: PaymentOutcome,
}

#[derive(Serialize)]
pub struct ConfirmResponse {
    pub session: CheckoutSession,
    pub reservation: Reservation,
    pub order: Option<Order>,
    pub tickets: Vec<Ticket>,
    pub idempotent: bool,
}

/// Open (or replay) a checkout session for a reservation.
pub async fn create_session(
    State(state): State<AppState>,
    user: UserId,
    request_id: RequestId,
    idempotency_key: IdempotencyKey,
    Json(body): Json<CreateSessionRequest>,
) -> Result<Response, AppError> {
    tracing::debug!(
        request_id = %request_id.0,
        reservation_id = %body.reservation_id,
        "checkout session requested"
    );
    state
        .rate_limiter
        .check_and_record(
            "checkout_session",
            &user.0,
            state.config.sale.session_rate_per_min,
            RATE_WINDOW,
        )
        .await?;

    let (session, replayed) = db::checkout::create_session(
        &state.pool,
        &state.config.sale,
        &user.0,
        body.reservation_id,
        &idempotency_key.0,
    )
    .await?;

    let response = SessionResponse {
        session,
        idempotent: replayed,
    };
    if replayed {
        Ok(ok(response))
    } else {
        Ok(created(response))
    }
}

/// Settle a pending session with the simulated payment outcome.
pub async fn confirm(
    State(state): State<AppState>,
    user: UserId,
    request_id: RequestId,
    Json(body): Json<ConfirmRequest>,
) -> Result<Response, AppError> {
    tracing::debug!(
        request_id = %request_id.0,
        checkout_id = %body.checkout_id,
        "checkout confirmation requested"
    );
    state
        .rate_limiter
        .check_and_record(
            "checkout_confirm",
            &user.0,
            state.config.sale.confirm_rate_per_min,
            RATE_WINDOW,
        )
        .await?;

    let outcome = db::checkout::confirm(
        &state.pool,
        &state.signer,
        body.checkout_id,
        &user.0,
        matches!(body.simulate, PaymentOutcome::Success),
    )
    .await?;

    let replayed = outcome.replayed;
    let response = ConfirmResponse {
        session: outcome.session,
        reservation: outcome.reservation,
        order: outcome.order,
        tickets: outcome.tickets,
        idempotent: replayed,
    };
    if replayed {
        Ok(ok(response))
    } else {
        Ok(created(response))
    }
}

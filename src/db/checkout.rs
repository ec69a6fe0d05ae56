//! Idempotent two-phase checkout: session creation, then confirmation.
//!
//! Session uniqueness rides on the `idempotency_key` unique index; losers of
//! the insert race fall back to returning the winner's row. Confirmation
//! serialises on the session and reservation row locks, so at most one of
//! {order creation, expiration, cancellation} wins per reservation.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::SaleConfig;
use crate::models::{
    reservation_status, session_status, CheckoutSession, Order, Reservation, Ticket, Tier,
};
use crate::signing::TicketSigner;
use crate::utils::error::AppError;

const IDEMPOTENCY_KEY_CONSTRAINT: &str = "checkout_sessions_idempotency_key_unique";

pub async fn find_by_key(
    pool: &PgPool,
    idempotency_key: &str,
) -> Result<Option<CheckoutSession>, AppError> {
    let session = sqlx::query_as::<_, CheckoutSession>(
        "SELECT * FROM checkout_sessions WHERE idempotency_key = $1",
    )
    .bind(idempotency_key)
    .fetch_optional(pool)
    .await?;
    Ok(session)
}

/// Open a checkout session for a reservation. Returns `(session, replayed)`;
/// `replayed` is true when an existing session satisfied the request.
pub async fn create_session(
    pool: &PgPool,
    sale: &SaleConfig,
    user_id: &str,
    reservation_id: Uuid,
    idempotency_key: &str,
) -> Result<(CheckoutSession, bool), AppError> {
    // Repeat of an already-settled attempt: return it verbatim.
    if let Some(existing) = find_by_key(pool, idempotency_key).await? {
        return Ok((existing, true));
    }

    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let reservation = sqlx::query_as::<_, Reservation>(
        "SELECT * FROM reservations WHERE id = $1 FOR UPDATE",
    )
    .bind(reservation_id)
    .fetch_optional(&mut *tx)
    .await?;
    let reservation = match reservation {
        Some(r) if r.user_id == user_id => r,
        _ => return Err(AppError::NotFound("reservation".to_string())),
    };

    if !reservation.is_active_at(now) {
        return Err(AppError::ReservationExpiredOrInvalid);
    }

    // A different idempotency key must not spawn a competing session for the
    // same hold; hand back the one already pending.
    let pending = sqlx::query_as::<_, CheckoutSession>(
        "SELECT * FROM checkout_sessions WHERE reservation_id = $1 AND status = 'pending' LIMIT 1",
    )
    .bind(reservation_id)
    .fetch_optional(&mut *tx)
    .await?;
    if let Some(pending) = pending {
        tx.rollback().await?;
        return Ok((pending, true));
    }

    // Fresh payment window for the buyer.
    sqlx::query("UPDATE reservations SET expires_at = $2, updated_at = now() WHERE id = $1")
        .bind(reservation_id)
        .bind(now + sale.reservation_ttl())
        .execute(&mut *tx)
        .await?;

    let inserted = sqlx::query_as::<_, CheckoutSession>(
        "INSERT INTO checkout_sessions (reservation_id, user_id, idempotency_key, status)
         VALUES ($1, $2, $3, 'pending')
         RETURNING *",
    )
    .bind(reservation_id)
    .bind(user_id)
    .bind(idempotency_key)
    .fetch_one(&mut *tx)
    .await;

    match inserted {
        Ok(session) => {
            tx.commit().await?;
            tracing::info!(
                session_id = %session.id,
                reservation_id = %reservation_id,
                "checkout session created"
            );
            Ok((session, false))
        }
        Err(sqlx::Error::Database(db))
            if db.constraint() == Some(IDEMPOTENCY_KEY_CONSTRAINT) =>
        {
            // Lost the unique-key race; the winner's session is the answer.
            tx.rollback().await?;
            let winner = find_by_key(pool, idempotency_key).await?.ok_or_else(|| {
                AppError::Internal("idempotency-key winner vanished".to_string())
            })?;
            Ok((winner, true))
        }
        Err(e) => Err(e.into()),
    }
}

/// Everything a confirmation returns: the settled session and reservation,
/// plus the order and tickets when payment succeeded (now or previously).
#[derive(Debug)]
pub struct ConfirmOutcome {
    pub session: CheckoutSession,
    pub reservation: Reservation,
    pub order: Option<Order>,
    pub tickets: Vec<Ticket>,
    pub replayed: bool,
}

/// Settle a pending session with the caller-supplied payment outcome.
pub async fn confirm(
    pool: &PgPool,
    signer: &TicketSigner,
    checkout_id: Uuid,
    user_id: &str,
    payment_succeeded: bool,
) -> Result<ConfirmOutcome, AppError> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let session = sqlx::query_as::<_, CheckoutSession>(
        "SELECT * FROM checkout_sessions WHERE id = $1 FOR UPDATE",
    )
    .bind(checkout_id)
    .fetch_optional(&mut *tx)
    .await?;
    let session = match session {
        Some(s) if s.user_id == user_id => s,
        _ => return Err(AppError::NotFound("checkout session".to_string())),
    };

    // Settled already: replay the result without touching state.
    let existing_order =
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE session_id = $1")
            .bind(session.id)
            .fetch_optional(&mut *tx)
            .await?;
    if let Some(order) = existing_order {
        let tickets = sqlx::query_as::<_, Ticket>(
            "SELECT * FROM tickets WHERE order_id = $1 ORDER BY created_at, code",
        )
        .bind(order.id)
        .fetch_all(&mut *tx)
        .await?;
        let reservation = sqlx::query_as::<_, Reservation>(
            "SELECT * FROM reservations WHERE id = $1",
        )
        .bind(session.reservation_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        return Ok(ConfirmOutcome {
            session,
            reservation,
            order: Some(order),
            tickets,
            replayed: true,
        });
    }

    if session.status != session_status::PENDING {
        return Err(AppError::SessionNotPending {
            status: session.status.clone(),
        });
    }

    // Serialisation point for this reservation's outcome.
    let reservation = sqlx::query_as::<_, Reservation>(
        "SELECT * FROM reservations WHERE id = $1 FOR UPDATE",
    )
    .bind(session.reservation_id)
    .fetch_one(&mut *tx)
    .await?;

    // The recovery worker may have flipped the hold to expired before this
    // lock was acquired; both that and a live timestamp lapse settle the
    // session as expired.
    if reservation.status == reservation_status::EXPIRED
        || (reservation.status == reservation_status::ACTIVE && reservation.expires_at <= now)
    {
        set_reservation_status(&mut tx, reservation.id, "expired").await?;
        set_session_status(&mut tx, session.id, "expired").await?;
        tx.commit().await?;
        tracing::info!(session_id = %session.id, "confirm on expired hold");
        return Err(AppError::ReservationExpiredOrInvalid);
    }
    // Only canceled/converted holds remain here: settled by a payment
    // outcome, so the session fails rather than expires.
    if reservation.status != reservation_status::ACTIVE {
        set_session_status(&mut tx, session.id, "failed").await?;
        tx.commit().await?;
        return Err(AppError::ReservationExpiredOrInvalid);
    }

    if payment_succeeded {
        let tier = sqlx::query_as::<_, Tier>("SELECT * FROM tiers WHERE id = $1")
            .bind(reservation.tier_id)
            .fetch_one(&mut *tx)
            .await?;

        let order = sqlx::query_as::<_, Order>(
            "INSERT INTO orders
                 (session_id, event_id, tier_id, user_id, quantity, total_price_cents, status)
             VALUES ($1, $2, $3, $4, $5, $6, 'paid')
             RETURNING *",
        )
        .bind(session.id)
        .bind(reservation.event_id)
        .bind(reservation.tier_id)
        .bind(&reservation.user_id)
        .bind(reservation.quantity)
        .bind(i64::from(reservation.quantity) * tier.price_cents)
        .fetch_one(&mut *tx)
        .await?;

        let tickets = super::tickets::issue_for_order(&mut tx, &order, signer, order.quantity)
            .await?;

        let session = set_session_status(&mut tx, session.id, "completed").await?;
        let reservation = set_reservation_status(&mut tx, reservation.id, "converted").await?;
        tx.commit().await?;

        metrics::counter!("boxoffice_orders_created_total").increment(1);
        metrics::counter!("boxoffice_confirmations_total", "outcome" => "success").increment(1);
        tracing::info!(
            order_id = %order.id,
            session_id = %session.id,
            quantity = order.quantity,
            "order paid, tickets issued"
        );

        Ok(ConfirmOutcome {
            session,
            reservation,
            order: Some(order),
            tickets,
            replayed: false,
        })
    } else {
        let session = set_session_status(&mut tx, session.id, "failed").await?;
        let reservation = set_reservation_status(&mut tx, reservation.id, "canceled").await?;
        tx.commit().await?;

        metrics::counter!("boxoffice_confirmations_total", "outcome" => "fail").increment(1);
        tracing::info!(session_id = %session.id, "payment failed, hold released");

        Ok(ConfirmOutcome {
            session,
            reservation,
            order: None,
            tickets: Vec::new(),
            replayed: false,
        })
    }
}

async fn set_session_status(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    session_id: Uuid,
    status: &str,
) -> Result<CheckoutSession, sqlx::Error> {
    sqlx::query_as::<_, CheckoutSession>(
        "UPDATE checkout_sessions SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(session_id)
    .bind(status)
    .fetch_one(&mut **tx)
    .await
}

async fn set_reservation_status(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    reservation_id: Uuid,
    status: &str,
) -> Result<Reservation, sqlx::Error> {
    sqlx::query_as::<_, Reservation>(
        "UPDATE reservations SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(reservation_id)
    .bind(status)
    .fetch_one(&mut **tx)
    .await
}

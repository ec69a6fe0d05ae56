//! Reservation engine: oversell-safe, TTL-bounded inventory holds.
//!
//! The whole check-then-insert runs in one transaction holding an exclusive
//! lock on the tier row. Any two concurrent holds on the same tier serialise
//! on that lock; cross-tier traffic never contends.

use chrono::Utc;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::config::SaleConfig;
use crate::models::{Event, Reservation, Tier};
use crate::utils::error::AppError;

pub struct ReserveRequest<'a> {
    pub event_id: Uuid,
    pub tier_id: Uuid,
    pub user_id: &'a str,
    pub quantity: i32,
}

/// Place a hold for `quantity` on a tier. Caller must already hold an
/// admission grant; this function owns every durable-store check.
pub async fn reserve(
    pool: &PgPool,
    sale: &SaleConfig,
    req: ReserveRequest<'_>,
) -> Result<Reservation, AppError> {
    if req.quantity < 1 {
        return Err(AppError::Validation("quantity must be at least 1".to_string()));
    }

    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
        .bind(req.event_id)
        .fetch_optional(&mut *tx)
        .await?;
    let event = match event {
        Some(e) if !e.is_draft() => e,
        _ => return Err(AppError::NotFound("event".to_string())),
    };
    if event.paused || !event.is_on_sale() {
        return Err(AppError::SalesPaused);
    }

    // Serialisation point: every hold on this tier queues behind this lock.
    let tier = sqlx::query_as::<_, Tier>(
        "SELECT * FROM tiers WHERE id = $1 AND event_id = $2 FOR UPDATE",
    )
    .bind(req.tier_id)
    .bind(req.event_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("tier".to_string()))?;

    let already_paid: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(quantity), 0) FROM orders
         WHERE event_id = $1 AND user_id = $2 AND status = 'paid'",
    )
    .bind(req.event_id)
    .bind(req.user_id)
    .fetch_one(&mut *tx)
    .await?;

    let active_held: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(quantity), 0) FROM reservations
         WHERE event_id = $1 AND user_id = $2 AND status = 'active' AND expires_at > $3",
    )
    .bind(req.event_id)
    .bind(req.user_id)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    if already_paid + active_held + i64::from(req.quantity)
        > i64::from(sale.per_event_purchase_limit)
    {
        metrics::counter!("boxoffice_purchase_limit_hits_total").increment(1);
        return Err(AppError::PurchaseLimitExceeded {
            already_purchased: already_paid,
            active_holds: active_held,
            requested: req.quantity,
            limit: sale.per_event_purchase_limit,
        });
    }

    if req.quantity > tier.per_user_limit {
        return Err(AppError::PerTierLimitExceeded {
            requested: req.quantity,
            limit: tier.per_user_limit,
        });
    }

    // One in-flight hold per user per event.
    if active_held > 0 {
        return Err(AppError::DoubleHold);
    }

    let reserved: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(quantity), 0) FROM reservations
         WHERE tier_id = $1 AND status = 'active' AND expires_at > $2",
    )
    .bind(req.tier_id)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    let sold: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(quantity), 0) FROM orders
         WHERE tier_id = $1 AND status = 'paid'",
    )
    .bind(req.tier_id)
    .fetch_one(&mut *tx)
    .await?;

    let available = i64::from(tier.capacity) - reserved - sold;
    if available < i64::from(req.quantity) {
        metrics::counter!("boxoffice_oversell_attempts_total").increment(1);
        tracing::warn!(
            tier_id = %req.tier_id,
            available = available,
            requested = req.quantity,
            "insufficient inventory"
        );
        return Err(AppError::InsufficientInventory {
            available: available.max(0),
            requested: req.quantity,
        });
    }

    let reservation = sqlx::query_as::<_, Reservation>(
        "INSERT INTO reservations (event_id, tier_id, user_id, quantity, status, expires_at)
         VALUES ($1, $2, $3, $4, 'active', $5)
         RETURNING *",
    )
    .bind(req.event_id)
    .bind(req.tier_id)
    .bind(req.user_id)
    .bind(req.quantity)
    .bind(now + sale.reservation_ttl())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    metrics::counter!("boxoffice_reservations_created_total").increment(1);
    tracing::info!(
        reservation_id = %reservation.id,
        tier_id = %req.tier_id,
        quantity = req.quantity,
        "reservation created"
    );
    Ok(reservation)
}

/// A reservation joined with its tier for display.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ActiveReservationView {
    pub id: Uuid,
    pub event_id: Uuid,
    pub tier_id: Uuid,
    pub tier_name: String,
    pub price_cents: i64,
    pub quantity: i32,
    pub status: String,
    pub expires_at: chrono::DateTime<Utc>,
    pub created_at: chrono::DateTime<Utc>,
}

/// Most recently created active, unexpired reservation for (event, user).
pub async fn lookup_active(
    pool: &PgPool,
    event_id: Uuid,
    user_id: &str,
) -> Result<Option<ActiveReservationView>, AppError> {
    let view = sqlx::query_as::<_, ActiveReservationView>(
        r#"
        SELECT r.id, r.event_id, r.tier_id, t.name AS tier_name, t.price_cents,
               r.quantity, r.status, r.expires_at, r.created_at
        FROM reservations r
        JOIN tiers t ON t.id = r.tier_id
        WHERE r.event_id = $1 AND r.user_id = $2
          AND r.status = 'active' AND r.expires_at > now()
        ORDER BY r.created_at DESC
        LIMIT 1
        "#,
    )
    .bind(event_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(view)
}

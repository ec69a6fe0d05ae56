use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::{event_status, Event, Tier};
use crate::utils::error::AppError;

pub async fn get_event(pool: &PgPool, event_id: Uuid) -> Result<Option<Event>, AppError> {
    let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
        .bind(event_id)
        .fetch_optional(pool)
        .await?;
    Ok(event)
}

/// Load an event as a buyer may see it: draft events do not exist.
pub async fn get_visible_event(pool: &PgPool, event_id: Uuid) -> Result<Event, AppError> {
    let event = get_event(pool, event_id).await?;
    match event {
        Some(e) if !e.is_draft() => Ok(e),
        _ => Err(AppError::NotFound("event".to_string())),
    }
}

pub async fn list_public_events(pool: &PgPool) -> Result<Vec<Event>, AppError> {
    let events = sqlx::query_as::<_, Event>(
        "SELECT * FROM events WHERE status <> $1 ORDER BY starts_at",
    )
    .bind(event_status::DRAFT)
    .fetch_all(pool)
    .await?;
    Ok(events)
}

pub async fn list_tiers(pool: &PgPool, event_id: Uuid) -> Result<Vec<Tier>, AppError> {
    let tiers = sqlx::query_as::<_, Tier>(
        "SELECT * FROM tiers WHERE event_id = $1 ORDER BY price_cents, name",
    )
    .bind(event_id)
    .fetch_all(pool)
    .await?;
    Ok(tiers)
}

pub async fn set_paused(
    pool: &PgPool,
    event_id: Uuid,
    paused: bool,
) -> Result<Event, AppError> {
    let event = sqlx::query_as::<_, Event>(
        "UPDATE events SET paused = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(event_id)
    .bind(paused)
    .fetch_optional(pool)
    .await?;
    event.ok_or_else(|| AppError::NotFound("event".to_string()))
}

/// Per-tier occupancy. `reserved` counts active unexpired holds, `sold`
/// counts paid orders; what remains of `capacity` is sellable.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TierAvailability {
    pub tier_id: Uuid,
    pub name: String,
    pub price_cents: i64,
    pub capacity: i32,
    pub reserved: i64,
    pub sold: i64,
}

impl TierAvailability {
    pub fn available(&self) -> i64 {
        (i64::from(self.capacity) - self.reserved - self.sold).max(0)
    }
}

pub async fn availability(
    pool: &PgPool,
    event_id: Uuid,
) -> Result<Vec<TierAvailability>, AppError> {
    let tiers = sqlx::query_as::<_, TierAvailability>(
        r#"
        SELECT t.id AS tier_id,
               t.name,
               t.price_cents,
               t.capacity,
               COALESCE(r.reserved, 0) AS reserved,
               COALESCE(o.sold, 0) AS sold
        FROM tiers t
        LEFT JOIN (
            SELECT tier_id, SUM(quantity) AS reserved
            FROM reservations
            WHERE status = 'active' AND expires_at > now()
            GROUP BY tier_id
        ) r ON r.tier_id = t.id
        LEFT JOIN (
            SELECT tier_id, SUM(quantity) AS sold
            FROM orders
            WHERE status = 'paid'
            GROUP BY tier_id
        ) o ON o.tier_id = t.id
        WHERE t.event_id = $1
        ORDER BY t.price_cents, t.name
        "#,
    )
    .bind(event_id)
    .fetch_all(pool)
    .await?;
    Ok(tiers)
}

/// Aggregate counts for the admin status summary.
#[derive(Debug, Clone, Serialize)]
pub struct EventStats {
    pub active_holds: i64,
    pub paid_orders: i64,
    pub sold_quantity: i64,
    pub tickets_issued: i64,
}

pub async fn event_stats(pool: &PgPool, event_id: Uuid) -> Result<EventStats, AppError> {
    let active_holds: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM reservations
         WHERE event_id = $1 AND status = 'active' AND expires_at > now()",
    )
    .bind(event_id)
    .fetch_one(pool)
    .await?;

    let (paid_orders, sold_quantity): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(quantity), 0)
         FROM orders WHERE event_id = $1 AND status = 'paid'",
    )
    .bind(event_id)
    .fetch_one(pool)
    .await?;

    let tickets_issued: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM tickets WHERE event_id = $1")
            .bind(event_id)
            .fetch_one(pool)
            .await?;

    Ok(EventStats {
        active_holds,
        paid_orders,
        sold_quantity,
        tickets_issued,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_subtracts_holds_and_sales() {
        let tier = TierAvailability {
            tier_id: Uuid::new_v4(),
            name: "GA".to_string(),
            price_cents: 5000,
            capacity: 100,
            reserved: 12,
            sold: 30,
        };
        assert_eq!(tier.available(), 58);
    }

    #[test]
    fn availability_clamps_at_zero() {
        let tier = TierAvailability {
            tier_id: Uuid::new_v4(),
            name: "GA".to_string(),
            price_cents: 5000,
            capacity: 10,
            reserved: 8,
            sold: 10,
        };
        assert_eq!(tier.available(), 0);
    }
}

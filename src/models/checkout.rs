use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Idempotency envelope around a pending payment. At most one session exists
/// per idempotency key; the unique index is the coordination point.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CheckoutSession {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub user_id: String,
    pub idempotency_key: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Immutable record of a paid purchase. Exactly one per completed session.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub session_id: Uuid,
    pub event_id: Uuid,
    pub tier_id: Uuid,
    pub user_id: String,
    pub quantity: i32,
    pub total_price_cents: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

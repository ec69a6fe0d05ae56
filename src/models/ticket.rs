use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One issued seat. `code` is globally unique; `qr_sig` authenticates
/// `code`, order and event for stateless gate-side verification.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub order_id: Uuid,
    pub event_id: Uuid,
    pub tier_id: Uuid,
    pub user_id: String,
    pub code: String,
    pub qr_sig: String,
    pub created_at: DateTime<Utc>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A TTL-bounded inventory hold. Counts toward occupied capacity only while
/// `status = active` and `expires_at > now`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reservation {
    pub id: Uuid,
    pub event_id: Uuid,
    pub tier_id: Uuid,
    pub user_id: String,
    pub quantity: i32,
    pub status: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == super::reservation_status::ACTIVE && self.expires_at > now
    }
}

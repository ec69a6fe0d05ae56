//! Per-event waiting room over Redis.
//!
//! Joiners land in a sorted set scored by join time (milliseconds); position
//! is the live 1-indexed rank. Once sale opens, a wave cursor releases the
//! front of the queue in bounded bands, paced by `wave_interval`. Admission
//! grants are short-lived bearer keys consumed by the reservation stage.
//!
//! All waiting-room state is reconstructible: losing Redis loses queue
//! positions and grants, never inventory or orders.

use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SaleConfig;
use crate::models::Event;
use crate::utils::error::AppError;

/// Advance the wave cursor, at most once per interval, monotonically.
/// Concurrent pollers race here; the script makes the advance idempotent and
/// losers simply observe the winner's cursor.
///
/// KEYS[1] = wave_end, KEYS[2] = last_advance
/// ARGV[1] = total, ARGV[2] = now_ms, ARGV[3] = interval_ms, ARGV[4] = wave_size
const WAVE_ADVANCE_SCRIPT: &str = r"
local wave_end = tonumber(redis.call('GET', KEYS[1]))
local last = tonumber(redis.call('GET', KEYS[2]))
local total = tonumber(ARGV[1])
local now = tonumber(ARGV[2])
local interval = tonumber(ARGV[3])
local size = tonumber(ARGV[4])
if not wave_end then
  wave_end = math.min(total, size)
  redis.call('SET', KEYS[1], wave_end)
  redis.call('SET', KEYS[2], now)
  return wave_end
end
if total > wave_end and (not last or now - last >= interval) then
  wave_end = math.min(total, wave_end + size)
  redis.call('SET', KEYS[1], wave_end)
  redis.call('SET', KEYS[2], now)
end
return wave_end
";

/// What a queuer sees when polling.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StatusView {
    Waiting {
        on_sale_at: DateTime<Utc>,
        seconds_until_on_sale: i64,
    },
    SaleOpen {
        on_sale_at: DateTime<Utc>,
        position: u64,
        total: u64,
        can_enter: bool,
        eta_seconds: u64,
        paused: bool,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenRecord {
    user: String,
    joined_at: i64,
}

#[derive(Clone)]
pub struct WaitingRoom {
    conn: ConnectionManager,
    token_ttl_secs: u64,
    grant_ttl_secs: u64,
    wave_size: u64,
    wave_interval_secs: u64,
}

impl WaitingRoom {
    pub fn new(conn: ConnectionManager, sale: &SaleConfig) -> Self {
        Self {
            conn,
            token_ttl_secs: sale.token_ttl_secs,
            grant_ttl_secs: sale.grant_ttl_secs,
            wave_size: sale.wave_size.max(1),
            wave_interval_secs: sale.wave_interval_secs,
        }
    }

    fn queue_key(event_id: Uuid) -> String {
        format!("wr:{event_id}:queue")
    }

    fn token_key(event_id: Uuid, token: &str) -> String {
        format!("wr:{event_id}:token:{token}")
    }

    fn grant_key(event_id: Uuid, token: &str) -> String {
        format!("wr:{event_id}:grant:{token}")
    }

    fn wave_end_key(event_id: Uuid) -> String {
        format!("wr:{event_id}:wave_end")
    }

    fn last_advance_key(event_id: Uuid) -> String {
        format!("wr:{event_id}:last_advance")
    }

    /// Mint a token and append it to the event's queue.
    pub async fn join(&self, event_id: Uuid, user_id: &str) -> Result<String, AppError> {
        let mut conn = self.conn.clone();
        let token = Uuid::new_v4().simple().to_string();
        let now_ms = Utc::now().timestamp_millis();

        let record = serde_json::to_string(&TokenRecord {
            user: user_id.to_string(),
            joined_at: now_ms,
        })
        .map_err(|e| AppError::Internal(format!("token record serialization: {e}")))?;

        let queue_key = Self::queue_key(event_id);
        let _: () = redis::pipe()
            .atomic()
            .set_ex(
                Self::token_key(event_id, &token),
                record,
                self.token_ttl_secs,
            )
            .ignore()
            .zadd(&queue_key, &token, now_ms)
            .ignore()
            .expire(&queue_key, self.token_ttl_secs as i64)
            .ignore()
            .query_async(&mut conn)
            .await?;

        metrics::counter!("boxoffice_queue_joins_total").increment(1);
        tracing::debug!(event_id = %event_id, token = %token, "queue join");
        Ok(token)
    }

    /// Poll queue state for a token. When the sale is open this also drives
    /// the wave cursor forward and, for eligible tokens, issues the
    /// admission grant.
    pub async fn status(&self, event: &Event, token: &str) -> Result<StatusView, AppError> {
        let mut conn = self.conn.clone();

        let record: Option<String> = conn.get(Self::token_key(event.id, token)).await?;
        if record.is_none() {
            return Err(AppError::InvalidToken);
        }

        let now = Utc::now();
        if now < event.on_sale_at {
            return Ok(StatusView::Waiting {
                on_sale_at: event.on_sale_at,
                seconds_until_on_sale: (event.on_sale_at - now).num_seconds().max(0),
            });
        }

        let queue_key = Self::queue_key(event.id);
        let now_ms = now.timestamp_millis();
        let stale_before = now_ms - (self.token_ttl_secs as i64) * 1000;

        // Entries whose token TTL has lapsed leave the set, shrinking later
        // joiners' positions. Accepted fairness trade-off.
        let _: () = conn
            .zrembyscore(&queue_key, "-inf", stale_before)
            .await?;

        let rank: Option<i64> = conn.zrank(&queue_key, token).await?;
        let Some(rank) = rank else {
            return Err(AppError::InvalidToken);
        };
        let position = rank as u64 + 1;
        let total: i64 = conn.zcard(&queue_key).await?;
        let total = total.max(0) as u64;

        let wave_end: i64 = Script::new(WAVE_ADVANCE_SCRIPT)
            .key(Self::wave_end_key(event.id))
            .key(Self::last_advance_key(event.id))
            .arg(total)
            .arg(now_ms)
            .arg((self.wave_interval_secs as i64) * 1000)
            .arg(self.wave_size)
            .invoke_async(&mut conn)
            .await?;
        let wave_end = wave_end.max(0) as u64;

        let can_enter = position <= wave_end && !event.paused;
        if can_enter {
            let _: () = conn
                .set_ex(Self::grant_key(event.id, token), 1, self.grant_ttl_secs)
                .await?;
            tracing::debug!(
                event_id = %event.id,
                position = position,
                wave_end = wave_end,
                "admission grant issued"
            );
        }

        Ok(StatusView::SaleOpen {
            on_sale_at: event.on_sale_at,
            position,
            total,
            can_enter,
            eta_seconds: eta_seconds(position, wave_end, self.wave_size, self.wave_interval_secs),
            paused: event.paused,
        })
    }

    /// Whether `token` currently holds an admission grant for the event.
    pub async fn has_grant(&self, event_id: Uuid, token: &str) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(Self::grant_key(event_id, token)).await?;
        Ok(exists)
    }

    /// Whether `token` is a live waiting-room token for the event.
    pub async fn token_exists(&self, event_id: Uuid, token: &str) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(Self::token_key(event_id, token)).await?;
        Ok(exists)
    }

    /// Consume the grant after a successful reservation. Failed attempts keep
    /// the grant so the buyer can retry another quantity within its TTL.
    pub async fn consume_grant(&self, event_id: Uuid, token: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(Self::grant_key(event_id, token)).await?;
        Ok(())
    }

    /// Administrative reset: drop the queue, cursors, and every per-token
    /// record and grant.
    pub async fn clear(&self, event_id: Uuid) -> Result<u64, AppError> {
        let mut conn = self.conn.clone();
        let queue_key = Self::queue_key(event_id);
        let tokens: Vec<String> = conn.zrange(&queue_key, 0, -1).await?;

        for chunk in tokens.chunks(100) {
            let mut pipe = redis::pipe();
            for token in chunk {
                pipe.del(Self::token_key(event_id, token)).ignore();
                pipe.del(Self::grant_key(event_id, token)).ignore();
            }
            let _: () = pipe.query_async(&mut conn).await?;
        }

        let _: () = redis::pipe()
            .del(&queue_key)
            .ignore()
            .del(Self::wave_end_key(event_id))
            .ignore()
            .del(Self::last_advance_key(event_id))
            .ignore()
            .query_async(&mut conn)
            .await?;

        tracing::info!(event_id = %event_id, dropped = tokens.len(), "waiting room cleared");
        Ok(tokens.len() as u64)
    }

    /// Queue depth and current wave cursor, for the admin summary.
    pub async fn wave_state(&self, event_id: Uuid) -> Result<(u64, Option<u64>), AppError> {
        let mut conn = self.conn.clone();
        let depth: i64 = conn.zcard(Self::queue_key(event_id)).await?;
        let wave_end: Option<i64> = conn.get(Self::wave_end_key(event_id)).await?;
        Ok((depth.max(0) as u64, wave_end.map(|w| w.max(0) as u64)))
    }
}

/// Whole waves remaining before `position` is admitted, times the interval.
fn eta_seconds(position: u64, wave_end: u64, wave_size: u64, wave_interval_secs: u64) -> u64 {
    if position <= wave_end {
        return 0;
    }
    let behind = position - wave_end;
    behind.div_ceil(wave_size.max(1)) * wave_interval_secs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eta_is_zero_inside_the_wave() {
        assert_eq!(eta_seconds(1, 100, 100, 30), 0);
        assert_eq!(eta_seconds(100, 100, 100, 30), 0);
    }

    #[test]
    fn eta_rounds_up_to_whole_waves() {
        // One position past the cursor still waits a full interval.
        assert_eq!(eta_seconds(101, 100, 100, 30), 30);
        assert_eq!(eta_seconds(200, 100, 100, 30), 30);
        assert_eq!(eta_seconds(201, 100, 100, 30), 60);
        assert_eq!(eta_seconds(450, 100, 100, 30), 120);
    }

    #[test]
    fn eta_handles_degenerate_wave_size() {
        assert_eq!(eta_seconds(5, 0, 0, 30), 150);
    }

    #[test]
    fn keys_are_scoped_per_event_and_token() {
        let event = Uuid::new_v4();
        assert!(WaitingRoom::queue_key(event).contains(&event.to_string()));
        assert!(WaitingRoom::grant_key(event, "t1").ends_with(":grant:t1"));
        assert!(WaitingRoom::token_key(event, "t1").ends_with(":token:t1"));
    }
}

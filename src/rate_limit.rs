//! Sliding-window rate limiter over Redis sorted sets.
//!
//! Each (scope, key) pair gets a sorted set of attempt timestamps. An atomic
//! pipeline removes entries outside the window, counts what remains, records
//! the new attempt and refreshes the TTL, so concurrent requests cannot both
//! slip under the limit.
//!
//! The limiter fails OPEN: if Redis is unreachable the request is allowed,
//! so an ephemeral-store outage degrades pacing rather than denying checkout.

use std::time::Duration;

use chrono::Utc;
use redis::aio::ConnectionManager;

use crate::utils::error::AppError;

#[derive(Clone)]
pub struct RateLimiter {
    conn: ConnectionManager,
}

impl RateLimiter {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    fn window_key(scope: &str, key: &str) -> String {
        format!("rl:{scope}:{key}")
    }

    /// Check the (scope, key) window and record this attempt. Returns
    /// `rate_limited` with a retry hint when the caller is over `max_attempts`
    /// within `window`.
    pub async fn check_and_record(
        &self,
        scope: &str,
        key: &str,
        max_attempts: u32,
        window: Duration,
    ) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let rate_key = Self::window_key(scope, key);
        let now_ms = Utc::now().timestamp_millis();
        let window_ms = window.as_millis() as i64;
        let window_start = now_ms.saturating_sub(window_ms);
        let ttl_secs = (window.as_secs() as i64).max(1) * 2;

        let result: Result<(i64,), redis::RedisError> = redis::pipe()
            .atomic()
            .zrembyscore(&rate_key, 0, window_start)
            .ignore()
            .zcard(&rate_key)
            .zadd(&rate_key, now_ms, now_ms)
            .ignore()
            .expire(&rate_key, ttl_secs)
            .ignore()
            .query_async(&mut conn)
            .await;

        let count = match result {
            Ok((count,)) => count,
            Err(e) => {
                // Fail open: pacing is best-effort, checkout must stay up.
                tracing::warn!(
                    error = %e,
                    scope = scope,
                    "rate limiter unreachable, allowing request"
                );
                return Ok(());
            }
        };

        if count >= i64::from(max_attempts) {
            metrics::counter!("boxoffice_rate_limit_hits_total", "scope" => scope.to_string())
                .increment(1);
            tracing::warn!(
                scope = scope,
                key = key,
                attempts = count + 1,
                max_attempts = max_attempts,
                "rate limit exceeded"
            );
            return Err(AppError::RateLimited {
                retry_after_seconds: window.as_secs(),
            });
        }

        Ok(())
    }

    /// Drop the window for a key. Used by tests and admin resets.
    pub async fn reset(&self, scope: &str, key: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("DEL")
            .arg(Self::window_key(scope, key))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

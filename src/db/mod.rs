//! Shared data-access layer.
//!
//! Postgres is the source of truth for money-bearing state; Redis holds only
//! reconstructible, short-lived data. Both are reached through bounded pools
//! built here. Query modules are grouped by aggregate.

use std::time::Duration;

use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::{PostgresConfig, RedisConfig};

pub mod checkout;
pub mod events;
pub mod reservations;
pub mod tickets;

pub async fn connect_postgres(config: &PostgresConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout))
        .connect(&config.url)
        .await
}

/// Redis commands run with bounded timeouts and fail fast; callers that can
/// degrade (the rate limiter) treat errors as open.
pub async fn connect_redis(config: &RedisConfig) -> redis::RedisResult<ConnectionManager> {
    let client = redis::Client::open(config.url.as_str())?;
    let manager_config = ConnectionManagerConfig::new()
        .set_connection_timeout(Duration::from_secs(config.connect_timeout))
        .set_response_timeout(Duration::from_secs(config.response_timeout));
    ConnectionManager::new_with_config(client, manager_config).await
}

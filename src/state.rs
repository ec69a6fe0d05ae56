use sqlx::PgPool;

use crate::config::Config;
use crate::queue::WaitingRoom;
use crate::rate_limit::RateLimiter;
use crate::signing::TicketSigner;

/// Shared handler state. Every field is a cheap clone over pooled
/// connections or immutable configuration.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub waiting_room: WaitingRoom,
    pub rate_limiter: RateLimiter,
    pub signer: TicketSigner,
    pub config: Config,
}

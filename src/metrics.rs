//! Business counters.
//!
//! Recorded through the `metrics` facade; exposition (Prometheus or
//! otherwise) is wired up by the deployment, not here.
//!
//! # Exported counters
//!
//! - `boxoffice_queue_joins_total` - waiting-room joins
//! - `boxoffice_reservations_created_total` - holds placed
//! - `boxoffice_oversell_attempts_total` - holds rejected for inventory
//! - `boxoffice_purchase_limit_hits_total` - holds rejected by the per-event cap
//! - `boxoffice_orders_created_total` - paid orders
//! - `boxoffice_confirmations_total{outcome}` - confirm calls by outcome
//! - `boxoffice_rate_limit_hits_total{scope}` - requests turned away by pacing
//! - `boxoffice_holds_expired_total` - holds expired by the recovery worker
//! - `boxoffice_tickets_recovered_total` - tickets re-issued by the repair pass

use metrics::describe_counter;

/// Register descriptions for every business counter. Call once at startup,
/// before any counter is recorded.
pub fn register_business_metrics() {
    describe_counter!(
        "boxoffice_queue_joins_total",
        "Total waiting-room joins across all events"
    );
    describe_counter!(
        "boxoffice_reservations_created_total",
        "Total inventory holds successfully placed"
    );
    describe_counter!(
        "boxoffice_oversell_attempts_total",
        "Reservation attempts rejected for insufficient inventory"
    );
    describe_counter!(
        "boxoffice_purchase_limit_hits_total",
        "Reservation attempts rejected by the per-event purchase cap"
    );
    describe_counter!(
        "boxoffice_orders_created_total",
        "Paid orders created by confirmed checkouts"
    );
    describe_counter!(
        "boxoffice_confirmations_total",
        "Checkout confirmations by outcome (success, fail)"
    );
    describe_counter!(
        "boxoffice_rate_limit_hits_total",
        "Requests rejected by the sliding-window rate limiter, by scope"
    );
    describe_counter!(
        "boxoffice_holds_expired_total",
        "Stale holds expired by the recovery worker"
    );
    describe_counter!(
        "boxoffice_tickets_recovered_total",
        "Missing tickets re-issued by the recovery worker"
    );

    tracing::info!("business metrics registered");
}

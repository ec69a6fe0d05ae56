//! Recovery worker: a periodic sweep that expires stale holds and repairs
//! paid orders missing tickets.
//!
//! Both passes are idempotent, so overlapping or replicated runs are safe:
//! expired rows never re-match the expiry predicate, and a fully-ticketed
//! order is a no-op for the repair pass.

use std::time::Duration;

use sqlx::PgPool;
use uuid::Uuid;

use crate::db::tickets::issue_for_order;
use crate::models::Order;
use crate::signing::TicketSigner;

pub struct RecoveryWorker {
    pool: PgPool,
    signer: TicketSigner,
    interval: Duration,
}

/// Counts from one sweep, for logs and tests.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub holds_expired: u64,
    pub tickets_recovered: u64,
}

impl RecoveryWorker {
    pub fn new(pool: PgPool, signer: TicketSigner, interval: Duration) -> Self {
        Self {
            pool,
            signer,
            interval,
        }
    }

    /// Run forever at the configured interval. Cycle errors are logged and
    /// the loop continues; the next sweep picks up whatever was missed.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.run_cycle().await {
                Ok(report) => {
                    if report.holds_expired > 0 || report.tickets_recovered > 0 {
                        tracing::info!(
                            holds_expired = report.holds_expired,
                            tickets_recovered = report.tickets_recovered,
                            "recovery cycle completed"
                        );
                    }
                }
                Err(e) => {
                    tracing::error!(error = ?e, "recovery cycle failed");
                }
            }
        }
    }

    /// One sweep: two independent passes, each in its own transaction.
    pub async fn run_cycle(&self) -> Result<CycleReport, sqlx::Error> {
        let holds_expired = self.expire_stale_holds().await?;
        let tickets_recovered = self.repair_missing_tickets().await?;
        Ok(CycleReport {
            holds_expired,
            tickets_recovered,
        })
    }

    /// Pass A: flip active holds past their deadline to `expired`.
    /// Availability is computed from active unexpired rows, so the capacity
    /// accounting corrects itself the moment the status changes.
    async fn expire_stale_holds(&self) -> Result<u64, sqlx::Error> {
        let expired: Vec<(Uuid,)> = sqlx::query_as(
            "UPDATE reservations SET status = 'expired', updated_at = now()
             WHERE status = 'active' AND expires_at <= now()
             RETURNING id",
        )
        .fetch_all(&self.pool)
        .await?;

        let count = expired.len() as u64;
        if count > 0 {
            metrics::counter!("boxoffice_holds_expired_total").increment(count);
            tracing::info!(count = count, "expired stale holds");
        }
        Ok(count)
    }

    /// Pass B: every paid order must eventually own `quantity` tickets.
    /// Each shortfall is repaired under the order's row lock so a concurrent
    /// confirmation or second worker cannot over-issue.
    async fn repair_missing_tickets(&self) -> Result<u64, sqlx::Error> {
        let shortfall_orders: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT o.id FROM orders o
             LEFT JOIN (
                 SELECT order_id, COUNT(*) AS issued FROM tickets GROUP BY order_id
             ) t ON t.order_id = o.id
             WHERE o.status = 'paid' AND COALESCE(t.issued, 0) < o.quantity",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut recovered = 0u64;
        for (order_id,) in shortfall_orders {
            recovered += self.repair_order(order_id).await?;
        }

        if recovered > 0 {
            metrics::counter!("boxoffice_tickets_recovered_total").increment(recovered);
            tracing::warn!(count = recovered, "recovered missing tickets");
        }
        Ok(recovered)
    }

    async fn repair_order(&self, order_id: Uuid) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE id = $1 AND status = 'paid' FOR UPDATE",
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(order) = order else {
            // Settled differently between the scan and the lock.
            tx.rollback().await?;
            return Ok(0);
        };

        let issued: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tickets WHERE order_id = $1")
            .bind(order.id)
            .fetch_one(&mut *tx)
            .await?;

        let shortfall = i64::from(order.quantity) - issued;
        if shortfall <= 0 {
            tx.rollback().await?;
            return Ok(0);
        }

        let tickets = issue_for_order(&mut tx, &order, &self.signer, shortfall as i32).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            recovered = tickets.len(),
            "repaired order ticket shortfall"
        );
        Ok(tickets.len() as u64)
    }
}

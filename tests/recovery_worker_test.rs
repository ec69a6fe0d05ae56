//! Recovery worker integration tests: stale-hold expiry, ticket repair, and
//! sweep idempotence.

mod common;

use std::collections::HashSet;
use std::time::Duration as StdDuration;

use chrono::Duration;

use boxoffice_server::signing::TicketSigner;
use boxoffice_server::worker::RecoveryWorker;

use common::*;

fn worker(pool: sqlx::PgPool, sale: &boxoffice_server::config::SaleConfig) -> RecoveryWorker {
    RecoveryWorker::new(
        pool,
        TicketSigner::new(&sale.qr_secret),
        StdDuration::from_secs(60),
    )
}

#[tokio::test]
#[ignore] // Requires Postgres running
async fn sweep_expires_stale_holds_only() {
    let pool = test_pool().await;
    let sale = sale_config();
    let event = seed_on_sale_event(&pool).await;
    let tier = seed_tier(&pool, event.id, 10, 1000, 6).await;

    let stale = seed_reservation(
        &pool,
        event.id,
        tier.id,
        &unique_user(),
        1,
        "active",
        Duration::seconds(-30),
    )
    .await;
    let fresh = seed_reservation(
        &pool,
        event.id,
        tier.id,
        &unique_user(),
        1,
        "active",
        Duration::minutes(3),
    )
    .await;

    let report = worker(pool.clone(), &sale)
        .run_cycle()
        .await
        .expect("sweep");
    assert!(report.holds_expired >= 1);

    let stale_status: String =
        sqlx::query_scalar("SELECT status FROM reservations WHERE id = $1")
            .bind(stale.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    let fresh_status: String =
        sqlx::query_scalar("SELECT status FROM reservations WHERE id = $1")
            .bind(fresh.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(stale_status, "expired");
    assert_eq!(fresh_status, "active");
}

#[tokio::test]
#[ignore] // Requires Postgres running
async fn sweep_repairs_paid_orders_missing_tickets() {
    let pool = test_pool().await;
    let sale = sale_config();
    let event = seed_on_sale_event(&pool).await;
    let tier = seed_tier(&pool, event.id, 10, 2000, 6).await;
    let user = unique_user();

    // A paid order that crashed before ticket issuance.
    let reservation = seed_reservation(
        &pool,
        event.id,
        tier.id,
        &user,
        3,
        "converted",
        Duration::minutes(3),
    )
    .await;
    let session = seed_session(&pool, reservation.id, &user, "completed").await;
    let order = seed_paid_order(&pool, session.id, event.id, tier.id, &user, 3, 6000).await;
    assert_eq!(ticket_count(&pool, order.id).await, 0);

    let w = worker(pool.clone(), &sale);
    let report = w.run_cycle().await.expect("first sweep");
    assert_eq!(report.tickets_recovered, 3);
    assert_eq!(ticket_count(&pool, order.id).await, 3);

    // Codes are distinct and signatures verify.
    let tickets: Vec<(String, String)> =
        sqlx::query_as("SELECT code, qr_sig FROM tickets WHERE order_id = $1")
            .bind(order.id)
            .fetch_all(&pool)
            .await
            .unwrap();
    let signer = TicketSigner::new(&sale.qr_secret);
    let codes: HashSet<&str> = tickets.iter().map(|(c, _)| c.as_str()).collect();
    assert_eq!(codes.len(), 3);
    for (code, sig) in &tickets {
        assert!(signer.verify(code, order.id, event.id, sig));
    }

    // Running again changes nothing.
    let report = w.run_cycle().await.expect("second sweep");
    assert_eq!(report.tickets_recovered, 0);
    assert_eq!(ticket_count(&pool, order.id).await, 3);
}

#[tokio::test]
#[ignore] // Requires Postgres running
async fn sweep_tops_up_partial_ticket_shortfalls() {
    let pool = test_pool().await;
    let sale = sale_config();
    let event = seed_on_sale_event(&pool).await;
    let tier = seed_tier(&pool, event.id, 10, 2000, 6).await;
    let user = unique_user();

    let reservation = seed_reservation(
        &pool,
        event.id,
        tier.id,
        &user,
        3,
        "converted",
        Duration::minutes(3),
    )
    .await;
    let session = seed_session(&pool, reservation.id, &user, "completed").await;
    let order = seed_paid_order(&pool, session.id, event.id, tier.id, &user, 3, 6000).await;

    // One of three tickets made it out before the crash.
    sqlx::query(
        "INSERT INTO tickets (order_id, event_id, tier_id, user_id, code, qr_sig)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(order.id)
    .bind(event.id)
    .bind(tier.id)
    .bind(&user)
    .bind(format!("existing-{}", uuid::Uuid::new_v4().simple()))
    .bind("partial-sig")
    .execute(&pool)
    .await
    .unwrap();

    let report = worker(pool.clone(), &sale)
        .run_cycle()
        .await
        .expect("sweep");
    assert_eq!(report.tickets_recovered, 2);
    assert_eq!(ticket_count(&pool, order.id).await, 3);
}

#[tokio::test]
#[ignore] // Requires Postgres running
async fn repeated_sweeps_are_idempotent() {
    let pool = test_pool().await;
    let sale = sale_config();
    let event = seed_on_sale_event(&pool).await;
    let tier = seed_tier(&pool, event.id, 10, 1000, 6).await;

    seed_reservation(
        &pool,
        event.id,
        tier.id,
        &unique_user(),
        2,
        "active",
        Duration::seconds(-10),
    )
    .await;

    let w = worker(pool.clone(), &sale);
    let first = w.run_cycle().await.expect("first sweep");
    assert!(first.holds_expired >= 1);

    // Expired rows never re-match; later sweeps see a clean state.
    for _ in 0..3 {
        let report = w.run_cycle().await.expect("repeat sweep");
        assert_eq!(report.tickets_recovered, 0);
    }
}

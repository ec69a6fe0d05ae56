//! Reservation engine integration tests: oversell-freedom under concurrency
//! and purchase-cap enforcement.

mod common;

use futures::future::join_all;

use boxoffice_server::db::reservations::{self, ReserveRequest};
use boxoffice_server::db::checkout;
use boxoffice_server::signing::TicketSigner;
use boxoffice_server::utils::error::AppError;

use common::*;

#[tokio::test]
#[ignore] // Requires Postgres running
async fn concurrent_holds_never_oversell_a_tier() {
    let pool = test_pool().await;
    let sale = sale_config();
    let event = seed_on_sale_event(&pool).await;
    let tier = seed_tier(&pool, event.id, 1, 5000, 6).await;

    // Ten distinct buyers race for a single seat.
    let attempts = join_all((0..10).map(|_| {
        let pool = pool.clone();
        let sale = sale.clone();
        let user = unique_user();
        let event_id = event.id;
        let tier_id = tier.id;
        tokio::spawn(async move {
            reservations::reserve(
                &pool,
                &sale,
                ReserveRequest {
                    event_id,
                    tier_id,
                    user_id: &user,
                    quantity: 1,
                },
            )
            .await
        })
    }))
    .await;

    let mut successes = 0;
    let mut conflicts = 0;
    for result in attempts {
        match result.expect("task panicked") {
            Ok(_) => successes += 1,
            Err(AppError::InsufficientInventory { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(conflicts, 9);

    let active: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM reservations
         WHERE tier_id = $1 AND status = 'active' AND expires_at > now()",
    )
    .bind(tier.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(active, 1);
}

#[tokio::test]
#[ignore] // Requires Postgres running
async fn purchase_limit_ladder_caps_at_six() {
    let pool = test_pool().await;
    let sale = sale_config();
    let signer = TicketSigner::new(&sale.qr_secret);
    let event = seed_on_sale_event(&pool).await;
    let tier = seed_tier(&pool, event.id, 100, 2500, 6).await;
    let user = unique_user();

    let buy = |quantity: i32, key: String| {
        let pool = pool.clone();
        let sale = sale.clone();
        let signer = signer.clone();
        let user = user.clone();
        let event_id = event.id;
        let tier_id = tier.id;
        async move {
            let reservation = reservations::reserve(
                &pool,
                &sale,
                ReserveRequest {
                    event_id,
                    tier_id,
                    user_id: &user,
                    quantity,
                },
            )
            .await?;
            let (session, _) =
                checkout::create_session(&pool, &sale, &user, reservation.id, &key).await?;
            checkout::confirm(&pool, &signer, session.id, &user, true).await
        }
    };

    // Buy 3: fine.
    buy(3, "ladder-k1".to_string() + &user).await.expect("first purchase");

    // 3 paid + 4 requested busts the limit of 6, with the breakdown attached.
    let err = reservations::reserve(
        &pool,
        &sale,
        ReserveRequest {
            event_id: event.id,
            tier_id: tier.id,
            user_id: &user,
            quantity: 4,
        },
    )
    .await
    .expect_err("should exceed limit");
    match err {
        AppError::PurchaseLimitExceeded {
            already_purchased,
            requested,
            limit,
            ..
        } => {
            assert_eq!(already_purchased, 3);
            assert_eq!(requested, 4);
            assert_eq!(limit, 6);
        }
        other => panic!("unexpected error: {other}"),
    }

    // Boundary case p + q = 6 must succeed.
    buy(3, "ladder-k2".to_string() + &user).await.expect("second purchase");

    // Fully capped now; even one more is rejected.
    let err = reservations::reserve(
        &pool,
        &sale,
        ReserveRequest {
            event_id: event.id,
            tier_id: tier.id,
            user_id: &user,
            quantity: 1,
        },
    )
    .await
    .expect_err("limit reached");
    match err {
        AppError::PurchaseLimitExceeded {
            already_purchased, ..
        } => assert_eq!(already_purchased, 6),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
#[ignore] // Requires Postgres running
async fn one_active_hold_per_user_per_event() {
    let pool = test_pool().await;
    let sale = sale_config();
    let event = seed_on_sale_event(&pool).await;
    let tier = seed_tier(&pool, event.id, 50, 1000, 6).await;
    let user = unique_user();

    reservations::reserve(
        &pool,
        &sale,
        ReserveRequest {
            event_id: event.id,
            tier_id: tier.id,
            user_id: &user,
            quantity: 1,
        },
    )
    .await
    .expect("first hold");

    let err = reservations::reserve(
        &pool,
        &sale,
        ReserveRequest {
            event_id: event.id,
            tier_id: tier.id,
            user_id: &user,
            quantity: 1,
        },
    )
    .await
    .expect_err("second hold must be rejected");
    assert!(matches!(err, AppError::DoubleHold));
}

#[tokio::test]
#[ignore] // Requires Postgres running
async fn paused_event_rejects_new_holds() {
    let pool = test_pool().await;
    let sale = sale_config();
    let event = seed_event(&pool, "on_sale", true).await;
    let tier = seed_tier(&pool, event.id, 50, 1000, 6).await;
    let user = unique_user();

    let err = reservations::reserve(
        &pool,
        &sale,
        ReserveRequest {
            event_id: event.id,
            tier_id: tier.id,
            user_id: &user,
            quantity: 1,
        },
    )
    .await
    .expect_err("paused event");
    assert!(matches!(err, AppError::SalesPaused));
}

#[tokio::test]
#[ignore] // Requires Postgres running
async fn tier_per_user_limit_is_enforced() {
    let pool = test_pool().await;
    let sale = sale_config();
    let event = seed_on_sale_event(&pool).await;
    let tier = seed_tier(&pool, event.id, 50, 1000, 2).await;
    let user = unique_user();

    let err = reservations::reserve(
        &pool,
        &sale,
        ReserveRequest {
            event_id: event.id,
            tier_id: tier.id,
            user_id: &user,
            quantity: 3,
        },
    )
    .await
    .expect_err("over tier limit");
    assert!(matches!(
        err,
        AppError::PerTierLimitExceeded { requested: 3, limit: 2 }
    ));
}

#[tokio::test]
#[ignore] // Requires Postgres running
async fn expired_holds_free_capacity_without_worker_help() {
    let pool = test_pool().await;
    let sale = sale_config();
    let event = seed_on_sale_event(&pool).await;
    let tier = seed_tier(&pool, event.id, 1, 1000, 6).await;

    // A hold already past its deadline occupies nothing.
    let stale_user = unique_user();
    seed_reservation(
        &pool,
        event.id,
        tier.id,
        &stale_user,
        1,
        "active",
        chrono::Duration::seconds(-60),
    )
    .await;

    let user = unique_user();
    let reservation = reservations::reserve(
        &pool,
        &sale,
        ReserveRequest {
            event_id: event.id,
            tier_id: tier.id,
            user_id: &user,
            quantity: 1,
        },
    )
    .await
    .expect("stale hold must not block the seat");
    assert_eq!(reservation.quantity, 1);
}

//! Happy-path flow across both stores: queue -> grant -> hold -> checkout ->
//! verified tickets.

mod common;

use boxoffice_server::db::{checkout, events, reservations, tickets};
use boxoffice_server::db::reservations::ReserveRequest;
use boxoffice_server::queue::{StatusView, WaitingRoom};
use boxoffice_server::signing::TicketSigner;

use common::*;

#[tokio::test]
#[ignore] // Requires Postgres and Redis running
async fn join_reserve_pay_and_verify_tickets() {
    let pool = test_pool().await;
    let sale = sale_config();
    let signer = TicketSigner::new(&sale.qr_secret);
    let room = WaitingRoom::new(test_redis().await, &sale);

    let event = seed_on_sale_event(&pool).await;
    let tier = seed_tier(&pool, event.id, 10, 4500, 6).await;
    let user = unique_user();

    // Queue up; the sale is already open, so the first wave admits us.
    let token = room.join(event.id, &user).await.expect("join");
    let view = room.status(&event, &token).await.expect("status");
    match view {
        StatusView::SaleOpen {
            position, can_enter, ..
        } => {
            assert_eq!(position, 1);
            assert!(can_enter);
        }
        other => panic!("expected sale_open view, got {other:?}"),
    }
    assert!(room.has_grant(event.id, &token).await.unwrap());

    // Hold two seats, consuming the grant.
    let reservation = reservations::reserve(
        &pool,
        &sale,
        ReserveRequest {
            event_id: event.id,
            tier_id: tier.id,
            user_id: &user,
            quantity: 2,
        },
    )
    .await
    .expect("reserve");
    room.consume_grant(event.id, &token).await.expect("consume grant");

    let active = reservations::lookup_active(&pool, event.id, &user)
        .await
        .expect("lookup")
        .expect("active hold visible");
    assert_eq!(active.id, reservation.id);
    assert_eq!(active.quantity, 2);

    // Checkout: session, then a successful payment.
    let key = format!("e2e-{}", uuid::Uuid::new_v4().simple());
    let (session, replayed) =
        checkout::create_session(&pool, &sale, &user, reservation.id, &key)
            .await
            .expect("create session");
    assert!(!replayed);

    let outcome = checkout::confirm(&pool, &signer, session.id, &user, true)
        .await
        .expect("confirm");
    let order = outcome.order.expect("order");
    assert_eq!(order.total_price_cents, 9000);
    assert_eq!(outcome.tickets.len(), 2);

    // The buyer's wallet holds two verifiable tickets.
    let my_tickets = tickets::list_for_user(&pool, &user).await.expect("list");
    assert_eq!(my_tickets.len(), 2);
    for ticket in &my_tickets {
        assert!(signer.verify(&ticket.code, order.id, event.id, &ticket.qr_sig));
        assert_eq!(ticket.order_id, order.id);
    }

    // Sold seats show up in availability; the converted hold does not.
    let availability = events::availability(&pool, event.id).await.expect("availability");
    let tier_row = availability
        .iter()
        .find(|t| t.tier_id == tier.id)
        .expect("tier present");
    assert_eq!(tier_row.sold, 2);
    assert_eq!(tier_row.reserved, 0);
    assert_eq!(tier_row.available(), 8);
}

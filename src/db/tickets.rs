use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::{Order, Ticket};
use crate::signing::TicketSigner;
use crate::utils::error::AppError;

/// Insert `count` tickets for an order, each with a fresh code and QR
/// signature. `ON CONFLICT (code) DO NOTHING` keeps a concurrent recovery
/// sweep from ever double-inserting a code.
pub(crate) async fn issue_for_order(
    tx: &mut Transaction<'_, Postgres>,
    order: &Order,
    signer: &TicketSigner,
    count: i32,
) -> Result<Vec<Ticket>, sqlx::Error> {
    let mut tickets = Vec::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        let code = Uuid::new_v4().simple().to_string();
        let qr_sig = signer.sign(&code, order.id, order.event_id);
        let ticket = sqlx::query_as::<_, Ticket>(
            "INSERT INTO tickets (order_id, event_id, tier_id, user_id, code, qr_sig)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (code) DO NOTHING
             RETURNING *",
        )
        .bind(order.id)
        .bind(order.event_id)
        .bind(order.tier_id)
        .bind(&order.user_id)
        .bind(&code)
        .bind(&qr_sig)
        .fetch_optional(&mut **tx)
        .await?;
        if let Some(ticket) = ticket {
            tickets.push(ticket);
        }
    }
    Ok(tickets)
}

pub async fn list_for_order(pool: &PgPool, order_id: Uuid) -> Result<Vec<Ticket>, AppError> {
    let tickets = sqlx::query_as::<_, Ticket>(
        "SELECT * FROM tickets WHERE order_id = $1 ORDER BY created_at, code",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(tickets)
}

pub async fn list_for_user(pool: &PgPool, user_id: &str) -> Result<Vec<Ticket>, AppError> {
    let tickets = sqlx::query_as::<_, Ticket>(
        "SELECT * FROM tickets WHERE user_id = $1 ORDER BY created_at DESC, code",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(tickets)
}

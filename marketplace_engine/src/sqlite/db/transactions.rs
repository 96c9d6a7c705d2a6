use chrono::{DateTime, Utc};
use log::trace;
use sqlx::SqliteConnection;

use crate::db_types::{
    Actor,
    InvoiceCode,
    NewTransaction,
    PaymentId,
    TransactionRecord,
    TransactionStatusEvent,
    TransactionStatusType,
};

/// Inserts a transaction in the `Waited` status together with its first status event.
pub async fn insert_transaction(
    tx: NewTransaction,
    order_id: i64,
    payment_id: &PaymentId,
    user_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<TransactionRecord, sqlx::Error> {
    let record: TransactionRecord = sqlx::query_as(
        r#"
            INSERT INTO transactions (
                invoice_code,
                order_id,
                payment_id,
                user_id,
                merchant_id,
                merchant_domain,
                merchant_voucher_id,
                marketplace_voucher_id,
                status,
                payment_method,
                payment_details,
                address,
                cart_items,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *;
        "#,
    )
    .bind(tx.invoice_code.as_str())
    .bind(order_id)
    .bind(payment_id.as_str())
    .bind(user_id)
    .bind(tx.merchant_id)
    .bind(tx.merchant_domain)
    .bind(tx.merchant_voucher_id)
    .bind(tx.marketplace_voucher_id)
    .bind(TransactionStatusType::Waited)
    .bind(tx.payment_method)
    .bind(tx.payment_details)
    .bind(tx.address)
    .bind(tx.cart_items)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    insert_status_event(record.id, TransactionStatusType::Waited, Actor::User(user_id), None, now, conn).await?;
    trace!("🧾️ Transaction [{}] inserted with id {}", record.invoice_code, record.id);
    Ok(record)
}

pub async fn fetch_transaction(
    invoice: &InvoiceCode,
    conn: &mut SqliteConnection,
) -> Result<Option<TransactionRecord>, sqlx::Error> {
    let tx = sqlx::query_as("SELECT * FROM transactions WHERE invoice_code = $1")
        .bind(invoice.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(tx)
}

pub async fn fetch_transaction_by_id(
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<TransactionRecord>, sqlx::Error> {
    let tx = sqlx::query_as("SELECT * FROM transactions WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(tx)
}

pub async fn fetch_transactions_for_payment(
    payment_id: &PaymentId,
    conn: &mut SqliteConnection,
) -> Result<Vec<TransactionRecord>, sqlx::Error> {
    let txs = sqlx::query_as("SELECT * FROM transactions WHERE payment_id = $1 ORDER BY id")
        .bind(payment_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(txs)
}

pub async fn fetch_transactions_for_user(
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<TransactionRecord>, sqlx::Error> {
    let txs = sqlx::query_as("SELECT * FROM transactions WHERE user_id = $1 ORDER BY id DESC")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(txs)
}

/// Compare-and-swap on the stored status. The update only lands if the transaction is still in `expected`, so of two
/// concurrent writers exactly one wins. Returns `None` for the loser.
///
/// `receipt_number` and `cancel_notes` are only written when they are `Some`.
pub async fn update_status(
    id: i64,
    expected: TransactionStatusType,
    new_status: TransactionStatusType,
    receipt_number: Option<String>,
    cancel_notes: Option<String>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<TransactionRecord>, sqlx::Error> {
    let tx = sqlx::query_as(
        r#"
            UPDATE transactions SET
                status = $1,
                updated_at = $2,
                receipt_number = COALESCE($3, receipt_number),
                cancel_notes = COALESCE($4, cancel_notes)
            WHERE id = $5 AND status = $6
            RETURNING *;
        "#,
    )
    .bind(new_status)
    .bind(now)
    .bind(receipt_number)
    .bind(cancel_notes)
    .bind(id)
    .bind(expected)
    .fetch_optional(conn)
    .await?;
    Ok(tx)
}

pub async fn insert_status_event(
    transaction_id: i64,
    status: TransactionStatusType,
    actor: Actor,
    notes: Option<String>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<TransactionStatusEvent, sqlx::Error> {
    let event = sqlx::query_as(
        r#"
            INSERT INTO transaction_status_events (transaction_id, status, actor_type, actor_id, notes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(transaction_id)
    .bind(status)
    .bind(actor.actor_type())
    .bind(actor.id())
    .bind(notes)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(event)
}

pub async fn fetch_status_events(
    transaction_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<TransactionStatusEvent>, sqlx::Error> {
    let events = sqlx::query_as("SELECT * FROM transaction_status_events WHERE transaction_id = $1 ORDER BY id")
        .bind(transaction_id)
        .fetch_all(conn)
        .await?;
    Ok(events)
}

/// Transactions that have sat in `status` since before `cutoff`. Delivered transactions that the buyer has asked to
/// refund are excluded, since the refund negotiation owns them now.
pub async fn fetch_stale_transactions(
    status: TransactionStatusType,
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<TransactionRecord>, sqlx::Error> {
    let txs = sqlx::query_as(
        r#"
            SELECT * FROM transactions t
            WHERE t.status = $1 AND t.updated_at < $2
            AND NOT EXISTS (SELECT 1 FROM refund_requests r WHERE r.transaction_id = t.id)
            ORDER BY t.updated_at, t.id;
        "#,
    )
    .bind(status)
    .bind(cutoff)
    .fetch_all(conn)
    .await?;
    Ok(txs)
}

use chrono::{DateTime, Utc};
use log::trace;
use sqlx::SqliteConnection;

use crate::db_types::{NewPayment, Payment, PaymentId, PaymentStatus};

pub async fn insert_payment(
    payment: NewPayment,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Payment, sqlx::Error> {
    let status = payment.initial_status();
    let payment: Payment = sqlx::query_as(
        r#"
            INSERT INTO payments (payment_id, user_id, amount, method, channel, redirect_url, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *;
        "#,
    )
    .bind(payment.payment_id.as_str())
    .bind(payment.user_id)
    .bind(payment.amount)
    .bind(payment.method)
    .bind(payment.channel)
    .bind(payment.redirect_url)
    .bind(status)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await?;
    trace!("🧾️ Payment [{}] inserted as {}", payment.payment_id, payment.status);
    Ok(payment)
}

pub async fn fetch_payment(payment_id: &PaymentId, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE payment_id = $1")
        .bind(payment_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(payment)
}

/// Moves a pending payment to `status`. Returns `None` if the payment is no longer pending.
pub async fn settle_pending_payment(
    payment_id: &PaymentId,
    status: PaymentStatus,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as(
        r#"
            UPDATE payments SET status = $1, updated_at = $2
            WHERE payment_id = $3 AND status = $4
            RETURNING *;
        "#,
    )
    .bind(status)
    .bind(now)
    .bind(payment_id.as_str())
    .bind(PaymentStatus::Pending)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}

use chrono::{DateTime, Utc};
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{RefundMessage, RefundParty, RefundRequest, RefundRound, RoundStateType},
    state::{RoundState, RoundStep},
};

pub async fn insert_request(
    transaction_id: i64,
    reason: String,
    image_url: Option<String>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<RefundRequest, sqlx::Error> {
    let request: RefundRequest = sqlx::query_as(
        r#"
            INSERT INTO refund_requests (transaction_id, reason, image_url, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(transaction_id)
    .bind(reason)
    .bind(image_url)
    .bind(now)
    .fetch_one(conn)
    .await?;
    trace!("⚖️ Refund request #{} opened for transaction #{transaction_id}", request.id);
    Ok(request)
}

/// Opens round `round_no` of a request, awaiting the seller.
pub async fn insert_round(
    request_id: i64,
    round_no: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<RefundRound, sqlx::Error> {
    let round = sqlx::query_as(
        r#"
            INSERT INTO refund_rounds (refund_request_id, round_no, state, state_changed_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(request_id)
    .bind(round_no)
    .bind(RoundStateType::AwaitingSeller)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(round)
}

pub async fn fetch_request(request_id: i64, conn: &mut SqliteConnection) -> Result<Option<RefundRequest>, sqlx::Error> {
    let request =
        sqlx::query_as("SELECT * FROM refund_requests WHERE id = $1").bind(request_id).fetch_optional(conn).await?;
    Ok(request)
}

pub async fn fetch_request_for_transaction(
    transaction_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<RefundRequest>, sqlx::Error> {
    let request = sqlx::query_as("SELECT * FROM refund_requests WHERE transaction_id = $1")
        .bind(transaction_id)
        .fetch_optional(conn)
        .await?;
    Ok(request)
}

pub async fn fetch_rounds(request_id: i64, conn: &mut SqliteConnection) -> Result<Vec<RefundRound>, sqlx::Error> {
    let rounds = sqlx::query_as("SELECT * FROM refund_rounds WHERE refund_request_id = $1 ORDER BY round_no")
        .bind(request_id)
        .fetch_all(conn)
        .await?;
    Ok(rounds)
}

/// The latest round of a request. Only the latest round can ever be open.
pub async fn fetch_current_round(
    request_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<RefundRound>, sqlx::Error> {
    let round =
        sqlx::query_as("SELECT * FROM refund_rounds WHERE refund_request_id = $1 ORDER BY round_no DESC LIMIT 1")
            .bind(request_id)
            .fetch_optional(conn)
            .await?;
    Ok(round)
}

/// The number of rounds the buyer has rejected so far.
pub async fn count_rejections(request_id: i64, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM refund_rounds WHERE refund_request_id = $1 AND state = $2")
        .bind(request_id)
        .bind(RoundStateType::Rejected)
        .fetch_one(conn)
        .await?;
    Ok(count)
}

/// Writes a decision to `round`. The write is a compare-and-swap on the round's stored state and only lands if nobody
/// else has decided the round since it was read. Returns `None` if the swap failed.
pub async fn apply_step(
    round: &RefundRound,
    step: &RoundStep,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<RefundRound>, sqlx::Error> {
    let new_state = step.round_state();
    let ruling = match new_state {
        RoundState::AwaitingBuyer { ruling } => Some(ruling),
        _ => round.admin_ruling,
    };
    let closed_at = step.resolution().map(|_| now);
    let sql = format!(
        r#"
            UPDATE refund_rounds SET
                state = $1,
                admin_ruling = $2,
                resolution = $3,
                closed_at = $4,
                state_changed_at = $5,
                {stamp} = $6
            WHERE id = $7 AND state = $8 AND {stamp} IS NULL
            RETURNING *;
        "#,
        stamp = step.stamp.column()
    );
    let updated = sqlx::query_as(&sql)
        .bind(new_state.state_type())
        .bind(ruling)
        .bind(step.resolution())
        .bind(closed_at)
        .bind(now)
        .bind(now)
        .bind(round.id)
        .bind(round.state)
        .fetch_optional(conn)
        .await?;
    Ok(updated)
}

pub async fn insert_message(
    request_id: i64,
    party: RefundParty,
    body: String,
    image_url: Option<String>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<RefundMessage, sqlx::Error> {
    let message = sqlx::query_as(
        r#"
            INSERT INTO refund_messages (refund_request_id, party, body, image_url, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(request_id)
    .bind(party)
    .bind(body)
    .bind(image_url)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(message)
}

pub async fn fetch_messages(request_id: i64, conn: &mut SqliteConnection) -> Result<Vec<RefundMessage>, sqlx::Error> {
    let messages = sqlx::query_as("SELECT * FROM refund_messages WHERE refund_request_id = $1 ORDER BY id")
        .bind(request_id)
        .fetch_all(conn)
        .await?;
    Ok(messages)
}

pub async fn fetch_stale_rounds(
    state: RoundStateType,
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<RefundRound>, sqlx::Error> {
    let rounds = sqlx::query_as(
        r#"
            SELECT * FROM refund_rounds
            WHERE state = $1 AND state_changed_at < $2 AND closed_at IS NULL
            ORDER BY state_changed_at, id;
        "#,
    )
    .bind(state)
    .bind(cutoff)
    .fetch_all(conn)
    .await?;
    Ok(rounds)
}

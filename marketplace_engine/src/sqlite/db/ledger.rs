//! Balance movements for buyer wallets and merchant holding accounts.
//!
//! Both kinds of account behave identically: created lazily on first credit, one history row per movement, and debits
//! that check and update the balance in a single conditional statement.
use chrono::{DateTime, Utc};
use log::debug;
use mkt_common::Rupiah;
use sqlx::{sqlite::SqliteRow, FromRow, SqliteConnection};

use crate::{
    db_types::{
        HoldingAccount,
        HoldingAccountHistory,
        InvoiceCode,
        LedgerDirection,
        LedgerEntry,
        MarketplaceSubsidy,
        Wallet,
        WalletHistory,
    },
    traits::LedgerError,
};

struct AccountTable {
    accounts: &'static str,
    owner: &'static str,
    history: &'static str,
    history_fk: &'static str,
}

const WALLETS: AccountTable =
    AccountTable { accounts: "wallets", owner: "user_id", history: "wallet_history", history_fk: "wallet_id" };

const HOLDING_ACCOUNTS: AccountTable = AccountTable {
    accounts: "merchant_holding_accounts",
    owner: "merchant_id",
    history: "merchant_holding_account_history",
    history_fk: "holding_account_id",
};

trait LedgerAccount: for<'r> FromRow<'r, SqliteRow> + Send + Unpin {
    fn id(&self) -> i64;
}

impl LedgerAccount for Wallet {
    fn id(&self) -> i64 {
        self.id
    }
}

impl LedgerAccount for HoldingAccount {
    fn id(&self) -> i64 {
        self.id
    }
}

fn check_amount(amount: Rupiah) -> Result<(), LedgerError> {
    if amount.is_negative() {
        return Err(LedgerError::NegativeAmount(amount));
    }
    Ok(())
}

async fn fetch_account<A: LedgerAccount>(
    table: &AccountTable,
    owner_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<A>, sqlx::Error> {
    let sql = format!("SELECT * FROM {} WHERE {} = $1", table.accounts, table.owner);
    sqlx::query_as(&sql).bind(owner_id).fetch_optional(conn).await
}

async fn insert_history(
    table: &AccountTable,
    account_id: i64,
    direction: LedgerDirection,
    entry: LedgerEntry,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    let sql = format!(
        "INSERT INTO {} ({}, direction, amount, entry_type, payment_id, invoice_code, created_at) VALUES ($1, $2, $3, \
         $4, $5, $6, $7)",
        table.history, table.history_fk
    );
    sqlx::query(&sql)
        .bind(account_id)
        .bind(direction)
        .bind(entry.amount)
        .bind(entry.entry_type)
        .bind(entry.payment_id.map(|p| p.0))
        .bind(entry.invoice_code.map(|i| i.0))
        .bind(now)
        .execute(conn)
        .await?;
    Ok(())
}

async fn credit<A: LedgerAccount>(
    table: &AccountTable,
    owner_id: i64,
    entry: LedgerEntry,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<A, LedgerError> {
    check_amount(entry.amount)?;
    let create = format!(
        "INSERT INTO {} ({}, balance, created_at, updated_at) VALUES ($1, 0, $2, $3) ON CONFLICT ({}) DO NOTHING",
        table.accounts, table.owner, table.owner
    );
    sqlx::query(&create).bind(owner_id).bind(now).bind(now).execute(&mut *conn).await?;
    let update = format!(
        "UPDATE {} SET balance = balance + $1, updated_at = $2 WHERE {} = $3 RETURNING *",
        table.accounts, table.owner
    );
    let account: A = sqlx::query_as(&update).bind(entry.amount).bind(now).bind(owner_id).fetch_one(&mut *conn).await?;
    debug!("💰️ Credited {} to {} of #{owner_id} ({})", entry.amount, table.accounts, entry.entry_type);
    insert_history(table, account.id(), LedgerDirection::Credit, entry, now, conn).await?;
    Ok(account)
}

async fn debit<A: LedgerAccount>(
    table: &AccountTable,
    owner_id: i64,
    entry: LedgerEntry,
    now: DateTime<Utc>,
    not_found: LedgerError,
    conn: &mut SqliteConnection,
) -> Result<A, LedgerError> {
    check_amount(entry.amount)?;
    let update = format!(
        "UPDATE {} SET balance = balance - $1, updated_at = $2 WHERE {} = $3 AND balance >= $4 RETURNING *",
        table.accounts, table.owner
    );
    let account: Option<A> = sqlx::query_as(&update)
        .bind(entry.amount)
        .bind(now)
        .bind(owner_id)
        .bind(entry.amount)
        .fetch_optional(&mut *conn)
        .await?;
    let Some(account) = account else {
        // Only read to build the error message. The balance is never written from this value.
        let sql = format!("SELECT balance FROM {} WHERE {} = $1", table.accounts, table.owner);
        let available: Option<Rupiah> = sqlx::query_scalar(&sql).bind(owner_id).fetch_optional(&mut *conn).await?;
        return match available {
            Some(available) => Err(LedgerError::InsufficientBalance { requested: entry.amount, available }),
            None => Err(not_found),
        };
    };
    debug!("💰️ Debited {} from {} of #{owner_id} ({})", entry.amount, table.accounts, entry.entry_type);
    insert_history(table, account.id(), LedgerDirection::Debit, entry, now, conn).await?;
    Ok(account)
}

//--------------------------------------       Wallets       ---------------------------------------------------------
pub async fn fetch_wallet(user_id: i64, conn: &mut SqliteConnection) -> Result<Option<Wallet>, sqlx::Error> {
    fetch_account(&WALLETS, user_id, conn).await
}

pub async fn credit_wallet(
    user_id: i64,
    entry: LedgerEntry,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Wallet, LedgerError> {
    credit(&WALLETS, user_id, entry, now, conn).await
}

pub async fn debit_wallet(
    user_id: i64,
    entry: LedgerEntry,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Wallet, LedgerError> {
    debit(&WALLETS, user_id, entry, now, LedgerError::WalletNotFound(user_id), conn).await
}

pub async fn wallet_history(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<WalletHistory>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT h.* FROM wallet_history h JOIN wallets w ON h.wallet_id = w.id
            WHERE w.user_id = $1
            ORDER BY h.id;
        "#,
    )
    .bind(user_id)
    .fetch_all(conn)
    .await
}

//--------------------------------------   Holding accounts  ---------------------------------------------------------
pub async fn fetch_holding_account(
    merchant_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<HoldingAccount>, sqlx::Error> {
    fetch_account(&HOLDING_ACCOUNTS, merchant_id, conn).await
}

pub async fn credit_holding_account(
    merchant_id: i64,
    entry: LedgerEntry,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<HoldingAccount, LedgerError> {
    credit(&HOLDING_ACCOUNTS, merchant_id, entry, now, conn).await
}

pub async fn debit_holding_account(
    merchant_id: i64,
    entry: LedgerEntry,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<HoldingAccount, LedgerError> {
    debit(&HOLDING_ACCOUNTS, merchant_id, entry, now, LedgerError::HoldingAccountNotFound(merchant_id), conn).await
}

pub async fn holding_account_history(
    merchant_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<HoldingAccountHistory>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT h.* FROM merchant_holding_account_history h
            JOIN merchant_holding_accounts a ON h.holding_account_id = a.id
            WHERE a.merchant_id = $1
            ORDER BY h.id;
        "#,
    )
    .bind(merchant_id)
    .fetch_all(conn)
    .await
}

//--------------------------------------      Subsidies      ---------------------------------------------------------
pub async fn insert_subsidy(
    transaction_id: i64,
    invoice_code: &InvoiceCode,
    marketplace_voucher_id: Option<i64>,
    amount: Rupiah,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<MarketplaceSubsidy, sqlx::Error> {
    let subsidy = sqlx::query_as(
        r#"
            INSERT INTO marketplace_subsidies (transaction_id, invoice_code, marketplace_voucher_id, amount, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(transaction_id)
    .bind(invoice_code.as_str())
    .bind(marketplace_voucher_id)
    .bind(amount)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(subsidy)
}

pub async fn fetch_subsidies(conn: &mut SqliteConnection) -> Result<Vec<MarketplaceSubsidy>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM marketplace_subsidies ORDER BY id").fetch_all(conn).await
}

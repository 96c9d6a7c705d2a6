use chrono::{DateTime, Utc};
use mkt_common::Rupiah;
use thiserror::Error;

use crate::db_types::{HoldingAccount, HoldingAccountHistory, LedgerEntry, MarketplaceSubsidy, Wallet, WalletHistory};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Insufficient balance. Requested {requested}, but only {available} is available")]
    InsufficientBalance { requested: Rupiah, available: Rupiah },
    #[error("User #{0} has no wallet")]
    WalletNotFound(i64),
    #[error("Merchant #{0} has no holding account")]
    HoldingAccountNotFound(i64),
    #[error("Ledger amounts cannot be negative: {0}")]
    NegativeAmount(Rupiah),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}

/// The ledger mover. Every method changes exactly one balance and writes exactly one history row, atomically.
///
/// Debits never read a balance and then write it back. The balance check and the update are a single conditional
/// statement, so two concurrent debits can never overdraw an account.
#[allow(async_fn_in_trait)]
pub trait LedgerManagement {
    async fn fetch_wallet(&self, user_id: i64) -> Result<Option<Wallet>, LedgerError>;

    async fn wallet_history(&self, user_id: i64) -> Result<Vec<WalletHistory>, LedgerError>;

    async fn fetch_holding_account(&self, merchant_id: i64) -> Result<Option<HoldingAccount>, LedgerError>;

    async fn holding_account_history(&self, merchant_id: i64) -> Result<Vec<HoldingAccountHistory>, LedgerError>;

    /// Credits the user's wallet, creating the wallet if needed.
    async fn credit_wallet(&self, user_id: i64, entry: LedgerEntry, now: DateTime<Utc>) -> Result<Wallet, LedgerError>;

    async fn debit_wallet(&self, user_id: i64, entry: LedgerEntry, now: DateTime<Utc>) -> Result<Wallet, LedgerError>;

    /// Credits the merchant's holding account, creating the account if needed.
    async fn credit_merchant_holding_account(
        &self,
        merchant_id: i64,
        entry: LedgerEntry,
        now: DateTime<Utc>,
    ) -> Result<HoldingAccount, LedgerError>;

    async fn debit_merchant_holding_account(
        &self,
        merchant_id: i64,
        entry: LedgerEntry,
        now: DateTime<Utc>,
    ) -> Result<HoldingAccount, LedgerError>;

    /// The marketplace voucher nominals the marketplace has paid for, oldest first.
    async fn fetch_subsidies(&self) -> Result<Vec<MarketplaceSubsidy>, LedgerError>;
}

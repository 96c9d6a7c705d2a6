use std::{fmt::Debug, sync::Arc};

use log::*;
use mkt_common::Rupiah;

use crate::{
    db_types::{
        HoldingAccount,
        HoldingAccountHistory,
        LedgerEntry,
        LedgerEntryType,
        MarketplaceSubsidy,
        Wallet,
        WalletHistory,
    },
    helpers::Clock,
    traits::{LedgerError, LedgerManagement},
};

/// `LedgerApi` is the read side of the ledger, plus the two movements that start outside the marketplace: topping up
/// a buyer's wallet and withdrawing from a merchant's holding account.
///
/// Movements caused by checkouts and settlements are made by the storage backend, inside the storage transaction of
/// the status change that causes them.
pub struct LedgerApi<B> {
    db: B,
    clock: Arc<dyn Clock>,
}

impl<B> Debug for LedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerApi")
    }
}

impl<B> LedgerApi<B> {
    pub fn new(db: B, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }
}

impl<B> LedgerApi<B>
where B: LedgerManagement
{
    /// The user's wallet. A user that has never been credited has an empty balance.
    pub async fn wallet_balance(&self, user_id: i64) -> Result<Rupiah, LedgerError> {
        let wallet = self.db.fetch_wallet(user_id).await?;
        Ok(wallet.map(|w| w.balance).unwrap_or_default())
    }

    pub async fn fetch_wallet(&self, user_id: i64) -> Result<Wallet, LedgerError> {
        self.db.fetch_wallet(user_id).await?.ok_or(LedgerError::WalletNotFound(user_id))
    }

    pub async fn wallet_history(&self, user_id: i64) -> Result<Vec<WalletHistory>, LedgerError> {
        self.db.wallet_history(user_id).await
    }

    pub async fn holding_balance(&self, merchant_id: i64) -> Result<Rupiah, LedgerError> {
        let account = self.db.fetch_holding_account(merchant_id).await?;
        Ok(account.map(|a| a.balance).unwrap_or_default())
    }

    pub async fn fetch_holding_account(&self, merchant_id: i64) -> Result<HoldingAccount, LedgerError> {
        self.db.fetch_holding_account(merchant_id).await?.ok_or(LedgerError::HoldingAccountNotFound(merchant_id))
    }

    pub async fn holding_account_history(&self, merchant_id: i64) -> Result<Vec<HoldingAccountHistory>, LedgerError> {
        self.db.holding_account_history(merchant_id).await
    }

    /// Adds funds from outside the marketplace to a buyer's wallet.
    pub async fn top_up_wallet(&self, user_id: i64, amount: Rupiah) -> Result<Wallet, LedgerError> {
        let entry = LedgerEntry::new(amount, LedgerEntryType::TopUp);
        let wallet = self.db.credit_wallet(user_id, entry, self.clock.now()).await?;
        info!("💰️ Wallet of user #{user_id} topped up by {amount}. New balance: {}", wallet.balance);
        Ok(wallet)
    }

    /// Pays out merchant funds to an external account. Fails with [`LedgerError::InsufficientBalance`] and changes
    /// nothing if the holding account does not cover the amount.
    pub async fn withdraw_from_holding_account(
        &self,
        merchant_id: i64,
        amount: Rupiah,
    ) -> Result<HoldingAccount, LedgerError> {
        let entry = LedgerEntry::new(amount, LedgerEntryType::Withdrawal);
        match self.db.debit_merchant_holding_account(merchant_id, entry, self.clock.now()).await {
            Ok(account) => {
                info!("💰️ Merchant #{merchant_id} withdrew {amount}. Remaining balance: {}", account.balance);
                Ok(account)
            },
            Err(e) => {
                warn!("💰️ Merchant #{merchant_id} could not withdraw {amount}. {e}");
                Err(e)
            },
        }
    }

    pub async fn fetch_subsidies(&self) -> Result<Vec<MarketplaceSubsidy>, LedgerError> {
        self.db.fetch_subsidies().await
    }

    /// The total the marketplace has paid towards marketplace vouchers.
    pub async fn total_subsidy(&self) -> Result<Rupiah, LedgerError> {
        let subsidies = self.db.fetch_subsidies().await?;
        Ok(subsidies.iter().map(|s| s.amount).sum())
    }
}

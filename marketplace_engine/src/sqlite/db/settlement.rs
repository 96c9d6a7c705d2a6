//! Money and inventory side effects of terminal status changes.
//!
//! These functions never commit. The backend calls them inside the same storage transaction as the status write that
//! triggered them, so a settlement either lands together with its status change or not at all.
use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{LedgerEntry, LedgerEntryType, TransactionRecord},
    sqlite::db::{catalog, ledger},
    traits::MarketplaceError,
};

/// Where the money of a transaction goes when it reaches a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// The buyer is credited what they paid and the items go back into stock.
    ToBuyer(LedgerEntryType),
    /// The merchant's holding account is credited and the marketplace voucher is journaled as a subsidy.
    ToMerchant,
    /// Nothing was paid, so only the stock is restored.
    RestockOnly,
    /// The buyer is credited what they paid. The stock was already restored when the transaction was canceled.
    RefundOnly(LedgerEntryType),
}

pub async fn settle(
    tx: &TransactionRecord,
    settlement: Settlement,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), MarketplaceError> {
    match settlement {
        Settlement::ToBuyer(entry_type) => {
            refund_buyer(tx, entry_type, now, &mut *conn).await?;
            restock_items(tx, conn).await
        },
        Settlement::ToMerchant => settle_to_merchant(tx, now, conn).await,
        Settlement::RestockOnly => restock_items(tx, conn).await,
        Settlement::RefundOnly(entry_type) => refund_buyer(tx, entry_type, now, conn).await,
    }
}

async fn refund_buyer(
    tx: &TransactionRecord,
    entry_type: LedgerEntryType,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), MarketplaceError> {
    let details = tx.payment_details()?;
    let entry = LedgerEntry::new(details.buyer_refund(), entry_type)
        .with_payment_id(tx.payment_id.clone())
        .with_invoice(tx.invoice_code.clone());
    ledger::credit_wallet(tx.user_id, entry, now, conn).await?;
    debug!("💰️ Transaction [{}] settled to buyer #{}: {}", tx.invoice_code, tx.user_id, details.buyer_refund());
    Ok(())
}

async fn settle_to_merchant(
    tx: &TransactionRecord,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), MarketplaceError> {
    let details = tx.payment_details()?;
    let entry = LedgerEntry::new(details.merchant_payout(), LedgerEntryType::Sale)
        .with_payment_id(tx.payment_id.clone())
        .with_invoice(tx.invoice_code.clone());
    ledger::credit_holding_account(tx.merchant_id, entry, now, &mut *conn).await?;
    let subsidy = details.marketplace_voucher_nominal;
    if subsidy.value() > 0 {
        ledger::insert_subsidy(tx.id, &tx.invoice_code, tx.marketplace_voucher_id, subsidy, now, conn).await?;
    }
    debug!(
        "💰️ Transaction [{}] settled to merchant #{}: {} (marketplace subsidy {subsidy})",
        tx.invoice_code,
        tx.merchant_id,
        details.merchant_payout()
    );
    Ok(())
}

async fn restock_items(tx: &TransactionRecord, conn: &mut SqliteConnection) -> Result<(), MarketplaceError> {
    for item in tx.cart_items()? {
        catalog::restock(item.product_id, item.variant_id, item.quantity, &mut *conn).await?;
    }
    Ok(())
}

//! `SqliteDatabase` is a concrete implementation of a marketplace engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module. Every state-changing method opens one storage transaction, runs the relevant guard against the state it
//! reads inside that transaction, and commits the status write together with its ledger side effects.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use mkt_common::Rupiah;
use sqlx::{SqliteConnection, SqlitePool};

use super::db::{
    addresses,
    catalog,
    db_url,
    ledger,
    new_pool,
    orders,
    payments,
    refunds,
    settlement::{self, Settlement},
    transactions,
    vouchers,
};
use crate::{
    db_types::{
        Actor,
        Beneficiary,
        City,
        HoldingAccount,
        HoldingAccountHistory,
        InvoiceCode,
        LedgerEntry,
        LedgerEntryType,
        MarketplaceSubsidy,
        MarketplaceVoucher,
        Merchant,
        MerchantCourier,
        MerchantVoucher,
        NewOrder,
        Order,
        OrderCode,
        OrderItem,
        Payment,
        PaymentId,
        PaymentMethodType,
        PaymentStatus,
        Product,
        Promotion,
        RefundDecision,
        RefundMessage,
        RefundParty,
        RefundRequest,
        RefundRound,
        RoundStateType,
        TransactionRecord,
        TransactionStatusEvent,
        TransactionStatusType,
        UserAddress,
        Variant,
        Wallet,
        WalletHistory,
    },
    mkt_api::checkout_api::CheckoutError,
    refund_objects::{NewRefundMessage, RefundCase, RoundOutcome},
    state::{
        advance_round,
        check_merchant_transition,
        check_transition,
        check_user_transition,
        RefundError,
        RoundState,
        RoundTransition,
        TransitionError,
    },
    traits::{
        AddressManagement,
        CatalogManagement,
        LedgerError,
        LedgerManagement,
        MarketplaceDatabase,
        MarketplaceError,
        NewCheckout,
        PaymentError,
        PaymentManagement,
        PaymentSettlement,
        VoucherManagement,
    },
    transaction_objects::{CheckoutResult, StatusChange, TransitionOutcome, UserAction},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using `MKT_DATABASE_URL` to locate the database
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

//--------------------------------------   Shared tx logic   ---------------------------------------------------------

/// Runs the guard for `change` against the transaction as it is stored right now, then writes the new status with a
/// compare-and-swap, appends the status event and applies the settlement that the new status calls for.
///
/// `actor` is recorded on the status event. It is usually `change.actor()`, except for refund closures, where the
/// party whose decision closed the case is recorded.
async fn apply_change(
    record: TransactionRecord,
    change: StatusChange,
    actor: Actor,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<TransitionOutcome, MarketplaceError> {
    let invoice = record.invoice_code.clone();
    let current = record.status;
    let target = change.target();
    let mut receipt_number = None;
    match &change {
        StatusChange::Merchant { merchant_id, update } => {
            if *merchant_id != record.merchant_id {
                return Err(MarketplaceError::TransactionNotFound(invoice));
            }
            check_merchant_transition(current, update)?;
            if target == TransactionStatusType::Processed {
                let payment = payment_for(&record, &mut *conn).await?;
                if payment.status != PaymentStatus::Paid {
                    return Err(TransitionError::PaymentNotSettled(invoice).into());
                }
            }
            if target == TransactionStatusType::OnDelivery {
                receipt_number = update.receipt_number.as_ref().map(|r| r.trim().to_string());
            }
        },
        StatusChange::User { user_id, action } => {
            if *user_id != record.user_id {
                return Err(MarketplaceError::TransactionNotFound(invoice));
            }
            check_user_transition(current, action)?;
            if matches!(action, UserAction::RequestRefund(_)) &&
                refunds::fetch_request_for_transaction(record.id, &mut *conn).await?.is_some()
            {
                return Err(RefundError::RefundAlreadyRequested(invoice).into());
            }
        },
        StatusChange::System { target, .. } => check_transition(current, *target)?,
    }
    let settlement = match target {
        TransactionStatusType::Canceled => {
            let payment = payment_for(&record, &mut *conn).await?;
            match payment.status {
                PaymentStatus::Paid => Some(Settlement::ToBuyer(LedgerEntryType::Cancellation)),
                PaymentStatus::Pending | PaymentStatus::Failed => Some(Settlement::RestockOnly),
            }
        },
        TransactionStatusType::Completed => Some(Settlement::ToMerchant),
        TransactionStatusType::Refunded => Some(Settlement::ToBuyer(LedgerEntryType::Refund)),
        _ => None,
    };
    let notes = change.notes();
    let cancel_notes = if target == TransactionStatusType::Canceled { notes.clone() } else { None };
    let updated = transactions::update_status(record.id, current, target, receipt_number, cancel_notes, now, &mut *conn)
        .await?
        .ok_or_else(|| TransitionError::AlreadyProcessed(invoice.clone()))?;
    transactions::insert_status_event(record.id, target, actor, notes, now, &mut *conn).await?;
    if let Some(settlement) = settlement {
        settlement::settle(&updated, settlement, now, &mut *conn).await?;
    }
    let refund_request = match change {
        StatusChange::User { action: UserAction::RequestRefund(reason), .. } => {
            let request = refunds::insert_request(record.id, reason.reason, reason.image_url, now, &mut *conn).await?;
            refunds::insert_round(request.id, 1, now, &mut *conn).await?;
            Some(request)
        },
        _ => None,
    };
    debug!("🔄️ Transaction [{invoice}] moved from {current} to {target} by {actor}");
    Ok(TransitionOutcome { old_status: current, transaction: updated, refund_request })
}

async fn payment_for(record: &TransactionRecord, conn: &mut SqliteConnection) -> Result<Payment, MarketplaceError> {
    payments::fetch_payment(&record.payment_id, conn)
        .await?
        .ok_or_else(|| PaymentError::PaymentNotFound(record.payment_id.clone()).into())
}

/// Checks that `actor` may speak for `party` in the refund request on `record`. The system (the escalation scheduler)
/// may act as any party.
fn check_party(
    actor: Actor,
    party: RefundParty,
    request_id: i64,
    record: &TransactionRecord,
) -> Result<(), RefundError> {
    let allowed = match (actor, party) {
        (Actor::System, _) => true,
        (Actor::User(id), RefundParty::Buyer) => id == record.user_id,
        (Actor::Merchant(id), RefundParty::Seller) => id == record.merchant_id,
        (Actor::Admin(_), RefundParty::Admin) => true,
        _ => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(RefundError::NotAParty { actor, party, request_id })
    }
}

async fn refund_context(
    request_id: i64,
    conn: &mut SqliteConnection,
) -> Result<(RefundRequest, TransactionRecord, RefundRound), MarketplaceError> {
    let request =
        refunds::fetch_request(request_id, &mut *conn).await?.ok_or(RefundError::RefundRequestNotFound(request_id))?;
    let record = transactions::fetch_transaction_by_id(request.transaction_id, &mut *conn)
        .await?
        .ok_or_else(|| MarketplaceError::NotFound(format!("Transaction #{}", request.transaction_id)))?;
    let round = refunds::fetch_current_round(request_id, &mut *conn).await?.ok_or_else(|| {
        RefundError::InconsistentRound { round_id: request_id, reason: "the refund request has no rounds".into() }
    })?;
    Ok((request, record, round))
}

//--------------------------------------  MarketplaceDatabase ---------------------------------------------------------
impl MarketplaceDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder, now: DateTime<Utc>) -> Result<Order, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, now, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn fetch_order_by_code(&self, code: &OrderCode) -> Result<Option<Order>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_code(code, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_order_items(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn create_checkout(&self, checkout: NewCheckout) -> Result<CheckoutResult, MarketplaceError> {
        let NewCheckout {
            order_id,
            order_code,
            user_id,
            payment,
            transactions: new_transactions,
            reservations,
            merchant_voucher_ids,
            marketplace_voucher_id,
            now,
        } = checkout;
        let mut tx = self.pool.begin().await?;
        if !orders::deactivate_order(order_id, &mut tx).await? {
            return Err(CheckoutError::OrderNotActive(order_code).into());
        }
        let payment = payments::insert_payment(payment, now, &mut tx).await?;
        trace!("🧾️ Checkout of order [{order_code}]: payment [{}] saved", payment.payment_id);
        for r in reservations {
            if !catalog::decrement_stock(r.product_id, r.variant_id, r.quantity, &mut tx).await? {
                return Err(CheckoutError::InsufficientStock {
                    product_id: r.product_id,
                    variant_id: r.variant_id,
                    requested: r.quantity,
                }
                .into());
            }
            if let Some(promotion_id) = r.promotion_id {
                if !catalog::consume_promotion_quota(promotion_id, r.quantity, &mut tx).await? {
                    return Err(CheckoutError::PromotionExhausted(promotion_id).into());
                }
            }
        }
        for voucher_id in merchant_voucher_ids {
            if !vouchers::consume_merchant_voucher(voucher_id, &mut tx).await? {
                return Err(CheckoutError::VoucherExhausted(voucher_id).into());
            }
        }
        if let Some(voucher_id) = marketplace_voucher_id {
            if !vouchers::consume_marketplace_voucher(voucher_id, &mut tx).await? {
                return Err(CheckoutError::VoucherExhausted(voucher_id).into());
            }
        }
        let mut records = Vec::with_capacity(new_transactions.len());
        for new_tx in new_transactions {
            let record =
                transactions::insert_transaction(new_tx, order_id, &payment.payment_id, user_id, now, &mut tx).await?;
            records.push(record);
        }
        if payment.method == PaymentMethodType::Wallet {
            let entry =
                LedgerEntry::new(payment.amount, LedgerEntryType::Payment).with_payment_id(payment.payment_id.clone());
            ledger::debit_wallet(user_id, entry, now, &mut tx).await?;
        }
        tx.commit().await?;
        debug!("🧾️ Order [{order_code}] checked out into {} transactions", records.len());
        Ok(CheckoutResult { payment, transactions: records })
    }

    async fn fetch_transaction(&self, invoice: &InvoiceCode) -> Result<Option<TransactionRecord>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let record = transactions::fetch_transaction(invoice, &mut conn).await?;
        Ok(record)
    }

    async fn fetch_transactions_for_payment(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Vec<TransactionRecord>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let records = transactions::fetch_transactions_for_payment(payment_id, &mut conn).await?;
        Ok(records)
    }

    async fn fetch_transactions_for_user(&self, user_id: i64) -> Result<Vec<TransactionRecord>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let records = transactions::fetch_transactions_for_user(user_id, &mut conn).await?;
        Ok(records)
    }

    async fn fetch_status_events(&self, transaction_id: i64) -> Result<Vec<TransactionStatusEvent>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let events = transactions::fetch_status_events(transaction_id, &mut conn).await?;
        Ok(events)
    }

    async fn transition_transaction(
        &self,
        invoice: &InvoiceCode,
        change: StatusChange,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let record = transactions::fetch_transaction(invoice, &mut tx)
            .await?
            .ok_or_else(|| MarketplaceError::TransactionNotFound(invoice.clone()))?;
        let actor = change.actor();
        let outcome = apply_change(record, change, actor, now, &mut tx).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    async fn fetch_stale_transactions(
        &self,
        status: TransactionStatusType,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<TransactionRecord>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let records = transactions::fetch_stale_transactions(status, cutoff, &mut conn).await?;
        Ok(records)
    }

    async fn fetch_refund_request(&self, request_id: i64) -> Result<Option<RefundRequest>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let request = refunds::fetch_request(request_id, &mut conn).await?;
        Ok(request)
    }

    async fn fetch_refund_request_for_transaction(
        &self,
        transaction_id: i64,
    ) -> Result<Option<RefundRequest>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let request = refunds::fetch_request_for_transaction(transaction_id, &mut conn).await?;
        Ok(request)
    }

    async fn fetch_refund_case(&self, request_id: i64) -> Result<Option<RefundCase>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let Some(request) = refunds::fetch_request(request_id, &mut conn).await? else {
            return Ok(None);
        };
        let rounds = refunds::fetch_rounds(request_id, &mut conn).await?;
        let messages = refunds::fetch_messages(request_id, &mut conn).await?;
        Ok(Some(RefundCase { request, rounds, messages }))
    }

    async fn advance_refund_round(
        &self,
        request_id: i64,
        party: RefundParty,
        decision: RefundDecision,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<RoundOutcome, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let (request, record, round) = refund_context(request_id, &mut tx).await?;
        check_party(actor, party, request_id, &record)?;
        let state = RoundState::from_round(&round)?;
        let prior_rejections = refunds::count_rejections(request_id, &mut tx).await?;
        let step = advance_round(request_id, &state, party, decision, prior_rejections)?;
        let updated =
            refunds::apply_step(&round, &step, now, &mut tx).await?.ok_or(RefundError::ConcurrentDecision(request_id))?;
        trace!("⚖️ Refund request #{request_id} round {}: {party} {decision} -> {}", round.round_no, updated.state);
        let new_round = match step.transition {
            RoundTransition::NewRound => Some(refunds::insert_round(request_id, round.round_no + 1, now, &mut tx).await?),
            _ => None,
        };
        let resolution = step.resolution();
        let transaction = match resolution {
            Some(resolution) => {
                let target = match resolution.beneficiary() {
                    Beneficiary::Buyer => TransactionStatusType::Refunded,
                    Beneficiary::Merchant => TransactionStatusType::Completed,
                };
                let change = StatusChange::System { target, notes: Some(resolution.to_string()) };
                let outcome = apply_change(record, change, actor, now, &mut tx).await?;
                info!("⚖️ Refund request #{request_id} closed: {resolution}");
                outcome.transaction
            },
            None => record,
        };
        tx.commit().await?;
        Ok(RoundOutcome { request, round: updated, new_round, resolution, transaction })
    }

    async fn append_refund_message(
        &self,
        request_id: i64,
        actor: Actor,
        message: NewRefundMessage,
        now: DateTime<Utc>,
    ) -> Result<RefundMessage, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let (_, record, round) = refund_context(request_id, &mut tx).await?;
        check_party(actor, message.party, request_id, &record)?;
        if round.is_closed() {
            return Err(RefundError::RefundRequestClosed(request_id).into());
        }
        let message =
            refunds::insert_message(request_id, message.party, message.body, message.image_url, now, &mut tx).await?;
        tx.commit().await?;
        Ok(message)
    }

    async fn fetch_stale_refund_rounds(
        &self,
        state: RoundStateType,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<RefundRound>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let rounds = refunds::fetch_stale_rounds(state, cutoff, &mut conn).await?;
        Ok(rounds)
    }
}

//--------------------------------------  PaymentManagement  ---------------------------------------------------------
impl PaymentManagement for SqliteDatabase {
    async fn fetch_payment(&self, payment_id: &PaymentId) -> Result<Option<Payment>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment(payment_id, &mut conn).await?;
        Ok(payment)
    }

    async fn settle_payment(
        &self,
        payment_id: &PaymentId,
        amount: Rupiah,
        success: bool,
        now: DateTime<Utc>,
    ) -> Result<PaymentSettlement, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::fetch_payment(payment_id, &mut tx)
            .await?
            .ok_or_else(|| PaymentError::PaymentNotFound(payment_id.clone()))?;
        if payment.amount != amount {
            return Err(PaymentError::PaymentAmountMismatch {
                payment_id: payment_id.clone(),
                expected: payment.amount,
                received: amount,
            }
            .into());
        }
        let already_settled = |status| PaymentError::PaymentAlreadySettled { payment_id: payment_id.clone(), status };
        if payment.status != PaymentStatus::Pending {
            return Err(already_settled(payment.status).into());
        }
        let status = if success { PaymentStatus::Paid } else { PaymentStatus::Failed };
        let payment = payments::settle_pending_payment(payment_id, status, now, &mut tx)
            .await?
            .ok_or_else(|| already_settled(status))?;
        let records = transactions::fetch_transactions_for_payment(payment_id, &mut tx).await?;
        let mut canceled = Vec::new();
        for record in records {
            match (success, record.status) {
                // The buyer canceled before the money arrived and the stock went back then. Only the money returns.
                (true, TransactionStatusType::Canceled) => {
                    settlement::settle(&record, Settlement::RefundOnly(LedgerEntryType::Cancellation), now, &mut tx)
                        .await?;
                },
                (false, status) if !status.is_terminal() => {
                    let change = StatusChange::System {
                        target: TransactionStatusType::Canceled,
                        notes: Some("Payment failed".to_string()),
                    };
                    canceled.push(apply_change(record, change, Actor::System, now, &mut tx).await?);
                },
                _ => {},
            }
        }
        tx.commit().await?;
        info!("🧾️ Payment [{payment_id}] settled as {status}. {} transactions canceled", canceled.len());
        Ok(PaymentSettlement { payment, canceled })
    }
}

//--------------------------------------   LedgerManagement  ---------------------------------------------------------
impl LedgerManagement for SqliteDatabase {
    async fn fetch_wallet(&self, user_id: i64) -> Result<Option<Wallet>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let wallet = ledger::fetch_wallet(user_id, &mut conn).await?;
        Ok(wallet)
    }

    async fn wallet_history(&self, user_id: i64) -> Result<Vec<WalletHistory>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let history = ledger::wallet_history(user_id, &mut conn).await?;
        Ok(history)
    }

    async fn fetch_holding_account(&self, merchant_id: i64) -> Result<Option<HoldingAccount>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let account = ledger::fetch_holding_account(merchant_id, &mut conn).await?;
        Ok(account)
    }

    async fn holding_account_history(&self, merchant_id: i64) -> Result<Vec<HoldingAccountHistory>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let history = ledger::holding_account_history(merchant_id, &mut conn).await?;
        Ok(history)
    }

    async fn credit_wallet(&self, user_id: i64, entry: LedgerEntry, now: DateTime<Utc>) -> Result<Wallet, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let wallet = ledger::credit_wallet(user_id, entry, now, &mut tx).await?;
        tx.commit().await?;
        Ok(wallet)
    }

    async fn debit_wallet(&self, user_id: i64, entry: LedgerEntry, now: DateTime<Utc>) -> Result<Wallet, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let wallet = ledger::debit_wallet(user_id, entry, now, &mut tx).await?;
        tx.commit().await?;
        Ok(wallet)
    }

    async fn credit_merchant_holding_account(
        &self,
        merchant_id: i64,
        entry: LedgerEntry,
        now: DateTime<Utc>,
    ) -> Result<HoldingAccount, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let account = ledger::credit_holding_account(merchant_id, entry, now, &mut tx).await?;
        tx.commit().await?;
        Ok(account)
    }

    async fn debit_merchant_holding_account(
        &self,
        merchant_id: i64,
        entry: LedgerEntry,
        now: DateTime<Utc>,
    ) -> Result<HoldingAccount, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let account = ledger::debit_holding_account(merchant_id, entry, now, &mut tx).await?;
        tx.commit().await?;
        Ok(account)
    }

    async fn fetch_subsidies(&self) -> Result<Vec<MarketplaceSubsidy>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let subsidies = ledger::fetch_subsidies(&mut conn).await?;
        Ok(subsidies)
    }
}

//--------------------------------------  Catalog & addresses ---------------------------------------------------------
impl CatalogManagement for SqliteDatabase {
    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::fetch_product(product_id, &mut conn).await?)
    }

    async fn fetch_variant(&self, variant_id: i64) -> Result<Option<Variant>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::fetch_variant(variant_id, &mut conn).await?)
    }

    async fn fetch_variants_for_product(&self, product_id: i64) -> Result<Vec<Variant>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::fetch_variants_for_product(product_id, &mut conn).await?)
    }

    async fn fetch_promotion_for_product(&self, product_id: i64) -> Result<Option<Promotion>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::fetch_promotion_for_product(product_id, &mut conn).await?)
    }

    async fn fetch_merchant(&self, merchant_id: i64) -> Result<Option<Merchant>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::fetch_merchant(merchant_id, &mut conn).await?)
    }

    async fn fetch_merchant_for_user(&self, user_id: i64) -> Result<Option<Merchant>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::fetch_merchant_for_user(user_id, &mut conn).await?)
    }

    async fn fetch_merchant_courier(
        &self,
        merchant_id: i64,
        courier_code: &str,
    ) -> Result<Option<MerchantCourier>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::fetch_merchant_courier(merchant_id, courier_code, &mut conn).await?)
    }

    async fn decrement_stock(
        &self,
        product_id: i64,
        variant_id: Option<i64>,
        quantity: i64,
    ) -> Result<(), MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        if catalog::decrement_stock(product_id, variant_id, quantity, &mut conn).await? {
            Ok(())
        } else {
            Err(CheckoutError::InsufficientStock { product_id, variant_id, requested: quantity }.into())
        }
    }

    async fn restock(&self, product_id: i64, variant_id: Option<i64>, quantity: i64) -> Result<(), MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        catalog::restock(product_id, variant_id, quantity, &mut conn).await?;
        Ok(())
    }
}

impl AddressManagement for SqliteDatabase {
    async fn fetch_city(&self, city_id: i64) -> Result<Option<City>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(addresses::fetch_city(city_id, &mut conn).await?)
    }

    async fn fetch_default_address(&self, user_id: i64) -> Result<Option<UserAddress>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(addresses::fetch_default_address(user_id, &mut conn).await?)
    }

    async fn fetch_user_address(&self, user_id: i64, address_id: i64) -> Result<Option<UserAddress>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(addresses::fetch_user_address(user_id, address_id, &mut conn).await?)
    }
}

impl VoucherManagement for SqliteDatabase {
    async fn fetch_merchant_voucher_by_code(
        &self,
        merchant_id: i64,
        code: &str,
    ) -> Result<Option<MerchantVoucher>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(vouchers::fetch_merchant_voucher_by_code(merchant_id, code, &mut conn).await?)
    }

    async fn fetch_marketplace_voucher_by_code(&self, code: &str) -> Result<Option<MarketplaceVoucher>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(vouchers::fetch_marketplace_voucher_by_code(code, &mut conn).await?)
    }
}

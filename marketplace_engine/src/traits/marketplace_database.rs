use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    db_types::{
        Actor,
        InvoiceCode,
        NewOrder,
        Order,
        OrderCode,
        OrderItem,
        PaymentId,
        RefundDecision,
        RefundMessage,
        RefundParty,
        RefundRequest,
        RefundRound,
        RoundStateType,
        TransactionRecord,
        TransactionStatusEvent,
        TransactionStatusType,
    },
    mkt_api::{checkout_api::CheckoutError, order_summary_api::OrderSummaryError},
    refund_objects::{NewRefundMessage, RefundCase, RoundOutcome},
    snapshots::SnapshotError,
    state::{RefundError, TransitionError},
    traits::{
        AddressManagement,
        CatalogManagement,
        DeliveryQuoteError,
        LedgerError,
        LedgerManagement,
        NewCheckout,
        PaymentError,
        PaymentManagement,
        PaymentProviderError,
        VoucherManagement,
    },
    transaction_objects::{CheckoutResult, StatusChange, TransitionOutcome},
};

/// The coarse classification of every engine error. The boundary layer maps these to user-visible responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Bad input. Never retried automatically.
    Validation,
    /// The entity is not in a state that allows the request. Re-fetch before retrying.
    StateConflict,
    /// A courier or payment gateway call failed or timed out. Safe to retry; nothing was written.
    ExternalDependency,
    /// A balance could not be moved.
    Ledger,
    /// Persisted data could not be read back. Indicates corruption and must not be retried blindly.
    DataIntegrity,
    Storage,
    NotFound,
}

#[derive(Debug, Clone, Error)]
pub enum MarketplaceError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Refund(#[from] RefundError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    OrderSummary(#[from] OrderSummaryError),
    #[error(transparent)]
    Checkout(#[from] CheckoutError),
    #[error(transparent)]
    Payment(#[from] PaymentError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    DeliveryQuote(#[from] DeliveryQuoteError),
    #[error(transparent)]
    PaymentProvider(#[from] PaymentProviderError),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Transaction {0} does not exist")]
    TransactionNotFound(InvoiceCode),
    #[error("{0} does not exist")]
    NotFound(String),
}

impl From<sqlx::Error> for MarketplaceError {
    fn from(e: sqlx::Error) -> Self {
        MarketplaceError::DatabaseError(e.to_string())
    }
}

impl MarketplaceError {
    pub fn kind(&self) -> ErrorKind {
        use ErrorKind::*;
        match self {
            MarketplaceError::Transition(e) => match e {
                TransitionError::CannotReverse { .. }
                | TransitionError::CannotSkip { .. }
                | TransitionError::PaymentNotSettled(_)
                | TransitionError::AlreadyProcessed(_) => StateConflict,
                TransitionError::ForbiddenTransition(_)
                | TransitionError::ReceiptNumberEmpty
                | TransitionError::CancelNotesEmpty
                | TransitionError::AmbiguousUserAction => Validation,
            },
            MarketplaceError::Refund(e) => match e {
                RefundError::RefundRequestNotFound(_) => NotFound,
                RefundError::InconsistentRound { .. } => DataIntegrity,
                RefundError::NotAParty { .. } | RefundError::UnsupportedDecision { .. } => Validation,
                _ => StateConflict,
            },
            MarketplaceError::Ledger(LedgerError::DatabaseError(_)) => Storage,
            MarketplaceError::Ledger(_) => Ledger,
            MarketplaceError::OrderSummary(OrderSummaryError::OrderNotFound(_)) => NotFound,
            MarketplaceError::OrderSummary(_) => Validation,
            MarketplaceError::Checkout(e) => match e {
                CheckoutError::SummaryNotCheckoutable { .. } | CheckoutError::NegativeTotal(_) => Validation,
                _ => StateConflict,
            },
            MarketplaceError::Payment(e) => match e {
                PaymentError::PaymentNotFound(_) => NotFound,
                PaymentError::PaymentAmountMismatch { .. } => Validation,
                PaymentError::PaymentAlreadySettled { .. } => StateConflict,
            },
            MarketplaceError::Snapshot(_) => DataIntegrity,
            MarketplaceError::DeliveryQuote(_) | MarketplaceError::PaymentProvider(_) => ExternalDependency,
            MarketplaceError::DatabaseError(_) => Storage,
            MarketplaceError::TransactionNotFound(_) | MarketplaceError::NotFound(_) => NotFound,
        }
    }

    /// Only external dependency failures are worth retrying without first re-reading state.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::ExternalDependency
    }
}

/// This trait defines the highest level of behaviour for marketplace storage backends.
///
/// This behaviour includes:
/// * Reading orders and their items, and persisting a checkout atomically.
/// * Changing transaction status. The backend runs the transition guard, the status write and all ledger side
///   effects in a single storage transaction, and uses a compare-and-swap on the stored status so that concurrent
///   writers cannot both succeed.
/// * Running refund negotiations, with the same atomicity guarantees.
/// * Finding entities the escalation scheduler should act on.
#[allow(async_fn_in_trait)]
pub trait MarketplaceDatabase:
    Clone + CatalogManagement + AddressManagement + VoucherManagement + LedgerManagement + PaymentManagement
{
    /// The URL of the database
    fn url(&self) -> &str;

    async fn insert_order(&self, order: NewOrder, now: DateTime<Utc>) -> Result<Order, MarketplaceError>;

    async fn fetch_order_by_code(&self, code: &OrderCode) -> Result<Option<Order>, MarketplaceError>;

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, MarketplaceError>;

    /// Persists a checkout in a single atomic transaction:
    /// * deactivates the order, so that it cannot be checked out twice,
    /// * inserts the payment and one transaction per merchant, each with its initial `Waited` status event,
    /// * takes the reserved units out of stock and consumes promotion and voucher quota,
    /// * debits the buyer's wallet for wallet payments.
    ///
    /// If any step fails, nothing is written.
    async fn create_checkout(&self, checkout: NewCheckout) -> Result<CheckoutResult, MarketplaceError>;

    async fn fetch_transaction(&self, invoice: &InvoiceCode) -> Result<Option<TransactionRecord>, MarketplaceError>;

    async fn fetch_transactions_for_payment(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Vec<TransactionRecord>, MarketplaceError>;

    async fn fetch_transactions_for_user(&self, user_id: i64) -> Result<Vec<TransactionRecord>, MarketplaceError>;

    /// The status log of a transaction, oldest first.
    async fn fetch_status_events(&self, transaction_id: i64) -> Result<Vec<TransactionStatusEvent>, MarketplaceError>;

    /// Applies a status change. See the trait documentation for the atomicity guarantees.
    ///
    /// * Merchant and user changes must come from the transaction's own merchant or buyer.
    /// * Cancellation settles to the buyer: a paid total is credited back to the buyer's wallet and stock is restored.
    /// * Completion settles to the merchant's holding account and records the marketplace subsidy.
    /// * A buyer's refund request opens the refund negotiation.
    async fn transition_transaction(
        &self,
        invoice: &InvoiceCode,
        change: StatusChange,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, MarketplaceError>;

    /// Transactions that have been in `status` since before `cutoff`, oldest first.
    async fn fetch_stale_transactions(
        &self,
        status: TransactionStatusType,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<TransactionRecord>, MarketplaceError>;

    async fn fetch_refund_request(&self, request_id: i64) -> Result<Option<RefundRequest>, MarketplaceError>;

    async fn fetch_refund_request_for_transaction(
        &self,
        transaction_id: i64,
    ) -> Result<Option<RefundRequest>, MarketplaceError>;

    async fn fetch_refund_case(&self, request_id: i64) -> Result<Option<RefundCase>, MarketplaceError>;

    /// Applies a party's decision to the current round of a refund request.
    ///
    /// If the decision closes the case, the parent transaction moves to `Refunded` or `Completed` and the money is
    /// settled accordingly, in the same storage transaction.
    async fn advance_refund_round(
        &self,
        request_id: i64,
        party: RefundParty,
        decision: RefundDecision,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<RoundOutcome, MarketplaceError>;

    async fn append_refund_message(
        &self,
        request_id: i64,
        actor: Actor,
        message: NewRefundMessage,
        now: DateTime<Utc>,
    ) -> Result<RefundMessage, MarketplaceError>;

    /// Open rounds that have been in `state` since before `cutoff`, oldest first.
    async fn fetch_stale_refund_rounds(
        &self,
        state: RoundStateType,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<RefundRound>, MarketplaceError>;
}

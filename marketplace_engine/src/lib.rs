//! Marketplace Transaction Engine
//!
//! The marketplace engine is the order-to-fulfillment core of a multi-merchant e-commerce marketplace. It takes a
//! buyer's order, prices it, turns it into one immutable transaction per merchant, and then drives each transaction
//! through to completion, cancellation or refund while keeping wallets and merchant holding accounts in lockstep.
//!
//! The library is divided into the following sections:
//! 1. Storage contracts ([`mod@traits`]) and the SQLite backend that implements them ([`SqliteDatabase`]). You should
//!    never need to access the database directly. Instead, use the public API objects described below. The exception
//!    is the data types used in the database. These are defined in the [`mod@db_types`] module and are public.
//! 2. The pure state machines ([`mod@state`]) that decide which transaction status changes and refund negotiation
//!    moves are legal. The storage backend runs these guards inside the same database transaction as the write they
//!    protect.
//! 3. The public API ([`OrderSummaryApi`], [`CheckoutApi`], [`TransactionFlowApi`], [`RefundApi`], [`LedgerApi`],
//!    [`PaymentApi`] and [`EscalationApi`]). This provides the functionality that the surrounding HTTP layer and the
//!    background scheduler call into.
//!
//! The engine also emits events when transactions are created, change status, or when a refund case closes. A simple
//! pub-sub hook system ([`mod@events`]) lets you react to these without touching engine internals.
pub mod db_types;
pub mod events;
pub mod helpers;
mod mkt_api;
pub mod snapshots;
pub mod state;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(all(feature = "sqlite", any(feature = "test_utils", test)))]
pub mod test_utils;

pub use mkt_api::{
    checkout_api::{CheckoutApi, CheckoutError},
    escalation_api::{EscalationApi, EscalationPolicy, SweepReport},
    ledger_api::LedgerApi,
    order_objects,
    order_summary_api::{OrderSummaryApi, OrderSummaryError},
    payment_api::PaymentApi,
    refund_api::RefundApi,
    refund_objects,
    transaction_flow_api::TransactionFlowApi,
    transaction_objects,
};
#[cfg(feature = "sqlite")]
pub use sqlite::{db as sqlite_db, SqliteDatabase};
pub use traits::{
    AddressManagement,
    CatalogManagement,
    DeliveryQuoteProvider,
    ErrorKind,
    LedgerManagement,
    MarketplaceDatabase,
    MarketplaceError,
    PaymentGateway,
    PaymentManagement,
    VoucherManagement,
};

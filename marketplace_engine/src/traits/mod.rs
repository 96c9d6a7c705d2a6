//! # Storage and collaborator contracts
//!
//! This module defines the interfaces the transaction engine depends on. The engine's API objects are generic over
//! these traits, so a backend only has to implement them to be usable.
//!
//! ## Storage
//! * [`MarketplaceDatabase`] is the highest-level contract. It covers orders, checkouts, transactions and refund
//!   negotiations, and it is where the state machine guards run inside a storage transaction.
//! * [`CatalogManagement`], [`AddressManagement`] and [`VoucherManagement`] are the read side of the catalog, the
//!   address book and voucher definitions. The engine never edits these, apart from stock and quota bookkeeping.
//! * [`LedgerManagement`] is the only way to move money between wallets and merchant holding accounts.
//! * [`PaymentManagement`] settles gateway payments when the gateway calls back.
//!
//! ## External collaborators
//! * [`DeliveryQuoteProvider`] quotes courier services for a parcel.
//! * [`PaymentGateway`] starts a payment with the external gateway.
//!
//! Both are network calls. The engine wraps every call in a timeout and reports expiry as a typed error.
mod address_management;
mod catalog_management;
mod data_objects;
mod delivery;
mod ledger_management;
mod marketplace_database;
mod payment_gateway;
mod payment_management;
mod voucher_management;

pub use address_management::AddressManagement;
pub use catalog_management::CatalogManagement;
pub use data_objects::{NewCheckout, PaymentSettlement, StockReservation};
pub use delivery::{DeliveryQuote, DeliveryQuoteError, DeliveryQuoteProvider, DeliveryQuoteRequest};
pub use ledger_management::{LedgerError, LedgerManagement};
pub use marketplace_database::{ErrorKind, MarketplaceDatabase, MarketplaceError};
pub use payment_gateway::{InitiatedPayment, PaymentGateway, PaymentInitiation, PaymentProviderError};
pub use payment_management::{PaymentError, PaymentManagement};
pub use voucher_management::VoucherManagement;

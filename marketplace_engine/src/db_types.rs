use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use mkt_common::Rupiah;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(String);

//--------------------------------------      OrderCode      ---------------------------------------------------------
/// The unique, human-readable code of a buyer's order. One order fans out into one transaction per merchant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderCode(pub String);

impl From<String> for OrderCode {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderCode {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OrderCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------     InvoiceCode     ---------------------------------------------------------
/// The unique, human-readable identifier of a single per-merchant transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct InvoiceCode(pub String);

impl From<String> for InvoiceCode {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for InvoiceCode {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for InvoiceCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl InvoiceCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------      PaymentId      ---------------------------------------------------------
/// The payment identifier. For gateway payments this is the id issued by the gateway; wallet payments get a locally
/// generated one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct PaymentId(pub String);

impl From<String> for PaymentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PaymentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PaymentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------       Catalog       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Merchant {
    pub id: i64,
    /// The marketplace user that owns this merchant account.
    pub user_id: i64,
    pub name: String,
    pub domain: String,
    pub city_id: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A courier a merchant ships with, and the service codes of that courier the merchant has enabled.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MerchantCourier {
    pub id: i64,
    pub merchant_id: i64,
    pub courier_code: String,
    /// Comma-separated list of enabled service codes, e.g. `REG,YES`
    pub services: String,
}

impl MerchantCourier {
    pub fn enabled_services(&self) -> impl Iterator<Item = &str> {
        self.services.split(',').map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn is_enabled(&self, service: &str) -> bool {
        self.enabled_services().any(|s| s.eq_ignore_ascii_case(service))
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub merchant_id: i64,
    pub name: String,
    pub price: Rupiah,
    /// Stock for products sold without variants. Products with variants track stock per variant.
    pub stock: i64,
    pub weight_grams: i64,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Variant {
    pub id: i64,
    pub product_id: i64,
    pub name: String,
    pub price: Rupiah,
    pub stock: i64,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum DiscountType {
    Nominal,
    Percentage,
}

impl Display for DiscountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscountType::Nominal => write!(f, "Nominal"),
            DiscountType::Percentage => write!(f, "Percentage"),
        }
    }
}

/// A product promotion. `quota` is the number of discounted units still available across all buyers, and
/// `max_discounted_quantity` caps how many units a single order line may buy at the discounted price.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Promotion {
    pub id: i64,
    pub product_id: i64,
    pub discount_type: DiscountType,
    pub nominal: i64,
    pub quota: i64,
    pub max_discounted_quantity: i64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_active: bool,
}

impl Promotion {
    pub fn is_running(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.starts_at <= now && now <= self.ends_at
    }
}

//--------------------------------------      Addresses      ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct City {
    pub id: i64,
    pub name: String,
    /// The identifier the courier network uses for this city
    pub routing_id: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserAddress {
    pub id: i64,
    pub user_id: i64,
    pub city_id: i64,
    pub recipient: String,
    pub phone: String,
    pub street: String,
    pub postal_code: String,
    pub is_default: bool,
}

//--------------------------------------       Vouchers      ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MerchantVoucher {
    pub id: i64,
    pub merchant_id: i64,
    pub code: String,
    pub nominal: Rupiah,
    pub min_order: Rupiah,
    pub quota: i64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl MerchantVoucher {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.quota > 0 && self.starts_at <= now && now <= self.ends_at
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MarketplaceVoucher {
    pub id: i64,
    pub code: String,
    pub percentage: i64,
    pub max_discount: Rupiah,
    pub min_order: Rupiah,
    pub quota: i64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl MarketplaceVoucher {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.quota > 0 && self.starts_at <= now && now <= self.ends_at
    }
}

//--------------------------------------        Orders       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_code: OrderCode,
    pub user_id: i64,
    /// Orders are deactivated once they have been checked out.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub merchant_id: i64,
    pub quantity: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_code: OrderCode,
    pub user_id: i64,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    pub fn new(order_code: OrderCode, user_id: i64) -> Self {
        Self { order_code, user_id, items: vec![] }
    }

    pub fn with_item(mut self, item: NewOrderItem) -> Self {
        self.items.push(item);
        self
    }
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub quantity: i64,
    pub notes: Option<String>,
}

impl NewOrderItem {
    pub fn new(product_id: i64, variant_id: Option<i64>, quantity: i64) -> Self {
        Self { product_id, variant_id, quantity, notes: None }
    }
}

//--------------------------------------  TransactionStatus  ---------------------------------------------------------
/// The status of a per-merchant transaction. The numeric [`TransactionStatusType::id`] defines the ordering that the
/// transition guard works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum TransactionStatusType {
    /// Created, waiting for the merchant to process it.
    Waited,
    /// The merchant has accepted the order and is preparing it.
    Processed,
    /// Canceled by the buyer, the merchant, a failed payment or the scheduler.
    Canceled,
    /// Handed over to the courier.
    OnDelivery,
    /// The courier has delivered the parcel.
    Delivered,
    /// The buyer has disputed the delivery and a refund case is open.
    RequestRefund,
    /// The buyer has accepted the goods, or a refund case closed in the merchant's favour.
    Completed,
    /// A refund case closed in the buyer's favour.
    Refunded,
}

impl TransactionStatusType {
    pub fn id(&self) -> i64 {
        match self {
            Self::Waited => 1,
            Self::Processed => 2,
            Self::Canceled => 3,
            Self::OnDelivery => 4,
            Self::Delivered => 5,
            Self::RequestRefund => 6,
            Self::Completed => 7,
            Self::Refunded => 8,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(Self::Waited),
            2 => Some(Self::Processed),
            3 => Some(Self::Canceled),
            4 => Some(Self::OnDelivery),
            5 => Some(Self::Delivered),
            6 => Some(Self::RequestRefund),
            7 => Some(Self::Completed),
            8 => Some(Self::Refunded),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Canceled | Self::Completed | Self::Refunded)
    }
}

impl Display for TransactionStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Waited => "Waited",
            Self::Processed => "Processed",
            Self::Canceled => "Canceled",
            Self::OnDelivery => "OnDelivery",
            Self::Delivered => "Delivered",
            Self::RequestRefund => "RequestRefund",
            Self::Completed => "Completed",
            Self::Refunded => "Refunded",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TransactionStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Waited" => Ok(Self::Waited),
            "Processed" => Ok(Self::Processed),
            "Canceled" => Ok(Self::Canceled),
            "OnDelivery" => Ok(Self::OnDelivery),
            "Delivered" => Ok(Self::Delivered),
            "RequestRefund" => Ok(Self::RequestRefund),
            "Completed" => Ok(Self::Completed),
            "Refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid transaction status: {s}"))),
        }
    }
}

/// Who caused a status change or refund decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Actor {
    User(i64),
    Merchant(i64),
    Admin(i64),
    /// The escalation scheduler or the payment webhook
    System,
}

impl Actor {
    pub fn actor_type(&self) -> ActorType {
        match self {
            Actor::User(_) => ActorType::User,
            Actor::Merchant(_) => ActorType::Merchant,
            Actor::Admin(_) => ActorType::Admin,
            Actor::System => ActorType::System,
        }
    }

    pub fn id(&self) -> Option<i64> {
        match self {
            Actor::User(id) | Actor::Merchant(id) | Actor::Admin(id) => Some(*id),
            Actor::System => None,
        }
    }
}

impl Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Actor::User(id) => write!(f, "user #{id}"),
            Actor::Merchant(id) => write!(f, "merchant #{id}"),
            Actor::Admin(id) => write!(f, "admin #{id}"),
            Actor::System => write!(f, "system"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum ActorType {
    User,
    Merchant,
    Admin,
    System,
}

/// One row of the append-only status log. The transaction's stored status is always the status of its latest event.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TransactionStatusEvent {
    pub id: i64,
    pub transaction_id: i64,
    pub status: TransactionStatusType,
    pub actor_type: ActorType,
    pub actor_id: Option<i64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------     Transaction     ---------------------------------------------------------
/// A per-merchant transaction. The four snapshot columns hold versioned JSON envelopes; use the accessor methods in
/// [`crate::snapshots`] to decode them.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: i64,
    pub invoice_code: InvoiceCode,
    pub order_id: i64,
    pub payment_id: PaymentId,
    pub user_id: i64,
    pub merchant_id: i64,
    pub merchant_domain: String,
    pub merchant_voucher_id: Option<i64>,
    pub marketplace_voucher_id: Option<i64>,
    pub status: TransactionStatusType,
    pub receipt_number: Option<String>,
    pub cancel_notes: Option<String>,
    pub payment_method: String,
    pub payment_details: String,
    pub address: String,
    pub cart_items: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub invoice_code: InvoiceCode,
    pub merchant_id: i64,
    pub merchant_domain: String,
    pub merchant_voucher_id: Option<i64>,
    pub marketplace_voucher_id: Option<i64>,
    pub payment_method: String,
    pub payment_details: String,
    pub address: String,
    pub cart_items: String,
}

//--------------------------------------       Payments      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentMethodType {
    Wallet,
    Gateway,
}

impl Display for PaymentMethodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethodType::Wallet => write!(f, "Wallet"),
            PaymentMethodType::Gateway => write!(f, "Gateway"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// Waiting for the gateway webhook
    Pending,
    Paid,
    Failed,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Paid => write!(f, "Paid"),
            PaymentStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// One payment covers every transaction of a checkout.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub payment_id: PaymentId,
    pub user_id: i64,
    pub amount: Rupiah,
    pub method: PaymentMethodType,
    pub channel: Option<String>,
    pub redirect_url: Option<String>,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub payment_id: PaymentId,
    pub user_id: i64,
    pub amount: Rupiah,
    pub method: PaymentMethodType,
    pub channel: Option<String>,
    pub redirect_url: Option<String>,
}

impl NewPayment {
    /// Wallet payments are settled the moment the wallet is debited; gateway payments wait for the webhook.
    pub fn initial_status(&self) -> PaymentStatus {
        match self.method {
            PaymentMethodType::Wallet => PaymentStatus::Paid,
            PaymentMethodType::Gateway => PaymentStatus::Pending,
        }
    }
}

//--------------------------------------        Ledger       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum LedgerDirection {
    Credit,
    Debit,
}

impl Display for LedgerDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerDirection::Credit => write!(f, "Credit"),
            LedgerDirection::Debit => write!(f, "Debit"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum LedgerEntryType {
    /// Buyer paid for a checkout from their wallet
    Payment,
    /// Buyer credited after a cancellation
    Cancellation,
    /// Buyer credited after a refund case closed in their favour
    Refund,
    /// Merchant credited for a completed sale
    Sale,
    /// Merchant withdrew funds to an external account
    Withdrawal,
    /// Funds added from outside the marketplace
    TopUp,
}

impl Display for LedgerEntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LedgerEntryType::Payment => "Payment",
            LedgerEntryType::Cancellation => "Cancellation",
            LedgerEntryType::Refund => "Refund",
            LedgerEntryType::Sale => "Sale",
            LedgerEntryType::Withdrawal => "Withdrawal",
            LedgerEntryType::TopUp => "TopUp",
        };
        write!(f, "{s}")
    }
}

/// The details of a single balance movement. Every movement writes exactly one history row.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub amount: Rupiah,
    pub entry_type: LedgerEntryType,
    pub payment_id: Option<PaymentId>,
    pub invoice_code: Option<InvoiceCode>,
}

impl LedgerEntry {
    pub fn new(amount: Rupiah, entry_type: LedgerEntryType) -> Self {
        Self { amount, entry_type, payment_id: None, invoice_code: None }
    }

    pub fn with_payment_id(mut self, payment_id: PaymentId) -> Self {
        self.payment_id = Some(payment_id);
        self
    }

    pub fn with_invoice(mut self, invoice_code: InvoiceCode) -> Self {
        self.invoice_code = Some(invoice_code);
        self
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Wallet {
    pub id: i64,
    pub user_id: i64,
    pub balance: Rupiah,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WalletHistory {
    pub id: i64,
    pub wallet_id: i64,
    pub direction: LedgerDirection,
    pub amount: Rupiah,
    pub entry_type: LedgerEntryType,
    pub payment_id: Option<PaymentId>,
    pub invoice_code: Option<InvoiceCode>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct HoldingAccount {
    pub id: i64,
    pub merchant_id: i64,
    pub balance: Rupiah,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct HoldingAccountHistory {
    pub id: i64,
    pub holding_account_id: i64,
    pub direction: LedgerDirection,
    pub amount: Rupiah,
    pub entry_type: LedgerEntryType,
    pub payment_id: Option<PaymentId>,
    pub invoice_code: Option<InvoiceCode>,
    pub created_at: DateTime<Utc>,
}

/// A marketplace voucher nominal that the marketplace paid out of its own promotional budget when a transaction
/// settled to the merchant.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MarketplaceSubsidy {
    pub id: i64,
    pub transaction_id: i64,
    pub invoice_code: InvoiceCode,
    pub marketplace_voucher_id: Option<i64>,
    pub amount: Rupiah,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------       Refunds       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RefundRequest {
    pub id: i64,
    pub transaction_id: i64,
    pub reason: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum RefundParty {
    Buyer,
    Seller,
    Admin,
}

impl Display for RefundParty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefundParty::Buyer => write!(f, "buyer"),
            RefundParty::Seller => write!(f, "seller"),
            RefundParty::Admin => write!(f, "admin"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefundDecision {
    Accept,
    Reject,
    Cancel,
}

impl Display for RefundDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefundDecision::Accept => write!(f, "accept"),
            RefundDecision::Reject => write!(f, "reject"),
            RefundDecision::Cancel => write!(f, "cancel"),
        }
    }
}

/// The stored discriminant of a refund round. See [`crate::state::RoundState`] for the tagged form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum RoundStateType {
    AwaitingSeller,
    AwaitingAdmin,
    AwaitingBuyer,
    /// The buyer rejected the admin's ruling and a new round was opened.
    Rejected,
    Closed,
}

impl Display for RoundStateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RoundStateType::AwaitingSeller => "AwaitingSeller",
            RoundStateType::AwaitingAdmin => "AwaitingAdmin",
            RoundStateType::AwaitingBuyer => "AwaitingBuyer",
            RoundStateType::Rejected => "Rejected",
            RoundStateType::Closed => "Closed",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum Ruling {
    /// The admin sided with the buyer
    Accepted,
    /// The admin sided with the merchant
    Rejected,
}

/// Who receives the money when a refund case closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Beneficiary {
    Buyer,
    Merchant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum Resolution {
    /// The seller conceded the refund
    SellerAccepted,
    /// The buyer withdrew the request before the admin ruled
    BuyerCanceled,
    /// The buyer accepted an admin ruling in their favour
    BuyerAcceptedRefund,
    /// The buyer accepted an admin ruling in the merchant's favour
    BuyerAcceptedRejection,
    /// The admin ruled for the merchant after the buyer had exhausted their rejections
    AdminRejectedFinal,
    /// The buyer attempted to reject the admin's ruling once too often
    RejectionLimitReached,
}

impl Resolution {
    pub fn beneficiary(&self) -> Beneficiary {
        match self {
            Resolution::SellerAccepted | Resolution::BuyerAcceptedRefund => Beneficiary::Buyer,
            Resolution::BuyerCanceled
            | Resolution::BuyerAcceptedRejection
            | Resolution::AdminRejectedFinal
            | Resolution::RejectionLimitReached => Beneficiary::Merchant,
        }
    }
}

impl Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Resolution::SellerAccepted => "seller accepted the refund",
            Resolution::BuyerCanceled => "buyer canceled the request",
            Resolution::BuyerAcceptedRefund => "buyer accepted the refund ruling",
            Resolution::BuyerAcceptedRejection => "buyer accepted the rejection",
            Resolution::AdminRejectedFinal => "admin rejected after the rejection limit",
            Resolution::RejectionLimitReached => "rejection limit reached",
        };
        write!(f, "{s}")
    }
}

/// One round of a refund negotiation. Each party timestamp is written at most once per round.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RefundRound {
    pub id: i64,
    pub refund_request_id: i64,
    pub round_no: i64,
    pub state: RoundStateType,
    pub admin_ruling: Option<Ruling>,
    pub resolution: Option<Resolution>,
    pub buyer_accepted_at: Option<DateTime<Utc>>,
    pub buyer_rejected_at: Option<DateTime<Utc>>,
    pub buyer_canceled_at: Option<DateTime<Utc>>,
    pub seller_accepted_at: Option<DateTime<Utc>>,
    pub seller_rejected_at: Option<DateTime<Utc>>,
    pub admin_accepted_at: Option<DateTime<Utc>>,
    pub admin_rejected_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub state_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefundRound {
    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RefundMessage {
    pub id: i64,
    pub refund_request_id: i64,
    pub party: RefundParty,
    pub body: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_ids_round_trip() {
        for id in 1..=8 {
            let status = TransactionStatusType::from_id(id).unwrap();
            assert_eq!(status.id(), id);
            assert_eq!(status.to_string().parse::<TransactionStatusType>().unwrap(), status);
        }
        assert!(TransactionStatusType::from_id(9).is_none());
    }

    #[test]
    fn terminal_statuses() {
        use TransactionStatusType::*;
        let terminal = [Waited, Processed, Canceled, OnDelivery, Delivered, RequestRefund, Completed, Refunded]
            .into_iter()
            .filter(|s| s.is_terminal())
            .collect::<Vec<_>>();
        assert_eq!(terminal, vec![Canceled, Completed, Refunded]);
    }

    #[test]
    fn courier_services() {
        let courier =
            MerchantCourier { id: 1, merchant_id: 1, courier_code: "jne".into(), services: "REG, YES,".into() };
        assert_eq!(courier.enabled_services().collect::<Vec<_>>(), vec!["REG", "YES"]);
        assert!(courier.is_enabled("reg"));
        assert!(!courier.is_enabled("OKE"));
    }

    #[test]
    fn resolution_beneficiaries() {
        assert_eq!(Resolution::SellerAccepted.beneficiary(), Beneficiary::Buyer);
        assert_eq!(Resolution::BuyerAcceptedRefund.beneficiary(), Beneficiary::Buyer);
        assert_eq!(Resolution::BuyerCanceled.beneficiary(), Beneficiary::Merchant);
        assert_eq!(Resolution::RejectionLimitReached.beneficiary(), Beneficiary::Merchant);
    }
}

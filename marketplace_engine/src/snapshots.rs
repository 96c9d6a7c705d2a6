//! Versioned snapshots of the data a transaction was created from.
//!
//! A transaction must keep describing what the buyer actually bought, even after the catalog, the buyer's address book
//! or the voucher definitions change. The four snapshot columns of a transaction therefore hold immutable copies of
//! the cart items, the shipping address, the payment method and the payment breakdown.
//!
//! Every snapshot is written as an envelope:
//!
//! ```json
//! { "version": 1, "data": { ... } }
//! ```
//!
//! Reading follows these rules:
//! * Version 1 is the current format.
//! * A bare JSON value without an envelope is a legacy (version 0) blob. Legacy blobs used camelCase field names, which
//!   the snapshot types accept as aliases.
//! * Unknown fields are ignored, so newer writers can add optional fields without breaking older readers.
//! * Any other version is a data-integrity error. It is logged and never retried, since it means the persisted state
//!   is corrupt or was written by an incompatible release.
use log::*;
use mkt_common::Rupiah;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::db_types::{PaymentId, PaymentMethodType, TransactionRecord};

pub const SNAPSHOT_VERSION: u64 = 1;

#[derive(Debug, Clone, Error)]
pub enum SnapshotError {
    #[error("The {name} snapshot is not valid JSON: {reason}")]
    Malformed { name: &'static str, reason: String },
    #[error("The {name} snapshot has unsupported version {version}")]
    UnsupportedVersion { name: &'static str, version: u64 },
    #[error("Could not serialize the {name} snapshot: {reason}")]
    Encoding { name: &'static str, reason: String },
}

/// A value object that is persisted inside a transaction record.
pub trait Snapshot: Serialize + DeserializeOwned {
    const NAME: &'static str;
}

#[derive(Serialize)]
struct Envelope<'a, T> {
    version: u64,
    data: &'a T,
}

pub fn encode<T: Snapshot>(value: &T) -> Result<String, SnapshotError> {
    let envelope = Envelope { version: SNAPSHOT_VERSION, data: value };
    serde_json::to_string(&envelope).map_err(|e| SnapshotError::Encoding { name: T::NAME, reason: e.to_string() })
}

pub fn decode<T: Snapshot>(raw: &str) -> Result<T, SnapshotError> {
    let result = decode_value::<T>(raw);
    if let Err(e) = &result {
        error!("🗃️ Corrupt transaction snapshot. {e}");
    }
    result
}

fn decode_value<T: Snapshot>(raw: &str) -> Result<T, SnapshotError> {
    let malformed = |e: serde_json::Error| SnapshotError::Malformed { name: T::NAME, reason: e.to_string() };
    let value: Value = serde_json::from_str(raw).map_err(malformed)?;
    match envelope_version(&value) {
        Some(SNAPSHOT_VERSION) => {
            let data = value.get("data").cloned().unwrap_or(Value::Null);
            serde_json::from_value(data).map_err(malformed)
        },
        Some(version) => Err(SnapshotError::UnsupportedVersion { name: T::NAME, version }),
        None => {
            trace!("🗃️ Reading legacy {} snapshot", T::NAME);
            serde_json::from_value(value).map_err(malformed)
        },
    }
}

/// The envelope version, or `None` for a legacy bare blob.
fn envelope_version(value: &Value) -> Option<u64> {
    let obj = value.as_object()?;
    if !obj.contains_key("data") {
        return None;
    }
    obj.get("version").and_then(Value::as_u64)
}

//--------------------------------------      Cart items     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItemSnapshot {
    #[serde(alias = "productId")]
    pub product_id: i64,
    #[serde(alias = "variantId", default)]
    pub variant_id: Option<i64>,
    #[serde(alias = "merchantId")]
    pub merchant_id: i64,
    pub name: String,
    #[serde(alias = "variantName", default)]
    pub variant_name: Option<String>,
    pub quantity: i64,
    #[serde(alias = "realPrice")]
    pub real_price: Rupiah,
    #[serde(alias = "discountedPrice")]
    pub discounted_price: Rupiah,
    #[serde(alias = "promotionId", default)]
    pub promotion_id: Option<i64>,
    #[serde(alias = "weight", default)]
    pub weight_grams: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CartItemSnapshot {
    pub fn line_total(&self) -> Rupiah {
        self.discounted_price * self.quantity
    }
}

/// The cart-item column holds the whole list, so the list itself is the snapshot value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartItems(pub Vec<CartItemSnapshot>);

impl Snapshot for CartItems {
    const NAME: &'static str = "cart items";
}

//--------------------------------------       Address       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSnapshot {
    #[serde(alias = "addressId", default)]
    pub address_id: i64,
    pub recipient: String,
    #[serde(default)]
    pub phone: String,
    pub street: String,
    #[serde(alias = "cityId")]
    pub city_id: i64,
    #[serde(alias = "cityName", default)]
    pub city_name: String,
    #[serde(alias = "postalCode", default)]
    pub postal_code: String,
}

impl Snapshot for AddressSnapshot {
    const NAME: &'static str = "address";
}

//--------------------------------------    Payment method   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodSnapshot {
    pub method: PaymentMethodType,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(alias = "paymentId")]
    pub payment_id: PaymentId,
}

impl Snapshot for PaymentMethodSnapshot {
    const NAME: &'static str = "payment method";
}

//--------------------------------------   Payment details   ---------------------------------------------------------
/// The money breakdown of a single transaction. `total` is what the buyer paid for this transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub subtotal: Rupiah,
    #[serde(alias = "deliveryFee")]
    pub delivery_fee: Rupiah,
    #[serde(alias = "merchantVoucherNominal", default)]
    pub merchant_voucher_nominal: Rupiah,
    #[serde(alias = "marketplaceVoucherNominal", default)]
    pub marketplace_voucher_nominal: Rupiah,
    pub total: Rupiah,
}

impl Snapshot for PaymentDetails {
    const NAME: &'static str = "payment details";
}

impl PaymentDetails {
    pub fn new(
        subtotal: Rupiah,
        delivery_fee: Rupiah,
        merchant_voucher_nominal: Rupiah,
        marketplace_voucher_nominal: Rupiah,
    ) -> Self {
        let total = subtotal + delivery_fee - merchant_voucher_nominal - marketplace_voucher_nominal;
        Self { subtotal, delivery_fee, merchant_voucher_nominal, marketplace_voucher_nominal, total }
    }

    /// What the buyer gets back when the transaction is canceled or refunded: exactly what they paid.
    pub fn buyer_refund(&self) -> Rupiah {
        self.subtotal + self.delivery_fee - self.merchant_voucher_nominal - self.marketplace_voucher_nominal
    }

    /// What the merchant is credited when the transaction completes. The marketplace voucher is the marketplace's own
    /// cost and is not taken off the merchant's proceeds.
    pub fn merchant_payout(&self) -> Rupiah {
        self.subtotal + self.delivery_fee - self.merchant_voucher_nominal
    }

    pub fn is_consistent(&self) -> bool {
        self.total == self.buyer_refund()
    }
}

//--------------------------------------   Record accessors  ---------------------------------------------------------
impl TransactionRecord {
    pub fn cart_items(&self) -> Result<Vec<CartItemSnapshot>, SnapshotError> {
        decode::<CartItems>(&self.cart_items).map(|c| c.0)
    }

    pub fn address(&self) -> Result<AddressSnapshot, SnapshotError> {
        decode(&self.address)
    }

    pub fn payment_method(&self) -> Result<PaymentMethodSnapshot, SnapshotError> {
        decode(&self.payment_method)
    }

    pub fn payment_details(&self) -> Result<PaymentDetails, SnapshotError> {
        decode(&self.payment_details)
    }
}

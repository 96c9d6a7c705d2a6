use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{NewPayment, NewTransaction, OrderCode, Payment},
    transaction_objects::TransitionOutcome,
};

/// Units to take out of stock at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReservation {
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub quantity: i64,
    /// The promotion whose quota the units consume, if they were bought at a promotional price
    pub promotion_id: Option<i64>,
}

/// Everything a checkout writes. The backend persists all of it in one storage transaction, or nothing.
#[derive(Debug, Clone)]
pub struct NewCheckout {
    pub order_id: i64,
    pub order_code: OrderCode,
    pub user_id: i64,
    pub payment: NewPayment,
    pub transactions: Vec<NewTransaction>,
    pub reservations: Vec<StockReservation>,
    pub merchant_voucher_ids: Vec<i64>,
    pub marketplace_voucher_id: Option<i64>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSettlement {
    pub payment: Payment,
    /// The transactions canceled because the payment failed
    pub canceled: Vec<TransitionOutcome>,
}

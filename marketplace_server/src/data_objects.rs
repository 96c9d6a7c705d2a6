use std::fmt::Display;

use marketplace_engine::db_types::{Payment, PaymentId};
use mkt_common::Rupiah;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// The payment gateway's verdict on a payment, as posted to `/webhook/payment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCallback {
    pub payment_id: PaymentId,
    pub amount: Rupiah,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCallbackResult {
    pub payment: Payment,
    /// Invoice codes of the transactions canceled because the payment failed
    pub canceled: Vec<String>,
}

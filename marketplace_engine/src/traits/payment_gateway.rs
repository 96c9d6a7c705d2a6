use mkt_common::Rupiah;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{OrderCode, PaymentId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInitiation {
    /// The buyer's account reference with the gateway
    pub account_ref: String,
    pub amount: Rupiah,
    pub channel: String,
    pub order_code: OrderCode,
    pub redirect_target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiatedPayment {
    pub redirect_url: String,
    pub payment_id: PaymentId,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentProviderError {
    #[error("The payment gateway did not respond within {0}ms")]
    Timeout(u64),
    #[error("The payment gateway rejected the payment: {0}")]
    Rejected(String),
    #[error("The payment gateway is unavailable: {0}")]
    Unavailable(String),
}

/// The external payment gateway. The engine records the payment id it returns and waits for the gateway's webhook
/// (see [`crate::PaymentApi`]) to settle the payment.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    async fn initiate_payment(&self, request: &PaymentInitiation) -> Result<InitiatedPayment, PaymentProviderError>;
}

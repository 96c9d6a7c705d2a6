use mkt_common::Rupiah;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryQuoteRequest {
    pub origin_routing_id: String,
    pub destination_routing_id: String,
    pub weight_grams: i64,
    pub courier_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryQuote {
    /// The courier's service code, e.g. `REG`
    pub service: String,
    pub cost: Rupiah,
    /// Estimated time of delivery, as the courier reports it
    pub etd: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryQuoteError {
    #[error("The delivery quote did not arrive within {0}ms")]
    Timeout(u64),
    #[error("The courier service is unavailable: {0}")]
    Unavailable(String),
}

/// The courier network. Implementations make a network call; the engine bounds every call with a timeout.
#[allow(async_fn_in_trait)]
pub trait DeliveryQuoteProvider {
    async fn quote(&self, request: &DeliveryQuoteRequest) -> Result<Vec<DeliveryQuote>, DeliveryQuoteError>;
}

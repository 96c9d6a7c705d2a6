use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use mkt_common::Rupiah;

use crate::{
    db_types::PaymentId,
    traits::{
        DeliveryQuote,
        DeliveryQuoteError,
        DeliveryQuoteProvider,
        DeliveryQuoteRequest,
        InitiatedPayment,
        PaymentGateway,
        PaymentInitiation,
        PaymentProviderError,
    },
};

/// A courier network that quotes the same services for every parcel.
#[derive(Debug, Clone, Default)]
pub struct StubCourier {
    quotes: Vec<DeliveryQuote>,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<DeliveryQuoteRequest>>>,
}

impl StubCourier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service<S: Into<String>>(mut self, service: S, cost: i64) -> Self {
        let quote = DeliveryQuote { service: service.into(), cost: Rupiah::from(cost), etd: "2-3".into(), note: None };
        self.quotes.push(quote);
        self
    }

    /// Every quote takes this long to arrive
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<DeliveryQuoteRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl DeliveryQuoteProvider for StubCourier {
    async fn quote(&self, request: &DeliveryQuoteRequest) -> Result<Vec<DeliveryQuote>, DeliveryQuoteError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.quotes.clone())
    }
}

/// A payment gateway that accepts every payment and hands out sequential payment ids.
#[derive(Debug, Clone, Default)]
pub struct StubGateway {
    counter: Arc<AtomicU64>,
    reject_with: Option<String>,
    delay: Option<Duration>,
}

impl StubGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting<S: Into<String>>(reason: S) -> Self {
        Self { reject_with: Some(reason.into()), ..Self::default() }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// The number of payments initiated so far
    pub fn initiated(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}

impl PaymentGateway for StubGateway {
    async fn initiate_payment(&self, request: &PaymentInitiation) -> Result<InitiatedPayment, PaymentProviderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = &self.reject_with {
            return Err(PaymentProviderError::Rejected(reason.clone()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let payment_id = PaymentId(format!("PG-{}-{n}", request.order_code));
        Ok(InitiatedPayment { redirect_url: format!("https://pay.example/{payment_id}"), payment_id })
    }
}

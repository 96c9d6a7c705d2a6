use chrono::{DateTime, Utc};
use mkt_common::Rupiah;
use thiserror::Error;

use crate::{
    db_types::{Payment, PaymentId, PaymentStatus},
    traits::{MarketplaceError, PaymentSettlement},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("Payment {0} does not exist")]
    PaymentNotFound(PaymentId),
    #[error("Payment {payment_id} is for {expected}, but the gateway reported {received}")]
    PaymentAmountMismatch { payment_id: PaymentId, expected: Rupiah, received: Rupiah },
    #[error("Payment {payment_id} has already been settled as {status}")]
    PaymentAlreadySettled { payment_id: PaymentId, status: PaymentStatus },
}

/// Settlement of gateway payments.
#[allow(async_fn_in_trait)]
pub trait PaymentManagement {
    async fn fetch_payment(&self, payment_id: &PaymentId) -> Result<Option<Payment>, MarketplaceError>;

    /// Settles a pending payment in a single atomic transaction.
    ///
    /// * The payment must exist, be `Pending`, and `amount` must match the payment amount.
    /// * On success, the payment is marked `Paid` and its transactions can be processed by their merchants.
    /// * On failure, the payment is marked `Failed` and every transaction it paid for is canceled. Stock is restored,
    ///   and since no money was taken, no wallet is credited.
    async fn settle_payment(
        &self,
        payment_id: &PaymentId,
        amount: Rupiah,
        success: bool,
        now: DateTime<Utc>,
    ) -> Result<PaymentSettlement, MarketplaceError>;
}

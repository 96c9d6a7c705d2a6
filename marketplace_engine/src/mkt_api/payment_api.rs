use std::{fmt::Debug, sync::Arc};

use log::*;
use mkt_common::Rupiah;

use crate::{
    db_types::{Actor, Payment, PaymentId},
    events::{EventProducers, TransactionStatusChangedEvent},
    helpers::Clock,
    traits::{MarketplaceError, PaymentError, PaymentManagement, PaymentSettlement},
};

/// `PaymentApi` handles the payment gateway's callback for a pending gateway payment.
pub struct PaymentApi<B> {
    db: B,
    producers: EventProducers,
    clock: Arc<dyn Clock>,
}

impl<B> Debug for PaymentApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentApi")
    }
}

impl<B> PaymentApi<B> {
    pub fn new(db: B, producers: EventProducers, clock: Arc<dyn Clock>) -> Self {
        Self { db, producers, clock }
    }
}

impl<B> PaymentApi<B>
where B: PaymentManagement
{
    /// Records the gateway's verdict on a payment.
    ///
    /// A successful payment lets the merchants start processing. A failed one cancels every transaction it paid for
    /// and returns their stock. A payment can only be settled once; repeated callbacks fail with
    /// [`PaymentError::PaymentAlreadySettled`].
    pub async fn update_payment_status(
        &self,
        payment_id: &PaymentId,
        amount: Rupiah,
        success: bool,
    ) -> Result<PaymentSettlement, MarketplaceError> {
        let settlement = match self.db.settle_payment(payment_id, amount, success, self.clock.now()).await {
            Ok(s) => s,
            Err(e) => {
                warn!("🧾️ Could not settle payment [{payment_id}]. {e}");
                return Err(e);
            },
        };
        for outcome in &settlement.canceled {
            let event = TransactionStatusChangedEvent {
                transaction: outcome.transaction.clone(),
                old_status: outcome.old_status,
                new_status: outcome.transaction.status,
                actor: Actor::System,
            };
            self.producers.publish_status_changed(event).await;
        }
        Ok(settlement)
    }

    pub async fn fetch_payment(&self, payment_id: &PaymentId) -> Result<Payment, MarketplaceError> {
        self.db.fetch_payment(payment_id).await?.ok_or_else(|| PaymentError::PaymentNotFound(payment_id.clone()).into())
    }
}

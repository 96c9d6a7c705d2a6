use std::{fmt::Debug, sync::Arc};

use log::*;

use crate::{
    db_types::{Actor, InvoiceCode, TransactionRecord, TransactionStatusType},
    events::{EventProducers, TransactionStatusChangedEvent},
    helpers::Clock,
    state::TransactionTimeline,
    traits::{MarketplaceDatabase, MarketplaceError},
    transaction_objects::{
        MerchantStatusUpdate,
        StatusChange,
        TransactionView,
        TransitionOutcome,
        UserAction,
        UserStatusFlags,
    },
};

/// `TransactionFlowApi` drives per-merchant transactions through their status lifecycle.
///
/// Every change runs the transition guard against the stored status inside the storage transaction that writes the
/// new status, so two concurrent changes to the same transaction can never both succeed.
pub struct TransactionFlowApi<B> {
    db: B,
    producers: EventProducers,
    clock: Arc<dyn Clock>,
}

impl<B> Debug for TransactionFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TransactionFlowApi")
    }
}

impl<B> TransactionFlowApi<B> {
    pub fn new(db: B, producers: EventProducers, clock: Arc<dyn Clock>) -> Self {
        Self { db, producers, clock }
    }
}

impl<B> TransactionFlowApi<B>
where B: MarketplaceDatabase
{
    /// A merchant moves one of its own transactions along: process, ship (with a receipt number), mark delivered, or
    /// cancel (with a note).
    pub async fn transition_merchant_status(
        &self,
        merchant_id: i64,
        invoice: &InvoiceCode,
        update: MerchantStatusUpdate,
    ) -> Result<TransitionOutcome, MarketplaceError> {
        self.apply(invoice, StatusChange::Merchant { merchant_id, update }).await
    }

    /// A buyer completes, cancels or asks to refund one of their own transactions.
    pub async fn transition_user_status(
        &self,
        user_id: i64,
        invoice: &InvoiceCode,
        action: UserAction,
    ) -> Result<TransitionOutcome, MarketplaceError> {
        self.apply(invoice, StatusChange::User { user_id, action }).await
    }

    /// As [`Self::transition_user_status`], for clients that send one boolean per action.
    pub async fn transition_user_status_flags(
        &self,
        user_id: i64,
        invoice: &InvoiceCode,
        flags: UserStatusFlags,
    ) -> Result<TransitionOutcome, MarketplaceError> {
        let action = UserAction::try_from(flags)?;
        self.transition_user_status(user_id, invoice, action).await
    }

    /// Status changes made by the marketplace itself, i.e. the escalation scheduler.
    pub async fn transition_system_status(
        &self,
        invoice: &InvoiceCode,
        target: TransactionStatusType,
        notes: Option<String>,
    ) -> Result<TransitionOutcome, MarketplaceError> {
        self.apply(invoice, StatusChange::System { target, notes }).await
    }

    async fn apply(&self, invoice: &InvoiceCode, change: StatusChange) -> Result<TransitionOutcome, MarketplaceError> {
        let actor = change.actor();
        let target = change.target();
        let now = self.clock.now();
        let outcome = match self.db.transition_transaction(invoice, change, now).await {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!("🔄️ {actor} could not move transaction [{invoice}] to {target}. {e}");
                return Err(e);
            },
        };
        info!("🔄️ Transaction [{invoice}] {} -> {target} by {actor}", outcome.old_status);
        self.publish(&outcome, actor).await;
        Ok(outcome)
    }

    async fn publish(&self, outcome: &TransitionOutcome, actor: Actor) {
        let event = TransactionStatusChangedEvent {
            transaction: outcome.transaction.clone(),
            old_status: outcome.old_status,
            new_status: outcome.transaction.status,
            actor,
        };
        self.producers.publish_status_changed(event).await;
    }

    pub async fn fetch_transaction(&self, invoice: &InvoiceCode) -> Result<TransactionRecord, MarketplaceError> {
        self.db.fetch_transaction(invoice).await?.ok_or_else(|| MarketplaceError::TransactionNotFound(invoice.clone()))
    }

    /// The transaction with its timestamp timeline and delivery leg, derived from the status event log.
    pub async fn fetch_transaction_view(&self, invoice: &InvoiceCode) -> Result<TransactionView, MarketplaceError> {
        let transaction = self.fetch_transaction(invoice).await?;
        let events = self.db.fetch_status_events(transaction.id).await?;
        let timeline = TransactionTimeline::from_events(&events);
        if timeline.effective_status() != Some(transaction.status) {
            warn!(
                "🔄️ Transaction [{invoice}] is stored as {} but its event log ends at {:?}",
                transaction.status,
                timeline.effective_status()
            );
        }
        let delivery = timeline.delivery_status(transaction.receipt_number.clone());
        Ok(TransactionView { transaction, timeline, delivery })
    }

    pub async fn fetch_transactions_for_user(&self, user_id: i64) -> Result<Vec<TransactionRecord>, MarketplaceError> {
        self.db.fetch_transactions_for_user(user_id).await
    }
}

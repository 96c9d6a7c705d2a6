use std::{fmt::Debug, sync::Arc};

use log::*;

use crate::{
    db_types::{Actor, InvoiceCode, RefundDecision, RefundMessage, RefundParty, Resolution, TransactionStatusType},
    events::{EventProducers, RefundClosedEvent, TransactionStatusChangedEvent},
    helpers::Clock,
    refund_objects::{NewRefundMessage, RefundCase, RoundOutcome},
    state::RefundError,
    traits::{MarketplaceDatabase, MarketplaceError},
    transaction_objects::{RefundReason, StatusChange, TransitionOutcome, UserAction},
};

/// `RefundApi` runs the three-party refund negotiation between a buyer, the seller and a marketplace admin.
///
/// See [`crate::state::advance_round`] for the protocol itself. Every decision is applied in a single storage
/// transaction; when a decision closes the case, the parent transaction's terminal status change and its settlement
/// are part of that same transaction.
pub struct RefundApi<B> {
    db: B,
    producers: EventProducers,
    clock: Arc<dyn Clock>,
}

impl<B> Debug for RefundApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RefundApi")
    }
}

impl<B> RefundApi<B> {
    pub fn new(db: B, producers: EventProducers, clock: Arc<dyn Clock>) -> Self {
        Self { db, producers, clock }
    }
}

impl<B> RefundApi<B>
where B: MarketplaceDatabase
{
    /// The buyer asks for a refund of a delivered transaction. The transaction moves to `RequestRefund` and the first
    /// round opens, awaiting the seller.
    pub async fn open_refund_request(
        &self,
        user_id: i64,
        invoice: &InvoiceCode,
        reason: RefundReason,
    ) -> Result<TransitionOutcome, MarketplaceError> {
        let change = StatusChange::User { user_id, action: UserAction::RequestRefund(reason) };
        let outcome = self.db.transition_transaction(invoice, change, self.clock.now()).await?;
        if let Some(request) = &outcome.refund_request {
            info!("⚖️ Buyer #{user_id} opened refund request #{} for transaction [{invoice}]", request.id);
        }
        let event = TransactionStatusChangedEvent {
            transaction: outcome.transaction.clone(),
            old_status: outcome.old_status,
            new_status: outcome.transaction.status,
            actor: Actor::User(user_id),
        };
        self.producers.publish_status_changed(event).await;
        Ok(outcome)
    }

    /// Applies `party`'s `decision` to the current round of the refund request.
    ///
    /// `actor` must be entitled to speak for `party`: the buyer of the transaction, its merchant, or an admin.
    ///
    /// A buyer rejection after the buyer has already rejected [`crate::state::MAX_BUYER_REJECTIONS`] rulings closes the
    /// case in the merchant's favour. The closure is committed, and the call still fails with
    /// [`RefundError::AlreadyRejectedThreeTimes`] to tell the buyer their rejection was not accepted.
    pub async fn advance_refund_round(
        &self,
        request_id: i64,
        party: RefundParty,
        decision: RefundDecision,
        actor: Actor,
    ) -> Result<RoundOutcome, MarketplaceError> {
        let now = self.clock.now();
        let outcome = self.db.advance_refund_round(request_id, party, decision, actor, now).await?;
        debug!("⚖️ Refund request #{request_id}: {party} ({actor}) chose to {decision}. Round is now {}", outcome.round.state);
        if let Some(round) = &outcome.new_round {
            info!("⚖️ Refund request #{request_id} moved to round {}", round.round_no);
        }
        if let Some(resolution) = outcome.resolution {
            self.publish_closure(&outcome, resolution, actor).await;
            if resolution == Resolution::RejectionLimitReached {
                return Err(RefundError::AlreadyRejectedThreeTimes.into());
            }
        }
        Ok(outcome)
    }

    async fn publish_closure(&self, outcome: &RoundOutcome, resolution: Resolution, actor: Actor) {
        info!(
            "⚖️ Refund request #{} closed ({resolution}). Transaction [{}] is now {}",
            outcome.request.id, outcome.transaction.invoice_code, outcome.transaction.status
        );
        let status_event = TransactionStatusChangedEvent {
            transaction: outcome.transaction.clone(),
            old_status: TransactionStatusType::RequestRefund,
            new_status: outcome.transaction.status,
            actor,
        };
        self.producers.publish_status_changed(status_event).await;
        let event =
            RefundClosedEvent { request: outcome.request.clone(), resolution, transaction: outcome.transaction.clone() };
        self.producers.publish_refund_closed(event).await;
    }

    /// Adds a message to the case file. Any party may write until the case is closed.
    pub async fn append_refund_message(
        &self,
        request_id: i64,
        actor: Actor,
        message: NewRefundMessage,
    ) -> Result<RefundMessage, MarketplaceError> {
        let message = self.db.append_refund_message(request_id, actor, message, self.clock.now()).await?;
        trace!("⚖️ {actor} wrote on refund request #{request_id}");
        Ok(message)
    }

    pub async fn fetch_refund_case(&self, request_id: i64) -> Result<RefundCase, MarketplaceError> {
        let case = self.db.fetch_refund_case(request_id).await?;
        case.ok_or_else(|| RefundError::RefundRequestNotFound(request_id).into())
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    db_types::{InvoiceCode, TransactionStatusEvent, TransactionStatusType},
    transaction_objects::{MerchantStatusUpdate, UserAction},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Cannot move a transaction from {from} back to {to}")]
    CannotReverse { from: TransactionStatusType, to: TransactionStatusType },
    #[error("Cannot skip from {from} straight to {to}")]
    CannotSkip { from: TransactionStatusType, to: TransactionStatusType },
    #[error("Merchants may not set a transaction to {0}")]
    ForbiddenTransition(TransactionStatusType),
    #[error("A courier receipt number is required to ship a transaction")]
    ReceiptNumberEmpty,
    #[error("A cancellation note is required when a merchant cancels a transaction")]
    CancelNotesEmpty,
    #[error("Exactly one of complete, cancel or request refund must be chosen")]
    AmbiguousUserAction,
    #[error("Transaction {0} cannot be processed before its payment has settled")]
    PaymentNotSettled(InvoiceCode),
    #[error("Transaction {0} was changed by someone else. Fetch the current status and try again")]
    AlreadyProcessed(InvoiceCode),
}

/// The shared transition guard.
///
/// A move is a reversal if it does not go strictly forward, or if the transaction has already reached a terminal
/// state. It is a skip if it jumps more than two status ids, or exactly two to anything other than on-delivery,
/// completed, canceled or refunded.
pub fn check_transition(current: TransactionStatusType, target: TransactionStatusType) -> Result<(), TransitionError> {
    use crate::db_types::TransactionStatusType::*;
    if current.is_terminal() || target.id() <= current.id() {
        return Err(TransitionError::CannotReverse { from: current, to: target });
    }
    let distance = target.id() - current.id();
    let two_step_target = matches!(target, OnDelivery | Completed | Canceled | Refunded);
    if distance > 2 || (distance == 2 && !two_step_target) {
        return Err(TransitionError::CannotSkip { from: current, to: target });
    }
    Ok(())
}

pub fn check_merchant_transition(
    current: TransactionStatusType,
    update: &MerchantStatusUpdate,
) -> Result<(), TransitionError> {
    use crate::db_types::TransactionStatusType::*;
    match update.target {
        Processed | Delivered => {},
        OnDelivery => {
            if is_blank(update.receipt_number.as_deref()) {
                return Err(TransitionError::ReceiptNumberEmpty);
            }
        },
        Canceled => {
            if is_blank(update.notes.as_deref()) {
                return Err(TransitionError::CancelNotesEmpty);
            }
        },
        target => return Err(TransitionError::ForbiddenTransition(target)),
    }
    check_transition(current, update.target)
}

pub fn check_user_transition(current: TransactionStatusType, action: &UserAction) -> Result<(), TransitionError> {
    let target = action.target();
    if matches!(action, UserAction::Cancel) && current.id() >= TransactionStatusType::Processed.id() {
        return Err(TransitionError::CannotReverse { from: current, to: target });
    }
    check_transition(current, target)
}

fn is_blank(s: Option<&str>) -> bool {
    s.map(|s| s.trim().is_empty()).unwrap_or(true)
}

//--------------------------------------       Timeline      ---------------------------------------------------------
/// The timestamped view of a transaction's history, derived from its status event log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionTimeline {
    pub waited_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub on_delivery_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub request_refund_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub cancel_notes: Option<String>,
}

/// The courier leg of a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDeliveryStatus {
    pub on_delivery_at: Option<DateTime<Utc>>,
    pub receipt_number: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl TransactionTimeline {
    pub fn from_events(events: &[TransactionStatusEvent]) -> Self {
        use TransactionStatusType::*;
        let mut timeline = Self::default();
        for event in events {
            let at = Some(event.created_at);
            match event.status {
                Waited => timeline.waited_at = at,
                Processed => timeline.processed_at = at,
                Canceled => {
                    timeline.canceled_at = at;
                    timeline.cancel_notes = event.notes.clone();
                },
                OnDelivery => timeline.on_delivery_at = at,
                Delivered => timeline.delivered_at = at,
                RequestRefund => timeline.request_refund_at = at,
                Completed => timeline.completed_at = at,
                Refunded => timeline.refunded_at = at,
            }
        }
        timeline
    }

    /// The status implied by whichever timestamps are set, highest priority first.
    pub fn effective_status(&self) -> Option<TransactionStatusType> {
        use TransactionStatusType::*;
        [
            (self.refunded_at, Refunded),
            (self.completed_at, Completed),
            (self.request_refund_at, RequestRefund),
            (self.canceled_at, Canceled),
            (self.delivered_at, Delivered),
            (self.on_delivery_at, OnDelivery),
            (self.processed_at, Processed),
            (self.waited_at, Waited),
        ]
        .into_iter()
        .find_map(|(at, status)| at.map(|_| status))
    }

    /// Every later-stage timestamp has its required predecessor set.
    pub fn is_monotonic(&self) -> bool {
        let requires = |later: Option<DateTime<Utc>>, earlier: Option<DateTime<Utc>>| {
            later.is_none() || earlier.map(|e| later.map(|l| l >= e).unwrap_or(true)).unwrap_or(false)
        };
        requires(self.processed_at, self.waited_at)
            && requires(self.canceled_at, self.waited_at)
            && requires(self.on_delivery_at, self.processed_at)
            && requires(self.delivered_at, self.on_delivery_at)
            && requires(self.request_refund_at, self.delivered_at)
            && requires(self.completed_at, self.delivered_at)
            && requires(self.refunded_at, self.request_refund_at)
    }

    pub fn delivery_status(&self, receipt_number: Option<String>) -> TransactionDeliveryStatus {
        TransactionDeliveryStatus { on_delivery_at: self.on_delivery_at, receipt_number, delivered_at: self.delivered_at }
    }
}

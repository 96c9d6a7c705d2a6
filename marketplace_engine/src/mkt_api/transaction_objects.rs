use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Actor, Payment, RefundRequest, TransactionRecord, TransactionStatusType},
    state::{TransactionDeliveryStatus, TransactionTimeline, TransitionError},
};

/// A status change requested by the merchant that owns a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantStatusUpdate {
    pub target: TransactionStatusType,
    /// Required when shipping
    pub receipt_number: Option<String>,
    /// Required when canceling
    pub notes: Option<String>,
}

impl MerchantStatusUpdate {
    pub fn process() -> Self {
        Self { target: TransactionStatusType::Processed, receipt_number: None, notes: None }
    }

    pub fn ship<S: Into<String>>(receipt_number: S) -> Self {
        Self { target: TransactionStatusType::OnDelivery, receipt_number: Some(receipt_number.into()), notes: None }
    }

    pub fn deliver() -> Self {
        Self { target: TransactionStatusType::Delivered, receipt_number: None, notes: None }
    }

    pub fn cancel<S: Into<String>>(notes: S) -> Self {
        Self { target: TransactionStatusType::Canceled, receipt_number: None, notes: Some(notes.into()) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundReason {
    pub reason: String,
    pub image_url: Option<String>,
}

impl RefundReason {
    pub fn new<S: Into<String>>(reason: S) -> Self {
        Self { reason: reason.into(), image_url: None }
    }

    pub fn with_image<S: Into<String>>(mut self, image_url: S) -> Self {
        self.image_url = Some(image_url.into());
        self
    }
}

/// A status change requested by the buyer. Exactly one action per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserAction {
    Complete,
    Cancel,
    RequestRefund(RefundReason),
}

impl UserAction {
    pub fn target(&self) -> TransactionStatusType {
        match self {
            UserAction::Complete => TransactionStatusType::Completed,
            UserAction::Cancel => TransactionStatusType::Canceled,
            UserAction::RequestRefund(_) => TransactionStatusType::RequestRefund,
        }
    }
}

/// The flag-style form of a buyer's request, as HTTP clients tend to send it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserStatusFlags {
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub is_canceled: bool,
    #[serde(default)]
    pub is_request_refund: bool,
    pub reason: Option<String>,
    pub image_url: Option<String>,
}

impl TryFrom<UserStatusFlags> for UserAction {
    type Error = TransitionError;

    fn try_from(flags: UserStatusFlags) -> Result<Self, Self::Error> {
        match (flags.is_completed, flags.is_canceled, flags.is_request_refund) {
            (true, false, false) => Ok(UserAction::Complete),
            (false, true, false) => Ok(UserAction::Cancel),
            (false, false, true) => Ok(UserAction::RequestRefund(RefundReason {
                reason: flags.reason.unwrap_or_default(),
                image_url: flags.image_url,
            })),
            _ => Err(TransitionError::AmbiguousUserAction),
        }
    }
}

/// A status change, together with who asked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    Merchant { merchant_id: i64, update: MerchantStatusUpdate },
    User { user_id: i64, action: UserAction },
    /// Scheduler and payment webhook changes. These run through the shared guard only.
    System { target: TransactionStatusType, notes: Option<String> },
}

impl StatusChange {
    pub fn target(&self) -> TransactionStatusType {
        match self {
            StatusChange::Merchant { update, .. } => update.target,
            StatusChange::User { action, .. } => action.target(),
            StatusChange::System { target, .. } => *target,
        }
    }

    pub fn actor(&self) -> Actor {
        match self {
            StatusChange::Merchant { merchant_id, .. } => Actor::Merchant(*merchant_id),
            StatusChange::User { user_id, .. } => Actor::User(*user_id),
            StatusChange::System { .. } => Actor::System,
        }
    }

    pub fn notes(&self) -> Option<String> {
        match self {
            StatusChange::Merchant { update, .. } => update.notes.clone(),
            StatusChange::User { .. } => None,
            StatusChange::System { notes, .. } => notes.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub old_status: TransactionStatusType,
    pub transaction: TransactionRecord,
    /// Set when the change opened a refund request
    pub refund_request: Option<RefundRequest>,
}

/// A transaction together with its derived timestamp views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionView {
    pub transaction: TransactionRecord,
    pub timeline: TransactionTimeline,
    pub delivery: TransactionDeliveryStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResult {
    pub payment: Payment,
    pub transactions: Vec<TransactionRecord>,
}

impl CheckoutResult {
    /// Where the buyer should be sent to complete a gateway payment
    pub fn redirect_url(&self) -> Option<&str> {
        self.payment.redirect_url.as_deref()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn exactly_one_user_flag() {
        let flags = UserStatusFlags { is_completed: true, ..Default::default() };
        assert_eq!(UserAction::try_from(flags).unwrap(), UserAction::Complete);
        let flags = UserStatusFlags {
            is_request_refund: true,
            reason: Some("Wrong size".into()),
            image_url: Some("https://img/1.png".into()),
            ..Default::default()
        };
        let action = UserAction::try_from(flags).unwrap();
        assert_eq!(action, UserAction::RequestRefund(RefundReason::new("Wrong size").with_image("https://img/1.png")));
        assert_eq!(action.target(), TransactionStatusType::RequestRefund);

        let none = UserStatusFlags::default();
        assert_eq!(UserAction::try_from(none), Err(TransitionError::AmbiguousUserAction));
        let two = UserStatusFlags { is_completed: true, is_canceled: true, ..Default::default() };
        assert_eq!(UserAction::try_from(two), Err(TransitionError::AmbiguousUserAction));
    }

    #[test]
    fn status_change_actor() {
        let change = StatusChange::Merchant { merchant_id: 4, update: MerchantStatusUpdate::cancel("Sold out") };
        assert_eq!(change.actor(), Actor::Merchant(4));
        assert_eq!(change.target(), TransactionStatusType::Canceled);
        assert_eq!(change.notes().as_deref(), Some("Sold out"));
    }
}

use serde::{Deserialize, Serialize};

use crate::db_types::{Actor, Payment, RefundRequest, Resolution, TransactionRecord, TransactionStatusType};

/// A checkout committed. One payment, one transaction per merchant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionsCreatedEvent {
    pub payment: Payment,
    pub transactions: Vec<TransactionRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionStatusChangedEvent {
    pub transaction: TransactionRecord,
    pub old_status: TransactionStatusType,
    pub new_status: TransactionStatusType,
    pub actor: Actor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundClosedEvent {
    pub request: RefundRequest,
    pub resolution: Resolution,
    pub transaction: TransactionRecord,
}

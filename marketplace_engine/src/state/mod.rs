//! The state machines of the marketplace.
//!
//! Both machines are pure: they look at the current state and a requested move and either describe the next state
//! or explain why the move is illegal. The storage backend calls them after reading the current state and before
//! writing the new one, inside a single database transaction, so the guard and the write can never disagree.
//!
//! * [`transaction_state`] governs the status of a per-merchant transaction.
//! * [`refund_state`] governs the rounds of a three-party refund negotiation.
pub mod refund_state;
pub mod transaction_state;

pub use refund_state::{advance_round, DecisionStamp, RefundError, RoundState, RoundStep, RoundTransition};
pub use transaction_state::{
    check_merchant_transition,
    check_transition,
    check_user_transition,
    TransactionDeliveryStatus,
    TransactionTimeline,
    TransitionError,
};

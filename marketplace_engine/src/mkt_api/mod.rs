pub mod checkout_api;
pub mod escalation_api;
pub mod ledger_api;
pub mod order_objects;
pub mod order_summary_api;
pub mod payment_api;
pub mod refund_api;
pub mod refund_objects;
pub mod transaction_flow_api;
pub mod transaction_objects;

mod clock;
mod codes;

pub use clock::{Clock, FixedClock, SystemClock};
pub use codes::{new_invoice_code, new_order_code, new_wallet_payment_id};

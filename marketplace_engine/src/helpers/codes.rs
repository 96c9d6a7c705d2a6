use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};

use crate::db_types::{InvoiceCode, OrderCode, PaymentId};

fn random_suffix(len: usize) -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(len).map(char::from).collect::<String>().to_uppercase()
}

/// Invoice codes look like `INV/20240131/MKT/12/8F3K2Q`: date, merchant id and a random suffix.
pub fn new_invoice_code(now: DateTime<Utc>, merchant_id: i64) -> InvoiceCode {
    InvoiceCode(format!("INV/{}/MKT/{merchant_id}/{}", now.format("%Y%m%d"), random_suffix(6)))
}

pub fn new_order_code(now: DateTime<Utc>) -> OrderCode {
    OrderCode(format!("ORD-{}-{}", now.format("%Y%m%d%H%M%S"), random_suffix(8)))
}

pub fn new_wallet_payment_id(now: DateTime<Utc>) -> PaymentId {
    PaymentId(format!("WLT-{}-{}", now.format("%Y%m%d%H%M%S"), random_suffix(10)))
}

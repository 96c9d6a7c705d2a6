//! Multi-step setups that many tests share.
use std::{sync::Arc, time::Duration};

use crate::{
    db_types::{InvoiceCode, OrderCode},
    events::EventProducers,
    helpers::Clock,
    order_objects::{CheckoutRequest, MerchantChoice, OrderSummaryRequest, PaymentMethod},
    test_utils::{
        seed::{rupiah, seed_order, standard_courier, StandardMarketplace, COURIER},
        stubs::{StubCourier, StubGateway},
    },
    transaction_objects::{CheckoutResult, MerchantStatusUpdate},
    CheckoutApi,
    LedgerApi,
    OrderSummaryApi,
    SqliteDatabase,
    TransactionFlowApi,
};

pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(2);

pub fn summary_api(db: &SqliteDatabase, clock: Arc<dyn Clock>) -> OrderSummaryApi<SqliteDatabase, StubCourier> {
    OrderSummaryApi::new(db.clone(), standard_courier(), clock, PROVIDER_TIMEOUT)
}

pub fn checkout_api(
    db: &SqliteDatabase,
    clock: Arc<dyn Clock>,
) -> CheckoutApi<SqliteDatabase, StubCourier, StubGateway> {
    CheckoutApi::new(summary_api(db, clock), StubGateway::new(), EventProducers::default(), PROVIDER_TIMEOUT)
}

/// Two `Blue / L` shirts from the first standard merchant, shipped with `jne REG` and the `HEMAT20` voucher applied:
/// 100,000 + 15,000 - 20,000 = 95,000.
pub fn shirt_order_request(m: &StandardMarketplace, order_code: &str) -> OrderSummaryRequest {
    OrderSummaryRequest::new(m.buyer_id, OrderCode::from(order_code))
        .with_merchant_choice(m.merchant_id, MerchantChoice::default().with_courier(COURIER).with_voucher("HEMAT20"))
}

/// Tops the buyer's wallet up by 95,000, then orders and checks out the shirt order, paying from the wallet.
pub async fn wallet_checkout_of_shirts(
    db: &SqliteDatabase,
    clock: Arc<dyn Clock>,
    m: &StandardMarketplace,
    order_code: &str,
) -> CheckoutResult {
    LedgerApi::new(db.clone(), clock.clone()).top_up_wallet(m.buyer_id, rupiah(95_000)).await.expect("Top up failed");
    seed_order(db, order_code, m.buyer_id, &[(m.product_id, Some(m.variant_id), 2)]).await;
    let request = CheckoutRequest::new(shirt_order_request(m, order_code), PaymentMethod::Wallet);
    checkout_api(db, clock).create_transactions_from_summary(request).await.expect("Checkout failed")
}

/// Walks a paid transaction through processing, shipping and delivery.
pub async fn deliver(db: &SqliteDatabase, clock: Arc<dyn Clock>, merchant_id: i64, invoice: &InvoiceCode) {
    let api = TransactionFlowApi::new(db.clone(), EventProducers::default(), clock);
    let updates =
        [MerchantStatusUpdate::process(), MerchantStatusUpdate::ship("JNE-0001"), MerchantStatusUpdate::deliver()];
    for update in updates {
        api.transition_merchant_status(merchant_id, invoice, update).await.expect("Merchant transition failed");
    }
}

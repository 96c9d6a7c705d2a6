use std::{sync::Arc, time::Duration};

use chrono::{TimeZone, Utc};
use mkt_common::Rupiah;
use marketplace_engine::{
    db_types::{OrderCode, PaymentMethodType, PaymentStatus, TransactionStatusType},
    events::EventProducers,
    helpers::{Clock, FixedClock},
    order_objects::{CheckoutRequest, MerchantChoice, OrderSummaryRequest, PaymentMethod},
    test_utils::{
        flows::{checkout_api, shirt_order_request, summary_api, wallet_checkout_of_shirts, PROVIDER_TIMEOUT},
        prepare_env::new_test_database,
        seed::*,
        stubs::{StubCourier, StubGateway},
    },
    transaction_objects::UserAction,
    CatalogManagement,
    CheckoutApi,
    CheckoutError,
    ErrorKind,
    LedgerApi,
    MarketplaceDatabase,
    MarketplaceError,
    OrderSummaryApi,
    OrderSummaryError,
    PaymentApi,
    SqliteDatabase,
    TransactionFlowApi,
    VoucherManagement,
};

async fn setup() -> (SqliteDatabase, Arc<dyn Clock>, StandardMarketplace) {
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
    let db = new_test_database().await;
    let m = seed_standard_marketplace(&db, now).await;
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(now));
    (db, clock, m)
}

#[tokio::test]
async fn scenario_a_summary_total() {
    let (db, clock, m) = setup().await;
    seed_order(&db, "ORD-A", m.buyer_id, &[(m.product_id, Some(m.variant_id), 2)]).await;
    let api = summary_api(&db, clock);
    let request = shirt_order_request(&m, "ORD-A");
    let summary = api.compute_order_summary(&request).await.unwrap();
    assert_eq!(summary.subtotal, rupiah(100_000));
    assert_eq!(summary.delivery_cost, rupiah(DELIVERY_COST));
    assert_eq!(summary.merchant_discount, rupiah(20_000));
    assert_eq!(summary.marketplace_discount, rupiah(0));
    assert_eq!(summary.total, rupiah(95_000));
    assert!(summary.is_checkoutable());
    let group = &summary.merchants[0];
    assert_eq!(group.delivery.as_ref().unwrap().service, "REG");
    assert_eq!(group.merchant_voucher_id, Some(m.voucher_id));
    assert_eq!(summary.address.city_name, "Jakarta");

    // Summarising is side-effect free, so a second run is identical
    let again = api.compute_order_summary(&request).await.unwrap();
    assert_eq!(summary, again);
}

#[tokio::test]
async fn summary_gates() {
    let (db, clock, m) = setup().await;
    seed_order(&db, "ORD-G", m.buyer_id, &[(m.product_id, Some(m.variant_id), 11)]).await;
    let api = summary_api(&db, clock);

    // More than the 10 in stock
    let summary = api.compute_order_summary(&shirt_order_request(&m, "ORD-G")).await.unwrap();
    assert!(!summary.is_order_valid);
    assert!(!summary.merchants[0].items[0].is_valid);

    // Unknown voucher code
    let request = OrderSummaryRequest::new(m.buyer_id, OrderCode::from("ORD-G"))
        .with_merchant_choice(m.merchant_id, MerchantChoice::default().with_courier(COURIER).with_voucher("NOPE"));
    let summary = api.compute_order_summary(&request).await.unwrap();
    assert!(!summary.is_voucher_valid);
    assert!(summary.merchants[0].is_voucher_invalid);

    // No courier chosen
    let request = OrderSummaryRequest::new(m.buyer_id, OrderCode::from("ORD-G"));
    let summary = api.compute_order_summary(&request).await.unwrap();
    assert!(!summary.is_order_valid);
    assert_eq!(summary.delivery_cost, rupiah(0));
}

#[tokio::test]
async fn deleted_variant_invalidates_the_line() {
    let (db, clock, m) = setup().await;
    seed_order(&db, "ORD-V", m.buyer_id, &[(m.product_id, Some(m.variant_id), 1)]).await;
    delete_variant(&db, m.variant_id).await;
    let summary = summary_api(&db, clock).compute_order_summary(&shirt_order_request(&m, "ORD-V")).await.unwrap();
    assert!(!summary.is_order_valid);
}

#[tokio::test]
async fn orders_of_others_and_own_products_are_rejected() {
    let (db, clock, m) = setup().await;
    seed_order(&db, "ORD-O", m.buyer_id, &[(m.product_id, Some(m.variant_id), 1)]).await;
    let api = summary_api(&db, clock);
    let stranger = OrderSummaryRequest::new(42, OrderCode::from("ORD-O"));
    let err = api.compute_order_summary(&stranger).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::OrderSummary(OrderSummaryError::OrderNotFound(_))));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let city = db.fetch_merchant(m.merchant_id).await.unwrap().unwrap().city_id;
    seed_address(&db, MERCHANT_USER_ID, city, true).await;
    seed_order(&db, "ORD-OWN", MERCHANT_USER_ID, &[(m.product_id, Some(m.variant_id), 1)]).await;
    let own = OrderSummaryRequest::new(MERCHANT_USER_ID, OrderCode::from("ORD-OWN"));
    let err = api.compute_order_summary(&own).await.unwrap_err();
    let own_product = OrderSummaryError::OwnProductOrder(m.merchant_id);
    assert!(matches!(err, MarketplaceError::OrderSummary(ref e) if *e == own_product));
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn slow_courier_times_out() {
    let (db, clock, m) = setup().await;
    seed_order(&db, "ORD-T", m.buyer_id, &[(m.product_id, Some(m.variant_id), 1)]).await;
    let slow = StubCourier::new().with_service("REG", DELIVERY_COST).with_delay(Duration::from_millis(200));
    let api = OrderSummaryApi::new(db.clone(), slow, clock, Duration::from_millis(20));
    let err = api.compute_order_summary(&shirt_order_request(&m, "ORD-T")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalDependency);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn wallet_checkout_writes_everything_at_once() {
    let (db, clock, m) = setup().await;
    let result = wallet_checkout_of_shirts(&db, clock.clone(), &m, "ORD-W").await;
    assert_eq!(result.payment.status, PaymentStatus::Paid);
    assert_eq!(result.payment.method, PaymentMethodType::Wallet);
    assert_eq!(result.payment.amount, rupiah(95_000));
    assert_eq!(result.transactions.len(), 1);
    let tx = &result.transactions[0];
    assert_eq!(tx.status, TransactionStatusType::Waited);
    assert_eq!(tx.merchant_id, m.merchant_id);
    let details = tx.payment_details().unwrap();
    assert!(details.is_consistent());
    assert_eq!(details.total, rupiah(95_000));
    assert_eq!(tx.cart_items().unwrap()[0].quantity, 2);
    let events = db.fetch_status_events(tx.id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, TransactionStatusType::Waited);

    let ledger = LedgerApi::new(db.clone(), clock.clone());
    assert_eq!(ledger.wallet_balance(m.buyer_id).await.unwrap(), rupiah(0));
    assert_eq!(db.fetch_variant(m.variant_id).await.unwrap().unwrap().stock, 8);
    let voucher = db.fetch_merchant_voucher_by_code(m.merchant_id, "HEMAT20").await.unwrap().unwrap();
    assert_eq!(voucher.quota, 9);
    let order = db.fetch_order_by_code(&OrderCode::from("ORD-W")).await.unwrap().unwrap();
    assert!(!order.is_active);

    // The order is spent
    let request = CheckoutRequest::new(shirt_order_request(&m, "ORD-W"), PaymentMethod::Wallet);
    let err = checkout_api(&db, clock).create_transactions_from_summary(request).await.unwrap_err();
    assert!(matches!(
        err,
        MarketplaceError::Checkout(CheckoutError::SummaryNotCheckoutable { is_order_eligible: false, .. })
    ));
}

#[tokio::test]
async fn failed_wallet_debit_leaves_no_trace() {
    let (db, clock, m) = setup().await;
    LedgerApi::new(db.clone(), clock.clone()).top_up_wallet(m.buyer_id, rupiah(50_000)).await.unwrap();
    seed_order(&db, "ORD-POOR", m.buyer_id, &[(m.product_id, Some(m.variant_id), 2)]).await;
    let request = CheckoutRequest::new(shirt_order_request(&m, "ORD-POOR"), PaymentMethod::Wallet);
    let err = checkout_api(&db, clock.clone()).create_transactions_from_summary(request).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Ledger);
    assert_eq!(db.fetch_variant(m.variant_id).await.unwrap().unwrap().stock, 10);
    let order = db.fetch_order_by_code(&OrderCode::from("ORD-POOR")).await.unwrap().unwrap();
    assert!(order.is_active);
    assert!(db.fetch_transactions_for_user(m.buyer_id).await.unwrap().is_empty());
    let ledger = LedgerApi::new(db.clone(), clock);
    assert_eq!(ledger.wallet_balance(m.buyer_id).await.unwrap(), rupiah(50_000));
}

fn two_merchant_request(m: &StandardMarketplace, code: &str) -> OrderSummaryRequest {
    shirt_order_request(m, code)
        .with_merchant_choice(m.second_merchant_id, MerchantChoice::default().with_courier(COURIER))
        .with_marketplace_voucher("MKT10")
}

#[tokio::test]
async fn gateway_checkout_splits_the_marketplace_voucher() {
    let (db, clock, m) = setup().await;
    let now = clock.now();
    seed_marketplace_voucher(&db, "MKT10", 10, 50_000, 5, now).await;
    seed_order(&db, "ORD-2M", m.buyer_id, &[(m.product_id, Some(m.variant_id), 2), (m.second_product_id, None, 1)])
        .await;
    let gateway = StubGateway::new();
    let summaries = summary_api(&db, clock.clone());
    let checkout = CheckoutApi::new(summaries, gateway.clone(), EventProducers::default(), PROVIDER_TIMEOUT);
    let request = CheckoutRequest::new(two_merchant_request(&m, "ORD-2M"), PaymentMethod::Gateway {
        channel: "bca_va".into(),
    });
    let result = checkout.create_transactions_from_summary(request).await.unwrap();
    // 130,000 + 2 x 15,000 delivery - 20,000 merchant voucher - 10% of 110,000
    assert_eq!(result.payment.amount, rupiah(129_000));
    assert_eq!(result.payment.status, PaymentStatus::Pending);
    assert!(result.redirect_url().unwrap().starts_with("https://pay.example/"));
    assert_eq!(gateway.initiated(), 1);
    assert_eq!(result.transactions.len(), 2);
    let details = result.transactions.iter().map(|t| t.payment_details().unwrap()).collect::<Vec<_>>();
    // In proportion to the 80,000 and 30,000 each merchant contributes after its own voucher
    assert_eq!(details[0].marketplace_voucher_nominal, rupiah(8_000));
    assert_eq!(details[1].marketplace_voucher_nominal, rupiah(3_000));
    assert_eq!(details.iter().map(|d| d.total).sum::<Rupiah>(), rupiah(129_000));

    // Merchants cannot start on an unpaid transaction
    let payments = PaymentApi::new(db.clone(), EventProducers::default(), clock.clone());
    let settled = payments.update_payment_status(&result.payment.payment_id, rupiah(129_000), true).await.unwrap();
    assert_eq!(settled.payment.status, PaymentStatus::Paid);
    assert!(settled.canceled.is_empty());
    let err = payments.update_payment_status(&result.payment.payment_id, rupiah(129_000), true).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateConflict);
}

#[tokio::test]
async fn failed_gateway_payment_cancels_and_restocks() {
    let (db, clock, m) = setup().await;
    seed_order(&db, "ORD-F", m.buyer_id, &[(m.product_id, Some(m.variant_id), 2), (m.second_product_id, None, 1)])
        .await;
    let request = shirt_order_request(&m, "ORD-F")
        .with_merchant_choice(m.second_merchant_id, MerchantChoice::default().with_courier(COURIER));
    let request = CheckoutRequest::new(request, PaymentMethod::Gateway { channel: "bca_va".into() });
    let result = checkout_api(&db, clock.clone()).create_transactions_from_summary(request).await.unwrap();
    assert_eq!(db.fetch_product(m.second_product_id).await.unwrap().unwrap().stock, 4);

    let payments = PaymentApi::new(db.clone(), EventProducers::default(), clock.clone());
    let err = payments.update_payment_status(&result.payment.payment_id, rupiah(1), false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let settled =
        payments.update_payment_status(&result.payment.payment_id, result.payment.amount, false).await.unwrap();
    assert_eq!(settled.payment.status, PaymentStatus::Failed);
    assert_eq!(settled.canceled.len(), 2);
    assert!(settled.canceled.iter().all(|o| o.transaction.status == TransactionStatusType::Canceled));
    assert_eq!(db.fetch_variant(m.variant_id).await.unwrap().unwrap().stock, 10);
    assert_eq!(db.fetch_product(m.second_product_id).await.unwrap().unwrap().stock, 5);
    let ledger = LedgerApi::new(db.clone(), clock);
    assert_eq!(ledger.wallet_balance(m.buyer_id).await.unwrap(), rupiah(0));
}

#[tokio::test]
async fn rejected_gateway_writes_nothing() {
    let (db, clock, m) = setup().await;
    seed_order(&db, "ORD-R", m.buyer_id, &[(m.product_id, Some(m.variant_id), 1)]).await;
    let checkout = CheckoutApi::new(
        summary_api(&db, clock),
        StubGateway::rejecting("channel closed"),
        EventProducers::default(),
        PROVIDER_TIMEOUT,
    );
    let method = PaymentMethod::Gateway { channel: "bca_va".into() };
    let request = CheckoutRequest::new(shirt_order_request(&m, "ORD-R"), method);
    let err = checkout.create_transactions_from_summary(request).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalDependency);
    assert!(db.fetch_order_by_code(&OrderCode::from("ORD-R")).await.unwrap().unwrap().is_active);
    assert_eq!(db.fetch_variant(m.variant_id).await.unwrap().unwrap().stock, 10);
}

#[tokio::test]
async fn late_payment_after_cancel_is_refunded_without_restocking_again() {
    let (db, clock, m) = setup().await;
    seed_order(&db, "ORD-LATE", m.buyer_id, &[(m.product_id, Some(m.variant_id), 2)]).await;
    let request = CheckoutRequest::new(shirt_order_request(&m, "ORD-LATE"), PaymentMethod::Gateway {
        channel: "bca_va".into(),
    });
    let result = checkout_api(&db, clock.clone()).create_transactions_from_summary(request).await.unwrap();
    assert_eq!(db.fetch_variant(m.variant_id).await.unwrap().unwrap().stock, 8);

    let invoice = result.transactions[0].invoice_code.clone();
    let flow = TransactionFlowApi::new(db.clone(), EventProducers::default(), clock.clone());
    flow.transition_user_status(m.buyer_id, &invoice, UserAction::Cancel).await.unwrap();
    assert_eq!(db.fetch_variant(m.variant_id).await.unwrap().unwrap().stock, 10);
    let ledger = LedgerApi::new(db.clone(), clock.clone());
    assert_eq!(ledger.wallet_balance(m.buyer_id).await.unwrap(), rupiah(0));

    let payments = PaymentApi::new(db.clone(), EventProducers::default(), clock.clone());
    let settled = payments.update_payment_status(&result.payment.payment_id, rupiah(95_000), true).await.unwrap();
    assert_eq!(settled.payment.status, PaymentStatus::Paid);
    assert!(settled.canceled.is_empty());
    assert_eq!(ledger.wallet_balance(m.buyer_id).await.unwrap(), rupiah(95_000));
    assert_eq!(db.fetch_variant(m.variant_id).await.unwrap().unwrap().stock, 10);
}

#[tokio::test]
async fn large_marketplace_voucher_never_drives_a_merchant_negative() {
    let (db, clock, m) = setup().await;
    let now = clock.now();
    seed_marketplace_voucher(&db, "MKT100", 100, 100_000, 5, now).await;
    seed_order(&db, "ORD-BIG", m.buyer_id, &[(m.product_id, Some(m.variant_id), 2), (m.second_product_id, None, 1)])
        .await;
    let ledger = LedgerApi::new(db.clone(), clock.clone());
    ledger.top_up_wallet(m.buyer_id, rupiah(40_000)).await.unwrap();
    let request = shirt_order_request(&m, "ORD-BIG")
        .with_merchant_choice(m.second_merchant_id, MerchantChoice::default().with_courier(COURIER))
        .with_marketplace_voucher("MKT100");
    let request = CheckoutRequest::new(request, PaymentMethod::Wallet);
    let result = checkout_api(&db, clock.clone()).create_transactions_from_summary(request).await.unwrap();
    // 130,000 + 30,000 delivery - 20,000 merchant voucher - 100,000 marketplace voucher
    assert_eq!(result.payment.amount, rupiah(40_000));
    let details = result.transactions.iter().map(|t| t.payment_details().unwrap()).collect::<Vec<_>>();
    assert_eq!(details[0].total, rupiah(22_272));
    assert_eq!(details[1].total, rupiah(17_728));
    assert!(details.iter().all(|d| !d.total.is_negative()));

    // The mug can be canceled, and the buyer gets back exactly what that parcel cost them
    let mug = result.transactions.iter().find(|t| t.merchant_id == m.second_merchant_id).unwrap();
    let flow = TransactionFlowApi::new(db.clone(), EventProducers::default(), clock.clone());
    flow.transition_user_status(m.buyer_id, &mug.invoice_code, UserAction::Cancel).await.unwrap();
    assert_eq!(ledger.wallet_balance(m.buyer_id).await.unwrap(), rupiah(17_728));
    assert_eq!(db.fetch_product(m.second_product_id).await.unwrap().unwrap().stock, 5);
}

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use marketplace_engine::{
    db_types::{LedgerDirection, LedgerEntryType, TransactionStatusType},
    events::EventProducers,
    helpers::{Clock, FixedClock},
    order_objects::{CheckoutRequest, PaymentMethod},
    test_utils::{
        flows::{checkout_api, deliver, shirt_order_request},
        prepare_env::new_test_database,
        seed::*,
    },
    traits::LedgerError,
    transaction_objects::UserAction,
    LedgerApi,
    SqliteDatabase,
    TransactionFlowApi,
};

async fn setup() -> (SqliteDatabase, Arc<dyn Clock>, StandardMarketplace) {
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
    let db = new_test_database().await;
    let m = seed_standard_marketplace(&db, now).await;
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(now));
    (db, clock, m)
}

#[tokio::test]
async fn wallets_open_on_first_top_up() {
    let (db, clock, m) = setup().await;
    let ledger = LedgerApi::new(db, clock);
    assert_eq!(ledger.wallet_balance(m.buyer_id).await.unwrap(), rupiah(0));
    assert!(matches!(ledger.fetch_wallet(m.buyer_id).await, Err(LedgerError::WalletNotFound(_))));

    ledger.top_up_wallet(m.buyer_id, rupiah(40_000)).await.unwrap();
    let wallet = ledger.top_up_wallet(m.buyer_id, rupiah(2_500)).await.unwrap();
    assert_eq!(wallet.balance, rupiah(42_500));
    let history = ledger.wallet_history(m.buyer_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|h| h.direction == LedgerDirection::Credit && h.entry_type == LedgerEntryType::TopUp));

    let err = ledger.top_up_wallet(m.buyer_id, rupiah(-1)).await.unwrap_err();
    assert!(matches!(err, LedgerError::NegativeAmount(_)));
    assert_eq!(ledger.wallet_balance(m.buyer_id).await.unwrap(), rupiah(42_500));
}

#[tokio::test]
async fn merchants_cannot_overdraw() {
    let (db, clock, m) = setup().await;
    let ledger = LedgerApi::new(db, clock);
    let err = ledger.withdraw_from_holding_account(m.merchant_id, rupiah(1)).await.unwrap_err();
    assert!(matches!(err, LedgerError::HoldingAccountNotFound(id) if id == m.merchant_id));
}

#[tokio::test]
async fn completed_sale_pays_out_and_records_the_subsidy() {
    let (db, clock, m) = setup().await;
    let now = clock.now();
    seed_marketplace_voucher(&db, "MKT10", 10, 50_000, 5, now).await;
    let ledger = LedgerApi::new(db.clone(), clock.clone());
    ledger.top_up_wallet(m.buyer_id, rupiah(100_000)).await.unwrap();
    seed_order(&db, "ORD-SUB", m.buyer_id, &[(m.product_id, Some(m.variant_id), 2)]).await;
    let request = shirt_order_request(&m, "ORD-SUB").with_marketplace_voucher("MKT10");
    let request = CheckoutRequest::new(request, PaymentMethod::Wallet);
    let result = checkout_api(&db, clock.clone()).create_transactions_from_summary(request).await.unwrap();
    // 95,000 less 10% of the 80,000 left after the merchant voucher
    assert_eq!(result.payment.amount, rupiah(87_000));
    assert_eq!(ledger.wallet_balance(m.buyer_id).await.unwrap(), rupiah(13_000));

    let invoice = result.transactions[0].invoice_code.clone();
    deliver(&db, clock.clone(), m.merchant_id, &invoice).await;
    let flow = TransactionFlowApi::new(db.clone(), EventProducers::default(), clock.clone());
    let outcome = flow.transition_user_status(m.buyer_id, &invoice, UserAction::Complete).await.unwrap();
    assert_eq!(outcome.transaction.status, TransactionStatusType::Completed);

    // The merchant is paid as if the buyer had paid in full. The marketplace covers the difference.
    assert_eq!(ledger.holding_balance(m.merchant_id).await.unwrap(), rupiah(95_000));
    let subsidies = ledger.fetch_subsidies().await.unwrap();
    assert_eq!(subsidies.len(), 1);
    assert_eq!(subsidies[0].invoice_code, invoice);
    assert_eq!(ledger.total_subsidy().await.unwrap(), rupiah(8_000));

    let err = ledger.withdraw_from_holding_account(m.merchant_id, rupiah(95_001)).await.unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientBalance { available, .. } if available == rupiah(95_000)));
    assert_eq!(ledger.holding_balance(m.merchant_id).await.unwrap(), rupiah(95_000));
    let account = ledger.withdraw_from_holding_account(m.merchant_id, rupiah(45_000)).await.unwrap();
    assert_eq!(account.balance, rupiah(50_000));
    let history = ledger.holding_account_history(m.merchant_id).await.unwrap();
    let kinds = history.iter().map(|h| (h.direction, h.entry_type)).collect::<Vec<_>>();
    assert_eq!(kinds, vec![
        (LedgerDirection::Credit, LedgerEntryType::Sale),
        (LedgerDirection::Debit, LedgerEntryType::Withdrawal)
    ]);
}

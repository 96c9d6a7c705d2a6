use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use marketplace_engine::{
    db_types::{
        Actor,
        InvoiceCode,
        RefundDecision,
        RefundParty,
        Resolution,
        TransactionStatusType,
    },
    events::EventProducers,
    helpers::{Clock, FixedClock},
    test_utils::{
        flows::{deliver, wallet_checkout_of_shirts},
        prepare_env::new_test_database,
        seed::*,
    },
    transaction_objects::{MerchantStatusUpdate, RefundReason},
    CatalogManagement,
    EscalationApi,
    EscalationPolicy,
    LedgerApi,
    RefundApi,
    SqliteDatabase,
    SweepReport,
    TransactionFlowApi,
};

struct Fixture {
    db: SqliteDatabase,
    clock: FixedClock,
    m: StandardMarketplace,
    invoice: InvoiceCode,
}

impl Fixture {
    fn shared_clock(&self) -> Arc<dyn Clock> {
        Arc::new(self.clock.clone())
    }

    fn escalation(&self) -> EscalationApi<SqliteDatabase> {
        EscalationApi::new(self.db.clone(), EventProducers::default(), EscalationPolicy::default())
    }

    fn ledger(&self) -> LedgerApi<SqliteDatabase> {
        LedgerApi::new(self.db.clone(), self.shared_clock())
    }

    fn refunds(&self) -> RefundApi<SqliteDatabase> {
        RefundApi::new(self.db.clone(), EventProducers::default(), self.shared_clock())
    }

    async fn sweep_after(&self, hours: i64) -> SweepReport {
        self.clock.advance(Duration::hours(hours));
        self.escalation().run_sweeps(self.clock.now()).await.unwrap()
    }

    async fn status(&self) -> TransactionStatusType {
        let api = TransactionFlowApi::new(self.db.clone(), EventProducers::default(), self.shared_clock());
        api.fetch_transaction(&self.invoice).await.unwrap().status
    }

    async fn open_refund(&self) -> i64 {
        let reason = RefundReason::new("Wrong colour");
        let outcome = self.refunds().open_refund_request(self.m.buyer_id, &self.invoice, reason).await.unwrap();
        outcome.refund_request.unwrap().id
    }
}

async fn paid_shirt_order() -> Fixture {
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
    let db = new_test_database().await;
    let m = seed_standard_marketplace(&db, now).await;
    let clock = FixedClock::new(now);
    let result = wallet_checkout_of_shirts(&db, Arc::new(clock.clone()), &m, "ORD-ES").await;
    let invoice = result.transactions[0].invoice_code.clone();
    Fixture { db, clock, m, invoice }
}

#[tokio::test]
async fn scenario_b_unprocessed_orders_are_canceled() {
    let f = paid_shirt_order().await;
    assert_eq!(f.ledger().wallet_balance(f.m.buyer_id).await.unwrap(), rupiah(0));
    assert_eq!(f.db.fetch_variant(f.m.variant_id).await.unwrap().unwrap().stock, 8);

    let report = f.sweep_after(23).await;
    assert_eq!(report.total_moved(), 0);
    let report = f.sweep_after(2).await;
    assert_eq!(report.canceled_waited, 1);
    assert_eq!(report.failures, 0);
    assert_eq!(f.status().await, TransactionStatusType::Canceled);
    assert_eq!(f.ledger().wallet_balance(f.m.buyer_id).await.unwrap(), rupiah(95_000));
    assert_eq!(f.db.fetch_variant(f.m.variant_id).await.unwrap().unwrap().stock, 10);

    let report = f.sweep_after(1).await;
    assert_eq!(report, SweepReport::default());
    assert_eq!(f.ledger().wallet_balance(f.m.buyer_id).await.unwrap(), rupiah(95_000));
}

#[tokio::test]
async fn unshipped_orders_are_canceled() {
    let f = paid_shirt_order().await;
    let api = TransactionFlowApi::new(f.db.clone(), EventProducers::default(), f.shared_clock());
    api.transition_merchant_status(f.m.merchant_id, &f.invoice, MerchantStatusUpdate::process()).await.unwrap();
    assert_eq!(f.sweep_after(47).await.total_moved(), 0);
    let report = f.sweep_after(2).await;
    assert_eq!(report.canceled_processed, 1);
    assert_eq!(f.status().await, TransactionStatusType::Canceled);
    assert_eq!(f.ledger().wallet_balance(f.m.buyer_id).await.unwrap(), rupiah(95_000));
}

#[tokio::test]
async fn quiet_buyers_complete_delivered_orders() {
    let f = paid_shirt_order().await;
    deliver(&f.db, f.shared_clock(), f.m.merchant_id, &f.invoice).await;
    assert_eq!(f.sweep_after(71).await.total_moved(), 0);
    let report = f.sweep_after(2).await;
    assert_eq!(report.completed_delivered, 1);
    assert_eq!(f.status().await, TransactionStatusType::Completed);
    assert_eq!(f.ledger().holding_balance(f.m.merchant_id).await.unwrap(), rupiah(95_000));
}

#[tokio::test]
async fn refund_requests_are_not_completed_by_the_delivery_timeout() {
    let f = paid_shirt_order().await;
    deliver(&f.db, f.shared_clock(), f.m.merchant_id, &f.invoice).await;
    f.clock.advance(Duration::hours(70));
    f.open_refund().await;
    let report = f.sweep_after(5).await;
    assert_eq!(report.completed_delivered, 0);
    assert_eq!(report.seller_accepted, 0);
    assert_eq!(f.status().await, TransactionStatusType::RequestRefund);
}

#[tokio::test]
async fn silent_sellers_accept_the_refund() {
    let f = paid_shirt_order().await;
    deliver(&f.db, f.shared_clock(), f.m.merchant_id, &f.invoice).await;
    let request_id = f.open_refund().await;
    let report = f.sweep_after(49).await;
    assert_eq!(report.seller_accepted, 1);
    assert_eq!(f.status().await, TransactionStatusType::Refunded);
    assert_eq!(f.ledger().wallet_balance(f.m.buyer_id).await.unwrap(), rupiah(95_000));
    let case = f.refunds().fetch_refund_case(request_id).await.unwrap();
    assert_eq!(case.resolution(), Some(Resolution::SellerAccepted));
}

#[tokio::test]
async fn silent_buyers_accept_the_ruling() {
    let f = paid_shirt_order().await;
    deliver(&f.db, f.shared_clock(), f.m.merchant_id, &f.invoice).await;
    let request_id = f.open_refund().await;
    let refunds = f.refunds();
    let seller = Actor::Merchant(f.m.merchant_id);
    refunds.advance_refund_round(request_id, RefundParty::Seller, RefundDecision::Reject, seller).await.unwrap();
    f.clock.advance(Duration::hours(1));
    refunds
        .advance_refund_round(request_id, RefundParty::Admin, RefundDecision::Reject, Actor::Admin(9))
        .await
        .unwrap();
    assert_eq!(f.sweep_after(47).await.total_moved(), 0);
    let report = f.sweep_after(2).await;
    assert_eq!(report.buyer_accepted, 1);
    assert_eq!(f.status().await, TransactionStatusType::Completed);
    let case = refunds.fetch_refund_case(request_id).await.unwrap();
    assert_eq!(case.resolution(), Some(Resolution::BuyerAcceptedRejection));
    assert_eq!(f.ledger().holding_balance(f.m.merchant_id).await.unwrap(), rupiah(95_000));
}

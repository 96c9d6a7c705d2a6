use std::sync::Arc;

use chrono::{TimeZone, Utc};
use cucumber::World;
use log::*;
use marketplace_engine::{
    db_types::InvoiceCode,
    events::EventProducers,
    helpers::{Clock, FixedClock},
    order_objects::OrderSummary,
    test_utils::{
        flows::{checkout_api, summary_api},
        prepare_env::{prepare_test_env, random_db_path},
        seed::{seed_standard_marketplace, StandardMarketplace},
        stubs::{StubCourier, StubGateway},
    },
    CheckoutApi,
    EscalationApi,
    EscalationPolicy,
    LedgerApi,
    MarketplaceError,
    OrderSummaryApi,
    RefundApi,
    SqliteDatabase,
    TransactionFlowApi,
};

#[derive(Default, Debug, World)]
pub struct MarketplaceWorld {
    pub system: Option<MarketplaceSystem>,
    pub summary: Option<OrderSummary>,
    pub invoice: Option<InvoiceCode>,
    pub refund_request: Option<i64>,
    pub last_error: Option<MarketplaceError>,
}

/// A seeded marketplace on its own database, with a clock that only moves when a step says so.
#[derive(Debug)]
pub struct MarketplaceSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub clock: FixedClock,
    pub m: StandardMarketplace,
}

impl MarketplaceWorld {
    pub fn system(&self) -> &MarketplaceSystem {
        self.system.as_ref().expect("Marketplace not initialised")
    }

    pub fn invoice(&self) -> InvoiceCode {
        self.invoice.clone().expect("No transaction has been created yet")
    }

    pub fn refund_request(&self) -> i64 {
        self.refund_request.expect("No refund request has been opened yet")
    }

    pub fn take_error(&mut self) -> MarketplaceError {
        self.last_error.take().expect("The last step did not fail")
    }
}

impl MarketplaceSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        debug!("🚀️ Created database: {url}");
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let m = seed_standard_marketplace(&db, now).await;
        Self { db_path: url, db, clock: FixedClock::new(now), m }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::new(self.clock.clone())
    }

    pub fn summaries(&self) -> OrderSummaryApi<SqliteDatabase, StubCourier> {
        summary_api(&self.db, self.clock())
    }

    pub fn checkout(&self) -> CheckoutApi<SqliteDatabase, StubCourier, StubGateway> {
        checkout_api(&self.db, self.clock())
    }

    pub fn flow(&self) -> TransactionFlowApi<SqliteDatabase> {
        TransactionFlowApi::new(self.db.clone(), EventProducers::default(), self.clock())
    }

    pub fn refunds(&self) -> RefundApi<SqliteDatabase> {
        RefundApi::new(self.db.clone(), EventProducers::default(), self.clock())
    }

    pub fn ledger(&self) -> LedgerApi<SqliteDatabase> {
        LedgerApi::new(self.db.clone(), self.clock())
    }

    pub fn escalation(&self) -> EscalationApi<SqliteDatabase> {
        EscalationApi::new(self.db.clone(), EventProducers::default(), EscalationPolicy::default())
    }
}

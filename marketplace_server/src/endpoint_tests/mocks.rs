use chrono::{DateTime, Utc};
use marketplace_engine::{
    db_types::{Payment, PaymentId},
    traits::{PaymentManagement, PaymentSettlement},
    MarketplaceError,
};
use mkt_common::Rupiah;
use mockall::mock;

mock! {
    pub PaymentManager {}
    impl PaymentManagement for PaymentManager {
        async fn fetch_payment(&self, payment_id: &PaymentId) -> Result<Option<Payment>, MarketplaceError>;
        async fn settle_payment(&self, payment_id: &PaymentId, amount: Rupiah, success: bool, now: DateTime<Utc>) -> Result<PaymentSettlement, MarketplaceError>;
    }
}

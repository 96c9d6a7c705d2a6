use std::sync::Arc;

use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{TimeZone, Utc};
use marketplace_engine::{
    db_types::{Payment, PaymentId, PaymentMethodType, PaymentStatus},
    events::EventProducers,
    helpers::FixedClock,
    traits::{PaymentError, PaymentSettlement},
    MarketplaceError,
    PaymentApi,
};
use mkt_common::Rupiah;

use super::{
    helpers::{post_json, TEST_TOKEN},
    mocks::MockPaymentManager,
};
use crate::{config::WebhookConfig, routes::PaymentWebhookRoute};

const PAID_CALLBACK: &str = r#"{"payment_id":"PG-ORD-1-1","amount":129000,"success":true}"#;

fn payment(status: PaymentStatus) -> Payment {
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
    Payment {
        id: 1,
        payment_id: PaymentId::from("PG-ORD-1-1"),
        user_id: 1,
        amount: Rupiah::from(129_000),
        method: PaymentMethodType::Gateway,
        channel: Some("bca_va".into()),
        redirect_url: Some("https://pay.example/PG-ORD-1-1".into()),
        status,
        created_at: at,
        updated_at: at,
    }
}

fn configure_with(manager: MockPaymentManager) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()));
        let api = PaymentApi::new(manager, EventProducers::default(), clock);
        cfg.service(PaymentWebhookRoute::<MockPaymentManager>::new())
            .app_data(web::Data::new(api))
            .app_data(web::Data::new(WebhookConfig::new(TEST_TOKEN)));
    }
}

#[actix_web::test]
async fn successful_payment() {
    let _ = env_logger::try_init().ok();
    let mut manager = MockPaymentManager::new();
    manager
        .expect_settle_payment()
        .withf(|id, amount, success, _| id.0 == "PG-ORD-1-1" && *amount == Rupiah::from(129_000) && *success)
        .times(1)
        .returning(|_, _, _, _| Ok(PaymentSettlement { payment: payment(PaymentStatus::Paid), canceled: vec![] }));
    let (status, body) = post_json(Some(TEST_TOKEN), "/webhook/payment", PAID_CALLBACK, configure_with(manager)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""status":"Paid""#), "Unexpected body: {body}");
    assert!(body.contains(r#""canceled":[]"#), "Unexpected body: {body}");
}

#[actix_web::test]
async fn callbacks_without_the_token_are_refused() {
    let _ = env_logger::try_init().ok();
    let mut manager = MockPaymentManager::new();
    manager.expect_settle_payment().never();
    let (status, _) = post_json(None, "/webhook/payment", PAID_CALLBACK, configure_with(manager)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut manager = MockPaymentManager::new();
    manager.expect_settle_payment().never();
    let (status, body) = post_json(Some("guess"), "/webhook/payment", PAID_CALLBACK, configure_with(manager)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"The callback token is missing or invalid."}"#);
}

#[actix_web::test]
async fn repeated_callbacks_conflict() {
    let _ = env_logger::try_init().ok();
    let mut manager = MockPaymentManager::new();
    manager.expect_settle_payment().returning(|id, _, _, _| {
        Err(MarketplaceError::from(PaymentError::PaymentAlreadySettled {
            payment_id: id.clone(),
            status: PaymentStatus::Paid,
        }))
    });
    let (status, body) = post_json(Some(TEST_TOKEN), "/webhook/payment", PAID_CALLBACK, configure_with(manager)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, r#"{"error":"Payment PG-ORD-1-1 has already been settled as Paid"}"#);
}

#[actix_web::test]
async fn unknown_payments_are_not_found() {
    let _ = env_logger::try_init().ok();
    let mut manager = MockPaymentManager::new();
    manager
        .expect_settle_payment()
        .returning(|id, _, _, _| Err(MarketplaceError::from(PaymentError::PaymentNotFound(id.clone()))));
    let (status, _) = post_json(Some(TEST_TOKEN), "/webhook/payment", PAID_CALLBACK, configure_with(manager)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn wrong_amounts_are_bad_requests() {
    let _ = env_logger::try_init().ok();
    let mut manager = MockPaymentManager::new();
    manager.expect_settle_payment().returning(|id, amount, _, _| {
        Err(MarketplaceError::from(PaymentError::PaymentAmountMismatch {
            payment_id: id.clone(),
            expected: Rupiah::from(129_000),
            received: amount,
        }))
    });
    let callback = r#"{"payment_id":"PG-ORD-1-1","amount":1,"success":true}"#;
    let (status, _) = post_json(Some(TEST_TOKEN), "/webhook/payment", callback, configure_with(manager)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

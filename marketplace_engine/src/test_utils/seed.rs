//! Catalog seeding. The engine never writes catalog, address or voucher definitions itself, so tests insert them
//! directly.
use chrono::{DateTime, Duration, Utc};
use mkt_common::Rupiah;

use crate::{
    db_types::{DiscountType, NewOrder, NewOrderItem, Order, OrderCode},
    traits::MarketplaceDatabase,
    SqliteDatabase,
};

pub async fn seed_city(db: &SqliteDatabase, name: &str, routing_id: &str) -> i64 {
    sqlx::query_scalar("INSERT INTO cities (name, routing_id) VALUES ($1, $2) RETURNING id")
        .bind(name)
        .bind(routing_id)
        .fetch_one(db.pool())
        .await
        .expect("Error seeding city")
}

pub async fn seed_address(db: &SqliteDatabase, user_id: i64, city_id: i64, is_default: bool) -> i64 {
    sqlx::query_scalar(
        r#"INSERT INTO user_addresses (user_id, city_id, recipient, phone, street, postal_code, is_default)
        VALUES ($1, $2, 'Budi', '0812000111', 'Jl. Merdeka 1', '10110', $3) RETURNING id"#,
    )
    .bind(user_id)
    .bind(city_id)
    .bind(is_default)
    .fetch_one(db.pool())
    .await
    .expect("Error seeding address")
}

pub async fn seed_merchant(db: &SqliteDatabase, user_id: i64, domain: &str, city_id: i64) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO merchants (user_id, name, domain, city_id, created_at) VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(user_id)
    .bind(format!("Toko {domain}"))
    .bind(domain)
    .bind(city_id)
    .bind(Utc::now())
    .fetch_one(db.pool())
    .await
    .expect("Error seeding merchant")
}

/// `services` is a comma-separated list of enabled service codes
pub async fn seed_courier(db: &SqliteDatabase, merchant_id: i64, courier_code: &str, services: &str) {
    sqlx::query("INSERT INTO merchant_couriers (merchant_id, courier_code, services) VALUES ($1, $2, $3)")
        .bind(merchant_id)
        .bind(courier_code)
        .bind(services)
        .execute(db.pool())
        .await
        .expect("Error seeding courier");
}

pub async fn seed_product(db: &SqliteDatabase, merchant_id: i64, name: &str, price: i64, stock: i64) -> i64 {
    sqlx::query_scalar(
        r#"INSERT INTO products (merchant_id, name, price, stock, weight_grams) VALUES ($1, $2, $3, $4, 500)
        RETURNING id"#,
    )
    .bind(merchant_id)
    .bind(name)
    .bind(price)
    .bind(stock)
    .fetch_one(db.pool())
    .await
    .expect("Error seeding product")
}

pub async fn seed_variant(db: &SqliteDatabase, product_id: i64, name: &str, price: i64, stock: i64) -> i64 {
    sqlx::query_scalar("INSERT INTO variants (product_id, name, price, stock) VALUES ($1, $2, $3, $4) RETURNING id")
        .bind(product_id)
        .bind(name)
        .bind(price)
        .bind(stock)
        .fetch_one(db.pool())
        .await
        .expect("Error seeding variant")
}

pub async fn delete_variant(db: &SqliteDatabase, variant_id: i64) {
    sqlx::query("UPDATE variants SET is_deleted = TRUE WHERE id = $1")
        .bind(variant_id)
        .execute(db.pool())
        .await
        .expect("Error deleting variant");
}

#[allow(clippy::too_many_arguments)]
pub async fn seed_promotion(
    db: &SqliteDatabase,
    product_id: i64,
    discount_type: DiscountType,
    nominal: i64,
    quota: i64,
    max_discounted_quantity: i64,
    now: DateTime<Utc>,
) -> i64 {
    sqlx::query_scalar(
        r#"INSERT INTO promotions
        (product_id, discount_type, nominal, quota, max_discounted_quantity, starts_at, ends_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id"#,
    )
    .bind(product_id)
    .bind(discount_type)
    .bind(nominal)
    .bind(quota)
    .bind(max_discounted_quantity)
    .bind(now - Duration::days(1))
    .bind(now + Duration::days(30))
    .fetch_one(db.pool())
    .await
    .expect("Error seeding promotion")
}

/// A merchant voucher valid from yesterday for the next 30 days
pub async fn seed_merchant_voucher(
    db: &SqliteDatabase,
    merchant_id: i64,
    code: &str,
    nominal: i64,
    min_order: i64,
    quota: i64,
    now: DateTime<Utc>,
) -> i64 {
    sqlx::query_scalar(
        r#"INSERT INTO merchant_vouchers (merchant_id, code, nominal, min_order, quota, starts_at, ends_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id"#,
    )
    .bind(merchant_id)
    .bind(code)
    .bind(nominal)
    .bind(min_order)
    .bind(quota)
    .bind(now - Duration::days(1))
    .bind(now + Duration::days(30))
    .fetch_one(db.pool())
    .await
    .expect("Error seeding merchant voucher")
}

pub async fn seed_marketplace_voucher(
    db: &SqliteDatabase,
    code: &str,
    percentage: i64,
    max_discount: i64,
    quota: i64,
    now: DateTime<Utc>,
) -> i64 {
    sqlx::query_scalar(
        r#"INSERT INTO marketplace_vouchers (code, percentage, max_discount, min_order, quota, starts_at, ends_at)
        VALUES ($1, $2, $3, 0, $4, $5, $6) RETURNING id"#,
    )
    .bind(code)
    .bind(percentage)
    .bind(max_discount)
    .bind(quota)
    .bind(now - Duration::days(1))
    .bind(now + Duration::days(30))
    .fetch_one(db.pool())
    .await
    .expect("Error seeding marketplace voucher")
}

pub async fn seed_order(db: &SqliteDatabase, code: &str, user_id: i64, items: &[(i64, Option<i64>, i64)]) -> Order {
    let order = items.iter().fold(NewOrder::new(OrderCode::from(code), user_id), |order, (product, variant, qty)| {
        order.with_item(NewOrderItem::new(*product, *variant, *qty))
    });
    db.insert_order(order, Utc::now()).await.expect("Error seeding order")
}

/// The ids of a small, ready-to-shop marketplace.
#[derive(Debug, Clone, Copy)]
pub struct StandardMarketplace {
    pub buyer_id: i64,
    pub address_id: i64,
    pub merchant_id: i64,
    pub merchant_user_id: i64,
    pub product_id: i64,
    pub variant_id: i64,
    /// A merchant voucher `HEMAT20` worth 20,000 on orders of at least 50,000
    pub voucher_id: i64,
    pub second_merchant_id: i64,
    pub second_product_id: i64,
}

pub const BUYER_ID: i64 = 1;
pub const MERCHANT_USER_ID: i64 = 100;
pub const SECOND_MERCHANT_USER_ID: i64 = 200;
pub const COURIER: &str = "jne";
/// The cost of the `REG` service the standard courier stub quotes
pub const DELIVERY_COST: i64 = 15_000;

/// Seeds a buyer in Jakarta and two merchants in Bandung that ship with `jne REG`.
///
/// The first merchant sells a shirt with a `Blue / L` variant at 50,000 (10 in stock) and has the `HEMAT20`
/// voucher. The second sells a mug at 30,000 (5 in stock) without variants.
pub async fn seed_standard_marketplace(db: &SqliteDatabase, now: DateTime<Utc>) -> StandardMarketplace {
    let jakarta = seed_city(db, "Jakarta", "JKT").await;
    let bandung = seed_city(db, "Bandung", "BDG").await;
    let address_id = seed_address(db, BUYER_ID, jakarta, true).await;
    let merchant_id = seed_merchant(db, MERCHANT_USER_ID, "kaos-keren", bandung).await;
    seed_courier(db, merchant_id, COURIER, "REG,YES").await;
    let product_id = seed_product(db, merchant_id, "Kaos Polos", 50_000, 0).await;
    let variant_id = seed_variant(db, product_id, "Blue / L", 50_000, 10).await;
    let voucher_id = seed_merchant_voucher(db, merchant_id, "HEMAT20", 20_000, 50_000, 10, now).await;
    let second_merchant_id = seed_merchant(db, SECOND_MERCHANT_USER_ID, "gelas-cantik", bandung).await;
    seed_courier(db, second_merchant_id, COURIER, "REG").await;
    let second_product_id = seed_product(db, second_merchant_id, "Mug Keramik", 30_000, 5).await;
    StandardMarketplace {
        buyer_id: BUYER_ID,
        address_id,
        merchant_id,
        merchant_user_id: MERCHANT_USER_ID,
        product_id,
        variant_id,
        voucher_id,
        second_merchant_id,
        second_product_id,
    }
}

/// The standard courier stub: `REG` at [`DELIVERY_COST`] and an `OKE` service nobody has enabled.
pub fn standard_courier() -> super::stubs::StubCourier {
    super::stubs::StubCourier::new().with_service("OKE", 9_000).with_service("REG", DELIVERY_COST)
}

pub fn rupiah(value: i64) -> Rupiah {
    Rupiah::from(value)
}

use log::trace;
use sqlx::SqliteConnection;

use crate::db_types::{Merchant, MerchantCourier, Product, Promotion, Variant};

pub async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    let product =
        sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(product_id).fetch_optional(conn).await?;
    Ok(product)
}

pub async fn fetch_variant(variant_id: i64, conn: &mut SqliteConnection) -> Result<Option<Variant>, sqlx::Error> {
    let variant =
        sqlx::query_as("SELECT * FROM variants WHERE id = $1").bind(variant_id).fetch_optional(conn).await?;
    Ok(variant)
}

pub async fn fetch_variants_for_product(
    product_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Variant>, sqlx::Error> {
    let variants = sqlx::query_as("SELECT * FROM variants WHERE product_id = $1 ORDER BY id")
        .bind(product_id)
        .fetch_all(conn)
        .await?;
    Ok(variants)
}

pub async fn fetch_promotion_for_product(
    product_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Promotion>, sqlx::Error> {
    let promotion =
        sqlx::query_as("SELECT * FROM promotions WHERE product_id = $1 AND is_active ORDER BY id DESC LIMIT 1")
            .bind(product_id)
            .fetch_optional(conn)
            .await?;
    Ok(promotion)
}

pub async fn fetch_merchant(merchant_id: i64, conn: &mut SqliteConnection) -> Result<Option<Merchant>, sqlx::Error> {
    let merchant =
        sqlx::query_as("SELECT * FROM merchants WHERE id = $1").bind(merchant_id).fetch_optional(conn).await?;
    Ok(merchant)
}

pub async fn fetch_merchant_for_user(
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Merchant>, sqlx::Error> {
    let merchant =
        sqlx::query_as("SELECT * FROM merchants WHERE user_id = $1").bind(user_id).fetch_optional(conn).await?;
    Ok(merchant)
}

pub async fn fetch_merchant_courier(
    merchant_id: i64,
    courier_code: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<MerchantCourier>, sqlx::Error> {
    let courier = sqlx::query_as("SELECT * FROM merchant_couriers WHERE merchant_id = $1 AND courier_code = $2")
        .bind(merchant_id)
        .bind(courier_code)
        .fetch_optional(conn)
        .await?;
    Ok(courier)
}

/// Takes units out of stock if, and only if, there are enough of them. Returns `false` when stock is short, in which
/// case nothing has changed.
pub async fn decrement_stock(
    product_id: i64,
    variant_id: Option<i64>,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = match variant_id {
        Some(variant_id) => {
            sqlx::query("UPDATE variants SET stock = stock - $1 WHERE id = $2 AND product_id = $3 AND stock >= $4")
                .bind(quantity)
                .bind(variant_id)
                .bind(product_id)
                .bind(quantity)
                .execute(conn)
                .await?
        },
        None => {
            sqlx::query("UPDATE products SET stock = stock - $1 WHERE id = $2 AND stock >= $3")
                .bind(quantity)
                .bind(product_id)
                .bind(quantity)
                .execute(conn)
                .await?
        },
    };
    let ok = result.rows_affected() == 1;
    trace!("🗃️ Stock for product {product_id} / variant {variant_id:?} decremented by {quantity}: {ok}");
    Ok(ok)
}

pub async fn restock(
    product_id: i64,
    variant_id: Option<i64>,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    match variant_id {
        Some(variant_id) => {
            sqlx::query("UPDATE variants SET stock = stock + $1 WHERE id = $2")
                .bind(quantity)
                .bind(variant_id)
                .execute(conn)
                .await?;
        },
        None => {
            sqlx::query("UPDATE products SET stock = stock + $1 WHERE id = $2")
                .bind(quantity)
                .bind(product_id)
                .execute(conn)
                .await?;
        },
    }
    trace!("🗃️ Restocked {quantity} units of product {product_id} / variant {variant_id:?}");
    Ok(())
}

/// Consumes promotion quota. Returns `false`, changing nothing, if the remaining quota does not cover `quantity`.
pub async fn consume_promotion_quota(
    promotion_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE promotions SET quota = quota - $1 WHERE id = $2 AND quota >= $3")
        .bind(quantity)
        .bind(promotion_id)
        .bind(quantity)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order, OrderCode, OrderItem},
    sqlite::db::catalog,
    traits::MarketplaceError,
};

/// Inserts the order and its items. Each item is tagged with the merchant that owns the product. This is not atomic;
/// wrap it in a transaction and pass `&mut *tx` if you need it to be.
pub async fn insert_order(
    order: NewOrder,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Order, MarketplaceError> {
    let inserted: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (order_code, user_id, is_active, created_at)
            VALUES ($1, $2, TRUE, $3)
            RETURNING *;
        "#,
    )
    .bind(order.order_code.as_str())
    .bind(order.user_id)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    for item in order.items {
        let product = catalog::fetch_product(item.product_id, &mut *conn)
            .await?
            .ok_or_else(|| MarketplaceError::NotFound(format!("Product #{}", item.product_id)))?;
        sqlx::query(
            r#"
                INSERT INTO order_items (order_id, product_id, variant_id, merchant_id, quantity, notes)
                VALUES ($1, $2, $3, $4, $5, $6);
            "#,
        )
        .bind(inserted.id)
        .bind(item.product_id)
        .bind(item.variant_id)
        .bind(product.merchant_id)
        .bind(item.quantity)
        .bind(item.notes)
        .execute(&mut *conn)
        .await?;
    }
    debug!("🧾️ Order [{}] inserted with id {}", inserted.order_code, inserted.id);
    Ok(inserted)
}

pub async fn fetch_order_by_code(code: &OrderCode, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_code = $1").bind(code.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

/// The items of an order, grouped by merchant and then in insertion order.
pub async fn fetch_order_items(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY merchant_id, id")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Flips the order's active flag off. Returns `false` if the order was already inactive, i.e. someone else checked it
/// out first.
pub async fn deactivate_order(order_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE orders SET is_active = FALSE WHERE id = $1 AND is_active")
        .bind(order_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

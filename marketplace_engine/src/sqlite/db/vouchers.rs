use sqlx::SqliteConnection;

use crate::db_types::{MarketplaceVoucher, MerchantVoucher};

pub async fn fetch_merchant_voucher_by_code(
    merchant_id: i64,
    code: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<MerchantVoucher>, sqlx::Error> {
    let voucher = sqlx::query_as("SELECT * FROM merchant_vouchers WHERE merchant_id = $1 AND code = $2")
        .bind(merchant_id)
        .bind(code)
        .fetch_optional(conn)
        .await?;
    Ok(voucher)
}

pub async fn fetch_marketplace_voucher_by_code(
    code: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<MarketplaceVoucher>, sqlx::Error> {
    let voucher = sqlx::query_as("SELECT * FROM marketplace_vouchers WHERE code = $1")
        .bind(code)
        .fetch_optional(conn)
        .await?;
    Ok(voucher)
}

/// Uses up one unit of voucher quota. Returns `false` if the voucher has none left.
pub async fn consume_merchant_voucher(voucher_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE merchant_vouchers SET quota = quota - 1 WHERE id = $1 AND quota > 0")
        .bind(voucher_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn consume_marketplace_voucher(voucher_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE marketplace_vouchers SET quota = quota - 1 WHERE id = $1 AND quota > 0")
        .bind(voucher_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

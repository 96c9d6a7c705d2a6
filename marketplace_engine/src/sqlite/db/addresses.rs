use sqlx::SqliteConnection;

use crate::db_types::{City, UserAddress};

pub async fn fetch_city(city_id: i64, conn: &mut SqliteConnection) -> Result<Option<City>, sqlx::Error> {
    let city = sqlx::query_as("SELECT * FROM cities WHERE id = $1").bind(city_id).fetch_optional(conn).await?;
    Ok(city)
}

/// The user's default address. If several are flagged as default, the most recently added one wins.
pub async fn fetch_default_address(
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<UserAddress>, sqlx::Error> {
    let address =
        sqlx::query_as("SELECT * FROM user_addresses WHERE user_id = $1 AND is_default ORDER BY id DESC LIMIT 1")
            .bind(user_id)
            .fetch_optional(conn)
            .await?;
    Ok(address)
}

pub async fn fetch_user_address(
    user_id: i64,
    address_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<UserAddress>, sqlx::Error> {
    let address = sqlx::query_as("SELECT * FROM user_addresses WHERE id = $1 AND user_id = $2")
        .bind(address_id)
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(address)
}

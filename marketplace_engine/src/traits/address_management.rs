use crate::{
    db_types::{City, UserAddress},
    traits::MarketplaceError,
};

#[allow(async_fn_in_trait)]
pub trait AddressManagement {
    async fn fetch_city(&self, city_id: i64) -> Result<Option<City>, MarketplaceError>;

    async fn fetch_default_address(&self, user_id: i64) -> Result<Option<UserAddress>, MarketplaceError>;

    /// Fetches the address only if it belongs to `user_id`.
    async fn fetch_user_address(&self, user_id: i64, address_id: i64) -> Result<Option<UserAddress>, MarketplaceError>;
}

use crate::{
    db_types::{Merchant, MerchantCourier, Product, Promotion, Variant},
    traits::MarketplaceError,
};

/// The catalog and inventory contract.
///
/// Product and variant lookups return soft-deleted rows as well; callers decide what a deleted product means for them.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, MarketplaceError>;

    async fn fetch_variant(&self, variant_id: i64) -> Result<Option<Variant>, MarketplaceError>;

    async fn fetch_variants_for_product(&self, product_id: i64) -> Result<Vec<Variant>, MarketplaceError>;

    /// The most recent promotion flagged as active for the product. It may still be outside its validity window.
    async fn fetch_promotion_for_product(&self, product_id: i64) -> Result<Option<Promotion>, MarketplaceError>;

    async fn fetch_merchant(&self, merchant_id: i64) -> Result<Option<Merchant>, MarketplaceError>;

    /// The merchant account owned by a marketplace user, if they have one.
    async fn fetch_merchant_for_user(&self, user_id: i64) -> Result<Option<Merchant>, MarketplaceError>;

    async fn fetch_merchant_courier(
        &self,
        merchant_id: i64,
        courier_code: &str,
    ) -> Result<Option<MerchantCourier>, MarketplaceError>;

    /// Takes `quantity` units out of stock. Stock lives on the variant when there is one, otherwise on the product.
    ///
    /// Fails with `CheckoutError::InsufficientStock` if there are not enough units, without changing anything.
    async fn decrement_stock(
        &self,
        product_id: i64,
        variant_id: Option<i64>,
        quantity: i64,
    ) -> Result<(), MarketplaceError>;

    async fn restock(&self, product_id: i64, variant_id: Option<i64>, quantity: i64) -> Result<(), MarketplaceError>;
}

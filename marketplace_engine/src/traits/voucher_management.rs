use crate::{
    db_types::{MarketplaceVoucher, MerchantVoucher},
    traits::MarketplaceError,
};

#[allow(async_fn_in_trait)]
pub trait VoucherManagement {
    /// Merchant voucher codes are only unique per merchant, so a code that belongs to a different merchant is not found.
    async fn fetch_merchant_voucher_by_code(
        &self,
        merchant_id: i64,
        code: &str,
    ) -> Result<Option<MerchantVoucher>, MarketplaceError>;

    async fn fetch_marketplace_voucher_by_code(&self, code: &str) -> Result<Option<MarketplaceVoucher>, MarketplaceError>;
}

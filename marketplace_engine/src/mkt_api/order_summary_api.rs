//! The order summary calculator.
//!
//! A summary prices an order against the live catalog, the buyer's voucher choices and courier quotes. Computing one
//! never writes anything, so the same request can be summarised as often as the buyer likes. Checkout recomputes the
//! summary itself rather than trusting one the client sends back.
use std::{collections::BTreeMap, fmt::Debug, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use log::*;
use mkt_common::{Rupiah, MIN_DISCOUNTED_PRICE};
use thiserror::Error;

use crate::{
    db_types::{
        DiscountType,
        MarketplaceVoucher,
        Merchant,
        MerchantVoucher,
        Order,
        OrderCode,
        OrderItem,
        Promotion,
        UserAddress,
    },
    helpers::Clock,
    order_objects::{OrderItemPerMerchant, OrderSummary, OrderSummaryRequest, SelectedDelivery, SummaryItem},
    snapshots::AddressSnapshot,
    traits::{DeliveryQuoteError, DeliveryQuoteProvider, DeliveryQuoteRequest, MarketplaceDatabase, MarketplaceError},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderSummaryError {
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderCode),
    #[error("Order {0} has no items")]
    EmptyOrder(OrderCode),
    #[error("The shipping address does not exist or does not belong to the buyer")]
    AddressNotFound,
    #[error("Buyers cannot order from their own shop (merchant #{0})")]
    OwnProductOrder(i64),
    #[error("Order item #{order_item_id} has an invalid quantity of {quantity}")]
    InvalidQuantity { order_item_id: i64, quantity: i64 },
    #[error("Promotion #{0} is not a valid discount")]
    InvalidPromotion(i64),
    #[error("Product #{0} does not exist")]
    ProductNotFound(i64),
    #[error("Merchant #{0} does not exist")]
    MerchantNotFound(i64),
}

pub struct OrderSummaryApi<B, D> {
    db: B,
    couriers: D,
    clock: Arc<dyn Clock>,
    quote_timeout: Duration,
}

impl<B, D> Debug for OrderSummaryApi<B, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderSummaryApi")
    }
}

impl<B, D> OrderSummaryApi<B, D> {
    pub fn new(db: B, couriers: D, clock: Arc<dyn Clock>, quote_timeout: Duration) -> Self {
        Self { db, couriers, clock, quote_timeout }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, D> OrderSummaryApi<B, D>
where
    B: MarketplaceDatabase,
    D: DeliveryQuoteProvider,
{
    /// Prices the order described by `request`.
    ///
    /// Problems the buyer can fix by changing their choices, such as an unusable voucher, a sold-out item or a courier
    /// that cannot deliver, do not fail the call. They clear one of the summary's three gates instead, so that the
    /// client can show the full picture. Only requests that cannot be priced at all return an error.
    pub async fn compute_order_summary(&self, request: &OrderSummaryRequest) -> Result<OrderSummary, MarketplaceError> {
        let now = self.clock.now();
        let order = self.fetch_own_order(request).await?;
        let address = self.resolve_address(request).await?;
        let city = self
            .db
            .fetch_city(address.city_id)
            .await?
            .ok_or_else(|| MarketplaceError::NotFound(format!("City #{}", address.city_id)))?;
        let items = self.db.fetch_order_items(order.id).await?;
        if items.is_empty() {
            return Err(OrderSummaryError::EmptyOrder(order.order_code).into());
        }
        let mut by_merchant: BTreeMap<i64, Vec<OrderItem>> = BTreeMap::new();
        for item in items {
            by_merchant.entry(item.merchant_id).or_default().push(item);
        }
        let mut merchants = Vec::with_capacity(by_merchant.len());
        let mut all_items_valid = true;
        let mut all_deliveries_valid = true;
        for (merchant_id, items) in by_merchant {
            let merchant =
                self.db.fetch_merchant(merchant_id).await?.ok_or(OrderSummaryError::MerchantNotFound(merchant_id))?;
            if merchant.user_id == request.user_id {
                return Err(OrderSummaryError::OwnProductOrder(merchant_id).into());
            }
            let group = self.summarise_merchant(request, &merchant, &items, &city.routing_id, now).await?;
            all_items_valid &= group.items.iter().all(|i| i.is_valid);
            all_deliveries_valid &= group.delivery.is_some();
            merchants.push(group);
        }

        let subtotal = merchants.iter().map(|m| m.subtotal).sum::<Rupiah>();
        let delivery_cost = merchants.iter().map(|m| m.delivery_cost).sum::<Rupiah>();
        let merchant_discount = merchants.iter().map(|m| m.merchant_voucher_discount).sum::<Rupiah>();
        let mut marketplace_voucher_id = None;
        let mut marketplace_discount = Rupiah::ZERO;
        let mut is_marketplace_voucher_invalid = false;
        if let Some(code) = request.marketplace_voucher_code.as_deref() {
            let voucher = self.db.fetch_marketplace_voucher_by_code(code).await?;
            let applied = voucher
                .and_then(|v| marketplace_voucher_discount(&v, subtotal, merchant_discount, now).map(|d| (v.id, d)));
            match applied {
                Some((id, discount)) => {
                    marketplace_voucher_id = Some(id);
                    marketplace_discount = discount;
                },
                None => {
                    debug!("🧮️ Marketplace voucher '{code}' cannot be applied to order [{}]", order.order_code);
                    is_marketplace_voucher_invalid = true;
                },
            }
        }
        let total = subtotal + delivery_cost - merchant_discount - marketplace_discount;
        let is_voucher_valid = !is_marketplace_voucher_invalid && merchants.iter().all(|m| !m.is_voucher_invalid);
        let summary = OrderSummary {
            order_id: order.id,
            order_code: order.order_code,
            user_id: order.user_id,
            merchants,
            subtotal,
            delivery_cost,
            merchant_discount,
            marketplace_discount,
            total,
            marketplace_voucher_id,
            is_marketplace_voucher_invalid,
            is_order_valid: all_items_valid && all_deliveries_valid,
            is_voucher_valid,
            is_order_eligible: order.is_active,
            address: AddressSnapshot {
                address_id: address.id,
                recipient: address.recipient,
                phone: address.phone,
                street: address.street,
                city_id: city.id,
                city_name: city.name,
                postal_code: address.postal_code,
            },
        };
        debug!(
            "🧮️ Order [{}] summarised: total {} over {} merchants. valid: {}, vouchers valid: {}, eligible: {}",
            summary.order_code,
            summary.total,
            summary.merchants.len(),
            summary.is_order_valid,
            summary.is_voucher_valid,
            summary.is_order_eligible
        );
        Ok(summary)
    }

    /// Orders belonging to someone else are reported as missing.
    async fn fetch_own_order(&self, request: &OrderSummaryRequest) -> Result<Order, MarketplaceError> {
        match self.db.fetch_order_by_code(&request.order_code).await? {
            Some(order) if order.user_id == request.user_id => Ok(order),
            _ => Err(OrderSummaryError::OrderNotFound(request.order_code.clone()).into()),
        }
    }

    async fn resolve_address(&self, request: &OrderSummaryRequest) -> Result<UserAddress, MarketplaceError> {
        let address = match request.address_id {
            Some(id) => self.db.fetch_user_address(request.user_id, id).await?,
            None => self.db.fetch_default_address(request.user_id).await?,
        };
        address.ok_or_else(|| OrderSummaryError::AddressNotFound.into())
    }

    async fn summarise_merchant(
        &self,
        request: &OrderSummaryRequest,
        merchant: &Merchant,
        items: &[OrderItem],
        destination: &str,
        now: DateTime<Utc>,
    ) -> Result<OrderItemPerMerchant, MarketplaceError> {
        let mut summary_items = Vec::with_capacity(items.len());
        for item in items {
            summary_items.push(self.summarise_item(item, now).await?);
        }
        let subtotal = summary_items.iter().map(SummaryItem::line_total).sum::<Rupiah>();
        let weight_grams = summary_items.iter().map(|i| i.weight_grams * i.quantity).sum::<i64>();
        let choice = request.choice_for(merchant.id);

        let mut merchant_voucher_id = None;
        let mut merchant_voucher_discount = Rupiah::ZERO;
        let mut is_voucher_invalid = false;
        if let Some(code) = choice.voucher_code.as_deref() {
            let voucher = self.db.fetch_merchant_voucher_by_code(merchant.id, code).await?;
            let applied =
                voucher.and_then(|v| merchant_voucher_discount_for(&v, merchant.id, subtotal, now).map(|d| (v.id, d)));
            match applied {
                Some((id, discount)) => {
                    merchant_voucher_id = Some(id);
                    merchant_voucher_discount = discount;
                },
                None => {
                    debug!("🧮️ Voucher '{code}' cannot be applied to merchant #{}", merchant.id);
                    is_voucher_invalid = true;
                },
            }
        }

        let delivery = match choice.courier_code.as_deref() {
            Some(courier_code) => self.select_delivery(merchant, courier_code, destination, weight_grams).await?,
            None => None,
        };
        let delivery_cost = delivery.as_ref().map(|d| d.cost).unwrap_or_default();
        let total = subtotal + delivery_cost - merchant_voucher_discount;
        Ok(OrderItemPerMerchant {
            merchant_id: merchant.id,
            merchant_name: merchant.name.clone(),
            merchant_domain: merchant.domain.clone(),
            items: summary_items,
            subtotal,
            weight_grams,
            delivery,
            delivery_cost,
            merchant_voucher_id,
            merchant_voucher_discount,
            total,
            is_voucher_invalid,
        })
    }

    async fn summarise_item(&self, item: &OrderItem, now: DateTime<Utc>) -> Result<SummaryItem, MarketplaceError> {
        if item.quantity <= 0 {
            return Err(OrderSummaryError::InvalidQuantity { order_item_id: item.id, quantity: item.quantity }.into());
        }
        let product =
            self.db.fetch_product(item.product_id).await?.ok_or(OrderSummaryError::ProductNotFound(item.product_id))?;
        let variant = match item.variant_id {
            Some(id) => self.db.fetch_variant(id).await?.filter(|v| v.product_id == product.id),
            None => None,
        };
        // A variant that has vanished leaves the line unpriceable, so it is invalid rather than an error
        let variant_missing = item.variant_id.is_some() && variant.is_none();
        let (real_price, stock, variant_deleted) = match &variant {
            Some(v) => (v.price, v.stock, v.is_deleted),
            None => (product.price, product.stock, false),
        };
        let promotion = self.db.fetch_promotion_for_product(product.id).await?;
        let (discounted_price, promotion_id) =
            price_with_promotion(real_price, promotion.as_ref(), item.quantity, now)?;
        let is_valid = !product.is_deleted && !variant_deleted && !variant_missing && item.quantity <= stock;
        if !is_valid {
            trace!("🧮️ Order item #{} is not valid (stock {stock}, quantity {})", item.id, item.quantity);
        }
        Ok(SummaryItem {
            order_item_id: item.id,
            product_id: product.id,
            variant_id: item.variant_id,
            name: product.name,
            variant_name: variant.map(|v| v.name),
            quantity: item.quantity,
            real_price,
            discounted_price,
            promotion_id,
            weight_grams: product.weight_grams,
            notes: item.notes.clone(),
            is_valid,
        })
    }

    /// Asks the courier network for quotes and picks the first service the merchant has enabled for this courier.
    /// `None` means the parcel cannot be shipped the way the buyer chose.
    async fn select_delivery(
        &self,
        merchant: &Merchant,
        courier_code: &str,
        destination: &str,
        weight_grams: i64,
    ) -> Result<Option<SelectedDelivery>, MarketplaceError> {
        let Some(courier) = self.db.fetch_merchant_courier(merchant.id, courier_code).await? else {
            debug!("🧮️ Merchant #{} does not ship with {courier_code}", merchant.id);
            return Ok(None);
        };
        let origin = self
            .db
            .fetch_city(merchant.city_id)
            .await?
            .ok_or_else(|| MarketplaceError::NotFound(format!("City #{}", merchant.city_id)))?;
        let request = DeliveryQuoteRequest {
            origin_routing_id: origin.routing_id,
            destination_routing_id: destination.to_string(),
            weight_grams,
            courier_code: courier_code.to_string(),
        };
        let quotes = match tokio::time::timeout(self.quote_timeout, self.couriers.quote(&request)).await {
            Ok(quotes) => quotes?,
            Err(_) => {
                warn!("🧮️ Delivery quote for merchant #{} timed out", merchant.id);
                return Err(DeliveryQuoteError::Timeout(self.quote_timeout.as_millis() as u64).into());
            },
        };
        let selected = quotes.into_iter().find(|q| courier.is_enabled(&q.service)).map(|q| SelectedDelivery {
            courier_code: courier.courier_code.clone(),
            service: q.service,
            cost: q.cost,
            etd: q.etd,
        });
        Ok(selected)
    }
}

//--------------------------------------   Pricing rules     ---------------------------------------------------------

/// The unit price after the product's promotion, and the promotion that produced it.
///
/// A promotion only applies while it is running and while both its remaining quota and its per-line cap cover the
/// whole quantity. Otherwise the line is sold at the real price. A discount never takes the unit price below
/// [`MIN_DISCOUNTED_PRICE`].
pub fn price_with_promotion(
    real_price: Rupiah,
    promotion: Option<&Promotion>,
    quantity: i64,
    now: DateTime<Utc>,
) -> Result<(Rupiah, Option<i64>), OrderSummaryError> {
    let Some(promotion) = promotion else {
        return Ok((real_price, None));
    };
    let malformed = promotion.nominal < 0 ||
        (promotion.discount_type == DiscountType::Percentage && promotion.nominal > 100) ||
        promotion.max_discounted_quantity < 0;
    if malformed {
        return Err(OrderSummaryError::InvalidPromotion(promotion.id));
    }
    let applies =
        promotion.is_running(now) && promotion.quota >= quantity && promotion.max_discounted_quantity >= quantity;
    if !applies {
        return Ok((real_price, None));
    }
    let discount = match promotion.discount_type {
        DiscountType::Nominal => Rupiah::from(promotion.nominal),
        DiscountType::Percentage => real_price.percent(promotion.nominal),
    };
    let discounted = (real_price - discount).at_least(MIN_DISCOUNTED_PRICE).min(real_price);
    Ok((discounted, Some(promotion.id)))
}

/// The merchant voucher discount, or `None` if the voucher cannot be used on this subtotal.
pub fn merchant_voucher_discount_for(
    voucher: &MerchantVoucher,
    merchant_id: i64,
    subtotal: Rupiah,
    now: DateTime<Utc>,
) -> Option<Rupiah> {
    let usable = voucher.merchant_id == merchant_id && voucher.is_usable(now) && voucher.min_order <= subtotal;
    usable.then(|| voucher.nominal.min(subtotal))
}

/// The marketplace voucher discount, or `None` if the voucher cannot be used on this order. The percentage applies to
/// the subtotal after merchant discounts and is capped at the voucher's maximum.
pub fn marketplace_voucher_discount(
    voucher: &MarketplaceVoucher,
    subtotal: Rupiah,
    merchant_discount: Rupiah,
    now: DateTime<Utc>,
) -> Option<Rupiah> {
    let usable = voucher.is_usable(now) && voucher.min_order <= subtotal;
    usable.then(|| (subtotal - merchant_discount).percent(voucher.percentage).min(voucher.max_discount))
}

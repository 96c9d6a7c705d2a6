use std::collections::BTreeMap;

use mkt_common::Rupiah;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::OrderCode,
    snapshots::{AddressSnapshot, CartItemSnapshot},
};

//--------------------------------------   Summary request   ---------------------------------------------------------
/// The buyer's choices for one merchant in an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantChoice {
    pub voucher_code: Option<String>,
    /// The courier the buyer picked for this merchant's parcel
    pub courier_code: Option<String>,
}

impl MerchantChoice {
    pub fn with_courier<S: Into<String>>(mut self, courier_code: S) -> Self {
        self.courier_code = Some(courier_code.into());
        self
    }

    pub fn with_voucher<S: Into<String>>(mut self, voucher_code: S) -> Self {
        self.voucher_code = Some(voucher_code.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummaryRequest {
    pub user_id: i64,
    /// The shipping address. The buyer's default address is used when this is empty.
    pub address_id: Option<i64>,
    pub order_code: OrderCode,
    pub merchant_choices: BTreeMap<i64, MerchantChoice>,
    pub marketplace_voucher_code: Option<String>,
}

impl OrderSummaryRequest {
    pub fn new(user_id: i64, order_code: OrderCode) -> Self {
        let merchant_choices = BTreeMap::new();
        Self { user_id, address_id: None, order_code, merchant_choices, marketplace_voucher_code: None }
    }

    pub fn with_address(mut self, address_id: i64) -> Self {
        self.address_id = Some(address_id);
        self
    }

    pub fn with_merchant_choice(mut self, merchant_id: i64, choice: MerchantChoice) -> Self {
        self.merchant_choices.insert(merchant_id, choice);
        self
    }

    pub fn with_marketplace_voucher<S: Into<String>>(mut self, code: S) -> Self {
        self.marketplace_voucher_code = Some(code.into());
        self
    }

    pub fn choice_for(&self, merchant_id: i64) -> MerchantChoice {
        self.merchant_choices.get(&merchant_id).cloned().unwrap_or_default()
    }
}

//--------------------------------------    Summary result   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryItem {
    pub order_item_id: i64,
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub name: String,
    pub variant_name: Option<String>,
    pub quantity: i64,
    pub real_price: Rupiah,
    pub discounted_price: Rupiah,
    /// The promotion the discounted price came from, if any
    pub promotion_id: Option<i64>,
    pub weight_grams: i64,
    pub notes: Option<String>,
    /// False if the product or variant was removed, or stock no longer covers the quantity
    pub is_valid: bool,
}

impl SummaryItem {
    pub fn line_total(&self) -> Rupiah {
        self.discounted_price * self.quantity
    }

    pub fn to_snapshot(&self, merchant_id: i64) -> CartItemSnapshot {
        CartItemSnapshot {
            product_id: self.product_id,
            variant_id: self.variant_id,
            merchant_id,
            name: self.name.clone(),
            variant_name: self.variant_name.clone(),
            quantity: self.quantity,
            real_price: self.real_price,
            discounted_price: self.discounted_price,
            promotion_id: self.promotion_id,
            weight_grams: self.weight_grams,
            notes: self.notes.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedDelivery {
    pub courier_code: String,
    pub service: String,
    pub cost: Rupiah,
    pub etd: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemPerMerchant {
    pub merchant_id: i64,
    pub merchant_name: String,
    pub merchant_domain: String,
    pub items: Vec<SummaryItem>,
    pub subtotal: Rupiah,
    pub weight_grams: i64,
    pub delivery: Option<SelectedDelivery>,
    pub delivery_cost: Rupiah,
    pub merchant_voucher_id: Option<i64>,
    pub merchant_voucher_discount: Rupiah,
    /// subtotal + delivery cost - merchant voucher discount
    pub total: Rupiah,
    pub is_voucher_invalid: bool,
}

/// A priced, validated view of an order. Computing it has no side effects, so it can be recomputed as often as needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: i64,
    pub order_code: OrderCode,
    pub user_id: i64,
    /// One group per merchant, in ascending merchant id order
    pub merchants: Vec<OrderItemPerMerchant>,
    pub subtotal: Rupiah,
    pub delivery_cost: Rupiah,
    pub merchant_discount: Rupiah,
    pub marketplace_discount: Rupiah,
    pub total: Rupiah,
    pub marketplace_voucher_id: Option<i64>,
    pub is_marketplace_voucher_invalid: bool,
    pub is_order_valid: bool,
    pub is_voucher_valid: bool,
    pub is_order_eligible: bool,
    pub address: AddressSnapshot,
}

impl OrderSummary {
    pub fn is_checkoutable(&self) -> bool {
        self.is_order_valid && self.is_voucher_valid && self.is_order_eligible
    }

    /// The marketplace discount split over the merchant groups, in proportion to what each group contributed to the
    /// discount base (subtotal - merchant voucher). No group's share exceeds that group's own total, and the shares
    /// always add up to the aggregate discount.
    pub fn marketplace_discount_shares(&self) -> Vec<Rupiah> {
        let weights = self.merchants.iter().map(|g| g.subtotal - g.merchant_voucher_discount).collect::<Vec<_>>();
        let caps = self.merchants.iter().map(|g| g.total).collect::<Vec<_>>();
        prorate(self.marketplace_discount, &weights, &caps)
    }
}

/// Splits `amount` in proportion to `weights`, rounding down, then hands the rounding remainder to the earliest parts
/// that still have room under their `caps`. Whatever cannot be placed under any cap lands on the first part.
pub fn prorate(amount: Rupiah, weights: &[Rupiah], caps: &[Rupiah]) -> Vec<Rupiah> {
    if weights.is_empty() {
        return vec![];
    }
    let weight_sum = weights.iter().map(|w| w.value().max(0) as i128).sum::<i128>();
    let mut shares = weights
        .iter()
        .zip(caps)
        .map(|(w, cap)| {
            let share = match weight_sum {
                0 => 0,
                sum => (amount.value() as i128 * w.value().max(0) as i128 / sum) as i64,
            };
            Rupiah::from(share.min(cap.value().max(0)))
        })
        .collect::<Vec<_>>();
    let mut leftover = amount - shares.iter().sum::<Rupiah>();
    for (share, cap) in shares.iter_mut().zip(caps) {
        if leftover.value() <= 0 {
            break;
        }
        let room = (*cap - *share).value().max(0);
        let take = Rupiah::from(room.min(leftover.value()));
        *share += take;
        leftover -= take;
    }
    if leftover.value() > 0 {
        shares[0] += leftover;
    }
    shares
}

//--------------------------------------       Checkout      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Pay from the buyer's marketplace wallet
    Wallet,
    /// Pay through the external payment gateway on the given channel, e.g. a bank's virtual account
    Gateway { channel: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub summary: OrderSummaryRequest,
    pub payment_method: PaymentMethod,
    /// Where the gateway should send the buyer once they have paid
    pub redirect_target: Option<String>,
}

impl CheckoutRequest {
    pub fn new(summary: OrderSummaryRequest, payment_method: PaymentMethod) -> Self {
        Self { summary, payment_method, redirect_target: None }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn rp(values: &[i64]) -> Vec<Rupiah> {
        values.iter().copied().map(Rupiah::from).collect()
    }

    #[test]
    fn prorate_follows_the_weights() {
        let shares = prorate(Rupiah::from(11_000), &rp(&[80_000, 30_000]), &rp(&[95_000, 45_000]));
        assert_eq!(shares, rp(&[8_000, 3_000]));
        // The rounding remainder goes to the first part with room
        let shares = prorate(Rupiah::from(10_000), &rp(&[1, 1, 1]), &rp(&[5_000, 5_000, 5_000]));
        assert_eq!(shares, rp(&[3_334, 3_333, 3_333]));
        assert_eq!(prorate(Rupiah::from(500), &rp(&[7]), &rp(&[1_000])), rp(&[500]));
        assert_eq!(prorate(Rupiah::ZERO, &rp(&[1, 2]), &rp(&[10, 10])), rp(&[0, 0]));
        assert!(prorate(Rupiah::from(1), &[], &[]).is_empty());
    }

    #[test]
    fn prorate_never_exceeds_a_cap() {
        // A 100% voucher capped at 100,000 over a large and a small merchant
        let shares = prorate(Rupiah::from(100_000), &rp(&[80_000, 30_000]), &rp(&[95_000, 45_000]));
        assert_eq!(shares, rp(&[72_728, 27_272]));
        assert!(shares.iter().zip(rp(&[95_000, 45_000])).all(|(s, cap)| *s <= cap));
        // The small merchant is capped, and the excess moves to the merchant with room
        let shares = prorate(Rupiah::from(40_000), &rp(&[10_000, 10_000]), &rp(&[100_000, 5_000]));
        assert_eq!(shares, rp(&[35_000, 5_000]));
        assert_eq!(shares.iter().sum::<Rupiah>(), Rupiah::from(40_000));
    }

    #[test]
    fn merchant_choices_default_to_empty() {
        let req = OrderSummaryRequest::new(1, OrderCode::from("ORD-1"))
            .with_merchant_choice(7, MerchantChoice::default().with_courier("jne"));
        assert_eq!(req.choice_for(7).courier_code.as_deref(), Some("jne"));
        assert_eq!(req.choice_for(8), MerchantChoice::default());
    }
}

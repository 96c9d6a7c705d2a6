use std::{fmt::Debug, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use log::*;
use mkt_common::Rupiah;
use thiserror::Error;

use crate::{
    db_types::{NewPayment, NewTransaction, OrderCode, PaymentMethodType},
    events::{EventProducers, TransactionsCreatedEvent},
    helpers::{new_invoice_code, new_wallet_payment_id, Clock},
    mkt_api::order_summary_api::OrderSummaryApi,
    order_objects::{CheckoutRequest, OrderSummary, PaymentMethod},
    snapshots::{encode, CartItems, PaymentDetails, PaymentMethodSnapshot},
    traits::{
        DeliveryQuoteProvider,
        MarketplaceDatabase,
        MarketplaceError,
        NewCheckout,
        PaymentGateway,
        PaymentInitiation,
        PaymentProviderError,
        StockReservation,
    },
    transaction_objects::CheckoutResult,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    #[error(
        "Order {order_code} cannot be checked out. valid: {is_order_valid}, vouchers valid: {is_voucher_valid}, \
         eligible: {is_order_eligible}"
    )]
    SummaryNotCheckoutable {
        order_code: OrderCode,
        is_order_valid: bool,
        is_voucher_valid: bool,
        is_order_eligible: bool,
    },
    #[error("The order total is negative: {0}")]
    NegativeTotal(Rupiah),
    #[error("Not enough stock of product #{product_id} (variant {variant_id:?}) for {requested} units")]
    InsufficientStock { product_id: i64, variant_id: Option<i64>, requested: i64 },
    #[error("Voucher #{0} has no quota left")]
    VoucherExhausted(i64),
    #[error("Promotion #{0} has no quota left")]
    PromotionExhausted(i64),
    #[error("Order {0} has already been checked out")]
    OrderNotActive(OrderCode),
}

/// `CheckoutApi` turns a priced order into one transaction per merchant.
pub struct CheckoutApi<B, D, G> {
    summaries: OrderSummaryApi<B, D>,
    gateway: G,
    producers: EventProducers,
    gateway_timeout: Duration,
}

impl<B, D, G> Debug for CheckoutApi<B, D, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi")
    }
}

impl<B, D, G> CheckoutApi<B, D, G> {
    pub fn new(
        summaries: OrderSummaryApi<B, D>,
        gateway: G,
        producers: EventProducers,
        gateway_timeout: Duration,
    ) -> Self {
        Self { summaries, gateway, producers, gateway_timeout }
    }

    fn clock(&self) -> &Arc<dyn Clock> {
        self.summaries.clock()
    }
}

impl<B, D, G> CheckoutApi<B, D, G>
where
    B: MarketplaceDatabase,
    D: DeliveryQuoteProvider,
    G: PaymentGateway,
{
    /// Recomputes the summary for `request` and, if it passes all three gates, persists the checkout.
    ///
    /// Gateway payments are initiated with the payment gateway *before* anything is written, so a gateway failure
    /// leaves no trace. Everything else (payment record, transactions, stock and quota, wallet debit) is written in a
    /// single storage transaction.
    pub async fn create_transactions_from_summary(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutResult, MarketplaceError> {
        let summary = self.summaries.compute_order_summary(&request.summary).await?;
        if !summary.is_checkoutable() {
            return Err(CheckoutError::SummaryNotCheckoutable {
                order_code: summary.order_code,
                is_order_valid: summary.is_order_valid,
                is_voucher_valid: summary.is_voucher_valid,
                is_order_eligible: summary.is_order_eligible,
            }
            .into());
        }
        if summary.total.is_negative() {
            return Err(CheckoutError::NegativeTotal(summary.total).into());
        }
        let now = self.clock().now();
        let payment = match &request.payment_method {
            PaymentMethod::Wallet => NewPayment {
                payment_id: new_wallet_payment_id(now),
                user_id: summary.user_id,
                amount: summary.total,
                method: PaymentMethodType::Wallet,
                channel: None,
                redirect_url: None,
            },
            PaymentMethod::Gateway { channel } => {
                self.initiate_gateway_payment(&summary, channel, request.redirect_target.clone()).await?
            },
        };
        let checkout = build_checkout(&summary, payment, now)?;
        trace!("🧾️ Checking out order [{}] into {} transactions", summary.order_code, checkout.transactions.len());
        let result = self.summaries.db().create_checkout(checkout).await?;
        info!(
            "🧾️ Order [{}] checked out. Payment [{}] of {} ({})",
            summary.order_code, result.payment.payment_id, result.payment.amount, result.payment.status
        );
        let event =
            TransactionsCreatedEvent { payment: result.payment.clone(), transactions: result.transactions.clone() };
        self.producers.publish_transactions_created(event).await;
        Ok(result)
    }

    async fn initiate_gateway_payment(
        &self,
        summary: &OrderSummary,
        channel: &str,
        redirect_target: Option<String>,
    ) -> Result<NewPayment, MarketplaceError> {
        let initiation = PaymentInitiation {
            account_ref: summary.user_id.to_string(),
            amount: summary.total,
            channel: channel.to_string(),
            order_code: summary.order_code.clone(),
            redirect_target,
        };
        let initiation_call = self.gateway.initiate_payment(&initiation);
        let initiated = match tokio::time::timeout(self.gateway_timeout, initiation_call).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("🧾️ Payment gateway did not answer for order [{}]", summary.order_code);
                return Err(PaymentProviderError::Timeout(self.gateway_timeout.as_millis() as u64).into());
            },
        };
        debug!("🧾️ Gateway payment [{}] initiated for order [{}]", initiated.payment_id, summary.order_code);
        Ok(NewPayment {
            payment_id: initiated.payment_id,
            user_id: summary.user_id,
            amount: summary.total,
            method: PaymentMethodType::Gateway,
            channel: Some(channel.to_string()),
            redirect_url: Some(initiated.redirect_url),
        })
    }
}

/// Splits a checkoutable summary into the per-merchant transactions, with their snapshots, and the stock and quota to
/// reserve.
pub fn build_checkout(
    summary: &OrderSummary,
    payment: NewPayment,
    now: DateTime<Utc>,
) -> Result<NewCheckout, MarketplaceError> {
    let address = encode(&summary.address)?;
    let method = encode(&PaymentMethodSnapshot {
        method: payment.method,
        channel: payment.channel.clone(),
        payment_id: payment.payment_id.clone(),
    })?;
    let shares = summary.marketplace_discount_shares();
    let mut transactions = Vec::with_capacity(summary.merchants.len());
    let mut reservations = Vec::new();
    let mut merchant_voucher_ids = Vec::new();
    for (group, share) in summary.merchants.iter().zip(shares) {
        let cart = CartItems(group.items.iter().map(|i| i.to_snapshot(group.merchant_id)).collect());
        let details = PaymentDetails::new(group.subtotal, group.delivery_cost, group.merchant_voucher_discount, share);
        if details.total.is_negative() {
            return Err(CheckoutError::NegativeTotal(details.total).into());
        }
        transactions.push(NewTransaction {
            invoice_code: new_invoice_code(now, group.merchant_id),
            merchant_id: group.merchant_id,
            merchant_domain: group.merchant_domain.clone(),
            merchant_voucher_id: group.merchant_voucher_id,
            marketplace_voucher_id: summary.marketplace_voucher_id,
            payment_method: method.clone(),
            payment_details: encode(&details)?,
            address: address.clone(),
            cart_items: encode(&cart)?,
        });
        reservations.extend(group.items.iter().map(|i| StockReservation {
            product_id: i.product_id,
            variant_id: i.variant_id,
            quantity: i.quantity,
            promotion_id: i.promotion_id,
        }));
        merchant_voucher_ids.extend(group.merchant_voucher_id);
    }
    Ok(NewCheckout {
        order_id: summary.order_id,
        order_code: summary.order_code.clone(),
        user_id: summary.user_id,
        payment,
        transactions,
        reservations,
        merchant_voucher_ids,
        marketplace_voucher_id: summary.marketplace_voucher_id,
        now,
    })
}

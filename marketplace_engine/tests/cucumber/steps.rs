use chrono::Duration;
use cucumber::{then, when};
use marketplace_engine::{
    db_types::{Actor, RefundDecision, RefundParty, TransactionStatusType},
    helpers::Clock,
    order_objects::{CheckoutRequest, PaymentMethod},
    state::TransitionError,
    test_utils::{
        flows::{deliver, shirt_order_request},
        seed::{rupiah, seed_order},
    },
    transaction_objects::{MerchantStatusUpdate, RefundReason},
    CatalogManagement,
    MarketplaceError,
};

use crate::cucumber::MarketplaceWorld;

fn parse_status(status: &str) -> TransactionStatusType {
    status.parse().expect("Not a valid transaction status")
}

fn parse_decision(decision: &str) -> RefundDecision {
    match decision {
        "accepts" => RefundDecision::Accept,
        "rejects" => RefundDecision::Reject,
        "cancels" => RefundDecision::Cancel,
        other => panic!("Unknown refund decision: {other}"),
    }
}

//--------------------------------------      Checkout       ---------------------------------------------------------
#[when(expr = "the buyer tops up their wallet with {int} Rupiah")]
async fn top_up(world: &mut MarketplaceWorld, amount: i64) {
    let sys = world.system();
    sys.ledger().top_up_wallet(sys.m.buyer_id, rupiah(amount)).await.expect("Error topping up wallet");
}

#[when(expr = "the buyer orders {int} shirts as order {word}")]
async fn order_shirts(world: &mut MarketplaceWorld, quantity: i64, order_code: String) {
    let sys = world.system();
    seed_order(&sys.db, &order_code, sys.m.buyer_id, &[(sys.m.product_id, Some(sys.m.variant_id), quantity)]).await;
}

#[when(expr = "the buyer asks for a summary of order {word}")]
async fn summarise(world: &mut MarketplaceWorld, order_code: String) {
    let sys = world.system();
    let request = shirt_order_request(&sys.m, &order_code);
    let summary = sys.summaries().compute_order_summary(&request).await.expect("Error building summary");
    world.summary = Some(summary);
}

#[then(expr = "the summary subtotal is {int} Rupiah")]
async fn check_subtotal(world: &mut MarketplaceWorld, amount: i64) {
    let summary = world.summary.as_ref().expect("No summary");
    assert_eq!(summary.subtotal, rupiah(amount), "Subtotal is incorrect");
}

#[then(expr = "the summary total is {int} Rupiah")]
async fn check_total(world: &mut MarketplaceWorld, amount: i64) {
    let summary = world.summary.as_ref().expect("No summary");
    assert_eq!(summary.total, rupiah(amount), "Total is incorrect");
}

#[then("the summary can be checked out")]
async fn check_checkoutable(world: &mut MarketplaceWorld) {
    let summary = world.summary.as_ref().expect("No summary");
    assert!(summary.is_checkoutable(), "Summary is not checkoutable: {summary:?}");
}

#[when(expr = "the buyer checks out order {word} from their wallet")]
async fn wallet_checkout(world: &mut MarketplaceWorld, order_code: String) {
    let sys = world.system();
    let request = CheckoutRequest::new(shirt_order_request(&sys.m, &order_code), PaymentMethod::Wallet);
    let result = sys.checkout().create_transactions_from_summary(request).await.expect("Error checking out");
    assert_eq!(result.transactions.len(), 1);
    world.invoice = Some(result.transactions[0].invoice_code.clone());
}

#[when("the merchant delivers the transaction")]
async fn merchant_delivers(world: &mut MarketplaceWorld) {
    let sys = world.system();
    deliver(&sys.db, sys.clock(), sys.m.merchant_id, &world.invoice()).await;
}

//--------------------------------------     Transitions     ---------------------------------------------------------
#[when(expr = "the merchant sets the transaction to {word}")]
async fn merchant_sets(world: &mut MarketplaceWorld, status: String) {
    let sys = world.system();
    let update = MerchantStatusUpdate { target: parse_status(&status), receipt_number: None, notes: None };
    let result = sys.flow().transition_merchant_status(sys.m.merchant_id, &world.invoice(), update).await;
    world.last_error = result.err();
}

#[then("the merchant is told the transition is forbidden")]
async fn check_forbidden(world: &mut MarketplaceWorld) {
    let err = world.take_error();
    assert!(
        matches!(err, MarketplaceError::Transition(TransitionError::ForbiddenTransition(_))),
        "Expected ForbiddenTransition, got {err:?}"
    );
}

#[then(expr = "the transaction is {word}")]
async fn check_status(world: &mut MarketplaceWorld, status: String) {
    let tx = world.system().flow().fetch_transaction(&world.invoice()).await.expect("Error fetching transaction");
    assert_eq!(tx.status, parse_status(&status), "Transaction status is incorrect");
}

//--------------------------------------      Scheduler      ---------------------------------------------------------
#[when(expr = "{int} hours pass")]
async fn hours_pass(world: &mut MarketplaceWorld, hours: i64) {
    world.system().clock.advance(Duration::hours(hours));
}

#[when("the escalation scheduler runs")]
async fn run_scheduler(world: &mut MarketplaceWorld) {
    let sys = world.system();
    let report = sys.escalation().run_sweeps(sys.clock.now()).await.expect("Error running sweeps");
    assert_eq!(report.failures, 0, "Sweep failures: {report:?}");
}

//--------------------------------------       Refunds       ---------------------------------------------------------
#[when(expr = "the buyer requests a refund because {string}")]
async fn request_refund(world: &mut MarketplaceWorld, reason: String) {
    let sys = world.system();
    let outcome = sys
        .refunds()
        .open_refund_request(sys.m.buyer_id, &world.invoice(), RefundReason::new(reason))
        .await
        .expect("Error opening refund request");
    world.refund_request = outcome.refund_request.map(|r| r.id);
}

#[when(expr = "the {word} {word} the refund")]
async fn refund_decision(world: &mut MarketplaceWorld, party: String, decision: String) {
    let sys = world.system();
    let (party, actor) = match party.as_str() {
        "buyer" => (RefundParty::Buyer, Actor::User(sys.m.buyer_id)),
        "seller" => (RefundParty::Seller, Actor::Merchant(sys.m.merchant_id)),
        "admin" => (RefundParty::Admin, Actor::Admin(1)),
        other => panic!("Unknown refund party: {other}"),
    };
    let result =
        sys.refunds().advance_refund_round(world.refund_request(), party, parse_decision(&decision), actor).await;
    world.last_error = result.err();
}

//--------------------------------------       Ledger        ---------------------------------------------------------
#[then(expr = "the buyer's wallet holds {int} Rupiah")]
async fn check_wallet(world: &mut MarketplaceWorld, amount: i64) {
    let sys = world.system();
    let balance = sys.ledger().wallet_balance(sys.m.buyer_id).await.expect("Error fetching wallet");
    assert_eq!(balance, rupiah(amount), "Wallet balance is incorrect");
}

#[then(expr = "the merchant's holding account holds {int} Rupiah")]
async fn check_holding(world: &mut MarketplaceWorld, amount: i64) {
    let sys = world.system();
    let balance = sys.ledger().holding_balance(sys.m.merchant_id).await.expect("Error fetching holding account");
    assert_eq!(balance, rupiah(amount), "Holding balance is incorrect");
}

#[then(expr = "{int} shirts are in stock")]
async fn check_stock(world: &mut MarketplaceWorld, stock: i64) {
    let sys = world.system();
    let variant = sys.db.fetch_variant(sys.m.variant_id).await.expect("Error fetching variant").expect("No variant");
    assert_eq!(variant.stock, stock, "Stock is incorrect");
}

#[then("no step failed")]
async fn check_no_error(world: &mut MarketplaceWorld) {
    assert!(world.last_error.is_none(), "Unexpected error: {:?}", world.last_error);
}

//! The background loop that drives the escalation scheduler.
//!
//! Time enters the loop from two injected sources: a [`Ticker`] decides when a run happens, and a [`Clock`] decides
//! what "now" is for that run. Production uses a tokio interval and the system clock.
use std::sync::Arc;

use log::*;
use marketplace_engine::{
    events::EventProducers,
    helpers::{Clock, SystemClock},
    EscalationApi,
    EscalationPolicy,
    MarketplaceDatabase,
    SqliteDatabase,
};
use tokio::{
    task::JoinHandle,
    time::{Interval, MissedTickBehavior},
};

#[allow(async_fn_in_trait)]
pub trait Ticker {
    /// Waits until the next run is due. Returns false when the worker should stop.
    async fn tick(&mut self) -> bool;
}

pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: std::time::Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        // A slow sweep should not be followed by a burst of catch-up sweeps
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}

/// Running totals over the lifetime of a worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepTotals {
    pub runs: usize,
    pub moved: usize,
    pub failures: usize,
}

/// Starts the escalation worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_escalation_worker(
    db: SqliteDatabase,
    producers: EventProducers,
    policy: EscalationPolicy,
    period: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let api = EscalationApi::new(db, producers, policy);
        info!("🕰️ Escalation worker started. Sweeping every {period:?}");
        let totals = run_escalation_loop(api, IntervalTicker::new(period), Arc::new(SystemClock)).await;
        warn!("🕰️ Escalation worker stopped after {} runs", totals.runs);
    })
}

/// Runs the sweeps once per tick until the ticker says stop. A failed run is logged, and the loop carries on.
pub async fn run_escalation_loop<B, T>(api: EscalationApi<B>, mut ticker: T, clock: Arc<dyn Clock>) -> SweepTotals
where
    B: MarketplaceDatabase,
    T: Ticker,
{
    let mut totals = SweepTotals::default();
    while ticker.tick().await {
        totals.runs += 1;
        let now = clock.now();
        trace!("🕰️ Running escalation sweeps as of {now}");
        match api.run_sweeps(now).await {
            Ok(report) => {
                totals.moved += report.total_moved();
                totals.failures += report.failures;
                if report.failures > 0 {
                    warn!("🕰️ {} entities could not be escalated in this run", report.failures);
                }
            },
            Err(e) => {
                error!("🕰️ Error running the escalation sweeps: {e}");
                totals.failures += 1;
            },
        }
    }
    totals
}

#[cfg(test)]
mod test {
    use chrono::{Duration, TimeZone, Utc};
    use marketplace_engine::{
        db_types::TransactionStatusType,
        helpers::FixedClock,
        test_utils::{flows::wallet_checkout_of_shirts, prepare_env::new_test_database, seed::*},
        LedgerApi,
    };

    use super::*;

    struct SteppingTicker {
        clock: FixedClock,
        step: Duration,
        remaining: usize,
    }

    impl Ticker for SteppingTicker {
        async fn tick(&mut self) -> bool {
            if self.remaining == 0 {
                return false;
            }
            self.remaining -= 1;
            self.clock.advance(self.step);
            true
        }
    }

    #[tokio::test]
    async fn stale_orders_are_canceled_on_the_first_late_tick() {
        let _ = env_logger::try_init();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let db = new_test_database().await;
        let m = seed_standard_marketplace(&db, now).await;
        let clock = FixedClock::new(now);
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let result = wallet_checkout_of_shirts(&db, shared.clone(), &m, "ORD-WK").await;
        let invoice = result.transactions[0].invoice_code.clone();

        let api = EscalationApi::new(db.clone(), EventProducers::default(), EscalationPolicy::default());
        let ticker = SteppingTicker { clock: clock.clone(), step: Duration::hours(10), remaining: 3 };
        let totals = run_escalation_loop(api, ticker, shared.clone()).await;
        assert_eq!(totals, SweepTotals { runs: 3, moved: 1, failures: 0 });

        let tx = db.fetch_transaction(&invoice).await.unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatusType::Canceled);
        let balance = LedgerApi::new(db, shared).wallet_balance(m.buyer_id).await.unwrap();
        assert_eq!(balance, rupiah(95_000));
    }
}

use std::{fmt::Debug, future::Future};

use chrono::{DateTime, Duration, Utc};
use futures_util::future::join_all;
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{
        Actor,
        RefundDecision,
        RefundParty,
        RefundRound,
        RoundStateType,
        TransactionRecord,
        TransactionStatusType,
    },
    events::{EventProducers, RefundClosedEvent, TransactionStatusChangedEvent},
    traits::{MarketplaceDatabase, MarketplaceError},
    transaction_objects::StatusChange,
};

/// How long each kind of entity may sit without human action before the scheduler acts on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationPolicy {
    /// Unprocessed transactions are canceled after this long
    pub waited_timeout: Duration,
    /// Processed transactions that never shipped are canceled after this long
    pub processed_timeout: Duration,
    /// Delivered transactions with no refund request are completed after this long
    pub delivered_timeout: Duration,
    /// A seller that does not answer a refund round within this window is taken to accept it
    pub seller_window: Duration,
    /// A buyer that does not answer the admin's ruling within this window is taken to accept it
    pub buyer_window: Duration,
    /// Entities handled concurrently in one batch
    pub batch_size: usize,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            waited_timeout: Duration::hours(24),
            processed_timeout: Duration::hours(48),
            delivered_timeout: Duration::hours(72),
            seller_window: Duration::hours(48),
            buyer_window: Duration::hours(48),
            batch_size: 25,
        }
    }
}

/// What a single run of the sweeps did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub canceled_waited: usize,
    pub canceled_processed: usize,
    pub completed_delivered: usize,
    pub seller_accepted: usize,
    pub buyer_accepted: usize,
    /// Entities that could not be moved. Each was logged and skipped.
    pub failures: usize,
}

impl SweepReport {
    pub fn total_moved(&self) -> usize {
        self.canceled_waited
            + self.canceled_processed
            + self.completed_delivered
            + self.seller_accepted
            + self.buyer_accepted
    }
}

/// `EscalationApi` applies the marketplace's timeouts.
///
/// Every sweep goes through the same guarded status change as a human would, so a sweep racing a merchant or buyer on
/// the same transaction simply loses the compare-and-swap. That loss is counted as a failure and logged, and the sweep
/// carries on with the next entity. Running the sweeps twice in a row is harmless: the second run finds nothing stale.
pub struct EscalationApi<B> {
    db: B,
    producers: EventProducers,
    policy: EscalationPolicy,
}

impl<B> Debug for EscalationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EscalationApi")
    }
}

impl<B> EscalationApi<B> {
    pub fn new(db: B, producers: EventProducers, policy: EscalationPolicy) -> Self {
        Self { db, producers, policy }
    }

    pub fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }
}

impl<B> EscalationApi<B>
where B: MarketplaceDatabase
{
    /// Runs every sweep once, as of `now`.
    pub async fn run_sweeps(&self, now: DateTime<Utc>) -> Result<SweepReport, MarketplaceError> {
        let mut report = SweepReport::default();
        let (moved, failed) = self
            .sweep_transactions(
                TransactionStatusType::Waited,
                TransactionStatusType::Canceled,
                now - self.policy.waited_timeout,
                now,
            )
            .await?;
        report.canceled_waited = moved;
        report.failures += failed;
        let (moved, failed) = self
            .sweep_transactions(
                TransactionStatusType::Processed,
                TransactionStatusType::Canceled,
                now - self.policy.processed_timeout,
                now,
            )
            .await?;
        report.canceled_processed = moved;
        report.failures += failed;
        let (moved, failed) = self
            .sweep_transactions(
                TransactionStatusType::Delivered,
                TransactionStatusType::Completed,
                now - self.policy.delivered_timeout,
                now,
            )
            .await?;
        report.completed_delivered = moved;
        report.failures += failed;
        let (moved, failed) = self
            .sweep_refund_rounds(
                RoundStateType::AwaitingSeller,
                RefundParty::Seller,
                now - self.policy.seller_window,
                now,
            )
            .await?;
        report.seller_accepted = moved;
        report.failures += failed;
        let (moved, failed) = self
            .sweep_refund_rounds(RoundStateType::AwaitingBuyer, RefundParty::Buyer, now - self.policy.buyer_window, now)
            .await?;
        report.buyer_accepted = moved;
        report.failures += failed;
        if report.total_moved() > 0 || report.failures > 0 {
            info!(
                "🕰️ Sweep complete. {} entities moved, {} failures. {report:?}",
                report.total_moved(),
                report.failures
            );
        } else {
            trace!("🕰️ Sweep complete. Nothing was stale");
        }
        Ok(report)
    }

    async fn sweep_transactions(
        &self,
        from: TransactionStatusType,
        to: TransactionStatusType,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(usize, usize), MarketplaceError> {
        let stale = self.db.fetch_stale_transactions(from, cutoff).await?;
        if stale.is_empty() {
            return Ok((0, 0));
        }
        debug!("🕰️ {} transactions have been {from} since before {cutoff}", stale.len());
        let notes = format!("Automatically moved to {to} after the {from} timeout");
        let tally = in_batches(stale, self.policy.batch_size, |record: TransactionRecord| {
            let notes = notes.clone();
            async move { self.expire_transaction(record, to, notes, now).await }
        })
        .await;
        Ok(tally)
    }

    async fn expire_transaction(
        &self,
        record: TransactionRecord,
        target: TransactionStatusType,
        notes: String,
        now: DateTime<Utc>,
    ) -> Result<(), MarketplaceError> {
        let invoice = record.invoice_code.clone();
        let change = StatusChange::System { target, notes: Some(notes) };
        let outcome = self.db.transition_transaction(&invoice, change, now).await.map_err(|e| {
            warn!("🕰️ Could not move transaction [{invoice}] to {target}. {e}");
            e
        })?;
        let event = TransactionStatusChangedEvent {
            transaction: outcome.transaction.clone(),
            old_status: outcome.old_status,
            new_status: outcome.transaction.status,
            actor: Actor::System,
        };
        self.producers.publish_status_changed(event).await;
        Ok(())
    }

    async fn sweep_refund_rounds(
        &self,
        state: RoundStateType,
        party: RefundParty,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(usize, usize), MarketplaceError> {
        let stale = self.db.fetch_stale_refund_rounds(state, cutoff).await?;
        if stale.is_empty() {
            return Ok((0, 0));
        }
        debug!("🕰️ {} refund rounds have been {state} since before {cutoff}", stale.len());
        let tally =
            in_batches(stale, self.policy.batch_size, |round: RefundRound| self.accept_on_silence(round, party, now))
                .await;
        Ok(tally)
    }

    async fn accept_on_silence(
        &self,
        round: RefundRound,
        party: RefundParty,
        now: DateTime<Utc>,
    ) -> Result<(), MarketplaceError> {
        let request_id = round.refund_request_id;
        let outcome = self
            .db
            .advance_refund_round(request_id, party, RefundDecision::Accept, Actor::System, now)
            .await
            .map_err(|e| {
                warn!("🕰️ Could not accept refund request #{request_id} on behalf of the silent {party}. {e}");
                e
            })?;
        if let Some(resolution) = outcome.resolution {
            let status_event = TransactionStatusChangedEvent {
                transaction: outcome.transaction.clone(),
                old_status: TransactionStatusType::RequestRefund,
                new_status: outcome.transaction.status,
                actor: Actor::System,
            };
            self.producers.publish_status_changed(status_event).await;
            let event = RefundClosedEvent { request: outcome.request, resolution, transaction: outcome.transaction };
            self.producers.publish_refund_closed(event).await;
        }
        Ok(())
    }
}

/// Runs `f` over `items`, `batch_size` at a time, and returns the number of successes and failures.
async fn in_batches<T, F, Fut>(items: Vec<T>, batch_size: usize, f: F) -> (usize, usize)
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<(), MarketplaceError>>,
{
    let mut ok = 0;
    let mut failed = 0;
    let mut items = items.into_iter().peekable();
    while items.peek().is_some() {
        let batch = items.by_ref().take(batch_size.max(1)).map(&f).collect::<Vec<_>>();
        for result in join_all(batch).await {
            match result {
                Ok(()) => ok += 1,
                Err(_) => failed += 1,
            }
        }
    }
    (ok, failed)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::state::TransitionError;

    #[tokio::test]
    async fn batches_count_successes_and_failures() {
        let (ok, failed) = in_batches((0..7).collect(), 3, |i: i32| async move {
            if i % 3 == 0 {
                Err(TransitionError::AlreadyProcessed("INV".into()).into())
            } else {
                Ok(())
            }
        })
        .await;
        assert_eq!((ok, failed), (4, 3));
    }

    #[test]
    fn default_policy() {
        let policy = EscalationPolicy::default();
        assert_eq!(policy.waited_timeout, Duration::hours(24));
        assert_eq!(policy.delivered_timeout, Duration::hours(72));
        assert_eq!(policy.batch_size, 25);
    }
}

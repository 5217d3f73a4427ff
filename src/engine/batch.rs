// 8.4: batch execution. each account is its own attempt; one failing account
// never sinks the batch. liquidator stats are settled once at the end.

use super::core::Engine;
use super::results::{BatchResult, EngineError, SkipReason};
use crate::events::{BatchCompletedEvent, EventPayload, LiquidationFailedEvent};
use crate::types::AccountId;

impl Engine {
    /// Liquidate up to `max_batch_size` queued accounts, spending at most
    /// `budget` in estimated cost. Jobs that fail stay queued.
    pub fn execute_batch_liquidation(
        &mut self,
        caller: AccountId,
        accounts: &[AccountId],
        budget: u64,
    ) -> Result<BatchResult, EngineError> {
        self.ensure_not_paused()?;
        self.liquidators.ensure_authorized(caller)?;

        let max = self.config.venue.liquidation.max_batch_size;
        if accounts.len() > max {
            return Err(EngineError::BatchTooLarge {
                requested: accounts.len(),
                max,
            });
        }

        let mut batch = BatchResult {
            requested: accounts.len(),
            ..BatchResult::default()
        };
        let mut remaining = budget;

        for &account_id in accounts {
            let Some(job) = self.queue.get(account_id).filter(|job| job.is_active) else {
                batch.skipped.push((account_id, SkipReason::NoActiveJob));
                continue;
            };
            if !job.is_due(self.current_time) {
                batch.skipped.push((account_id, SkipReason::DeadlineNotReached));
                continue;
            }
            let cost = job.estimated_cost;
            if cost > remaining {
                batch.skipped.push((account_id, SkipReason::BudgetExhausted));
                continue;
            }

            let attempt = self.with_account_lock(account_id, |engine| {
                engine.check_job_ready(account_id)?;
                engine.liquidate_now(account_id, Some(caller), false)
            });

            match attempt {
                Ok(result) => {
                    self.queue.remove(account_id);
                    remaining -= cost;
                    batch.budget_used += cost;
                    batch.attempted += 1;
                    batch.successes += 1;
                    batch.total_reward = batch.total_reward.add(result.reward);
                    batch.results.push(result);
                }
                Err(EngineError::RiskCured { .. }) => {
                    batch.skipped.push((account_id, SkipReason::NoLongerEligible));
                }
                Err(err) => {
                    remaining -= cost;
                    batch.budget_used += cost;
                    batch.attempted += 1;
                    tracing::warn!(account = %account_id, error = %err, "batch item failed, continuing");
                    self.emit_event(EventPayload::LiquidationFailed(LiquidationFailedEvent {
                        account_id,
                        liquidator: caller,
                        reason: err.to_string(),
                    }));
                    batch.failed.push((account_id, err.to_string()));
                }
            }
        }

        if batch.attempted > 0 {
            let old = self
                .liquidators
                .get(caller)
                .map(|l| l.reputation)
                .unwrap_or_default();
            let new = self.liquidators.record_batch(
                caller,
                batch.attempted as u64,
                batch.successes as u64,
                batch.total_reward,
                self.current_time,
            )?;
            self.emit_reputation_change(caller, old, new);
        }

        tracing::info!(
            liquidator = %caller,
            requested = batch.requested,
            successes = batch.successes,
            failed = batch.failed.len(),
            skipped = batch.skipped.len(),
            "batch liquidation complete"
        );
        self.emit_event(EventPayload::BatchCompleted(BatchCompletedEvent {
            liquidator: caller,
            requested: batch.requested,
            attempted: batch.attempted,
            successes: batch.successes,
            total_reward: batch.total_reward,
            budget_used: batch.budget_used,
        }));

        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::market::Market;
    use crate::types::{AssetId, Bps, Price, Quote, SignedSize, Timestamp};
    use rust_decimal_macros::dec;

    const BTC: AssetId = AssetId(1);
    const ADMIN: AccountId = AccountId(0);
    const LIQ: AccountId = AccountId(100);

    fn engine_with_queued(count: u64) -> Engine {
        let mut engine = Engine::new(EngineConfig::default());
        engine
            .add_market(
                ADMIN,
                Market::new(BTC, "BTC", Price::new_unchecked(dec!(100)), Bps::new(1000), Timestamp::from_millis(0)),
            )
            .unwrap();
        engine.register_liquidator(LIQ).unwrap();
        for i in 1..=count {
            let id = AccountId(i);
            engine.deposit_collateral(id, Quote::new(dec!(10000))).unwrap();
            engine.open_position(id, BTC, SignedSize::new(dec!(900))).unwrap();
            engine.queue_liquidation(LIQ, id).unwrap();
        }
        engine
    }

    #[test]
    fn batch_size_is_bounded() {
        let mut engine = engine_with_queued(0);
        let accounts: Vec<AccountId> = (1..=11).map(AccountId).collect();
        assert!(matches!(
            engine.execute_batch_liquidation(LIQ, &accounts, u64::MAX),
            Err(EngineError::BatchTooLarge { requested: 11, max: 10 })
        ));
    }

    #[test]
    fn skips_jobs_before_deadline() {
        let mut engine = engine_with_queued(2);
        let batch = engine
            .execute_batch_liquidation(LIQ, &[AccountId(1), AccountId(2), AccountId(3)], u64::MAX)
            .unwrap();
        assert_eq!(batch.successes, 0);
        assert_eq!(
            batch.skipped,
            vec![
                (AccountId(1), SkipReason::DeadlineNotReached),
                (AccountId(2), SkipReason::DeadlineNotReached),
                (AccountId(3), SkipReason::NoActiveJob),
            ]
        );
        // nothing attempted, no reputation change
        assert_eq!(engine.liquidator(LIQ).unwrap().reputation, 7500);
    }

    #[test]
    fn budget_limits_work_done() {
        let mut engine = engine_with_queued(3);
        engine.advance_time(300_000);
        // each job costs 250_000
        let batch = engine
            .execute_batch_liquidation(LIQ, &[AccountId(1), AccountId(2), AccountId(3)], 600_000)
            .unwrap();
        assert_eq!(batch.successes, 2);
        assert_eq!(batch.budget_used, 500_000);
        assert_eq!(batch.skipped, vec![(AccountId(3), SkipReason::BudgetExhausted)]);
        assert!(engine.queue().is_queued(AccountId(3)));
        assert_eq!(batch.total_reward.value(), dec!(200));
        assert_eq!(engine.liquidator(LIQ).unwrap().reputation, 7550);
        assert_eq!(engine.liquidator(LIQ).unwrap().total_successes, 2);
    }

    #[test]
    fn duplicate_entries_liquidate_once() {
        let mut engine = engine_with_queued(1);
        engine.advance_time(300_000);
        let batch = engine
            .execute_batch_liquidation(LIQ, &[AccountId(1), AccountId(1)], u64::MAX)
            .unwrap();
        assert_eq!(batch.successes, 1);
        assert_eq!(batch.skipped, vec![(AccountId(1), SkipReason::NoActiveJob)]);
    }
}

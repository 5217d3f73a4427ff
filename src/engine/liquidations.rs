//! Liquidation scheduling and execution.
//!
//! Eligible accounts are queued with a grace period; past the emergency
//! threshold they are liquidated on the spot. Queued jobs are re-checked at
//! execution time, so an account that cured itself during the grace period is
//! rejected and stays queued for re-evaluation.

use super::config::Role;
use super::core::Engine;
use super::results::{EngineError, LiquidationResult, MonitorReport, QueueOutcome};
use crate::events::{
    BadDebtEvent, CloseReason, EventPayload, LiquidationCancelledEvent, LiquidationExecutedEvent,
    LiquidationFailedEvent, LiquidationQueuedEvent, LiquidatorRegisteredEvent, PositionClosedEvent,
    PriorityEscalatedEvent, ReputationChangedEvent,
};
use crate::liquidation::{
    calculate_liquidation_priority, calculate_liquidation_reward, escalate_job,
    estimate_liquidation_cost, is_emergency, is_liquidation_eligible,
};
use crate::margin::margin_ratio;
use crate::queue::LiquidationJob;
use crate::risk::fresh_assessment;
use crate::types::{AccountId, Bps, Quote};

impl Engine {
    pub fn register_liquidator(&mut self, id: AccountId) -> Result<u32, EngineError> {
        let reputation = self.liquidators.register(id, self.current_time)?.reputation;
        tracing::info!(liquidator = %id, reputation, "liquidator registered");
        self.emit_event(EventPayload::LiquidatorRegistered(LiquidatorRegisteredEvent {
            liquidator: id,
            reputation,
        }));
        Ok(reputation)
    }

    /// Queue an eligible account for liquidation after the grace period.
    ///
    /// Past the emergency threshold the account is liquidated immediately and
    /// no job is created; the caller earns the reward only if it is an
    /// authorized liquidator.
    pub fn queue_liquidation(&mut self, caller: AccountId, account_id: AccountId) -> Result<QueueOutcome, EngineError> {
        self.ensure_not_paused()?;
        self.with_account_lock(account_id, |engine| engine.queue_locked(caller, account_id))
    }

    fn queue_locked(&mut self, caller: AccountId, account_id: AccountId) -> Result<QueueOutcome, EngineError> {
        let now = self.current_time;
        let params = self.config.venue.liquidation.clone();

        let account = self
            .ledger
            .get(account_id)
            .ok_or(EngineError::AccountNotFound(account_id))?;
        let ratio = margin_ratio(account);
        if !is_liquidation_eligible(ratio, &params) {
            return Err(EngineError::NotEligible {
                account: account_id,
                margin_ratio: ratio,
            });
        }
        if self.queue.is_queued(account_id) {
            return Err(crate::queue::QueueError::AlreadyQueued(account_id).into());
        }

        if is_emergency(ratio, &params) {
            let beneficiary = self.liquidators.is_authorized(caller).then_some(caller);
            tracing::warn!(account = %account_id, margin_ratio = %ratio, "emergency liquidation");
            let result = self.liquidate_now(account_id, beneficiary, true)?;
            if let Some(liquidator) = beneficiary {
                let efficient = self.is_efficient(liquidator, result.reward, 0);
                self.credit_success(liquidator, result.reward, efficient)?;
            }
            return Ok(QueueOutcome::ExecutedImmediately(result));
        }

        let open_positions = account.open_position_count();
        let max_reward = calculate_liquidation_reward(account.collateral, ratio, &params);
        let risk = fresh_assessment(
            self.risk_feed.as_ref(),
            account_id,
            now,
            &self.config.venue.risk_feed,
        );
        let priority = calculate_liquidation_priority(ratio, risk.as_ref(), &params);

        let job = LiquidationJob {
            account: account_id,
            priority,
            estimated_cost: estimate_liquidation_cost(open_positions, &params),
            max_reward,
            deadline: now.plus_millis(params.liquidation_delay_ms),
            is_active: true,
            created_at: now,
        };
        self.queue.push(job.clone())?;

        tracing::info!(account = %account_id, priority, margin_ratio = %ratio, "liquidation queued");
        self.emit_event(EventPayload::LiquidationQueued(LiquidationQueuedEvent {
            account_id,
            priority,
            margin_ratio: ratio,
            max_reward,
            deadline: job.deadline,
            risk_adjusted: risk.is_some(),
        }));

        Ok(QueueOutcome::Queued(job))
    }

    /// Execute a queued job whose grace period has elapsed.
    pub fn execute_liquidation(&mut self, caller: AccountId, account_id: AccountId) -> Result<LiquidationResult, EngineError> {
        self.ensure_not_paused()?;
        self.liquidators.ensure_authorized(caller)?;

        self.with_account_lock(account_id, |engine| {
            engine.check_job_ready(account_id)?;
            let estimated_cost = engine
                .queue
                .get(account_id)
                .map(|job| job.estimated_cost)
                .unwrap_or_default();

            match engine.liquidate_now(account_id, Some(caller), false) {
                Ok(result) => {
                    engine.queue.remove(account_id);
                    let efficient = engine.is_efficient(caller, result.reward, estimated_cost);
                    engine.credit_success(caller, result.reward, efficient)?;
                    Ok(result)
                }
                Err(err) => {
                    let old = engine.liquidators.get(caller).map(|l| l.reputation).unwrap_or_default();
                    let new = engine.liquidators.record_failure(caller, engine.current_time)?;
                    engine.emit_event(EventPayload::LiquidationFailed(LiquidationFailedEvent {
                        account_id,
                        liquidator: caller,
                        reason: err.to_string(),
                    }));
                    engine.emit_reputation_change(caller, old, new);
                    Err(err)
                }
            }
        })
    }

    /// Cancel the job of an account that is no longer eligible. Returns
    /// whether the job was removed.
    pub fn reevaluate_liquidation(&mut self, account_id: AccountId) -> Result<bool, EngineError> {
        self.with_account_lock(account_id, |engine| {
            if !engine.queue.is_queued(account_id) {
                return Err(EngineError::NoActiveJob(account_id));
            }
            let ratio = engine.get_margin_ratio(account_id)?;
            if is_liquidation_eligible(ratio, &engine.config.venue.liquidation) {
                return Ok(false);
            }

            engine.queue.remove(account_id);
            tracing::info!(account = %account_id, margin_ratio = %ratio, "liquidation cancelled, risk cured");
            engine.emit_event(EventPayload::LiquidationCancelled(LiquidationCancelledEvent {
                account_id,
                margin_ratio: ratio,
            }));
            Ok(true)
        })
    }

    /// Re-read risk for every queued job and escalate where warranted.
    /// Feed failures leave the job as it is.
    pub fn monitor_liquidations(&mut self, caller: AccountId) -> Result<MonitorReport, EngineError> {
        self.require_role(caller, Role::RiskOracle)?;

        let mut report = MonitorReport::default();
        for account_id in self.queue.accounts() {
            report.inspected += 1;
            let escalated = self.with_account_lock(account_id, |engine| engine.monitor_one(account_id))?;
            match escalated {
                Some(true) => report.escalated += 1,
                Some(false) => {}
                None => report.risk_unavailable += 1,
            }
        }

        tracing::debug!(?report, "monitoring pass complete");
        Ok(report)
    }

    // None when the feed gave nothing usable
    fn monitor_one(&mut self, account_id: AccountId) -> Result<Option<bool>, EngineError> {
        let now = self.current_time;
        let Some(risk) = fresh_assessment(
            self.risk_feed.as_ref(),
            account_id,
            now,
            &self.config.venue.risk_feed,
        ) else {
            return Ok(None);
        };

        let params = &self.config.venue.liquidation;
        let Some(job) = self.queue.get_mut(account_id).filter(|job| job.is_active) else {
            return Ok(Some(false));
        };
        let old_priority = job.priority;
        let escalation = escalate_job(job, &risk, now, params);
        if !escalation.changed() {
            return Ok(Some(false));
        }

        let event = PriorityEscalatedEvent {
            account_id,
            old_priority,
            new_priority: job.priority,
            new_deadline: job.deadline,
            tier: risk.tier,
            var: risk.var,
        };
        tracing::info!(
            account = %account_id,
            old_priority,
            new_priority = event.new_priority,
            deadline_shortened = escalation.deadline_shortened,
            "liquidation escalated"
        );
        self.emit_event(EventPayload::PriorityEscalated(event));
        Ok(Some(true))
    }

    /// Active jobs, most urgent first.
    pub fn get_pending_liquidations(&self) -> Vec<LiquidationJob> {
        self.queue.pending().into_iter().cloned().collect()
    }

    /// Entry checks for executing a queued job. Returns the margin ratio
    /// the job will be settled at.
    pub(super) fn check_job_ready(&self, account_id: AccountId) -> Result<Bps, EngineError> {
        let job = self
            .queue
            .get(account_id)
            .filter(|job| job.is_active)
            .ok_or(EngineError::NoActiveJob(account_id))?;
        if !job.is_due(self.current_time) {
            return Err(EngineError::DeadlineNotReached {
                account: account_id,
                deadline: job.deadline,
                now: self.current_time,
            });
        }

        let ratio = self.get_margin_ratio(account_id)?;
        if !is_liquidation_eligible(ratio, &self.config.venue.liquidation) {
            return Err(EngineError::RiskCured {
                account: account_id,
                margin_ratio: ratio,
            });
        }
        Ok(ratio)
    }

    /// Runs the ledger primitive, pays the reward and clears the ledger's
    /// liquidation flag whatever the outcome. Must run under the account lock.
    pub(super) fn liquidate_now(
        &mut self,
        account_id: AccountId,
        beneficiary: Option<AccountId>,
        emergency: bool,
    ) -> Result<LiquidationResult, EngineError> {
        let result = self.settle_liquidation(account_id, beneficiary, emergency);
        self.ledger.unlock(account_id);
        result
    }

    fn settle_liquidation(
        &mut self,
        account_id: AccountId,
        beneficiary: Option<AccountId>,
        emergency: bool,
    ) -> Result<LiquidationResult, EngineError> {
        let now = self.current_time;
        // sampled before the primitive zeroes margin_used
        let ratio = self.get_margin_ratio(account_id)?;

        let outcome = self
            .ledger
            .liquidate_portfolio(account_id, &self.markets, now)
            .map_err(|source| {
                tracing::warn!(account = %account_id, error = %source, "ledger rejected liquidation");
                EngineError::LiquidationRejected {
                    account: account_id,
                    source,
                }
            })?;

        for closed in &outcome.closed {
            self.markets.adjust_open_interest(closed.asset, -closed.size.abs())?;
        }

        let reward = calculate_liquidation_reward(
            outcome.collateral_after,
            ratio,
            &self.config.venue.liquidation,
        );
        let paid = match beneficiary {
            Some(liquidator) => self
                .ledger
                .transfer_collateral(account_id, liquidator, reward, now)?,
            None => Quote::zero(),
        };

        for closed in &outcome.closed {
            self.emit_event(EventPayload::PositionClosed(PositionClosedEvent {
                account_id,
                position_id: closed.position_id,
                asset: closed.asset,
                exit_price: closed.exit_price,
                realized_pnl: closed.realized_pnl,
                close_reason: CloseReason::Liquidation,
            }));
        }
        if !outcome.bad_debt.is_zero() {
            tracing::warn!(account = %account_id, bad_debt = %outcome.bad_debt, "liquidation left bad debt");
            self.emit_event(EventPayload::BadDebt(BadDebtEvent {
                account_id,
                debt_amount: outcome.bad_debt,
            }));
        }

        let result = LiquidationResult {
            account_id,
            liquidator: beneficiary,
            margin_ratio: ratio,
            reward: paid,
            positions_closed: outcome.closed.len(),
            realized_pnl: outcome.realized_pnl,
            bad_debt: outcome.bad_debt,
            emergency,
        };

        tracing::info!(
            account = %account_id,
            margin_ratio = %ratio,
            reward = %paid,
            positions = result.positions_closed,
            emergency,
            "account liquidated"
        );
        self.emit_event(EventPayload::LiquidationExecuted(LiquidationExecutedEvent {
            account_id,
            liquidator: beneficiary,
            margin_ratio: ratio,
            reward: paid,
            positions_closed: result.positions_closed,
            realized_pnl: result.realized_pnl,
            emergency,
        }));

        Ok(result)
    }

    fn is_efficient(&self, liquidator: AccountId, reward: Quote, estimated_cost: u64) -> bool {
        self.liquidators
            .get(liquidator)
            .is_some_and(|l| self.efficiency.is_efficient(l, reward, estimated_cost))
    }

    fn credit_success(&mut self, liquidator: AccountId, reward: Quote, efficient: bool) -> Result<(), EngineError> {
        let old = self
            .liquidators
            .get(liquidator)
            .map(|l| l.reputation)
            .unwrap_or_default();
        let new = self
            .liquidators
            .record_success(liquidator, reward, efficient, self.current_time)?;
        self.emit_reputation_change(liquidator, old, new);
        Ok(())
    }

    pub(super) fn emit_reputation_change(&mut self, liquidator: AccountId, old: u32, new: u32) {
        if old != new {
            self.emit_event(EventPayload::ReputationChanged(ReputationChangedEvent {
                liquidator,
                old_reputation: old,
                new_reputation: new,
            }));
        }
    }
}

//! Liquidation eligibility, priority and reward.
//!
//! An account is eligible once its margin ratio reaches the liquidation
//! threshold and goes straight to execution past the emergency threshold.
//! Priority blends margin severity with the external risk signal; reward is a
//! tiered share of collateral that grows as the account gets worse.

use crate::config::ConfigError;
use crate::queue::LiquidationJob;
use crate::risk::RiskAssessment;
use crate::types::{Bps, Quote, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationParams {
    pub liquidation_threshold: Bps,
    pub emergency_threshold: Bps,
    /// Priority points per bps of ratio above the liquidation threshold
    pub priority_per_bps: u64,
    /// VaR level above which the VaR bonus starts
    pub var_reference: Bps,
    pub priority_per_var_bps: u64,
    pub high_risk_bonus: u64,
    /// Monitoring bump for HIGH tier jobs
    pub escalation_bonus: u64,
    pub max_escalated_priority: u64,
    /// VaR above this halves the remaining grace period
    pub var_escalation_threshold: Bps,
    pub base_liquidation_reward: Bps,
    pub max_liquidation_reward: Bps,
    /// Ratio above which the reward doubles
    pub double_reward_threshold: Bps,
    /// Ratio above which the reward triples
    pub triple_reward_threshold: Bps,
    pub liquidation_delay_ms: i64,
    pub max_batch_size: usize,
    pub base_cost: u64,
    pub cost_per_position: u64,
}

impl Default for LiquidationParams {
    fn default() -> Self {
        Self {
            liquidation_threshold: Bps::new(8000),
            emergency_threshold: Bps::new(9500),
            priority_per_bps: 50,
            var_reference: Bps::new(10_000),
            priority_per_var_bps: 10,
            high_risk_bonus: 2000,
            escalation_bonus: 2000,
            max_escalated_priority: 10_000,
            var_escalation_threshold: Bps::new(12_000),
            base_liquidation_reward: Bps::new(50),
            max_liquidation_reward: Bps::new(500),
            double_reward_threshold: Bps::new(8500),
            triple_reward_threshold: Bps::new(9000),
            liquidation_delay_ms: 300_000,
            max_batch_size: 10,
            base_cost: 200_000,
            cost_per_position: 50_000,
        }
    }
}

impl LiquidationParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.liquidation_threshold.value() == 0
            || self.liquidation_threshold > self.emergency_threshold
        {
            return Err(ConfigError::InvalidLiquidation {
                reason: "liquidation threshold must be positive and at most the emergency threshold".to_string(),
            });
        }
        if self.emergency_threshold > Bps::ONE_HUNDRED_PERCENT {
            return Err(ConfigError::InvalidLiquidation {
                reason: "emergency threshold above 100%".to_string(),
            });
        }
        if self.base_liquidation_reward > self.max_liquidation_reward
            || self.max_liquidation_reward > Bps::ONE_HUNDRED_PERCENT
        {
            return Err(ConfigError::InvalidLiquidation {
                reason: "base reward must not exceed max reward, max reward at most 100%".to_string(),
            });
        }
        if self.double_reward_threshold > self.triple_reward_threshold {
            return Err(ConfigError::InvalidLiquidation {
                reason: "reward tiers out of order".to_string(),
            });
        }
        if self.liquidation_delay_ms < 0 {
            return Err(ConfigError::InvalidLiquidation {
                reason: "liquidation delay must not be negative".to_string(),
            });
        }
        if self.max_batch_size == 0 {
            return Err(ConfigError::InvalidLiquidation {
                reason: "batch size must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

pub fn is_liquidation_eligible(margin_ratio: Bps, params: &LiquidationParams) -> bool {
    margin_ratio >= params.liquidation_threshold
}

pub fn is_emergency(margin_ratio: Bps, params: &LiquidationParams) -> bool {
    margin_ratio >= params.emergency_threshold
}

/// Severity score, higher = liquidate sooner. `risk` is `None` when the
/// feed could not answer, which leaves the margin component alone.
pub fn calculate_liquidation_priority(
    margin_ratio: Bps,
    risk: Option<&RiskAssessment>,
    params: &LiquidationParams,
) -> u64 {
    let base = margin_ratio
        .saturating_sub(params.liquidation_threshold)
        .value()
        .saturating_mul(params.priority_per_bps);

    let Some(risk) = risk else {
        return base;
    };

    let var_bonus = risk
        .var
        .saturating_sub(params.var_reference)
        .value()
        .saturating_mul(params.priority_per_var_bps);
    let tier_bonus = if risk.is_high() { params.high_risk_bonus } else { 0 };

    base.saturating_add(var_bonus).saturating_add(tier_bonus)
}

/// What monitoring changed on a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Escalation {
    pub priority_bumped: bool,
    pub deadline_shortened: bool,
}

impl Escalation {
    pub fn changed(&self) -> bool {
        self.priority_bumped || self.deadline_shortened
    }
}

/// In-place escalation of a queued job from a fresh risk reading.
pub fn escalate_job(
    job: &mut LiquidationJob,
    risk: &RiskAssessment,
    now: Timestamp,
    params: &LiquidationParams,
) -> Escalation {
    let mut escalation = Escalation::default();

    if risk.is_high() {
        // the cap bounds the bump, it never pulls a higher priority down
        let bumped = job
            .priority
            .saturating_add(params.escalation_bonus)
            .min(params.max_escalated_priority)
            .max(job.priority);
        escalation.priority_bumped = bumped != job.priority;
        job.priority = bumped;
    }

    if risk.var > params.var_escalation_threshold {
        job.deadline = now.plus_millis(params.liquidation_delay_ms / 2);
        escalation.deadline_shortened = true;
    }

    escalation
}

pub fn reward_rate(margin_ratio: Bps, params: &LiquidationParams) -> Bps {
    let base = params.base_liquidation_reward.value();
    let rate = if margin_ratio > params.triple_reward_threshold {
        base.saturating_mul(3)
    } else if margin_ratio > params.double_reward_threshold {
        base.saturating_mul(2)
    } else {
        base
    };
    Bps::new(rate)
}

pub fn calculate_liquidation_reward(
    collateral: Quote,
    margin_ratio: Bps,
    params: &LiquidationParams,
) -> Quote {
    let reward = collateral.apply_bps(reward_rate(margin_ratio, params));
    let cap = collateral.apply_bps(params.max_liquidation_reward);
    reward.min(cap)
}

/// Scheduling heuristic for batch sizing. Not a security boundary.
pub fn estimate_liquidation_cost(open_positions: usize, params: &LiquidationParams) -> u64 {
    params
        .base_cost
        .saturating_add(params.cost_per_position.saturating_mul(open_positions as u64))
}

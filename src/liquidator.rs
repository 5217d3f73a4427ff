//! Liquidator registry and reputation.
//!
//! Anyone can register as a liquidator. Reputation starts at 7500 of 10000,
//! moves with outcomes, and gates who may execute queued jobs.

use crate::config::ConfigError;
use crate::types::{AccountId, Quote, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationParams {
    pub initial_reputation: u32,
    pub max_reputation: u32,
    /// Floor for calling `execute_liquidation`
    pub min_reputation: u32,
    pub success_bonus: u32,
    pub efficiency_bonus: u32,
    pub failure_penalty: u32,
    pub batch_bonus: u32,
}

impl Default for ReputationParams {
    fn default() -> Self {
        Self {
            initial_reputation: 7500,
            max_reputation: 10_000,
            min_reputation: 5000,
            success_bonus: 25,
            efficiency_bonus: 25,
            failure_penalty: 100,
            batch_bonus: 50,
        }
    }
}

impl ReputationParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_reputation > self.max_reputation || self.min_reputation > self.max_reputation {
            return Err(ConfigError::InvalidReputation {
                reason: "initial and minimum reputation must not exceed the maximum".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Liquidator {
    pub id: AccountId,
    pub total_attempts: u64,
    pub total_successes: u64,
    pub total_rewards: Quote,
    pub reputation: u32,
    pub is_active: bool,
    pub last_activity_time: Timestamp,
    pub registered_at: Timestamp,
}

impl Liquidator {
    pub fn average_reward(&self) -> Option<Quote> {
        if self.total_successes == 0 {
            return None;
        }
        Some(Quote::new(
            self.total_rewards.value() / Decimal::from(self.total_successes),
        ))
    }

    fn raise(&mut self, points: u32, cap: u32) {
        self.reputation = self.reputation.saturating_add(points).min(cap);
    }

    fn lower(&mut self, points: u32) {
        self.reputation = self.reputation.saturating_sub(points);
    }
}

/// Decides whether a successful liquidation earns the efficiency bonus.
/// Stands in for a real cost model.
pub trait EfficiencyModel: Send + fmt::Debug {
    fn is_efficient(&self, liquidator: &Liquidator, reward: Quote, estimated_cost: u64) -> bool;
}

/// Efficient when the reward is at least the liquidator's historical average
/// per success. No history, no bonus.
#[derive(Debug, Clone, Copy, Default)]
pub struct AverageRewardEfficiency;

impl EfficiencyModel for AverageRewardEfficiency {
    fn is_efficient(&self, liquidator: &Liquidator, reward: Quote, _estimated_cost: u64) -> bool {
        liquidator
            .average_reward()
            .is_some_and(|average| reward >= average)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LiquidatorRegistry {
    liquidators: HashMap<AccountId, Liquidator>,
    params: ReputationParams,
}

impl LiquidatorRegistry {
    pub fn new(params: ReputationParams) -> Self {
        Self {
            liquidators: HashMap::new(),
            params,
        }
    }

    pub fn params(&self) -> &ReputationParams {
        &self.params
    }

    pub fn set_min_reputation(&mut self, min_reputation: u32) {
        self.params.min_reputation = min_reputation;
    }

    pub fn register(&mut self, id: AccountId, now: Timestamp) -> Result<&Liquidator, LiquidatorError> {
        if self.liquidators.contains_key(&id) {
            return Err(LiquidatorError::AlreadyRegistered(id));
        }
        let liquidator = Liquidator {
            id,
            total_attempts: 0,
            total_successes: 0,
            total_rewards: Quote::zero(),
            reputation: self.params.initial_reputation,
            is_active: true,
            last_activity_time: now,
            registered_at: now,
        };
        Ok(self.liquidators.entry(id).or_insert(liquidator))
    }

    pub fn get(&self, id: AccountId) -> Option<&Liquidator> {
        self.liquidators.get(&id)
    }

    fn get_mut(&mut self, id: AccountId) -> Result<&mut Liquidator, LiquidatorError> {
        self.liquidators
            .get_mut(&id)
            .ok_or(LiquidatorError::NotRegistered(id))
    }

    pub fn set_active(&mut self, id: AccountId, active: bool) -> Result<(), LiquidatorError> {
        self.get_mut(id)?.is_active = active;
        Ok(())
    }

    /// Registered, active and at or above the reputation floor.
    pub fn ensure_authorized(&self, id: AccountId) -> Result<&Liquidator, LiquidatorError> {
        let liquidator = self
            .liquidators
            .get(&id)
            .ok_or(LiquidatorError::NotRegistered(id))?;
        if !liquidator.is_active {
            return Err(LiquidatorError::Inactive(id));
        }
        if liquidator.reputation < self.params.min_reputation {
            return Err(LiquidatorError::ReputationTooLow {
                id,
                reputation: liquidator.reputation,
                required: self.params.min_reputation,
            });
        }
        Ok(liquidator)
    }

    pub fn is_authorized(&self, id: AccountId) -> bool {
        self.ensure_authorized(id).is_ok()
    }

    pub fn record_success(
        &mut self,
        id: AccountId,
        reward: Quote,
        efficient: bool,
        now: Timestamp,
    ) -> Result<u32, LiquidatorError> {
        let params = self.params.clone();
        let liquidator = self.get_mut(id)?;
        liquidator.total_attempts += 1;
        liquidator.total_successes += 1;
        liquidator.total_rewards = liquidator.total_rewards.add(reward);
        liquidator.last_activity_time = now;
        liquidator.raise(params.success_bonus, params.max_reputation);
        if efficient {
            liquidator.raise(params.efficiency_bonus, params.max_reputation);
        }
        Ok(liquidator.reputation)
    }

    pub fn record_failure(&mut self, id: AccountId, now: Timestamp) -> Result<u32, LiquidatorError> {
        let penalty = self.params.failure_penalty;
        let liquidator = self.get_mut(id)?;
        liquidator.total_attempts += 1;
        liquidator.last_activity_time = now;
        liquidator.lower(penalty);
        Ok(liquidator.reputation)
    }

    /// One aggregate update per batch. The flat bonus needs at least one success.
    pub fn record_batch(
        &mut self,
        id: AccountId,
        attempts: u64,
        successes: u64,
        rewards: Quote,
        now: Timestamp,
    ) -> Result<u32, LiquidatorError> {
        let params = self.params.clone();
        let liquidator = self.get_mut(id)?;
        liquidator.total_attempts += attempts;
        liquidator.total_successes += successes;
        liquidator.total_rewards = liquidator.total_rewards.add(rewards);
        liquidator.last_activity_time = now;
        if successes > 0 {
            liquidator.raise(params.batch_bonus, params.max_reputation);
        }
        Ok(liquidator.reputation)
    }

    pub fn len(&self) -> usize {
        self.liquidators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.liquidators.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LiquidatorError {
    #[error("Liquidator {0} already registered")]
    AlreadyRegistered(AccountId),

    #[error("Liquidator {0} not registered")]
    NotRegistered(AccountId),

    #[error("Liquidator {0} is deactivated")]
    Inactive(AccountId),

    #[error("Liquidator {id} reputation {reputation} below {required}")]
    ReputationTooLow { id: AccountId, reputation: u32, required: u32 },
}

//! Privileged controls: pause, parameter tuning, liquidator activation.

use super::config::Role;
use super::core::Engine;
use super::results::EngineError;
use crate::events::EventPayload;
use crate::types::{AccountId, Bps};

/// One tunable parameter and its new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamUpdate {
    BaseReward(Bps),
    MaxReward(Bps),
    LiquidationDelay { millis: i64 },
    EmergencyThreshold(Bps),
    MaxBatchSize(usize),
    MinReputation(u32),
}

impl Engine {
    /// Stop queueing, execution and new positions. Pending jobs are dropped.
    pub fn pause(&mut self, caller: AccountId) -> Result<usize, EngineError> {
        self.require_role(caller, Role::Admin)?;
        self.paused = true;
        let cleared_jobs = self.queue.clear();
        tracing::warn!(cleared_jobs, "engine paused");
        self.emit_event(EventPayload::Paused { cleared_jobs });
        Ok(cleared_jobs)
    }

    pub fn unpause(&mut self, caller: AccountId) -> Result<(), EngineError> {
        self.require_role(caller, Role::Admin)?;
        self.paused = false;
        tracing::info!("engine unpaused");
        self.emit_event(EventPayload::Unpaused);
        Ok(())
    }

    /// Apply a parameter change. The whole parameter set is validated before
    /// anything is committed.
    pub fn update_param(&mut self, caller: AccountId, update: ParamUpdate) -> Result<(), EngineError> {
        self.require_role(caller, Role::Admin)?;

        let mut liquidation = self.config.venue.liquidation.clone();
        let mut reputation = self.config.venue.reputation.clone();
        match update {
            ParamUpdate::BaseReward(bps) => liquidation.base_liquidation_reward = bps,
            ParamUpdate::MaxReward(bps) => liquidation.max_liquidation_reward = bps,
            ParamUpdate::LiquidationDelay { millis } => liquidation.liquidation_delay_ms = millis,
            ParamUpdate::EmergencyThreshold(bps) => liquidation.emergency_threshold = bps,
            ParamUpdate::MaxBatchSize(size) => liquidation.max_batch_size = size,
            ParamUpdate::MinReputation(floor) => reputation.min_reputation = floor,
        }
        liquidation.validate()?;
        reputation.validate()?;

        self.liquidators.set_min_reputation(reputation.min_reputation);
        self.config.venue.liquidation = liquidation;
        self.config.venue.reputation = reputation;

        tracing::info!(?update, "parameter updated");
        self.emit_event(EventPayload::ParamUpdated {
            description: format!("{update:?}"),
        });
        Ok(())
    }

    pub fn set_liquidator_active(&mut self, caller: AccountId, liquidator: AccountId, active: bool) -> Result<(), EngineError> {
        self.require_role(caller, Role::Admin)?;
        self.liquidators.set_active(liquidator, active)?;
        tracing::info!(%liquidator, active, "liquidator status changed");
        self.emit_event(EventPayload::ParamUpdated {
            description: format!("{liquidator} active={active}"),
        });
        Ok(())
    }
}

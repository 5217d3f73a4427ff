// 8.0 engine/core.rs: main engine. holds markets, ledger, queue, liquidators and collaborators.

use super::config::{EngineConfig, Role};
use super::results::EngineError;
use crate::account::{Account, AccountLedger};
use crate::config::VenueConfig;
use crate::events::{Event, EventId, EventPayload};
use crate::liquidator::{AverageRewardEfficiency, EfficiencyModel, Liquidator, LiquidatorRegistry};
use crate::margin::{CorrelationMatrix, CorrelationModel};
use crate::market::MarketRegistry;
use crate::queue::LiquidationQueue;
use crate::risk::{RiskFeed, UnavailableRiskFeed};
use crate::types::{AccountId, Timestamp};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/** 8.1: main engine struct. all state lives here, no globals */
#[derive(Debug)]
pub struct Engine {
    pub(super) config: EngineConfig,
    pub(super) markets: MarketRegistry,
    pub(super) ledger: AccountLedger,
    pub(super) queue: LiquidationQueue,
    pub(super) liquidators: LiquidatorRegistry,
    pub(super) correlation: Box<dyn CorrelationModel>,
    pub(super) risk_feed: Box<dyn RiskFeed>,
    pub(super) efficiency: Box<dyn EfficiencyModel>,
    pub(super) locks: AccountLocks,
    pub(super) paused: bool,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) current_time: Timestamp,
}

/// Accounts with a transaction in flight. The set is shared with each
/// transaction's guard, so a lock is released even when `f` unwinds.
#[derive(Debug, Clone, Default)]
pub(super) struct AccountLocks(Arc<Mutex<HashSet<AccountId>>>);

impl AccountLocks {
    fn set(&self) -> MutexGuard<'_, HashSet<AccountId>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn acquire(&self, account: AccountId) -> Option<AccountLockGuard> {
        if !self.set().insert(account) {
            return None;
        }
        Some(AccountLockGuard {
            locks: self.clone(),
            account,
        })
    }

    fn contains(&self, account: AccountId) -> bool {
        self.set().contains(&account)
    }
}

struct AccountLockGuard {
    locks: AccountLocks,
    account: AccountId,
}

impl Drop for AccountLockGuard {
    fn drop(&mut self) {
        self.locks.set().remove(&self.account);
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let correlation = CorrelationMatrix::from_params(&config.venue.margin);
        let liquidators = LiquidatorRegistry::new(config.venue.reputation.clone());
        Self {
            config,
            markets: MarketRegistry::new(),
            ledger: AccountLedger::new(),
            queue: LiquidationQueue::new(),
            liquidators,
            correlation: Box::new(correlation),
            risk_feed: Box::new(UnavailableRiskFeed),
            efficiency: Box::new(AverageRewardEfficiency),
            locks: AccountLocks::default(),
            paused: false,
            events: Vec::new(),
            next_event_id: 1,
            current_time: Timestamp::from_millis(0),
        }
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, millis: i64) {
        self.current_time = self.current_time.plus_millis(millis);
    }

    pub fn set_risk_feed(&mut self, feed: Box<dyn RiskFeed>) {
        self.risk_feed = feed;
    }

    pub fn set_correlation_model(&mut self, model: Box<dyn CorrelationModel>) {
        self.correlation = model;
    }

    pub fn set_efficiency_model(&mut self, model: Box<dyn EfficiencyModel>) {
        self.efficiency = model;
    }

    pub fn venue(&self) -> &VenueConfig {
        &self.config.venue
    }

    pub fn markets(&self) -> &MarketRegistry {
        &self.markets
    }

    pub fn get_account(&self, account_id: AccountId) -> Option<&Account> {
        self.ledger.get(account_id)
    }

    pub fn accounts_iter(&self) -> impl Iterator<Item = (&AccountId, &Account)> {
        self.ledger.iter()
    }

    pub fn queue(&self) -> &LiquidationQueue {
        &self.queue
    }

    pub fn liquidator(&self, id: AccountId) -> Option<&Liquidator> {
        self.liquidators.get(id)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub(super) fn require_role(&self, caller: AccountId, role: Role) -> Result<(), EngineError> {
        if self.config.roles.holder(role) != caller {
            return Err(EngineError::NotAuthorized { caller, role });
        }
        Ok(())
    }

    pub(super) fn ensure_not_paused(&self) -> Result<(), EngineError> {
        if self.paused {
            return Err(EngineError::Paused);
        }
        Ok(())
    }

    /// Runs `f` as one transaction on `account`. The lock is taken before `f`
    /// and released on every return path; a nested entry for the same
    /// account is rejected.
    pub(crate) fn with_account_lock<T>(
        &mut self,
        account: AccountId,
        f: impl FnOnce(&mut Self) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let Some(_lock) = self.locks.acquire(account) else {
            tracing::warn!(%account, "re-entrant transaction rejected");
            return Err(EngineError::Reentrant(account));
        };
        f(self)
    }

    pub fn is_locked(&self, account: AccountId) -> bool {
        self.locks.contains(account)
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.current_time, payload);
        self.next_event_id += 1;

        tracing::debug!(id = event.id.0, payload = ?event.payload, "event");

        self.events.push(event);

        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Quote;
    use rust_decimal_macros::dec;

    #[test]
    fn lock_released_on_error_path() {
        let mut engine = Engine::new(EngineConfig::default());
        let result: Result<(), EngineError> =
            engine.with_account_lock(AccountId(1), |_| Err(EngineError::Paused));
        assert!(matches!(result, Err(EngineError::Paused)));
        assert!(!engine.is_locked(AccountId(1)));
    }

    #[test]
    fn lock_released_when_transaction_unwinds() {
        let mut engine = Engine::new(EngineConfig::default());
        let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = engine.with_account_lock(AccountId(1), |_| -> Result<(), EngineError> {
                panic!("collaborator failure")
            });
        }));
        assert!(unwound.is_err());
        assert!(!engine.is_locked(AccountId(1)));
        assert!(engine.deposit_collateral(AccountId(1), Quote::new(dec!(5))).is_ok());
    }

    #[test]
    fn nested_entry_on_same_account_rejected() {
        let mut engine = Engine::new(EngineConfig::default());
        let outer = engine.with_account_lock(AccountId(1), |engine| {
            assert!(engine.is_locked(AccountId(1)));
            let inner = engine.with_account_lock(AccountId(1), |_| Ok(()));
            assert!(matches!(inner, Err(EngineError::Reentrant(AccountId(1)))));
            // other accounts are independent
            engine.with_account_lock(AccountId(2), |_| Ok(()))
        });
        assert!(outer.is_ok());
        assert!(!engine.is_locked(AccountId(1)));
    }

    #[test]
    fn event_log_is_bounded() {
        let mut engine = Engine::new(EngineConfig {
            max_events: 3,
            ..EngineConfig::default()
        });
        for _ in 0..5 {
            engine.deposit_collateral(AccountId(1), Quote::new(dec!(1))).unwrap();
        }
        assert_eq!(engine.events().len(), 3);
        assert_eq!(engine.events()[0].id, EventId(3));
        assert_eq!(engine.recent_events(1)[0].id, EventId(5));
    }

    #[test]
    fn roles_are_enforced() {
        let engine = Engine::new(EngineConfig::default());
        assert!(engine.require_role(AccountId(0), Role::Admin).is_ok());
        assert!(matches!(
            engine.require_role(AccountId(9), Role::RiskOracle),
            Err(EngineError::NotAuthorized { role: Role::RiskOracle, .. })
        ));
    }
}

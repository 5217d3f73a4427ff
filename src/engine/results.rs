// 8.0.2: result types and errors for engine operations.

use super::config::Role;
use crate::account::AccountError;
use crate::config::ConfigError;
use crate::liquidator::LiquidatorError;
use crate::margin::MarginError;
use crate::market::MarketError;
use crate::queue::{LiquidationJob, QueueError};
use crate::types::{AccountId, Bps, Quote, Timestamp};

#[derive(Debug, Clone)]
pub struct LiquidationResult {
    pub account_id: AccountId,
    /// None on an emergency liquidation triggered by someone who is not an
    /// authorized liquidator
    pub liquidator: Option<AccountId>,
    /// Ratio the reward was priced at
    pub margin_ratio: Bps,
    pub reward: Quote,
    pub positions_closed: usize,
    pub realized_pnl: Quote,
    pub bad_debt: Quote,
    pub emergency: bool,
}

#[derive(Debug, Clone)]
pub enum QueueOutcome {
    Queued(LiquidationJob),
    /// Emergency path: executed on the spot, no job created
    ExecutedImmediately(LiquidationResult),
}

impl QueueOutcome {
    pub fn job(&self) -> Option<&LiquidationJob> {
        match self {
            QueueOutcome::Queued(job) => Some(job),
            QueueOutcome::ExecutedImmediately(_) => None,
        }
    }

    pub fn is_emergency(&self) -> bool {
        matches!(self, QueueOutcome::ExecutedImmediately(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoActiveJob,
    DeadlineNotReached,
    NoLongerEligible,
    BudgetExhausted,
}

#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub requested: usize,
    pub attempted: usize,
    pub successes: usize,
    pub skipped: Vec<(AccountId, SkipReason)>,
    pub failed: Vec<(AccountId, String)>,
    pub total_reward: Quote,
    pub budget_used: u64,
    pub results: Vec<LiquidationResult>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorReport {
    pub inspected: usize,
    pub escalated: usize,
    /// Jobs left untouched because the feed had no usable answer
    pub risk_unavailable: usize,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("Account {0} not found")]
    AccountNotFound(AccountId),

    #[error("{caller} is not authorized as {role}")]
    NotAuthorized { caller: AccountId, role: Role },

    #[error("Engine is paused")]
    Paused,

    #[error("Position size must be non-zero")]
    InvalidSize,

    #[error("Insufficient margin: required {required}, available {available}")]
    InsufficientMargin { required: Quote, available: Quote },

    #[error("Account {account} not eligible for liquidation (ratio {margin_ratio})")]
    NotEligible { account: AccountId, margin_ratio: Bps },

    #[error("No active liquidation job for {0}")]
    NoActiveJob(AccountId),

    #[error("Liquidation of {account} not allowed before {deadline:?} (now {now:?})")]
    DeadlineNotReached {
        account: AccountId,
        deadline: Timestamp,
        now: Timestamp,
    },

    #[error("Account {account} cured its risk (ratio {margin_ratio}), job kept for re-evaluation")]
    RiskCured { account: AccountId, margin_ratio: Bps },

    #[error("Ledger rejected liquidation of {account}: {source}")]
    LiquidationRejected {
        account: AccountId,
        #[source]
        source: AccountError,
    },

    #[error("Batch of {requested} exceeds maximum {max}")]
    BatchTooLarge { requested: usize, max: usize },

    #[error("Account {0} is already inside a transaction")]
    Reentrant(AccountId),

    #[error("Nested engine transaction rejected")]
    TransactionInProgress,

    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    #[error("Market error: {0}")]
    Market(#[from] MarketError),

    #[error("Margin error: {0}")]
    Margin(#[from] MarginError),

    #[error("Liquidator error: {0}")]
    Liquidator(#[from] LiquidatorError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

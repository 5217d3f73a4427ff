// 10.0: every state change produces an event. used for audit trails, state reconstruction,
// and notifying external systems. the EventPayload enum lists all event types.

use crate::risk::RiskTier;
use crate::types::{AccountId, AssetId, Bps, PositionId, Price, Quote, SignedSize, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Market events
    MarketListed(MarketListedEvent),
    PriceUpdated(PriceUpdatedEvent),
    FundingAccrued(FundingAccruedEvent),

    // Account events
    Deposit(DepositEvent),
    Withdrawal(WithdrawalEvent),
    PositionOpened(PositionOpenedEvent),
    PositionClosed(PositionClosedEvent),

    // Liquidation events
    LiquidationQueued(LiquidationQueuedEvent),
    LiquidationExecuted(LiquidationExecutedEvent),
    LiquidationFailed(LiquidationFailedEvent),
    LiquidationCancelled(LiquidationCancelledEvent),
    PriorityEscalated(PriorityEscalatedEvent),
    BatchCompleted(BatchCompletedEvent),
    BadDebt(BadDebtEvent),

    // Liquidator events
    LiquidatorRegistered(LiquidatorRegisteredEvent),
    ReputationChanged(ReputationChangedEvent),

    // Admin events
    Paused { cleared_jobs: usize },
    Unpaused,
    ParamUpdated { description: String },
    CorrelationsUpdated { assets: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketListedEvent {
    pub asset: AssetId,
    pub symbol: String,
    pub price: Price,
    pub risk_weight: Bps,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceUpdatedEvent {
    pub asset: AssetId,
    pub old_price: Price,
    pub new_price: Price,
    pub accounts_marked: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingAccruedEvent {
    pub asset: AssetId,
    pub funding_per_unit: rust_decimal::Decimal,
    pub positions_affected: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositEvent {
    pub account_id: AccountId,
    pub amount: Quote,
    pub new_collateral: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalEvent {
    pub account_id: AccountId,
    pub amount: Quote,
    pub new_collateral: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionOpenedEvent {
    pub account_id: AccountId,
    pub position_id: PositionId,
    pub asset: AssetId,
    pub size: SignedSize,
    pub entry_price: Price,
    pub margin: Quote,
    pub discount: Bps,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionClosedEvent {
    pub account_id: AccountId,
    pub position_id: PositionId,
    pub asset: AssetId,
    pub exit_price: Price,
    pub realized_pnl: Quote,
    pub close_reason: CloseReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    UserClosed,
    Liquidation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationQueuedEvent {
    pub account_id: AccountId,
    pub priority: u64,
    pub margin_ratio: Bps,
    pub max_reward: Quote,
    pub deadline: Timestamp,
    /// false when the risk feed could not be used
    pub risk_adjusted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationExecutedEvent {
    pub account_id: AccountId,
    pub liquidator: Option<AccountId>,
    pub margin_ratio: Bps,
    pub reward: Quote,
    pub positions_closed: usize,
    pub realized_pnl: Quote,
    pub emergency: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationFailedEvent {
    pub account_id: AccountId,
    pub liquidator: AccountId,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationCancelledEvent {
    pub account_id: AccountId,
    pub margin_ratio: Bps,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityEscalatedEvent {
    pub account_id: AccountId,
    pub old_priority: u64,
    pub new_priority: u64,
    pub new_deadline: Timestamp,
    pub tier: RiskTier,
    pub var: Bps,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchCompletedEvent {
    pub liquidator: AccountId,
    pub requested: usize,
    pub attempted: usize,
    pub successes: usize,
    pub total_reward: Quote,
    pub budget_used: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadDebtEvent {
    pub account_id: AccountId,
    pub debt_amount: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidatorRegisteredEvent {
    pub liquidator: AccountId,
    pub reputation: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationChangedEvent {
    pub liquidator: AccountId,
    pub old_reputation: u32,
    pub new_reputation: u32,
}

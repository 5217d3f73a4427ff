// xmargin-core: cross-margin accounting and liquidation scheduling.
// risk-first: margin math decides who gets liquidated, the queue decides when.
// all computation is deterministic, time and feeds are supplied by the caller.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: AccountId, AssetId, Price, Quote, Bps, Timestamp
//   2.x  market.rs: market registry, prices, risk weights, open interest
//   3.x  position.rs: position struct, pnl net of funding
//   4.x  account.rs: account ledger, collateral, liquidation primitive
//   5.x  margin.rs: required margin, cross-margin discount, correlation models
//   6.x  risk.rs: risk feed collaborator, tiers, staleness
//   6.1  liquidation.rs: eligibility, priority, escalation, reward, cost
//   7.x  queue.rs: pending liquidation jobs
//   7.1  liquidator.rs: liquidator registry and reputation
//   8.x  engine/: transactions, scheduling, batch execution, admin, shared handle
//   9.x  config.rs: venue params, env presets, json loading
//   10.x events.rs: state transition events for audit

// core accounting modules
pub mod account;
pub mod margin;
pub mod market;
pub mod position;
pub mod types;

// liquidation modules
pub mod liquidation;
pub mod liquidator;
pub mod queue;
pub mod risk;

pub mod config;
pub mod engine;
pub mod events;

// re exports for convenience
pub use account::*;
pub use config::{ConfigError, Environment, VenueConfig};
pub use engine::*;
pub use events::*;
pub use liquidation::*;
pub use liquidator::*;
pub use margin::*;
pub use market::*;
pub use position::*;
pub use queue::*;
pub use risk::*;
pub use types::*;

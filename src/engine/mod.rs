// 8.0: engine. owns markets, the account ledger, the liquidation queue and the
// liquidator registry, and runs every operation as one locked transaction.
// deterministic: time, prices and risk come in from the caller.

mod accounts;
mod admin;
mod batch;
mod config;
mod core;
mod liquidations;
mod pricing;
mod results;
mod shared;

pub use admin::ParamUpdate;
pub use config::{EngineConfig, Role, Roles};
pub use core::Engine;
pub use results::{BatchResult, EngineError, LiquidationResult, MonitorReport, QueueOutcome, SkipReason};
pub use shared::SharedEngine;

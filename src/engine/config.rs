//! Engine configuration options.

use crate::config::VenueConfig;
use crate::types::AccountId;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    RiskOracle,
    PriceFeed,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::Admin => "admin",
            Role::RiskOracle => "risk oracle",
            Role::PriceFeed => "price feed",
        };
        f.write_str(label)
    }
}

/// Identities allowed to call privileged entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roles {
    /// Pauses, tunes parameters, lists markets.
    pub admin: AccountId,
    /// Runs `monitor_liquidations` and pushes correlations.
    pub risk_oracle: AccountId,
    /// Pushes prices, volatility and funding.
    pub price_feed: AccountId,
}

impl Roles {
    pub fn holder(&self, role: Role) -> AccountId {
        match role {
            Role::Admin => self.admin,
            Role::RiskOracle => self.risk_oracle,
            Role::PriceFeed => self.price_feed,
        }
    }
}

impl Default for Roles {
    fn default() -> Self {
        Self {
            admin: AccountId(0),
            risk_oracle: AccountId(0),
            price_feed: AccountId(0),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of events to retain in memory.
    pub max_events: usize,
    pub roles: Roles,
    pub venue: VenueConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
            roles: Roles::default(),
            venue: VenueConfig::default(),
        }
    }
}

// 9.0 config.rs: all venue settings in one place. margin, liquidation, reputation, risk feed.
// 9.1 presets per environment, JSON loading, and a validate pass before an engine is built.

use serde::{Deserialize, Serialize};

use crate::liquidation::LiquidationParams;
use crate::liquidator::ReputationParams;
use crate::margin::MarginParams;
use crate::risk::RiskFeedParams;
use crate::types::Bps;

// The complete venue configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VenueConfig {
    pub margin: MarginParams,
    pub liquidation: LiquidationParams,
    pub reputation: ReputationParams,
    pub risk_feed: RiskFeedParams,
}

impl VenueConfig {
    // Create a configuration preset for testnet: short grace period, easy liquidator onboarding
    pub fn testnet() -> Self {
        let mut config = Self::default();
        config.liquidation.liquidation_delay_ms = 30_000; // 30s
        config.reputation.min_reputation = 2500;
        config
    }

    // Create a configuration preset for mainnet with conservative settings
    pub fn mainnet_conservative() -> Self {
        let mut config = Self::default();
        config.margin.max_cross_margin_discount = Bps::new(2000); // 20%
        config.liquidation.emergency_threshold = Bps::new(9300);
        config.liquidation.max_batch_size = 5;
        config.reputation.min_reputation = 6000;
        config.risk_feed.max_assessment_age_ms = 60_000; // 1 minute
        config
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        // margin checks
        if self.margin.max_cross_margin_discount > Bps::ONE_HUNDRED_PERCENT {
            return Err(ConfigError::InvalidMargin {
                reason: "cross-margin discount cap above 100%".to_string(),
            });
        }
        let tiers = &self.margin.diversification_tiers;
        if tiers
            .windows(2)
            .any(|w| w[0].min_open_positions < w[1].min_open_positions)
        {
            return Err(ConfigError::InvalidMargin {
                reason: "diversification tiers must be sorted by position count, largest first".to_string(),
            });
        }
        if !(-10_000..=10_000).contains(&self.margin.default_correlation) {
            return Err(ConfigError::InvalidMargin {
                reason: "default correlation out of range".to_string(),
            });
        }

        self.liquidation.validate()?;
        self.reputation.validate()?;

        if self.risk_feed.max_assessment_age_ms <= 0 {
            return Err(ConfigError::InvalidRiskFeed {
                reason: "assessment age must be positive".to_string(),
            });
        }

        Ok(())
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid margin config: {reason}")]
    InvalidMargin { reason: String },

    #[error("Invalid liquidation config: {reason}")]
    InvalidLiquidation { reason: String },

    #[error("Invalid reputation config: {reason}")]
    InvalidReputation { reason: String },

    #[error("Invalid risk feed config: {reason}")]
    InvalidRiskFeed { reason: String },

    #[error("Config parse error: {0}")]
    Parse(String),
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> VenueConfig {
        match self {
            Environment::Development => VenueConfig::default(),
            Environment::Testnet => VenueConfig::testnet(),
            Environment::Mainnet => VenueConfig::mainnet_conservative(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = VenueConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.liquidation.liquidation_delay_ms, 300_000);
        assert_eq!(config.reputation.initial_reputation, 7500);
    }

    #[test]
    fn test_environment_presets() {
        assert!(Environment::Development.config().validate().is_ok());
        assert!(Environment::Testnet.config().validate().is_ok());
        assert!(Environment::Mainnet.config().validate().is_ok());
    }

    #[test]
    fn test_unsorted_tiers_rejected() {
        let mut config = VenueConfig::default();
        config.margin.diversification_tiers.reverse();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidMargin { .. })));
    }

    #[test]
    fn test_invalid_reputation() {
        let mut config = VenueConfig::default();
        config.reputation.min_reputation = 20_000;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidReputation { .. })));
    }

    #[test]
    fn test_json_roundtrip_and_validation() {
        let json = VenueConfig::mainnet_conservative().to_json().unwrap();
        let back = VenueConfig::from_json(&json).unwrap();
        assert_eq!(back.liquidation.max_batch_size, 5);

        let mut bad = VenueConfig::default();
        bad.liquidation.max_batch_size = 0;
        let json = serde_json::to_string(&bad).unwrap();
        assert!(matches!(
            VenueConfig::from_json(&json),
            Err(ConfigError::InvalidLiquidation { .. })
        ));

        assert!(matches!(VenueConfig::from_json("{"), Err(ConfigError::Parse(_))));
    }
}

//! Market registry.
//!
//! One entry per tradable asset with its current price, the risk weight used as
//! the base margin rate, volatility and open interest. Prices move only through
//! the price-feed collaborator; everything else reads.

use crate::types::{AssetId, Bps, Price, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub id: AssetId,
    /// Human-readable symbol (e.g., "BTC")
    pub symbol: String,
    pub price: Price,
    /// Base margin rate for positions in this asset
    pub risk_weight: Bps,
    pub volatility: Bps,
    /// Sum of absolute position sizes across all accounts
    pub open_interest: Decimal,
    pub is_active: bool,
    pub last_updated: Timestamp,
}

impl Market {
    pub fn new(
        id: AssetId,
        symbol: impl Into<String>,
        price: Price,
        risk_weight: Bps,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            price,
            risk_weight,
            volatility: Bps::ZERO,
            open_interest: Decimal::ZERO,
            is_active: true,
            last_updated: timestamp,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarketRegistry {
    markets: HashMap<AssetId, Market>,
}

impl MarketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_market(&mut self, market: Market) -> Result<AssetId, MarketError> {
        if self.markets.contains_key(&market.id) {
            return Err(MarketError::AlreadyListed(market.id));
        }
        if market.risk_weight > Bps::ONE_HUNDRED_PERCENT {
            return Err(MarketError::InvalidRiskWeight(market.risk_weight));
        }
        let id = market.id;
        self.markets.insert(id, market);
        Ok(id)
    }

    pub fn get(&self, asset: AssetId) -> Option<&Market> {
        self.markets.get(&asset)
    }

    pub fn ids(&self) -> impl Iterator<Item = &AssetId> {
        self.markets.keys()
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }

    fn get_mut(&mut self, asset: AssetId) -> Result<&mut Market, MarketError> {
        self.markets
            .get_mut(&asset)
            .ok_or(MarketError::MarketNotFound(asset))
    }

    /// Current price of an active market.
    pub fn price_of(&self, asset: AssetId) -> Result<Price, MarketError> {
        let market = self
            .markets
            .get(&asset)
            .ok_or(MarketError::MarketNotFound(asset))?;
        if !market.is_active {
            return Err(MarketError::MarketNotActive(asset));
        }
        Ok(market.price)
    }

    /// Risk weight, whether or not the market is currently active.
    pub fn risk_weight(&self, asset: AssetId) -> Result<Bps, MarketError> {
        self.markets
            .get(&asset)
            .map(|m| m.risk_weight)
            .ok_or(MarketError::MarketNotFound(asset))
    }

    pub fn update_price(
        &mut self,
        asset: AssetId,
        price: Price,
        timestamp: Timestamp,
    ) -> Result<Price, MarketError> {
        let market = self.get_mut(asset)?;
        let old = market.price;
        market.price = price;
        market.last_updated = timestamp;
        Ok(old)
    }

    pub fn update_volatility(
        &mut self,
        asset: AssetId,
        volatility: Bps,
        timestamp: Timestamp,
    ) -> Result<(), MarketError> {
        let market = self.get_mut(asset)?;
        market.volatility = volatility;
        market.last_updated = timestamp;
        Ok(())
    }

    pub fn set_active(&mut self, asset: AssetId, active: bool) -> Result<(), MarketError> {
        self.get_mut(asset)?.is_active = active;
        Ok(())
    }

    // open interest never goes negative even if a close races a stale delta
    pub fn adjust_open_interest(&mut self, asset: AssetId, delta: Decimal) -> Result<(), MarketError> {
        let market = self.get_mut(asset)?;
        market.open_interest = market.open_interest.saturating_add(delta).max(Decimal::ZERO);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarketError {
    #[error("Market {0} not found")]
    MarketNotFound(AssetId),

    #[error("Market {0} is not active")]
    MarketNotActive(AssetId),

    #[error("Market {0} already listed")]
    AlreadyListed(AssetId),

    #[error("Risk weight {0} above 100%")]
    InvalidRiskWeight(Bps),
}

//! Market listing and feed-driven updates: prices, volatility, funding, correlations.

use super::config::Role;
use super::core::Engine;
use super::results::EngineError;
use crate::events::{EventPayload, FundingAccruedEvent, MarketListedEvent, PriceUpdatedEvent};
use crate::margin::CorrelationMatrix;
use crate::market::Market;
use crate::types::{AccountId, AssetId, Bps, Price};
use rust_decimal::Decimal;

impl Engine {
    pub fn add_market(&mut self, caller: AccountId, market: Market) -> Result<AssetId, EngineError> {
        self.require_role(caller, Role::Admin)?;

        let event = MarketListedEvent {
            asset: market.id,
            symbol: market.symbol.clone(),
            price: market.price,
            risk_weight: market.risk_weight,
        };
        let asset = self.markets.add_market(market)?;

        tracing::info!(%asset, symbol = %event.symbol, "market listed");
        self.emit_event(EventPayload::MarketListed(event));
        Ok(asset)
    }

    /// Deactivated markets refuse new positions and make the ledger reject
    /// liquidations of accounts that hold them.
    pub fn set_market_active(&mut self, caller: AccountId, asset: AssetId, active: bool) -> Result<(), EngineError> {
        self.require_role(caller, Role::Admin)?;
        self.markets.set_active(asset, active)?;
        tracing::info!(%asset, active, "market status changed");
        self.emit_event(EventPayload::ParamUpdated {
            description: format!("{asset} active={active}"),
        });
        Ok(())
    }

    /// Push a new price and mark every holder of the asset to market.
    pub fn update_price(&mut self, caller: AccountId, asset: AssetId, price: Price) -> Result<(), EngineError> {
        self.require_role(caller, Role::PriceFeed)?;
        let old_price = self.markets.update_price(asset, price, self.current_time)?;

        let holders = self.ledger.accounts_holding(asset);
        for account_id in &holders {
            if let Some(account) = self.ledger.get_mut(*account_id) {
                account.refresh_unrealized_pnl(&self.markets);
            }
        }

        self.emit_event(EventPayload::PriceUpdated(PriceUpdatedEvent {
            asset,
            old_price,
            new_price: price,
            accounts_marked: holders.len(),
        }));
        Ok(())
    }

    pub fn update_volatility(&mut self, caller: AccountId, asset: AssetId, volatility: Bps) -> Result<(), EngineError> {
        self.require_role(caller, Role::PriceFeed)?;
        self.markets.update_volatility(asset, volatility, self.current_time)?;
        Ok(())
    }

    /// Charge `funding_per_unit` against every open position in `asset`.
    /// Positive funding is paid by longs.
    pub fn accrue_funding(
        &mut self,
        caller: AccountId,
        asset: AssetId,
        funding_per_unit: Decimal,
    ) -> Result<usize, EngineError> {
        self.require_role(caller, Role::PriceFeed)?;
        if self.markets.get(asset).is_none() {
            return Err(crate::market::MarketError::MarketNotFound(asset).into());
        }

        let mut positions_affected = 0;
        for account_id in self.ledger.accounts_holding(asset) {
            let Some(account) = self.ledger.get_mut(account_id) else {
                continue;
            };
            for position in account.positions.iter_mut().filter(|p| p.is_active && p.asset == asset) {
                position.accrue_funding(funding_per_unit);
                positions_affected += 1;
            }
            account.last_update_time = self.current_time;
            account.refresh_unrealized_pnl(&self.markets);
        }

        self.emit_event(EventPayload::FundingAccrued(FundingAccruedEvent {
            asset,
            funding_per_unit,
            positions_affected,
        }));
        Ok(positions_affected)
    }

    /// Install a full correlation matrix (bps, symmetric, unit diagonal).
    pub fn update_correlations(
        &mut self,
        caller: AccountId,
        assets: &[AssetId],
        rows: &[Vec<i32>],
    ) -> Result<(), EngineError> {
        self.require_role(caller, Role::RiskOracle)?;
        let matrix = CorrelationMatrix::from_rows(assets, rows, &self.config.venue.margin)?;
        self.correlation = Box::new(matrix);

        tracing::info!(assets = assets.len(), "correlation matrix updated");
        self.emit_event(EventPayload::CorrelationsUpdated { assets: assets.len() });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineConfig, Roles};
    use crate::types::{Quote, SignedSize, Timestamp};
    use rust_decimal_macros::dec;

    const BTC: AssetId = AssetId(1);
    const ETH: AssetId = AssetId(2);
    const ADMIN: AccountId = AccountId(900);
    const FEED: AccountId = AccountId(901);
    const ORACLE: AccountId = AccountId(902);
    const ALICE: AccountId = AccountId(1);

    fn engine() -> Engine {
        let mut engine = Engine::new(EngineConfig {
            roles: Roles {
                admin: ADMIN,
                risk_oracle: ORACLE,
                price_feed: FEED,
            },
            ..EngineConfig::default()
        });
        for (id, symbol) in [(BTC, "BTC"), (ETH, "ETH")] {
            engine
                .add_market(
                    ADMIN,
                    Market::new(id, symbol, Price::new_unchecked(dec!(100)), Bps::new(1000), Timestamp::from_millis(0)),
                )
                .unwrap();
        }
        engine
    }

    #[test]
    fn only_price_feed_moves_prices() {
        let mut engine = engine();
        let denied = engine.update_price(ADMIN, BTC, Price::new_unchecked(dec!(1)));
        assert!(matches!(denied, Err(EngineError::NotAuthorized { role: Role::PriceFeed, .. })));
        assert_eq!(engine.markets().get(BTC).unwrap().price.value(), dec!(100));
    }

    #[test]
    fn price_update_marks_holders_to_market() {
        let mut engine = engine();
        engine.deposit_collateral(ALICE, Quote::new(dec!(10000))).unwrap();
        engine.open_position(ALICE, BTC, SignedSize::new(dec!(100))).unwrap();

        engine.update_price(FEED, BTC, Price::new_unchecked(dec!(80))).unwrap();
        let account = engine.get_account(ALICE).unwrap();
        assert_eq!(account.unrealized_pnl.value(), dec!(-2000));
        // 1000 used / (10000 - 2000)
        assert_eq!(engine.get_margin_ratio(ALICE).unwrap(), Bps::new(1250));
    }

    #[test]
    fn funding_reduces_long_pnl() {
        let mut engine = engine();
        engine.deposit_collateral(ALICE, Quote::new(dec!(10000))).unwrap();
        engine.open_position(ALICE, BTC, SignedSize::new(dec!(10))).unwrap();
        engine.open_position(ALICE, ETH, SignedSize::new(dec!(-10))).unwrap();

        let affected = engine.accrue_funding(FEED, BTC, dec!(2)).unwrap();
        assert_eq!(affected, 1);
        assert_eq!(engine.get_account(ALICE).unwrap().unrealized_pnl.value(), dec!(-20));
    }

    #[test]
    fn correlations_need_oracle_and_valid_matrix() {
        let mut engine = engine();
        let rows = vec![vec![10000, -3000], vec![-3000, 10000]];
        assert!(engine.update_correlations(ADMIN, &[BTC, ETH], &rows).is_err());
        engine.update_correlations(ORACLE, &[BTC, ETH], &rows).unwrap();

        let bad = vec![vec![10000, 1], vec![2, 10000]];
        assert!(matches!(
            engine.update_correlations(ORACLE, &[BTC, ETH], &bad),
            Err(EngineError::Margin(_))
        ));
    }

    #[test]
    fn inactive_market_refuses_positions() {
        let mut engine = engine();
        engine.deposit_collateral(ALICE, Quote::new(dec!(10000))).unwrap();
        engine.set_market_active(ADMIN, ETH, false).unwrap();
        assert!(matches!(
            engine.open_position(ALICE, ETH, SignedSize::new(dec!(1))),
            Err(EngineError::Market(_))
        ));
    }
}

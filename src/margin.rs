//! Cross-margin calculation.
//!
//! Required margin starts from the asset's risk weight applied to notional.
//! Accounts that already hold collateral get a cross-margin discount for
//! diversification (open position count) and for correlation with the
//! positions they already hold. The total discount is capped.
//!
//! Margin ratio here is a severity score: used margin as a fraction of account
//! value in bps. Higher means riskier.

use crate::account::Account;
use crate::market::{MarketError, MarketRegistry};
use crate::position::Position;
use crate::types::{AssetId, Bps, Price, Quote, SignedSize, BPS_DENOMINATOR};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

const MAX_CORRELATION: i32 = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginParams {
    /// Cap on diversification + correlation discount combined
    pub max_cross_margin_discount: Bps,
    /// Checked in order, first match wins. Keep sorted by min_open_positions desc.
    pub diversification_tiers: Vec<DiversificationTier>,
    /// Discount the flat placeholder model grants to every collateralized account
    pub placeholder_correlation_discount: Bps,
    /// Ceiling for the matrix model (reached by a perfect hedge)
    pub max_correlation_discount: Bps,
    /// Correlation assumed for asset pairs missing from the matrix
    pub default_correlation: i32,
}

impl Default for MarginParams {
    fn default() -> Self {
        Self {
            max_cross_margin_discount: Bps::new(3000),
            diversification_tiers: vec![
                DiversificationTier {
                    min_open_positions: 5,
                    bonus: Bps::new(1000),
                },
                DiversificationTier {
                    min_open_positions: 3,
                    bonus: Bps::new(500),
                },
            ],
            placeholder_correlation_discount: Bps::new(500),
            max_correlation_discount: Bps::new(2000),
            default_correlation: MAX_CORRELATION,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiversificationTier {
    pub min_open_positions: usize,
    pub bonus: Bps,
}

pub fn diversification_bonus(open_positions: usize, params: &MarginParams) -> Bps {
    params
        .diversification_tiers
        .iter()
        .find(|tier| open_positions >= tier.min_open_positions)
        .map(|tier| tier.bonus)
        .unwrap_or(Bps::ZERO)
}

/// Correlation part of the cross-margin discount.
///
/// Implementations see the prospective position and the account's currently
/// active positions. The result is clamped by the caller, so a model only has
/// to be sensible, not bounded.
pub trait CorrelationModel: Send + fmt::Debug {
    fn correlation_discount(
        &self,
        asset: AssetId,
        size: SignedSize,
        open_positions: &[&Position],
        markets: &MarketRegistry,
    ) -> Bps;
}

/// Constant discount for any collateralized account. Known approximation,
/// kept for parity runs against the simplified venue.
#[derive(Debug, Clone, Copy)]
pub struct FlatCorrelationDiscount(pub Bps);

impl FlatCorrelationDiscount {
    pub fn from_params(params: &MarginParams) -> Self {
        Self(params.placeholder_correlation_discount)
    }
}

impl CorrelationModel for FlatCorrelationDiscount {
    fn correlation_discount(
        &self,
        _asset: AssetId,
        _size: SignedSize,
        _open_positions: &[&Position],
        _markets: &MarketRegistry,
    ) -> Bps {
        self.0
    }
}

/// Pairwise correlation matrix in bps (-10000..=10000).
///
/// The discount for a new position is driven by its notional-weighted
/// effective correlation with the open book: same-direction exposure to a
/// correlated asset earns nothing, an offsetting position in a correlated
/// asset (a hedge) earns up to `max_discount`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pairs: HashMap<(AssetId, AssetId), i32>,
    default_correlation: i32,
    max_discount: Bps,
}

fn pair_key(a: AssetId, b: AssetId) -> (AssetId, AssetId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl CorrelationMatrix {
    pub fn new(default_correlation: i32, max_discount: Bps) -> Self {
        Self {
            pairs: HashMap::new(),
            default_correlation: default_correlation.clamp(-MAX_CORRELATION, MAX_CORRELATION),
            max_discount,
        }
    }

    pub fn from_params(params: &MarginParams) -> Self {
        Self::new(params.default_correlation, params.max_correlation_discount)
    }

    /// Builds a matrix from a full square table. Every pair is validated,
    /// so this is O(n²) in the number of assets.
    pub fn from_rows(
        assets: &[AssetId],
        rows: &[Vec<i32>],
        params: &MarginParams,
    ) -> Result<Self, MarginError> {
        let n = assets.len();
        if rows.len() != n || rows.iter().any(|row| row.len() != n) {
            return Err(MarginError::MatrixShape { assets: n });
        }

        let mut matrix = Self::from_params(params);
        for i in 0..n {
            if rows[i][i] != MAX_CORRELATION {
                return Err(MarginError::InvalidCorrelation {
                    a: assets[i],
                    b: assets[i],
                    value: rows[i][i],
                });
            }
            for j in (i + 1)..n {
                if rows[i][j] != rows[j][i] {
                    return Err(MarginError::AsymmetricMatrix {
                        a: assets[i],
                        b: assets[j],
                    });
                }
                matrix.set(assets[i], assets[j], rows[i][j])?;
            }
        }
        Ok(matrix)
    }

    pub fn set(&mut self, a: AssetId, b: AssetId, correlation: i32) -> Result<(), MarginError> {
        if !(-MAX_CORRELATION..=MAX_CORRELATION).contains(&correlation)
            || (a == b && correlation != MAX_CORRELATION)
        {
            return Err(MarginError::InvalidCorrelation { a, b, value: correlation });
        }
        if a != b {
            self.pairs.insert(pair_key(a, b), correlation);
        }
        Ok(())
    }

    pub fn correlation(&self, a: AssetId, b: AssetId) -> i32 {
        if a == b {
            return MAX_CORRELATION;
        }
        self.pairs
            .get(&pair_key(a, b))
            .copied()
            .unwrap_or(self.default_correlation)
    }
}

impl CorrelationModel for CorrelationMatrix {
    fn correlation_discount(
        &self,
        asset: AssetId,
        size: SignedSize,
        open_positions: &[&Position],
        markets: &MarketRegistry,
    ) -> Bps {
        if size.is_zero() {
            return Bps::ZERO;
        }

        let mut weighted = Decimal::ZERO;
        let mut total_weight = Decimal::ZERO;

        for position in open_positions {
            let Some(market) = markets.get(position.asset) else {
                continue;
            };
            let weight = position
                .notional_value(market.price)
                .map_or(Decimal::MAX, |notional| notional.value());
            let direction = if position.size.is_long() == size.is_long() {
                Decimal::ONE
            } else {
                Decimal::NEGATIVE_ONE
            };
            // rho as a fraction keeps each term within its weight
            let rho = Decimal::from(self.correlation(asset, position.asset)) / Decimal::from(BPS_DENOMINATOR);
            weighted = weighted.saturating_add(weight * rho * direction);
            total_weight = total_weight.saturating_add(weight);
        }

        if total_weight.is_zero() {
            return Bps::ZERO;
        }

        // effective correlation in [-1, 1]: -1 (full hedge) earns the max
        let avg = weighted / total_weight;
        let raw = Decimal::from(self.max_discount.value()) * (Decimal::ONE - avg) / Decimal::TWO;
        Bps::from_decimal_floor(raw).min(self.max_discount)
    }
}

/// Diversification plus correlation, capped.
pub fn cross_margin_discount(
    account: &Account,
    asset: AssetId,
    size: SignedSize,
    markets: &MarketRegistry,
    model: &dyn CorrelationModel,
    params: &MarginParams,
) -> Bps {
    let open: Vec<&Position> = account.open_positions().collect();
    let diversification = diversification_bonus(open.len(), params);
    let correlation = model.correlation_discount(asset, size, &open, markets);
    diversification
        .saturating_add(correlation)
        .min(params.max_cross_margin_discount)
        .min(Bps::ONE_HUNDRED_PERCENT)
}

pub fn base_margin(size: SignedSize, price: Price, risk_weight: Bps) -> Result<Quote, MarginError> {
    size.abs()
        .checked_mul(price.value())
        .and_then(|notional| Quote::new(notional).checked_apply_bps(risk_weight))
        .ok_or(MarginError::Overflow)
}

/// Margin needed to carry `size` of `asset` at `price` for this account.
pub fn calculate_required_margin(
    account: &Account,
    asset: AssetId,
    size: SignedSize,
    price: Price,
    markets: &MarketRegistry,
    model: &dyn CorrelationModel,
    params: &MarginParams,
) -> Result<Quote, MarginError> {
    let risk_weight = markets.risk_weight(asset)?;
    let base = base_margin(size, price, risk_weight)?;

    if account.collateral.is_zero() {
        return Ok(base);
    }

    let discount = cross_margin_discount(account, asset, size, markets, model, params);
    base.checked_apply_bps(Bps::ONE_HUNDRED_PERCENT.saturating_sub(discount))
        .ok_or(MarginError::Overflow)
}

/// collateral + pnl, signed. Negative once losses exceed collateral.
pub fn total_value(account: &Account) -> Decimal {
    account.collateral.value().saturating_add(account.unrealized_pnl.value())
}

pub fn margin_ratio(account: &Account) -> Bps {
    if account.collateral.is_zero() || account.margin_used.is_zero() {
        return Bps::ZERO;
    }

    let value = total_value(account);
    if value <= Decimal::ZERO {
        return Bps::MAX;
    }

    let used = account.margin_used.value();
    let bps = Decimal::from(BPS_DENOMINATOR);
    used.checked_mul(bps)
        .and_then(|scaled| scaled.checked_div(value))
        // very large books: divide first
        .or_else(|| used.checked_div(value).and_then(|ratio| ratio.checked_mul(bps)))
        .map(Bps::from_decimal_floor)
        .unwrap_or(Bps::MAX)
}

/// Free margin, floored at zero.
pub fn available_margin(account: &Account) -> Quote {
    let value = total_value(account);
    let used = account.margin_used.value();
    if value <= used {
        Quote::zero()
    } else {
        Quote::new(value - used)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarginError {
    #[error("Market error: {0}")]
    Market(#[from] MarketError),

    #[error("Correlation {value} for {a}/{b} out of range")]
    InvalidCorrelation { a: AssetId, b: AssetId, value: i32 },

    #[error("Correlation matrix is not symmetric at {a}/{b}")]
    AsymmetricMatrix { a: AssetId, b: AssetId },

    #[error("Correlation matrix must be {assets}x{assets}")]
    MatrixShape { assets: usize },
    #[error("Margin amount out of range")]
    Overflow,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::Market;
    use crate::types::{AccountId, PositionId, Timestamp};
    use rust_decimal_macros::dec;

    const BTC: AssetId = AssetId(1);
    const ETH: AssetId = AssetId(2);

    fn markets() -> MarketRegistry {
        let mut registry = MarketRegistry::new();
        for (id, symbol, price) in [(BTC, "BTC", dec!(50000)), (ETH, "ETH", dec!(3000))] {
            registry
                .add_market(Market::new(
                    id,
                    symbol,
                    Price::new_unchecked(price),
                    Bps::new(1000),
                    Timestamp::from_millis(0),
                ))
                .unwrap();
        }
        registry
    }

    fn account(collateral: Decimal, margin_used: Decimal, pnl: Decimal) -> Account {
        let mut account = Account::new(AccountId(1), Timestamp::from_millis(0));
        account.collateral = Quote::new(collateral);
        account.margin_used = Quote::new(margin_used);
        account.unrealized_pnl = Quote::new(pnl);
        account
    }

    fn with_positions(account: &mut Account, count: usize, asset: AssetId, size: Decimal) {
        for i in 0..count {
            account.positions.push(Position::new(
                PositionId(i as u32),
                asset,
                SignedSize::new(size),
                Price::new_unchecked(dec!(50000)),
                Quote::zero(),
                Timestamp::from_millis(0),
            ));
        }
    }

    #[test]
    fn no_collateral_no_discount() {
        let acct = account(dec!(0), dec!(0), dec!(0));
        let margin = calculate_required_margin(
            &acct,
            BTC,
            SignedSize::new(dec!(1)),
            Price::new_unchecked(dec!(50000)),
            &markets(),
            &FlatCorrelationDiscount(Bps::new(500)),
            &MarginParams::default(),
        )
        .unwrap();
        // 1 * 50000 * 10%
        assert_eq!(margin.value(), dec!(5000));
    }

    #[test]
    fn flat_model_discount_applies_with_collateral() {
        let acct = account(dec!(10000), dec!(0), dec!(0));
        let margin = calculate_required_margin(
            &acct,
            BTC,
            SignedSize::new(dec!(1)),
            Price::new_unchecked(dec!(50000)),
            &markets(),
            &FlatCorrelationDiscount(Bps::new(500)),
            &MarginParams::default(),
        )
        .unwrap();
        // 5000 * (1 - 5%)
        assert_eq!(margin.value(), dec!(4750));
    }

    #[test]
    fn diversification_tiers() {
        let params = MarginParams::default();
        assert_eq!(diversification_bonus(2, &params), Bps::ZERO);
        assert_eq!(diversification_bonus(3, &params), Bps::new(500));
        assert_eq!(diversification_bonus(4, &params), Bps::new(500));
        assert_eq!(diversification_bonus(5, &params), Bps::new(1000));
        assert_eq!(diversification_bonus(50, &params), Bps::new(1000));
    }

    #[test]
    fn discount_is_capped() {
        let mut acct = account(dec!(10000), dec!(0), dec!(0));
        with_positions(&mut acct, 6, BTC, dec!(0.1));
        let discount = cross_margin_discount(
            &acct,
            ETH,
            SignedSize::new(dec!(1)),
            &markets(),
            &FlatCorrelationDiscount(Bps::new(9000)),
            &MarginParams::default(),
        );
        assert_eq!(discount, Bps::new(3000));
    }

    #[test]
    fn hedge_earns_full_correlation_discount() {
        let mut matrix = CorrelationMatrix::new(10000, Bps::new(2000));
        matrix.set(BTC, ETH, 10000).unwrap();
        let mut acct = account(dec!(10000), dec!(0), dec!(0));
        with_positions(&mut acct, 1, BTC, dec!(1));
        let open: Vec<&Position> = acct.open_positions().collect();

        // short ETH against long BTC, perfectly correlated
        let hedge = matrix.correlation_discount(ETH, SignedSize::new(dec!(-1)), &open, &markets());
        assert_eq!(hedge, Bps::new(2000));

        // same direction, no benefit
        let stacked = matrix.correlation_discount(ETH, SignedSize::new(dec!(1)), &open, &markets());
        assert_eq!(stacked, Bps::ZERO);
    }

    #[test]
    fn uncorrelated_pair_earns_half() {
        let mut matrix = CorrelationMatrix::new(10000, Bps::new(2000));
        matrix.set(BTC, ETH, 0).unwrap();
        let mut acct = account(dec!(10000), dec!(0), dec!(0));
        with_positions(&mut acct, 1, BTC, dec!(1));
        let open: Vec<&Position> = acct.open_positions().collect();

        let discount = matrix.correlation_discount(ETH, SignedSize::new(dec!(1)), &open, &markets());
        assert_eq!(discount, Bps::new(1000));
    }

    #[test]
    fn matrix_from_rows_validates() {
        let params = MarginParams::default();
        let ok = CorrelationMatrix::from_rows(&[BTC, ETH], &[vec![10000, 8000], vec![8000, 10000]], &params)
            .unwrap();
        assert_eq!(ok.correlation(ETH, BTC), 8000);

        let asym = CorrelationMatrix::from_rows(&[BTC, ETH], &[vec![10000, 8000], vec![7000, 10000]], &params);
        assert!(matches!(asym, Err(MarginError::AsymmetricMatrix { .. })));

        let shape = CorrelationMatrix::from_rows(&[BTC, ETH], &[vec![10000]], &params);
        assert!(matches!(shape, Err(MarginError::MatrixShape { assets: 2 })));

        let range = CorrelationMatrix::from_rows(&[BTC, ETH], &[vec![10000, 12000], vec![12000, 10000]], &params);
        assert!(matches!(range, Err(MarginError::InvalidCorrelation { .. })));
    }

    #[test]
    fn margin_ratio_basic() {
        assert_eq!(margin_ratio(&account(dec!(10000), dec!(9000), dec!(0))), Bps::new(9000));
        assert_eq!(margin_ratio(&account(dec!(10000), dec!(4000), dec!(-2000))), Bps::new(5000));
        assert_eq!(margin_ratio(&account(dec!(10000), dec!(4000), dec!(10000))), Bps::new(2000));
    }

    #[test]
    fn margin_ratio_zero_collateral() {
        assert_eq!(margin_ratio(&account(dec!(0), dec!(100), dec!(0))), Bps::ZERO);
    }

    #[test]
    fn margin_ratio_saturates_when_wiped_out() {
        assert_eq!(margin_ratio(&account(dec!(1000), dec!(100), dec!(-1500))), Bps::MAX);
    }

    #[test]
    fn available_margin_never_negative() {
        assert_eq!(available_margin(&account(dec!(1000), dec!(100), dec!(-5000))), Quote::zero());
        assert_eq!(available_margin(&account(dec!(1000), dec!(1200), dec!(0))), Quote::zero());
        assert_eq!(available_margin(&account(dec!(1000), dec!(100), dec!(50))).value(), dec!(950));
    }
}

// 3.0: open position tracking. pnl = size * (mark - entry) - funding.
// positions are never removed from an account, closing flips is_active.

use crate::types::{AssetId, PositionId, Price, Quote, SignedSize, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub asset: AssetId,
    pub size: SignedSize,
    pub entry_price: Price,
    pub entry_time: Timestamp,
    /// Accumulated funding owed by this position (negative = received).
    pub funding: Quote,
    /// Margin locked when the position was opened, released on close.
    pub margin: Quote,
    pub is_active: bool,
}

impl Position {
    pub fn new(
        id: PositionId,
        asset: AssetId,
        size: SignedSize,
        entry_price: Price,
        margin: Quote,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            asset,
            size,
            entry_price,
            entry_time: timestamp,
            funding: Quote::zero(),
            margin,
            is_active: true,
        }
    }

    // 3.1: paper gains/losses at the current price, net of funding
    pub fn unrealized_pnl(&self, mark_price: Price) -> Quote {
        calculate_unrealized_pnl(self.size, self.entry_price, mark_price).sub(self.funding)
    }

    /// `None` once `|size| * mark` no longer fits a Decimal.
    pub fn notional_value(&self, mark_price: Price) -> Option<Quote> {
        self.size.abs().checked_mul(mark_price.value()).map(Quote::new)
    }

    pub fn accrue_funding(&mut self, funding_per_unit: Decimal) {
        let owed = self.size.value().saturating_mul(funding_per_unit);
        self.funding = self.funding.add(Quote::new(owed));
    }
}

// 3.2: the raw pnl formula. size * (mark - entry), saturating at the Decimal
// range so marking an extreme book never fails
pub fn calculate_unrealized_pnl(size: SignedSize, entry_price: Price, mark_price: Price) -> Quote {
    // both prices are positive, the difference always fits
    let price_move = mark_price.value() - entry_price.value();
    Quote::new(size.value().saturating_mul(price_move))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn long_btc() -> Position {
        Position::new(
            PositionId(0),
            AssetId(1),
            SignedSize::new(dec!(2)),
            Price::new_unchecked(dec!(100)),
            Quote::new(dec!(20)),
            Timestamp::from_millis(0),
        )
    }

    #[test]
    fn long_pnl_follows_price() {
        let pos = long_btc();
        assert_eq!(pos.unrealized_pnl(Price::new_unchecked(dec!(110))).value(), dec!(20));
        assert_eq!(pos.unrealized_pnl(Price::new_unchecked(dec!(90))).value(), dec!(-20));
    }

    #[test]
    fn short_pnl_inverts() {
        let pnl = calculate_unrealized_pnl(
            SignedSize::new(dec!(-1)),
            Price::new_unchecked(dec!(100)),
            Price::new_unchecked(dec!(80)),
        );
        assert_eq!(pnl.value(), dec!(20));
    }

    #[test]
    fn funding_reduces_pnl() {
        let mut pos = long_btc();
        pos.accrue_funding(dec!(1.5)); // longs pay 1.5 per unit
        assert_eq!(pos.funding.value(), dec!(3));
        assert_eq!(pos.unrealized_pnl(Price::new_unchecked(dec!(100))).value(), dec!(-3));
    }
}

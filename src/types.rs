// 1.0: all the primitives live here. nothing in the engine works without these types.
// IDs, prices, sizes, basis points, timestamps. each is a newtype so the compiler catches type mixups.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

/// 10000 bps = 100%.
pub const BPS_DENOMINATOR: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub u32);

// sequence number inside one account's append-only position history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionId(pub u32);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acct-{}", self.0)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "asset-{}", self.0)
    }
}

// Long = profit when price goes up. Short = profit when price goes down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Long => dec!(1),
            Side::Short => dec!(-1),
        }
    }
}

// 1.1: signed size: positive = long, negative = short. core to all position math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedSize(Decimal);

impl SignedSize {
    pub fn new(size: Decimal) -> Self {
        Self(size)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn from_side(side: Side, abs_size: Decimal) -> Self {
        Self(side.sign() * abs_size.abs())
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn abs(&self) -> Decimal {
        self.0.abs()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_long(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_short(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn side(&self) -> Option<Side> {
        if self.is_long() {
            Some(Side::Long)
        } else if self.is_short() {
            Some(Side::Short)
        } else {
            None
        }
    }
}

impl fmt::Display for SignedSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.2: price in USD per unit of asset. must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn new_unchecked(value: Decimal) -> Self {
        debug_assert!(value > Decimal::ZERO);
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.3: USD amount. collateral, margin, pnl, rewards all use this.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote(Decimal);

impl Quote {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    // add and sub saturate at the Decimal range. use checked_add where
    // overflow must be refused instead
    pub fn add(&self, other: Quote) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn checked_add(&self, other: Quote) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn sub(&self, other: Quote) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    // clamps at zero. collateral is unsigned
    pub fn saturating_sub(&self, other: Quote) -> Self {
        Self(self.0.saturating_sub(other.0).max(Decimal::ZERO))
    }

    pub fn min(self, other: Quote) -> Self {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    /// `self * bps / 10000`, `None` if the result leaves the Decimal range.
    pub fn checked_apply_bps(&self, bps: Bps) -> Option<Self> {
        let bps = Decimal::from(bps.value());
        let denominator = Decimal::from(BPS_DENOMINATOR);
        match self.0.checked_mul(bps) {
            Some(scaled) => Some(Self(scaled / denominator)),
            // very large amounts: divide first, only sub-unit precision is lost
            None => (self.0 / denominator).checked_mul(bps).map(Self),
        }
    }

    /// Saturating form of `checked_apply_bps`.
    pub fn apply_bps(&self, bps: Bps) -> Self {
        self.checked_apply_bps(bps).unwrap_or(if self.is_negative() {
            Self(Decimal::MIN)
        } else {
            Self(Decimal::MAX)
        })
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for Quote {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quote {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl Sum for Quote {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, q| acc.add(q))
    }
}

impl<'a> Sum<&'a Quote> for Quote {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, q| acc.add(*q))
    }
}

// 1.4: basis points. 100 bps = 1%. ratios, rates, VaR all use this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Bps(u64);

impl Bps {
    pub const ZERO: Bps = Bps(0);
    pub const ONE_HUNDRED_PERCENT: Bps = Bps(BPS_DENOMINATOR);
    pub const MAX: Bps = Bps(u64::MAX);

    pub const fn new(bps: u64) -> Self {
        Self(bps)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }

    pub fn as_fraction(&self) -> Decimal {
        Decimal::from(self.0) / Decimal::from(BPS_DENOMINATOR)
    }

    pub fn saturating_add(&self, other: Bps) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(&self, other: Bps) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Floors a decimal bps value. Negative input clamps to zero and
    /// anything past u64 saturates.
    pub fn from_decimal_floor(value: Decimal) -> Self {
        if value <= Decimal::ZERO {
            return Self::ZERO;
        }
        Self(value.floor().to_u64().unwrap_or(u64::MAX))
    }
}

impl fmt::Display for Bps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}bps", self.0)
    }
}

// 1.5: millisecond timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn plus_millis(&self, ms: i64) -> Self {
        Self(self.0.saturating_add(ms))
    }

    pub fn millis_since(&self, earlier: Timestamp) -> i64 {
        self.0.saturating_sub(earlier.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn signed_size_operations() {
        let long = SignedSize::from_side(Side::Long, dec!(10));
        assert!(long.is_long());
        assert_eq!(long.abs(), dec!(10));

        let short = SignedSize::from_side(Side::Short, dec!(10));
        assert!(short.is_short());
        assert_eq!(short.value(), dec!(-10));
        assert_eq!(short.side(), Some(Side::Short));
    }

    #[test]
    fn bps_conversion() {
        assert_eq!(Bps::new(100).as_fraction(), dec!(0.01));
        assert_eq!(Bps::new(50).as_fraction(), dec!(0.005));
    }

    #[test]
    fn bps_floor_clamps() {
        assert_eq!(Bps::from_decimal_floor(dec!(9000.99)), Bps::new(9000));
        assert_eq!(Bps::from_decimal_floor(dec!(-5)), Bps::ZERO);
        assert_eq!(Bps::from_decimal_floor(Decimal::MAX), Bps::MAX);
    }

    #[test]
    fn quote_bps_and_saturation() {
        let collateral = Quote::new(dec!(10000));
        assert_eq!(collateral.apply_bps(Bps::new(100)).value(), dec!(100));
        assert_eq!(
            Quote::new(dec!(5)).saturating_sub(Quote::new(dec!(8))),
            Quote::zero()
        );
    }

    #[test]
    fn quote_arithmetic_stays_in_range() {
        let max = Quote::new(Decimal::MAX);
        assert_eq!(max.checked_add(Quote::new(dec!(1))), None);
        assert_eq!(max.add(Quote::new(dec!(1))), max);
        assert_eq!(Quote::new(Decimal::MIN).sub(Quote::new(dec!(1))).value(), Decimal::MIN);

        // scales down instead of overflowing
        let big = Quote::new(dec!(10_000_000_000_000_000_000_000_000));
        assert_eq!(big.checked_apply_bps(Bps::new(1000)).map(|q| q.value()), Some(dec!(1_000_000_000_000_000_000_000_000)));
        assert_eq!(max.checked_apply_bps(Bps::new(20_000)), None);
        assert_eq!(max.apply_bps(Bps::new(20_000)), max);
    }

    #[test]
    fn elapsed_time_saturates() {
        assert_eq!(Timestamp::from_millis(i64::MAX).millis_since(Timestamp::from_millis(-1)), i64::MAX);
    }
}

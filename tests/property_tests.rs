//! Property-based tests for the margin and liquidation math.
//!
//! These tests verify invariants hold under random inputs.

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use xmargin_core::*;

// Strategies for generating test data
fn price_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|x| Decimal::new(x, 2)) // $0.01 to $10,000
}

fn size_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..10_000i64).prop_map(|x| Decimal::new(x, 2)) // 0.01 to 100
}

fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000i64).prop_map(|x| Decimal::new(x, 2)) // $0 to $100,000
}

fn pnl_strategy() -> impl Strategy<Value = Decimal> {
    (-20_000_000i64..20_000_000i64).prop_map(|x| Decimal::new(x, 2))
}

fn account(collateral: Decimal, margin_used: Decimal, pnl: Decimal) -> Account {
    let mut account = Account::new(AccountId(1), Timestamp::from_millis(0));
    account.collateral = Quote::new(collateral);
    account.margin_used = Quote::new(margin_used);
    account.unrealized_pnl = Quote::new(pnl);
    account
}

fn markets(count: u32) -> MarketRegistry {
    let mut registry = MarketRegistry::new();
    for id in 1..=count {
        registry
            .add_market(Market::new(
                AssetId(id),
                format!("A{id}"),
                Price::new_unchecked(dec!(100)),
                Bps::new(1000),
                Timestamp::from_millis(0),
            ))
            .unwrap();
    }
    registry
}

proptest! {
    /// Unrealized PnL is zero when mark = entry
    #[test]
    fn pnl_zero_at_entry(
        size in size_strategy(),
        entry in price_strategy(),
    ) {
        let entry_price = Price::new_unchecked(entry);
        let pnl = calculate_unrealized_pnl(SignedSize::new(size), entry_price, entry_price);
        prop_assert_eq!(pnl.value(), Decimal::ZERO);
    }

    /// Longs and shorts of the same size see opposite PnL
    #[test]
    fn pnl_antisymmetric(
        size in size_strategy(),
        entry in price_strategy(),
        mark in price_strategy(),
    ) {
        let entry_price = Price::new_unchecked(entry);
        let mark_price = Price::new_unchecked(mark);
        let long = calculate_unrealized_pnl(SignedSize::new(size), entry_price, mark_price);
        let short = calculate_unrealized_pnl(SignedSize::new(-size), entry_price, mark_price);
        prop_assert_eq!(long.value(), -short.value());
        prop_assert_eq!(long.value() > Decimal::ZERO, mark > entry);
    }

    /// Available margin never underflows, whatever the loss
    #[test]
    fn available_margin_never_negative(
        collateral in amount_strategy(),
        margin_used in amount_strategy(),
        pnl in pnl_strategy(),
    ) {
        let available = available_margin(&account(collateral, margin_used, pnl));
        prop_assert!(!available.is_negative());
    }

    /// More margin used never lowers the ratio
    #[test]
    fn ratio_monotone_in_margin_used(
        collateral in 1i64..10_000_000i64,
        used_a in amount_strategy(),
        used_b in amount_strategy(),
        pnl in pnl_strategy(),
    ) {
        let collateral = Decimal::new(collateral, 2);
        let (low, high) = if used_a <= used_b { (used_a, used_b) } else { (used_b, used_a) };
        let r_low = margin_ratio(&account(collateral, low, pnl));
        let r_high = margin_ratio(&account(collateral, high, pnl));
        prop_assert!(r_low <= r_high, "{} > {}", r_low, r_high);
    }

    /// Higher account value never raises the ratio
    #[test]
    fn ratio_non_increasing_in_value(
        collateral in 1i64..10_000_000i64,
        used in amount_strategy(),
        pnl_a in pnl_strategy(),
        pnl_b in pnl_strategy(),
    ) {
        let collateral = Decimal::new(collateral, 2);
        let (low, high) = if pnl_a <= pnl_b { (pnl_a, pnl_b) } else { (pnl_b, pnl_a) };
        let r_poor = margin_ratio(&account(collateral, used, low));
        let r_rich = margin_ratio(&account(collateral, used, high));
        prop_assert!(r_rich <= r_poor, "{} > {}", r_rich, r_poor);
    }

    /// Discount stays in [0, 3000] for any book and any correlation input
    #[test]
    fn discount_bounded(
        book in proptest::collection::vec((1u32..=4u32, -1000i64..1000i64), 0..8),
        correlations in proptest::collection::vec(-10_000i32..=10_000i32, 6),
        flat in 0u64..20_000u64,
        new_asset in 1u32..=4u32,
        new_size in -1000i64..1000i64,
    ) {
        let registry = markets(4);
        let mut acct = account(dec!(10000), Decimal::ZERO, Decimal::ZERO);
        for (i, (asset, size)) in book.iter().enumerate() {
            if *size == 0 { continue; }
            acct.positions.push(Position::new(
                PositionId(i as u32),
                AssetId(*asset),
                SignedSize::new(Decimal::from(*size)),
                Price::new_unchecked(dec!(100)),
                Quote::zero(),
                Timestamp::from_millis(0),
            ));
        }

        let params = MarginParams::default();
        let mut matrix = CorrelationMatrix::from_params(&params);
        let pairs = [(1, 2), (1, 3), (1, 4), (2, 3), (2, 4), (3, 4)];
        for ((a, b), rho) in pairs.iter().zip(&correlations) {
            matrix.set(AssetId(*a), AssetId(*b), *rho).unwrap();
        }

        let size = SignedSize::new(Decimal::from(new_size));
        let flat_model = FlatCorrelationDiscount(Bps::new(flat));
        let models: [&dyn CorrelationModel; 2] = [&matrix, &flat_model];
        for model in models {
            let discount = cross_margin_discount(&acct, AssetId(new_asset), size, &registry, model, &params);
            prop_assert!(discount <= Bps::new(3000));
        }
    }

    /// Eligible iff ratio >= 8000, emergency iff ratio >= 9500
    #[test]
    fn eligibility_thresholds(ratio in 0u64..20_000u64) {
        let params = LiquidationParams::default();
        prop_assert_eq!(is_liquidation_eligible(Bps::new(ratio), &params), ratio >= 8000);
        prop_assert_eq!(is_emergency(Bps::new(ratio), &params), ratio >= 9500);
    }

    /// Reward never exceeds 5% of collateral and grows as the ratio worsens
    #[test]
    fn reward_capped_and_monotone(
        collateral in amount_strategy(),
        ratio_a in 8000u64..12_000u64,
        ratio_b in 8000u64..12_000u64,
        base in 0u64..=500u64,
    ) {
        let mut params = LiquidationParams::default();
        params.base_liquidation_reward = Bps::new(base);
        let collateral = Quote::new(collateral);
        let (low, high) = if ratio_a <= ratio_b { (ratio_a, ratio_b) } else { (ratio_b, ratio_a) };

        let r_low = calculate_liquidation_reward(collateral, Bps::new(low), &params);
        let r_high = calculate_liquidation_reward(collateral, Bps::new(high), &params);
        let cap = collateral.apply_bps(params.max_liquidation_reward);
        prop_assert!(r_high <= cap);
        prop_assert!(r_low <= r_high);
    }

    /// Reputation never leaves [0, 10000]
    #[test]
    fn reputation_bounded(ops in proptest::collection::vec((0u8..3u8, any::<bool>()), 1..300)) {
        let mut registry = LiquidatorRegistry::new(ReputationParams::default());
        let id = AccountId(7);
        registry.register(id, Timestamp::from_millis(0)).unwrap();

        for (i, (op, flag)) in ops.iter().enumerate() {
            let now = Timestamp::from_millis(i as i64);
            let reputation = match op {
                0 => registry.record_success(id, Quote::new(dec!(10)), *flag, now).unwrap(),
                1 => registry.record_failure(id, now).unwrap(),
                _ => registry.record_batch(id, 3, if *flag { 2 } else { 0 }, Quote::zero(), now).unwrap(),
            };
            prop_assert!(reputation <= 10_000);
        }
    }
}

// Edge cases outside proptest

#[test]
fn ratio_saturates_instead_of_overflowing() {
    let acct = account(dec!(1), dec!(79228162514264337593543950), Decimal::ZERO);
    assert_eq!(margin_ratio(&acct), Bps::MAX);
}

#[test]
fn loss_beyond_collateral_leaves_zero_available() {
    let acct = account(dec!(1000), dec!(500), dec!(-1_000_000));
    assert_eq!(available_margin(&acct), Quote::zero());
    assert_eq!(margin_ratio(&acct), Bps::MAX);
}

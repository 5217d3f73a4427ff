//! Cross-margin liquidation simulation.
//!
//! Walks the engine through the reference scenarios: scheduled liquidation,
//! emergency liquidation, risk-driven escalation and a partially failing batch.
//! Set `RUST_LOG=xmargin_core=debug` to see every audit event.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing_subscriber::EnvFilter;
use xmargin_core::*;

const ADMIN: AccountId = AccountId(0);
const ORACLE: AccountId = AccountId(1);
const FEED: AccountId = AccountId(2);
const KEEPER: AccountId = AccountId(10);
const BTC: AssetId = AssetId(1);
const SOL: AssetId = AssetId(2);

fn main() -> Result<(), EngineError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("Cross-Margin Liquidation Engine Simulation\n");

    scenario_a_scheduled_liquidation()?;
    scenario_b_emergency_liquidation()?;
    scenario_c_risk_escalation()?;
    scenario_d_partial_batch()?;

    println!("All simulations completed successfully.");
    Ok(())
}

fn new_engine() -> Result<Engine, EngineError> {
    let mut engine = Engine::new(EngineConfig {
        roles: Roles {
            admin: ADMIN,
            risk_oracle: ORACLE,
            price_feed: FEED,
        },
        venue: Environment::Development.config(),
        ..EngineConfig::default()
    });
    // simulated clock starts at wall time, scenarios advance it by hand
    engine.set_time(Timestamp::now());
    engine.add_market(
        ADMIN,
        Market::new(BTC, "BTC", Price::new_unchecked(dec!(100)), Bps::new(1000), engine.time()),
    )?;
    engine.register_liquidator(KEEPER)?;
    Ok(engine)
}

// deposit 10000 and open a long of `size` BTC at 100 (10% risk weight)
fn fund_trader(engine: &mut Engine, id: AccountId, size: Decimal) -> Result<(), EngineError> {
    engine.deposit_collateral(id, Quote::new(dec!(10000)))?;
    engine.open_position(id, BTC, SignedSize::new(size))?;
    Ok(())
}

/// Ratio 9000: queued, executed after the grace period at the 2x reward tier.
fn scenario_a_scheduled_liquidation() -> Result<(), EngineError> {
    println!("Scenario A: Scheduled Liquidation\n");

    let mut engine = new_engine()?;
    let trader = AccountId(100);
    fund_trader(&mut engine, trader, dec!(900))?;

    let ratio = engine.get_margin_ratio(trader)?;
    println!("  Trader margin ratio: {}", ratio);
    println!("  Eligible: {}", engine.is_liquidation_eligible(trader)?);

    if let Some(job) = engine.queue_liquidation(KEEPER, trader)?.job() {
        println!("  Queued with priority {}, due in {}ms", job.priority, job.deadline.millis_since(engine.time()));
    }

    if let Err(err) = engine.execute_liquidation(KEEPER, trader) {
        println!("  Early execution rejected: {}", err);
    }

    engine.advance_time(300_000);
    let result = engine.execute_liquidation(KEEPER, trader)?;
    println!("  Liquidated at {}, reward ${}", result.margin_ratio, result.reward);
    if let Some(keeper) = engine.liquidator(KEEPER) {
        println!("  Keeper reputation: {}\n", keeper.reputation);
    }
    Ok(())
}

/// Ratio 9600: past the emergency threshold, executed without a job.
fn scenario_b_emergency_liquidation() -> Result<(), EngineError> {
    println!("Scenario B: Emergency Liquidation\n");

    let mut engine = new_engine()?;
    let trader = AccountId(100);
    fund_trader(&mut engine, trader, dec!(960))?;

    println!("  Trader margin ratio: {}", engine.get_margin_ratio(trader)?);
    match engine.queue_liquidation(KEEPER, trader)? {
        QueueOutcome::ExecutedImmediately(result) => {
            println!("  Executed immediately, reward ${}", result.reward);
        }
        QueueOutcome::Queued(job) => println!("  Unexpectedly queued: {:?}", job),
    }
    println!("  Jobs pending: {}\n", engine.get_pending_liquidations().len());
    Ok(())
}

/// HIGH tier with VaR 13000 on a queued job: priority bumped, grace halved.
fn scenario_c_risk_escalation() -> Result<(), EngineError> {
    println!("Scenario C: Risk-Driven Escalation\n");

    let mut engine = new_engine()?;
    let trader = AccountId(100);
    // ratio 8060 gives a margin-only priority of 3000
    fund_trader(&mut engine, trader, dec!(806))?;

    let job = engine.queue_liquidation(KEEPER, trader)?;
    if let Some(job) = job.job() {
        println!("  Queued without risk data: priority {}, due in {}ms", job.priority, job.deadline.millis_since(engine.time()));
    }

    let mut feed = StaticRiskFeed::new();
    feed.set(trader, RiskAssessment::new(Bps::new(13_000), RiskTier::High, engine.time()));
    engine.set_risk_feed(Box::new(feed));

    let report = engine.monitor_liquidations(ORACLE)?;
    println!("  Monitoring: {} inspected, {} escalated", report.inspected, report.escalated);
    for job in engine.get_pending_liquidations() {
        println!("  Now: priority {}, due in {}ms\n", job.priority, job.deadline.millis_since(engine.time()));
    }
    Ok(())
}

/// Ten queued accounts, three holding a suspended market: seven succeed,
/// three stay queued for the next round.
fn scenario_d_partial_batch() -> Result<(), EngineError> {
    println!("Scenario D: Partial Batch Failure\n");

    let mut engine = new_engine()?;
    engine.add_market(
        ADMIN,
        Market::new(SOL, "SOL", Price::new_unchecked(dec!(10)), Bps::new(1000), engine.time()),
    )?;

    let traders: Vec<AccountId> = (100..110).map(AccountId).collect();
    for (i, &trader) in traders.iter().enumerate() {
        fund_trader(&mut engine, trader, dec!(890))?;
        if i < 3 {
            engine.open_position(trader, SOL, SignedSize::new(dec!(10)))?;
        }
        engine.queue_liquidation(KEEPER, trader)?;
    }

    engine.set_market_active(ADMIN, SOL, false)?;
    engine.advance_time(300_000);

    let batch = engine.execute_batch_liquidation(KEEPER, &traders, u64::MAX)?;
    println!("  Requested {}, attempted {}, succeeded {}", batch.requested, batch.attempted, batch.successes);
    for (account, reason) in &batch.failed {
        println!("  {} failed: {}", account, reason);
    }
    println!("  Total reward ${}, budget used {}", batch.total_reward, batch.budget_used);
    println!("  Still queued: {}", engine.get_pending_liquidations().len());
    if let Some(keeper) = engine.liquidator(KEEPER) {
        println!("  Keeper reputation: {}", keeper.reputation);
    }
    println!("  Events generated: {}\n", engine.events().len());
    Ok(())
}

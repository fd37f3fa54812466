//! Full-cycle scenarios: detection through risk gating to settled fills.

use arb_engine_core::{DetectorConfig, RiskConfig, SignalStatus, StatArbConfig};
use arb_engine_core::{Executor, OrderBook, PriceLevel};
use arb_engine_execution::PaperExecutor;
use arb_engine_pipeline::{Detector, MarketSnapshot, Pipeline, SpatialDetector, StatArbDetector};
use arb_engine_risk::{BreakerState, RiskEngine};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn deep_book(exchange: &str, bid: Decimal, ask: Decimal, at: DateTime<Utc>) -> OrderBook {
    OrderBook::new(
        exchange,
        "BTC/USDT",
        at,
        vec![PriceLevel::new(bid, dec!(100))],
        vec![PriceLevel::new(ask, dec!(100))],
    )
}

/// A 3% cross-exchange gap with deep books on both sides.
fn gap_snapshot(at: DateTime<Utc>) -> MarketSnapshot {
    let mut snapshot = MarketSnapshot::new(at);
    snapshot.insert(deep_book("binance", dec!(99.9), dec!(100), at));
    snapshot.insert(deep_book("kraken", dec!(103), dec!(103.1), at));
    snapshot
}

fn pipeline_with_spatial(risk: RiskEngine) -> Pipeline<PaperExecutor> {
    let executor = PaperExecutor::with_quote_balance(dec!(0.1), "USDT", dec!(10000));
    Pipeline::new(risk, executor)
        .with_detector(Box::new(SpatialDetector::new(DetectorConfig::default())))
}

#[tokio::test]
async fn test_profitable_gap_executes_with_positive_pnl() {
    let risk = RiskEngine::new(RiskConfig::default(), dec!(10000));
    let mut pipeline = pipeline_with_spatial(risk);

    let report = pipeline.run_cycle(&gap_snapshot(t0()), t0()).await;

    assert_eq!(report.signals.len(), 1);
    let signal = &report.signals[0];
    assert_eq!(signal.status, SignalStatus::Executed);
    assert_eq!(signal.executed_at, Some(t0()));
    assert_eq!(signal.net_spread_pct, dec!(2.8));
    assert_eq!(report.trades.len(), 2);
    assert!(report.pnl_usd > Decimal::ZERO);

    let stats = pipeline.stats();
    assert_eq!(stats.cycles, 1);
    assert_eq!(stats.signals_detected, 1);
    assert_eq!(stats.executed, 1);
    assert_eq!(stats.rejected, 0);
    assert_eq!(stats.missed, 0);
    assert_eq!(stats.total_pnl_usd, report.pnl_usd);

    // The arbitrage leaves more quote currency than it started with.
    let portfolio = pipeline.executor().portfolio();
    assert!(portfolio.equity_usd > dec!(10000));
}

#[tokio::test]
async fn test_open_breaker_rejects_everything() {
    let mut risk = RiskEngine::new(RiskConfig::default(), dec!(10000));
    // Three straight losses open the breaker before the cycle runs.
    for _ in 0..3 {
        risk.record_trade_outcome(dec!(-10), dec!(10000), t0());
    }
    assert_eq!(risk.breaker_state(t0()), BreakerState::Open);

    let mut pipeline = pipeline_with_spatial(risk);
    let report = pipeline.run_cycle(&gap_snapshot(t0()), t0()).await;

    assert_eq!(report.signals.len(), 1);
    assert_eq!(report.signals[0].status, SignalStatus::Rejected);
    assert!(report.signals[0].metadata.contains_key("reject_reason"));
    assert!(report.trades.is_empty());
    assert_eq!(report.pnl_usd, Decimal::ZERO);

    let stats = pipeline.stats();
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.executed, 0);
    assert_eq!(stats.total_pnl_usd, Decimal::ZERO);
}

#[tokio::test]
async fn test_stale_books_reject_then_fresh_books_execute() {
    let risk = RiskEngine::new(RiskConfig::default(), dec!(10000));
    let mut pipeline = pipeline_with_spatial(risk);

    // Books captured 30 seconds ago: stale against the 10s limit.
    let later = t0() + chrono::Duration::seconds(30);
    let mut stale_snapshot = gap_snapshot(later);
    stale_snapshot.insert(deep_book("binance", dec!(99.9), dec!(100), t0()));
    let report = pipeline.run_cycle(&stale_snapshot, later).await;
    assert_eq!(report.signals[0].status, SignalStatus::Rejected);

    // The next cycle's fresh books trade normally.
    let report = pipeline.run_cycle(&gap_snapshot(later), later).await;
    assert_eq!(report.signals[0].status, SignalStatus::Executed);
    assert!(report.pnl_usd > Decimal::ZERO);
}

/// Books for a cointegrated symbol pair at the given mid prices.
fn pair_snapshot(a: f64, b: f64) -> MarketSnapshot {
    let level = |mid: f64, off: f64| Decimal::from_f64(mid + off).unwrap();
    let mut snapshot = MarketSnapshot::new(t0());
    snapshot.insert(OrderBook::new(
        "binance",
        "AAA/USDT",
        t0(),
        vec![PriceLevel::new(level(a, -0.01), dec!(100))],
        vec![PriceLevel::new(level(a, 0.01), dec!(100))],
    ));
    snapshot.insert(OrderBook::new(
        "binance",
        "BBB/USDT",
        t0(),
        vec![PriceLevel::new(level(b, -0.01), dec!(100))],
        vec![PriceLevel::new(level(b, 0.01), dec!(100))],
    ));
    snapshot
}

#[tokio::test]
async fn test_statistical_pair_entry_executes_with_short_leg() {
    let config = StatArbConfig {
        lookback: 40,
        min_half_life: 0.1,
        ..StatArbConfig::default()
    };
    // Warm the detector on a cointegrated history: B oscillates, A tracks
    // 2×B plus mean-reverting noise.
    let mut detector = StatArbDetector::new(config, dec!(1000));
    let mut rng_state = 42_u64;
    let mut uniform = move || {
        rng_state = rng_state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (rng_state >> 33) as f64 / f64::from(1u32 << 30) - 1.0
    };
    let mut noise = 0.0_f64;
    for i in 0..60 {
        let b = 50.0 + 5.0 * ((i as f64) * 0.35).sin();
        noise = 0.5 * noise + 0.05 * uniform();
        detector.detect(&pair_snapshot(2.0 * b + noise, b));
    }
    assert_eq!(detector.pairs().len(), 1);

    let risk = RiskEngine::new(RiskConfig::default(), dec!(10000));
    let executor =
        PaperExecutor::with_quote_balance(dec!(0.1), "USDT", dec!(10000)).with_margin();
    let mut pipeline = Pipeline::new(risk, executor).with_detector(Box::new(detector));

    // A dislocates far above the hedge relation: the entry buys BBB and
    // shorts AAA on margin.
    let report = pipeline.run_cycle(&pair_snapshot(108.0, 50.0), t0()).await;
    assert_eq!(report.signals.len(), 1);
    let signal = &report.signals[0];
    assert_eq!(signal.status, SignalStatus::Executed);
    assert_eq!(signal.symbol, "BBB/USDT");
    assert_eq!(report.trades.len(), 2);

    assert!(pipeline.executor().balance("BBB") > Decimal::ZERO);
    assert!(pipeline.executor().balance("AAA") < Decimal::ZERO);
    let stats = pipeline.stats();
    assert_eq!(stats.executed, 1);
    assert_eq!(stats.missed, 0);
    assert_eq!(stats.rejected, 0);
    // The spread position stays unrealized at entry.
    assert_eq!(report.pnl_usd, Decimal::ZERO);
}

#[tokio::test]
async fn test_unresolved_half_open_trial_releases_the_slot() {
    let mut risk = RiskEngine::new(RiskConfig::default(), dec!(10000));
    for _ in 0..3 {
        risk.record_trade_outcome(dec!(-10), dec!(10000), t0());
    }
    // Too little quote currency for the $1,000 buy leg, so the trial
    // trade can never settle.
    let executor = PaperExecutor::with_quote_balance(dec!(0.1), "USDT", dec!(500));
    let mut pipeline = Pipeline::new(risk, executor)
        .with_detector(Box::new(SpatialDetector::new(DetectorConfig::default())));

    // Past the cooldown the breaker grants one trial; execution fails
    // without recording an outcome.
    let trial_at = t0() + chrono::Duration::minutes(31);
    let report = pipeline.run_cycle(&gap_snapshot(trial_at), trial_at).await;
    assert_eq!(report.signals[0].status, SignalStatus::Missed);

    // The unresolved trial must not leave the breaker stuck half-open:
    // a cycle a day later still reaches execution instead of being
    // rejected by a permanently armed trial.
    let next_day = trial_at + chrono::Duration::days(1);
    let report = pipeline.run_cycle(&gap_snapshot(next_day), next_day).await;
    assert_eq!(report.signals[0].status, SignalStatus::Missed);
    assert!(report.signals[0]
        .metadata
        .get("miss_reason")
        .is_some_and(|r| r.contains("insufficient")));
    assert_eq!(
        pipeline.risk_mut().breaker_state(next_day),
        BreakerState::HalfOpen
    );
}

#[tokio::test]
async fn test_consecutive_losses_halt_trading_mid_session() {
    let risk = RiskEngine::new(RiskConfig::default(), dec!(10000));
    let mut pipeline = pipeline_with_spatial(risk);

    // Feed losses through the risk engine as if resolved trades lost.
    for _ in 0..3 {
        pipeline
            .risk_mut()
            .record_trade_outcome(dec!(-10), dec!(10000), t0());
    }

    let report = pipeline.run_cycle(&gap_snapshot(t0()), t0()).await;
    assert_eq!(report.signals[0].status, SignalStatus::Rejected);
    assert!(report.trades.is_empty());
}

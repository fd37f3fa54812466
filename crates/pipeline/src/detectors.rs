//! Opportunity detectors.
//!
//! Detectors read a frozen [`MarketSnapshot`] and emit signals in the
//! `Detected` state; the orchestrator owns the rest of the lifecycle. The
//! spatial detector prices a cross-exchange gap with depth-weighted fill
//! estimates; the statistical detector maintains rolling price histories,
//! rescans the pair universe periodically, and trades z-score dislocations
//! of accepted pairs.

use crate::snapshot::MarketSnapshot;
use arb_engine_core::{ArbitrageSignal, DetectorConfig, Side, StatArbConfig, Strategy};
use arb_engine_stats::{
    CointegratedPair, CointegrationAnalyzer, HalfLifeBounds, PairScanner, SpreadSignal,
    ZScoreCalculator,
};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, warn};

/// Metadata key naming the symbol of a statistical signal's sell leg.
pub const SELL_SYMBOL_KEY: &str = "sell_symbol";

/// Metadata key carrying the sell leg's quantity in its own base units.
pub const SELL_QUANTITY_KEY: &str = "sell_quantity";

/// Produces signals from a frozen market snapshot.
pub trait Detector: Send {
    /// Detector name for logging.
    fn name(&self) -> &'static str;

    /// Scans the snapshot and returns zero or more `Detected` signals.
    fn detect(&mut self, snapshot: &MarketSnapshot) -> Vec<ArbitrageSignal>;
}

// =============================================================================
// Spatial Detector
// =============================================================================

/// Detects the same symbol priced differently across two exchanges.
#[derive(Debug, Clone)]
pub struct SpatialDetector {
    config: DetectorConfig,
}

impl SpatialDetector {
    /// Creates a detector with the given thresholds.
    #[must_use]
    pub const fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Prices one buy-venue/sell-venue combination, returning a signal when
    /// every gate passes.
    fn evaluate_pair(
        &self,
        buy_book: &arb_engine_core::OrderBook,
        sell_book: &arb_engine_core::OrderBook,
        snapshot_at: chrono::DateTime<chrono::Utc>,
    ) -> Option<ArbitrageSignal> {
        let budget = self.config.trade_amount_usd;
        let buy_price = buy_book.depth_weighted_price(Side::Buy, budget);
        let sell_price = sell_book.depth_weighted_price(Side::Sell, budget);
        if buy_price <= Decimal::ZERO || sell_price <= buy_price {
            return None;
        }

        let depth_usd = buy_book
            .total_depth_usd(Side::Buy)
            .min(sell_book.total_depth_usd(Side::Sell));
        if depth_usd < self.config.min_depth_usd {
            debug!(
                symbol = %buy_book.symbol,
                buy_exchange = %buy_book.exchange,
                sell_exchange = %sell_book.exchange,
                depth_usd = %depth_usd,
                "Gap skipped: thin book"
            );
            return None;
        }

        let gross_spread_pct = (sell_price - buy_price) / buy_price * Decimal::ONE_HUNDRED;
        // Two taker legs.
        let net_spread_pct = gross_spread_pct - self.config.taker_fee_pct * Decimal::TWO;
        if net_spread_pct < self.config.min_net_spread_pct {
            return None;
        }

        let quantity = budget / buy_price;
        // Confidence saturates once the net edge is double the minimum.
        let confidence = (net_spread_pct / (self.config.min_net_spread_pct * Decimal::TWO))
            .to_f64()
            .unwrap_or(0.0);

        let signal = ArbitrageSignal::new(
            Strategy::Spatial,
            buy_book.exchange.clone(),
            sell_book.exchange.clone(),
            buy_book.symbol.clone(),
            buy_price,
            sell_price,
            quantity,
            snapshot_at,
        )
        .with_net_spread_pct(net_spread_pct)
        .with_depth_usd(depth_usd)
        .with_confidence(confidence);

        info!(
            symbol = %signal.symbol,
            buy_exchange = %signal.buy_exchange,
            sell_exchange = %signal.sell_exchange,
            gross_spread_pct = %signal.gross_spread_pct,
            net_spread_pct = %signal.net_spread_pct,
            estimated_profit_usd = %signal.estimated_profit_usd,
            "Spatial opportunity detected"
        );
        Some(signal)
    }
}

impl Detector for SpatialDetector {
    fn name(&self) -> &'static str {
        "spatial"
    }

    fn detect(&mut self, snapshot: &MarketSnapshot) -> Vec<ArbitrageSignal> {
        let mut signals = Vec::new();
        for symbol in snapshot.symbols() {
            let books = snapshot.books_for_symbol(&symbol);
            for buy_book in &books {
                for sell_book in &books {
                    if buy_book.exchange == sell_book.exchange {
                        continue;
                    }
                    if let Some(signal) =
                        self.evaluate_pair(buy_book, sell_book, snapshot.captured_at)
                    {
                        signals.push(signal);
                    }
                }
            }
        }
        signals
    }
}

// =============================================================================
// Statistical Detector
// =============================================================================

/// Cycles between pair-universe rescans.
const DEFAULT_SCAN_INTERVAL: usize = 50;

/// Detects z-score dislocations in cointegrated symbol pairs.
///
/// Keeps a rolling mid-price history per symbol (averaged across venues),
/// rescans the universe every `scan_interval` cycles, and emits one entry
/// signal per accepted pair whose current z-score crosses the entry
/// threshold.
pub struct StatArbDetector {
    config: StatArbConfig,
    trade_amount_usd: Decimal,
    scanner: PairScanner,
    zscore: ZScoreCalculator,
    history: HashMap<String, VecDeque<f64>>,
    pairs: Vec<CointegratedPair>,
    cycles_since_scan: usize,
    scan_interval: usize,
}

impl StatArbDetector {
    /// Creates a detector with the given thresholds and per-trade notional.
    #[must_use]
    pub fn new(config: StatArbConfig, trade_amount_usd: Decimal) -> Self {
        let analyzer = CointegrationAnalyzer::new(config.significance_level)
            .with_min_points(config.min_points);
        let scanner = PairScanner::new(analyzer).with_half_life_bounds(HalfLifeBounds {
            min: config.min_half_life,
            max: config.max_half_life,
        });
        let zscore =
            ZScoreCalculator::new(config.entry_threshold, config.exit_threshold, config.lookback);
        Self {
            config,
            trade_amount_usd,
            scanner,
            zscore,
            history: HashMap::new(),
            pairs: Vec::new(),
            cycles_since_scan: 0,
            scan_interval: DEFAULT_SCAN_INTERVAL,
        }
    }

    /// Sets the number of cycles between universe rescans.
    #[must_use]
    pub fn with_scan_interval(mut self, cycles: usize) -> Self {
        self.scan_interval = cycles.max(1);
        self
    }

    /// Currently accepted pairs, ascending by p-value.
    #[must_use]
    pub fn pairs(&self) -> &[CointegratedPair] {
        &self.pairs
    }

    fn record_prices(&mut self, snapshot: &MarketSnapshot) {
        let capacity = self.config.lookback.max(self.config.min_points) * 2;
        for symbol in snapshot.symbols() {
            let books = snapshot.books_for_symbol(&symbol);
            let mids: Vec<f64> = books
                .iter()
                .filter_map(|b| {
                    let mid = b.mid_price();
                    if mid > Decimal::ZERO {
                        mid.to_f64()
                    } else {
                        None
                    }
                })
                .collect();
            if mids.is_empty() {
                continue;
            }
            let mid = mids.iter().sum::<f64>() / mids.len() as f64;
            let series = self.history.entry(symbol).or_default();
            series.push_back(mid);
            while series.len() > capacity {
                series.pop_front();
            }
        }
    }

    fn rescan(&mut self) {
        let series_by_symbol: HashMap<String, Vec<f64>> = self
            .history
            .iter()
            .map(|(symbol, series)| (symbol.clone(), series.iter().copied().collect()))
            .collect();
        match self
            .scanner
            .scan(&series_by_symbol, self.config.p_value_threshold)
        {
            Ok(pairs) => {
                info!(accepted = pairs.len(), "Pair universe rescanned");
                self.pairs = pairs;
            }
            Err(e) => warn!(error = %e, "Pair scan failed, keeping previous universe"),
        }
    }

    /// Builds the entry signal for one pair at the current z-score.
    fn pair_signal(
        &self,
        pair: &CointegratedPair,
        snapshot: &MarketSnapshot,
    ) -> Option<ArbitrageSignal> {
        let series_a: Vec<f64> = self.history.get(&pair.symbol_a)?.iter().copied().collect();
        let series_b: Vec<f64> = self.history.get(&pair.symbol_b)?.iter().copied().collect();
        let len = series_a.len().min(series_b.len());
        let result = self
            .zscore
            .compute(
                &series_a[series_a.len() - len..],
                &series_b[series_b.len() - len..],
                pair.hedge_ratio,
            )
            .ok()?;

        // Spread low ⇒ A cheap relative to B: buy A, sell B. Spread high
        // is the mirror. Exit/Hold produce nothing; entries are closed by
        // the opposite dislocation.
        let (buy_symbol, sell_symbol) = match result.signal {
            SpreadSignal::EntryLong => (&pair.symbol_a, &pair.symbol_b),
            SpreadSignal::EntryShort => (&pair.symbol_b, &pair.symbol_a),
            SpreadSignal::Exit | SpreadSignal::Hold => return None,
        };
        // A non-positive hedge ratio cannot be expressed as a buy/sell
        // leg pair.
        let hedge = Decimal::from_f64(pair.hedge_ratio).filter(|h| *h > Decimal::ZERO)?;

        // Cheapest venue to buy, dearest to sell.
        let buy_book = snapshot
            .books_for_symbol(buy_symbol)
            .into_iter()
            .filter(|b| b.best_ask().is_some())
            .min_by(|a, b| a.best_ask().cmp(&b.best_ask()))?;
        let sell_book = snapshot
            .books_for_symbol(sell_symbol)
            .into_iter()
            .filter(|b| b.best_bid().is_some())
            .max_by(|a, b| a.best_bid().cmp(&b.best_bid()))?;

        let buy_price = buy_book.mid_price();
        let sell_price = sell_book.mid_price();
        if buy_price <= Decimal::ZERO || sell_price <= Decimal::ZERO {
            return None;
        }
        let quantity = self.trade_amount_usd / buy_price;
        // The sell leg hedges the spread in its own base units: β units
        // of B per unit of A, 1/β units of A per unit of B.
        let sell_quantity = match result.signal {
            SpreadSignal::EntryLong => quantity * hedge,
            _ => quantity / hedge,
        };
        let confidence = (result.zscore.abs() / self.config.entry_threshold).min(1.0);

        let signal = ArbitrageSignal::new(
            Strategy::Statistical,
            buy_book.exchange.clone(),
            sell_book.exchange.clone(),
            buy_symbol.clone(),
            buy_price,
            sell_price,
            quantity,
            snapshot.captured_at,
        )
        .with_confidence(confidence)
        .with_metadata(SELL_SYMBOL_KEY, sell_symbol.clone())
        .with_metadata(SELL_QUANTITY_KEY, sell_quantity.to_string())
        .with_metadata("pair", format!("{}|{}", pair.symbol_a, pair.symbol_b))
        .with_metadata("zscore", format!("{:.4}", result.zscore))
        .with_metadata("hedge_ratio", format!("{:.6}", pair.hedge_ratio))
        .with_metadata("half_life", format!("{:.2}", pair.half_life));

        info!(
            pair = %format!("{}|{}", pair.symbol_a, pair.symbol_b),
            zscore = result.zscore,
            signal_kind = %result.signal,
            buy_symbol = %buy_symbol,
            sell_symbol = %sell_symbol,
            "Statistical entry detected"
        );
        Some(signal)
    }
}

impl Detector for StatArbDetector {
    fn name(&self) -> &'static str {
        "statistical"
    }

    fn detect(&mut self, snapshot: &MarketSnapshot) -> Vec<ArbitrageSignal> {
        self.record_prices(snapshot);

        self.cycles_since_scan += 1;
        if self.pairs.is_empty() || self.cycles_since_scan >= self.scan_interval {
            self.cycles_since_scan = 0;
            self.rescan();
        }

        let pairs = self.pairs.clone();
        pairs
            .iter()
            .filter_map(|pair| self.pair_signal(pair, snapshot))
            .collect()
    }
}

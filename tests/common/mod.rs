#![allow(dead_code)]

use chrono::{Days, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use triggerlab::adapters::static_range_adapter::StaticRangeAdapter;
use triggerlab::domain::backtest::BacktestOrchestrator;
use triggerlab::domain::compatibility::{CompatibilityClassifier, CompatibilityLevel, RuleTable};
use triggerlab::domain::detector::TriggerPointDetector;
use triggerlab::domain::error::EngineError;
use triggerlab::domain::evaluation::TriggerEvaluator;
use triggerlab::domain::indicator::IndicatorEngine;
use triggerlab::domain::normalization::{NormalizationMethod, NormalizationService, ReferenceStats};
pub use triggerlab::domain::ohlcv::{OhlcvBar, PriceSeries};
use triggerlab::domain::variable::{
    ChartCategory, ComparisonGroup, PurposeCategory, TradingVariable, VariableCatalog,
};
use triggerlab::ports::data_port::PriceDataPort;

pub struct MockPriceData {
    pub data: HashMap<String, Vec<OhlcvBar>>,
}

impl MockPriceData {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }
}

impl PriceDataPort for MockPriceData {
    fn fetch_bars(&self, symbol: &str) -> Result<Vec<OhlcvBar>, EngineError> {
        self.data.get(symbol).cloned().ok_or_else(|| EngineError::PriceData {
            reason: format!("no data for {symbol}"),
        })
    }
}

pub fn day(n: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .checked_add_days(Days::new(n as u64))
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Daily series where every price column equals the close.
pub fn closes(values: &[f64]) -> PriceSeries {
    PriceSeries::from_closes((0..values.len()).map(day).collect(), values)
}

pub fn make_bar(n: usize, close: f64) -> OhlcvBar {
    OhlcvBar {
        timestamp: day(n),
        open: close,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 1000.0,
    }
}

/// Bars with a deterministic oscillation, for indicators that need high/low.
pub fn wave_bars(len: usize, base: f64) -> Vec<OhlcvBar> {
    let mut prev = base;
    (0..len)
        .map(|i| {
            let x = i as f64;
            let close = base + 6.0 * (x / 5.0).sin() + 0.1 * x;
            let bar = OhlcvBar {
                timestamp: day(i),
                open: prev,
                high: prev.max(close) + 0.5,
                low: prev.min(close) - 0.5,
                close,
                volume: 10_000.0 + 500.0 * (x / 3.0).cos(),
            };
            prev = close;
            bar
        })
        .collect()
}

fn variable(id: &str, purpose: PurposeCategory, group: ComparisonGroup) -> TradingVariable {
    let chart = if group == ComparisonGroup::PriceComparable {
        ChartCategory::Overlay
    } else {
        ChartCategory::Subplot
    };
    TradingVariable::new(id, id, purpose, chart, group).unwrap()
}

pub fn close_var() -> TradingVariable {
    variable("close", PurposeCategory::Price, ComparisonGroup::PriceComparable)
}

pub fn sma_var(period: usize) -> TradingVariable {
    variable("sma", PurposeCategory::Trend, ComparisonGroup::PriceComparable)
        .with_param("period", period as f64)
}

pub fn rsi_var(period: usize) -> TradingVariable {
    variable("rsi", PurposeCategory::Momentum, ComparisonGroup::PercentageComparable)
        .with_param("period", period as f64)
}

pub fn stoch_var() -> TradingVariable {
    variable("stochastic", PurposeCategory::Momentum, ComparisonGroup::PercentageComparable)
}

pub fn macd_var() -> TradingVariable {
    variable("macd", PurposeCategory::Momentum, ComparisonGroup::ZeroCentered)
}

pub fn volume_var() -> TradingVariable {
    variable("volume", PurposeCategory::Volume, ComparisonGroup::VolumeBased)
}

pub fn catalog() -> VariableCatalog {
    VariableCatalog::new(vec![
        close_var(),
        sma_var(20),
        rsi_var(14),
        stoch_var(),
        macd_var(),
        volume_var(),
    ])
    .unwrap()
}

pub fn rule_table() -> RuleTable {
    use ComparisonGroup::*;
    let mut table = RuleTable::new();
    table
        .set_group_rule(PriceComparable, PercentageComparable, CompatibilityLevel::Warning)
        .unwrap();
    table
        .set_group_rule(PriceComparable, ZeroCentered, CompatibilityLevel::Incompatible)
        .unwrap();
    table
        .set_group_rule(PercentageComparable, ZeroCentered, CompatibilityLevel::Incompatible)
        .unwrap();
    table.set_advisory(
        PurposeCategory::Momentum,
        PurposeCategory::Trend,
        "momentum against trend lags",
    );
    table
}

pub fn classifier() -> Arc<CompatibilityClassifier> {
    Arc::new(CompatibilityClassifier::new(rule_table()))
}

pub fn normalizer() -> Arc<NormalizationService> {
    let ranges = StaticRangeAdapter::default()
        .with(
            ComparisonGroup::PriceComparable,
            ReferenceStats {
                min: 0.0,
                max: 200.0,
                mean: 100.0,
                std_dev: 20.0,
            },
        )
        .with(
            ComparisonGroup::PercentageComparable,
            ReferenceStats {
                min: 0.0,
                max: 100.0,
                mean: 50.0,
                std_dev: 15.0,
            },
        );
    Arc::new(NormalizationService::new(Arc::new(ranges), NormalizationMethod::MinMax))
}

pub fn engine() -> Arc<IndicatorEngine> {
    Arc::new(IndicatorEngine::with_defaults())
}

pub fn detector() -> TriggerPointDetector {
    TriggerPointDetector::new(engine(), classifier(), normalizer())
}

pub fn evaluator() -> TriggerEvaluator {
    TriggerEvaluator::new(engine(), classifier(), normalizer())
}

pub fn orchestrator() -> BacktestOrchestrator {
    BacktestOrchestrator::new(engine(), classifier(), normalizer())
}

pub const ENGINE_INI: &str = r#"
[comparison_groups]
default = incompatible
price_comparable.percentage_comparable = warning

[normalization]
method = minmax

[reference_stats.price_comparable]
min = 0
max = 200
mean = 100
std_dev = 20

[reference_stats.percentage_comparable]
min = 0
max = 100
mean = 50
std_dev = 15

[variable.close]
purpose = price
chart = overlay
group = price_comparable

[variable.sma]
display_name = Simple Moving Average
purpose = trend
chart = overlay
group = price_comparable
params = period=20

[variable.rsi]
display_name = Relative Strength Index
purpose = momentum
chart = subplot
group = percentage_comparable
params = period=14

[variable.macd]
purpose = momentum
chart = subplot
group = zero_centered

[strategy]
id = demo
name = Demo Strategy

[trigger.entry_cross]
type = entry
condition = sma(period=3) crosses_above sma(period=8)

[trigger.exit_cross]
type = exit
condition = sma(period=3) crosses_below sma(period=8)

[backtest]
indicator.1 = RSI(period=5)
cross.1 = sma(period=3) any_cross sma(period=8)
"#;

pub fn write_temp_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Price CSV text for `bars`.
pub fn csv_text(bars: &[OhlcvBar]) -> String {
    let mut text = String::from("timestamp,open,high,low,close,volume\n");
    for b in bars {
        text.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.timestamp.format("%Y-%m-%d"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    text
}

/// ExitCode has no PartialEq; compare through its debug form.
pub fn exit_code_is(code: ExitCode, expected: u8) -> bool {
    format!("{code:?}") == format!("{:?}", ExitCode::from(expected))
}

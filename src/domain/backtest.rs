//! Backtest orchestration.
//!
//! A run computes every needed indicator once, detects entry and exit points,
//! analyzes the requested cross pairs and assembles a `SimulationResult`.
//! Failures are reported inside the result, never returned as errors.

use crate::domain::compatibility::CompatibilityClassifier;
use crate::domain::condition::Condition;
use crate::domain::cross_signal::{CrossSignalAnalyzer, CrossSignalEvent, SignalType};
use crate::domain::detector::{TriggerPointDetector, required_indicators};
use crate::domain::error::EngineError;
use crate::domain::indicator::{IndicatorEngine, IndicatorRequest, IndicatorSet};
use crate::domain::normalization::NormalizationService;
use crate::domain::ohlcv::PriceSeries;
use crate::domain::operator::ComparisonOperator;
use crate::domain::strategy::Strategy;
use crate::domain::trigger::TriggerType;
use crate::domain::variable::TradingVariable;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Two variables whose crossings are reported.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossPair {
    pub left: TradingVariable,
    pub right: TradingVariable,
    pub signal_type: SignalType,
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    pub cross_pairs: Vec<CrossPair>,
}

#[derive(Debug, Clone, Default)]
pub struct BacktestRequest {
    /// Indicators to report even when no condition uses them.
    pub indicators: Vec<IndicatorRequest>,
    pub entry_conditions: Vec<Condition>,
    pub exit_conditions: Vec<Condition>,
    pub options: AnalysisOptions,
}

impl BacktestRequest {
    /// Entry and exit conditions taken from the active triggers of `strategy`.
    pub fn for_strategy(strategy: &Strategy, options: AnalysisOptions) -> Self {
        let conditions = |kind| -> Vec<Condition> {
            strategy
                .triggers(kind)
                .iter()
                .filter(|t| t.is_active())
                .map(|t| t.condition().clone())
                .collect()
        };
        Self {
            indicators: Vec::new(),
            entry_conditions: conditions(TriggerType::Entry),
            exit_conditions: conditions(TriggerType::Exit),
            options,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    pub elapsed_ms: f64,
    pub input_len: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    pub success: bool,
    pub message: String,
    pub entry_points: Vec<usize>,
    pub exit_points: Vec<usize>,
    /// Column name to values, each as long as the input series.
    pub indicators: BTreeMap<String, Vec<f64>>,
    pub cross_signals: Vec<CrossSignalEvent>,
    pub metadata: RunMetadata,
}

impl SimulationResult {
    fn empty(input_len: usize) -> Self {
        Self {
            success: false,
            message: String::new(),
            entry_points: Vec::new(),
            exit_points: Vec::new(),
            indicators: BTreeMap::new(),
            cross_signals: Vec::new(),
            metadata: RunMetadata {
                elapsed_ms: 0.0,
                input_len,
            },
        }
    }
}

pub struct BacktestOrchestrator {
    engine: Arc<IndicatorEngine>,
    classifier: Arc<CompatibilityClassifier>,
    normalizer: Arc<NormalizationService>,
    detector: TriggerPointDetector,
    analyzer: CrossSignalAnalyzer,
}

impl BacktestOrchestrator {
    pub fn new(
        engine: Arc<IndicatorEngine>,
        classifier: Arc<CompatibilityClassifier>,
        normalizer: Arc<NormalizationService>,
    ) -> Self {
        let detector =
            TriggerPointDetector::new(engine.clone(), classifier.clone(), normalizer.clone());
        Self {
            engine,
            classifier,
            normalizer,
            detector,
            analyzer: CrossSignalAnalyzer::new(),
        }
    }

    pub fn run(&self, prices: &PriceSeries, request: &BacktestRequest) -> SimulationResult {
        let started = Instant::now();
        let mut result = SimulationResult::empty(prices.len());

        match self.execute(prices, request, &mut result) {
            Ok(()) => {
                result.success = true;
                result.message = format!(
                    "{} entry point(s), {} exit point(s), {} cross signal(s)",
                    result.entry_points.len(),
                    result.exit_points.len(),
                    result.cross_signals.len()
                );
            }
            Err(err) => {
                warn!(error = %err, "backtest failed");
                result.success = false;
                result.message = err.to_string();
            }
        }

        result.metadata.elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        info!(
            success = result.success,
            bars = prices.len(),
            entries = result.entry_points.len(),
            exits = result.exit_points.len(),
            elapsed_ms = result.metadata.elapsed_ms,
            "backtest finished"
        );
        result
    }

    /// Run with the active entry and exit triggers of `strategy` as conditions.
    pub fn run_strategy(
        &self,
        strategy: &Strategy,
        prices: &PriceSeries,
        options: &AnalysisOptions,
    ) -> SimulationResult {
        self.run(prices, &BacktestRequest::for_strategy(strategy, options.clone()))
    }

    /// Independent runs in parallel, results in input order.
    pub fn run_many(&self, jobs: &[(&PriceSeries, &BacktestRequest)]) -> Vec<SimulationResult> {
        jobs.par_iter()
            .map(|(prices, request)| self.run(prices, request))
            .collect()
    }

    fn execute(
        &self,
        prices: &PriceSeries,
        request: &BacktestRequest,
        result: &mut SimulationResult,
    ) -> Result<(), EngineError> {
        if prices.is_empty() {
            return Err(EngineError::MissingData {
                what: "price series".to_string(),
            });
        }

        let set = self.compute_indicators(prices, request, result)?;

        result.entry_points = self
            .detector
            .detect_with(prices, &request.entry_conditions, &set)?;
        result.exit_points = self
            .detector
            .detect_with(prices, &request.exit_conditions, &set)?;

        for pair in &request.options.cross_pairs {
            let events = self.cross_events(prices, pair, &set)?;
            result.cross_signals.extend(events);
        }
        Ok(())
    }

    /// One batch for everything the run needs. Columns computed before a
    /// failure stay attached to the result.
    fn compute_indicators(
        &self,
        prices: &PriceSeries,
        request: &BacktestRequest,
        result: &mut SimulationResult,
    ) -> Result<IndicatorSet, EngineError> {
        let pair_conditions: Vec<Condition> = request
            .options
            .cross_pairs
            .iter()
            .map(|p| {
                Condition::against(
                    p.left.clone(),
                    ComparisonOperator::CrossesAbove,
                    p.right.clone(),
                )
            })
            .collect();

        let mut requests = request.indicators.clone();
        requests.extend(required_indicators(&self.engine, &request.entry_conditions)?);
        requests.extend(required_indicators(&self.engine, &request.exit_conditions)?);
        requests.extend(required_indicators(&self.engine, &pair_conditions)?);

        let outcome = self.engine.calculate_batch_partial(prices, &requests);
        result.indicators = outcome.computed.columns();
        match outcome.failures.into_iter().next() {
            Some((_, err)) => Err(err),
            None => Ok(outcome.computed),
        }
    }

    fn cross_events(
        &self,
        prices: &PriceSeries,
        pair: &CrossPair,
        set: &IndicatorSet,
    ) -> Result<Vec<CrossSignalEvent>, EngineError> {
        Condition::against(
            pair.left.clone(),
            ComparisonOperator::CrossesAbove,
            pair.right.clone(),
        )
        .check_operands(&self.classifier)?;
        let left = self.engine.resolve_series(&pair.left, prices, set)?;
        let right = self.engine.resolve_series(&pair.right, prices, set)?;

        let (left, right) = if self.classifier.needs_normalization(&pair.left, &pair.right) {
            self.normalizer.normalize_series(
                &left,
                pair.left.comparison_group(),
                &right,
                pair.right.comparison_group(),
                self.normalizer.default_method(),
            )?
        } else {
            (left.into_owned(), right.into_owned())
        };

        Ok(self.analyzer.events(
            &pair.left.key(),
            &left,
            &pair.right.key(),
            &right,
            pair.signal_type,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::compatibility::RuleTable;
    use crate::domain::normalization::{NormalizationMethod, ReferenceStats};
    use crate::domain::variable::{ChartCategory, ComparisonGroup, Parameters, PurposeCategory};
    use crate::ports::range_port::HistoricalRangeProvider;
    use chrono::{Duration, NaiveDate};

    struct NoStats;

    impl HistoricalRangeProvider for NoStats {
        fn reference_stats(&self, _: ComparisonGroup) -> Option<ReferenceStats> {
            None
        }
    }

    fn orchestrator() -> BacktestOrchestrator {
        BacktestOrchestrator::new(
            Arc::new(IndicatorEngine::with_defaults()),
            Arc::new(CompatibilityClassifier::new(RuleTable::new())),
            Arc::new(NormalizationService::new(Arc::new(NoStats), NormalizationMethod::MinMax)),
        )
    }

    fn prices(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let ts = (0..closes.len()).map(|i| start + Duration::days(i as i64)).collect();
        PriceSeries::from_closes(ts, closes)
    }

    fn price_var(id: &str) -> TradingVariable {
        TradingVariable::new(
            id,
            id,
            PurposeCategory::Trend,
            ChartCategory::Overlay,
            ComparisonGroup::PriceComparable,
        )
        .unwrap()
    }

    #[test]
    fn successful_run_reports_everything() {
        let series = prices(&[10.0, 10.0, 10.0, 7.0, 13.0, 13.0, 8.0]);
        let sma2 = price_var("sma").with_param("period", 2.0);
        let request = BacktestRequest {
            indicators: vec![IndicatorRequest::new("EMA", [("period".to_string(), 3.0)].into())],
            entry_conditions: vec![Condition::against(
                price_var("close"),
                ComparisonOperator::CrossesAbove,
                sma2.clone(),
            )],
            exit_conditions: vec![Condition::against(
                price_var("close"),
                ComparisonOperator::CrossesBelow,
                sma2.clone(),
            )],
            options: AnalysisOptions {
                cross_pairs: vec![CrossPair {
                    left: price_var("close"),
                    right: sma2,
                    signal_type: SignalType::AnyCross,
                }],
            },
        };
        let result = orchestrator().run(&series, &request);
        assert!(result.success, "{}", result.message);
        assert_eq!(result.entry_points, vec![4]);
        assert_eq!(result.exit_points, vec![3, 6]);
        assert_eq!(result.cross_signals.len(), 3);
        assert!(result.indicators.contains_key("SMA(period=2)"));
        assert!(result.indicators.contains_key("EMA(period=3)"));
        assert!(result.indicators.values().all(|c| c.len() == 7));
        assert_eq!(result.metadata.input_len, 7);
    }

    #[test]
    fn failure_is_captured_with_partial_results() {
        let series = prices(&[1.0, 2.0, 3.0]);
        let mut long = Parameters::new();
        long.insert("period".into(), 50.0);
        let request = BacktestRequest {
            indicators: vec![
                IndicatorRequest::new("SMA", [("period".to_string(), 2.0)].into()),
                IndicatorRequest::new("SMA", long),
            ],
            ..Default::default()
        };
        let result = orchestrator().run(&series, &request);
        assert!(!result.success);
        assert!(result.message.contains("insufficient data"));
        assert!(result.indicators.contains_key("SMA(period=2)"));
    }

    #[test]
    fn empty_series_fails_without_panicking() {
        let result = orchestrator().run(&prices(&[]), &BacktestRequest::default());
        assert!(!result.success);
        assert!(result.message.contains("price series"));
    }

    #[test]
    fn run_many_keeps_order() {
        let a = prices(&[1.0, 5.0, 1.0]);
        let b = prices(&[5.0, 5.0]);
        let request = BacktestRequest {
            entry_conditions: vec![Condition::threshold(
                price_var("close"),
                ComparisonOperator::Gt,
                4.0,
            )],
            ..Default::default()
        };
        let results = orchestrator().run_many(&[(&a, &request), (&b, &request)]);
        assert_eq!(results[0].entry_points, vec![1]);
        assert_eq!(results[1].entry_points, vec![0, 1]);
    }
}

//! Evaluation of triggers against a market snapshot.
//!
//! Failures while evaluating one trigger (unknown variable, missing data,
//! incompatible operands) are recorded in its `EvaluationResult` instead of
//! being returned, so `evaluate_all` always yields one result per trigger.

use crate::domain::compatibility::CompatibilityClassifier;
use crate::domain::condition::Target;
use crate::domain::cross_signal::{CrossDirection, crossed};
use crate::domain::error::EngineError;
use crate::domain::indicator::{IndicatorEngine, VariableSource, column_name};
use crate::domain::normalization::NormalizationService;
use crate::domain::operator::ComparisonOperator;
use crate::domain::snapshot::{MarketSnapshot, SampledValue};
use crate::domain::trigger::Trigger;
use crate::domain::variable::TradingVariable;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    pub trigger_id: String,
    /// False when the trigger could not be evaluated; `message` says why.
    pub success: bool,
    pub result: bool,
    pub value: f64,
    pub target_value: f64,
    pub operator: ComparisonOperator,
    pub message: String,
    pub timestamp: NaiveDateTime,
}

impl EvaluationResult {
    fn failed(trigger: &Trigger, timestamp: NaiveDateTime, err: &EngineError) -> Self {
        Self {
            trigger_id: trigger.trigger_id().to_string(),
            success: false,
            result: false,
            value: f64::NAN,
            target_value: f64::NAN,
            operator: trigger.operator(),
            message: err.to_string(),
            timestamp,
        }
    }
}

pub struct TriggerEvaluator {
    engine: Arc<IndicatorEngine>,
    classifier: Arc<CompatibilityClassifier>,
    normalizer: Arc<NormalizationService>,
}

impl TriggerEvaluator {
    pub fn new(
        engine: Arc<IndicatorEngine>,
        classifier: Arc<CompatibilityClassifier>,
        normalizer: Arc<NormalizationService>,
    ) -> Self {
        Self {
            engine,
            classifier,
            normalizer,
        }
    }

    pub fn evaluate(&self, trigger: &Trigger, snapshot: &MarketSnapshot) -> EvaluationResult {
        let timestamp = snapshot.timestamp();
        if !trigger.is_active() {
            return EvaluationResult {
                trigger_id: trigger.trigger_id().to_string(),
                success: true,
                result: false,
                value: f64::NAN,
                target_value: f64::NAN,
                operator: trigger.operator(),
                message: "trigger is inactive".to_string(),
                timestamp,
            };
        }
        match self.try_evaluate(trigger, snapshot) {
            Ok(result) => result,
            Err(err) => {
                warn!(trigger = trigger.trigger_id(), error = %err, "trigger evaluation failed");
                EvaluationResult::failed(trigger, timestamp, &err)
            }
        }
    }

    pub fn evaluate_all(
        &self,
        triggers: &[Trigger],
        snapshot: &MarketSnapshot,
    ) -> Vec<EvaluationResult> {
        triggers.iter().map(|t| self.evaluate(t, snapshot)).collect()
    }

    fn try_evaluate(
        &self,
        trigger: &Trigger,
        snapshot: &MarketSnapshot,
    ) -> Result<EvaluationResult, EngineError> {
        let condition = trigger.condition();
        condition.check_operands(&self.classifier)?;
        let mut value = self.sample(&condition.variable, snapshot)?;

        let mut target = match &condition.target {
            Target::Value(v) => SampledValue {
                current: *v,
                previous: Some(*v),
            },
            Target::Variable(other) => self.sample(other, snapshot)?,
        };

        let rescaled = condition
            .target
            .variable()
            .filter(|other| self.classifier.needs_normalization(&condition.variable, other));
        if let Some(other) = rescaled {
            let (g1, g2) = (condition.variable.comparison_group(), other.comparison_group());
            let method = self.normalizer.default_method();
            let (v, t) = self.normalizer.normalize(value.current, g1, target.current, g2, method)?;
            let previous = match (value.previous, target.previous) {
                (Some(pv), Some(pt)) => Some(self.normalizer.normalize(pv, g1, pt, g2, method)?),
                _ => None,
            };
            value = SampledValue {
                current: v,
                previous: previous.map(|p| p.0),
            };
            target = SampledValue {
                current: t,
                previous: previous.map(|p| p.1),
            };
        }

        let operator = condition.operator;
        let result = match operator {
            ComparisonOperator::CrossesAbove | ComparisonOperator::CrossesBelow => {
                let wanted = if operator == ComparisonOperator::CrossesAbove {
                    CrossDirection::Above
                } else {
                    CrossDirection::Below
                };
                match (value.previous, target.previous) {
                    (Some(pv), Some(pt)) => {
                        crossed(pv, pt, value.current, target.current) == Some(wanted)
                    }
                    _ => false,
                }
            }
            op => op.compare(value.current, target.current),
        };

        Ok(EvaluationResult {
            trigger_id: trigger.trigger_id().to_string(),
            success: true,
            result,
            value: value.current,
            target_value: target.current,
            operator,
            message: format!(
                "{}: {} {} {} is {}",
                condition, value.current, operator, target.current, result
            ),
            timestamp: snapshot.timestamp(),
        })
    }

    /// Current and previous value of a variable, from the snapshot or computed
    /// from its price history.
    fn sample(
        &self,
        variable: &TradingVariable,
        snapshot: &MarketSnapshot,
    ) -> Result<SampledValue, EngineError> {
        let (request, field) = match self.engine.source_of(variable)? {
            VariableSource::Price(field) => return Ok(snapshot.price(field)),
            VariableSource::Indicator { request, field } => (request, field),
        };
        let column = column_name(&request.key(), field);
        if let Some(sampled) = snapshot.indicator(&column) {
            return Ok(sampled);
        }

        let history = snapshot.history().ok_or_else(|| EngineError::MissingData {
            what: format!("{column} at {}", snapshot.timestamp()),
        })?;
        let output = self.engine.calculate_request(&request, history)?;
        let values = output.field(field).ok_or_else(|| EngineError::MissingData {
            what: column.clone(),
        })?;
        let last = values.len().checked_sub(1).ok_or_else(|| EngineError::MissingData {
            what: format!("{column} at {}", snapshot.timestamp()),
        })?;
        Ok(SampledValue {
            current: values[last],
            previous: last.checked_sub(1).map(|i| values[i]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::compatibility::{CompatibilityLevel, RuleTable};
    use crate::domain::condition::Condition;
    use crate::domain::normalization::{NormalizationMethod, ReferenceStats};
    use crate::domain::ohlcv::{OhlcvBar, PriceSeries};
    use crate::domain::trigger::TriggerType;
    use crate::domain::variable::{ChartCategory, ComparisonGroup, PurposeCategory};
    use crate::ports::range_port::HistoricalRangeProvider;
    use chrono::NaiveDate;

    struct Stats;

    impl HistoricalRangeProvider for Stats {
        fn reference_stats(&self, group: ComparisonGroup) -> Option<ReferenceStats> {
            match group {
                ComparisonGroup::PriceComparable => Some(ReferenceStats {
                    min: 0.0,
                    max: 200.0,
                    mean: 100.0,
                    std_dev: 20.0,
                }),
                ComparisonGroup::PercentageComparable => Some(ReferenceStats {
                    min: 0.0,
                    max: 100.0,
                    mean: 50.0,
                    std_dev: 10.0,
                }),
                _ => None,
            }
        }
    }

    fn classifier() -> CompatibilityClassifier {
        let mut rules = RuleTable::new();
        rules
            .set_group_rule(
                ComparisonGroup::PriceComparable,
                ComparisonGroup::PercentageComparable,
                CompatibilityLevel::Warning,
            )
            .unwrap();
        CompatibilityClassifier::new(rules)
    }

    fn evaluator() -> TriggerEvaluator {
        TriggerEvaluator::new(
            Arc::new(IndicatorEngine::with_defaults()),
            Arc::new(classifier()),
            Arc::new(NormalizationService::new(Arc::new(Stats), NormalizationMethod::MinMax)),
        )
    }

    fn var(id: &str, group: ComparisonGroup) -> TradingVariable {
        TradingVariable::new(id, id, PurposeCategory::Price, ChartCategory::Overlay, group).unwrap()
    }

    fn bar(close: f64) -> OhlcvBar {
        OhlcvBar {
            timestamp: NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
        }
    }

    fn trigger(id: &str, condition: Condition) -> Trigger {
        Trigger::new(id, TriggerType::Entry, condition, &classifier()).unwrap()
    }

    #[test]
    fn literal_comparison() {
        let t = trigger(
            "close_high",
            Condition::threshold(
                var("close", ComparisonGroup::PriceComparable),
                ComparisonOperator::Gt,
                100.0,
            ),
        );
        let result = evaluator().evaluate(&t, &MarketSnapshot::new(bar(105.0)));
        assert!(result.success);
        assert!(result.result);
        assert_eq!(result.value, 105.0);
        assert_eq!(result.target_value, 100.0);
    }

    #[test]
    fn snapshot_indicator_values_are_used() {
        let t = trigger(
            "rsi_low",
            Condition::threshold(
                var("rsi", ComparisonGroup::PercentageComparable).with_param("period", 14.0),
                ComparisonOperator::Lt,
                30.0,
            ),
        );
        let snap =
            MarketSnapshot::new(bar(100.0)).with_indicator("RSI(period=14)", 25.0, Some(35.0));
        let result = evaluator().evaluate(&t, &snap);
        assert!(result.result);
        assert_eq!(result.value, 25.0);
    }

    #[test]
    fn crossing_uses_previous_sample() {
        let t = trigger(
            "sma_cross",
            Condition::against(
                var("close", ComparisonGroup::PriceComparable),
                ComparisonOperator::CrossesAbove,
                var("sma", ComparisonGroup::PriceComparable).with_param("period", 5.0),
            ),
        );
        let snap = MarketSnapshot::new(bar(105.0))
            .with_previous_bar(bar(99.0))
            .with_indicator("SMA(period=5)", 102.0, Some(101.0));
        assert!(evaluator().evaluate(&t, &snap).result);

        let no_history =
            MarketSnapshot::new(bar(105.0)).with_indicator("SMA(period=5)", 102.0, None);
        let result = evaluator().evaluate(&t, &no_history);
        assert!(result.success);
        assert!(!result.result);
    }

    #[test]
    fn missing_indicator_is_computed_from_history() {
        let start = bar(0.0).timestamp;
        let ts = (0..5).map(|i| start + chrono::Duration::days(i)).collect();
        let history = PriceSeries::from_closes(ts, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let t = trigger(
            "sma_above",
            Condition::threshold(
                var("sma", ComparisonGroup::PriceComparable).with_param("period", 3.0),
                ComparisonOperator::Ge,
                4.0,
            ),
        );
        let snap = MarketSnapshot::new(bar(5.0)).with_history(Arc::new(history));
        let result = evaluator().evaluate(&t, &snap);
        assert!(result.success, "{}", result.message);
        assert_eq!(result.value, 4.0);
        assert!(result.result);
    }

    #[test]
    fn failures_are_isolated_per_trigger() {
        let unknown = trigger(
            "mystery",
            Condition::threshold(
                var("sentiment", ComparisonGroup::PercentageComparable),
                ComparisonOperator::Gt,
                1.0,
            ),
        );
        let missing = trigger(
            "no_rsi",
            Condition::threshold(
                var("rsi", ComparisonGroup::PercentageComparable),
                ComparisonOperator::Gt,
                50.0,
            ),
        );
        let ok = trigger(
            "close_low",
            Condition::threshold(
                var("close", ComparisonGroup::PriceComparable),
                ComparisonOperator::Lt,
                200.0,
            ),
        );
        let results =
            evaluator().evaluate_all(&[unknown, missing, ok], &MarketSnapshot::new(bar(100.0)));
        assert_eq!(results.len(), 3);
        assert!(!results[0].success);
        assert!(results[0].message.contains("unknown variable"));
        assert!(!results[1].success);
        assert!(results[1].message.contains("missing data"));
        assert!(results[2].success && results[2].result);
    }

    #[test]
    fn warned_pair_is_normalized() {
        // close 150 -> 0.75, rsi 60 -> 0.6 under min-max
        let t = trigger(
            "close_vs_rsi",
            Condition::against(
                var("close", ComparisonGroup::PriceComparable),
                ComparisonOperator::Gt,
                var("rsi", ComparisonGroup::PercentageComparable),
            ),
        );
        let snap = MarketSnapshot::new(bar(150.0)).with_indicator("RSI", 60.0, None);
        let result = evaluator().evaluate(&t, &snap);
        assert!(result.success, "{}", result.message);
        assert!(result.result);
        approx::assert_relative_eq!(result.value, 0.75);
        approx::assert_relative_eq!(result.target_value, 0.6);
    }

    #[test]
    fn inactive_trigger_is_false() {
        let mut t = trigger(
            "off",
            Condition::threshold(
                var("close", ComparisonGroup::PriceComparable),
                ComparisonOperator::Gt,
                0.0,
            ),
        );
        t.set_active(false);
        let result = evaluator().evaluate(&t, &MarketSnapshot::new(bar(1.0)));
        assert!(result.success);
        assert!(!result.result);
        assert_eq!(result.message, "trigger is inactive");
    }

    #[test]
    fn evaluation_is_idempotent() {
        let t = trigger(
            "close_high",
            Condition::threshold(
                var("close", ComparisonGroup::PriceComparable),
                ComparisonOperator::ApproxEq,
                101.0,
            ),
        );
        let snap = MarketSnapshot::new(bar(100.0));
        let e = evaluator();
        let (a, b) = (e.evaluate(&t, &snap), e.evaluate(&t, &snap));
        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
        assert_eq!(a.value.to_bits(), b.value.to_bits());
    }
}

//! Trigger point detection over a whole price series.
//!
//! Each condition yields a boolean mask over the series; several conditions
//! are combined with AND. Crossing operators use the sign-change rule from
//! `cross_signal`, so index 0 and NaN positions never qualify.

use crate::domain::compatibility::CompatibilityClassifier;
use crate::domain::condition::{Condition, Target};
use crate::domain::cross_signal::{CrossDirection, crossings};
use crate::domain::error::EngineError;
use crate::domain::indicator::{IndicatorEngine, IndicatorRequest, IndicatorSet};
use crate::domain::normalization::NormalizationService;
use crate::domain::ohlcv::PriceSeries;
use crate::domain::operator::ComparisonOperator;
use std::sync::Arc;
use tracing::debug;

pub struct TriggerPointDetector {
    engine: Arc<IndicatorEngine>,
    classifier: Arc<CompatibilityClassifier>,
    normalizer: Arc<NormalizationService>,
}

impl TriggerPointDetector {
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

    /// Indices where every condition holds. Computes the indicators the
    /// conditions need in one batch.
    pub fn detect(
        &self,
        prices: &PriceSeries,
        conditions: &[Condition],
    ) -> Result<Vec<usize>, EngineError> {
        let requests = required_indicators(&self.engine, conditions)?;
        let set = self.engine.calculate_batch(prices, &requests)?;
        self.detect_with(prices, conditions, &set)
    }

    /// Like `detect`, reusing indicators already present in `available`.
    pub fn detect_with(
        &self,
        prices: &PriceSeries,
        conditions: &[Condition],
        available: &IndicatorSet,
    ) -> Result<Vec<usize>, EngineError> {
        if conditions.is_empty() {
            return Ok(Vec::new());
        }
        let mut combined = vec![true; prices.len()];
        for condition in conditions {
            let mask = self.condition_mask(prices, condition, available)?;
            for (acc, hit) in combined.iter_mut().zip(mask) {
                *acc &= hit;
            }
        }
        let points: Vec<usize> = combined
            .iter()
            .enumerate()
            .filter_map(|(i, hit)| hit.then_some(i))
            .collect();
        debug!(conditions = conditions.len(), points = points.len(), "trigger points detected");
        Ok(points)
    }

    fn condition_mask(
        &self,
        prices: &PriceSeries,
        condition: &Condition,
        available: &IndicatorSet,
    ) -> Result<Vec<bool>, EngineError> {
        condition.check_operands(&self.classifier)?;
        let n = prices.len();
        let left = self.engine.resolve_series(&condition.variable, prices, available)?;

        let (left, right) = match &condition.target {
            Target::Value(v) => (left.into_owned(), vec![*v; n]),
            Target::Variable(other) => {
                let right = self.engine.resolve_series(other, prices, available)?;
                if self.classifier.needs_normalization(&condition.variable, other) {
                    self.normalizer.normalize_series(
                        &left,
                        condition.variable.comparison_group(),
                        &right,
                        other.comparison_group(),
                        self.normalizer.default_method(),
                    )?
                } else {
                    (left.into_owned(), right.into_owned())
                }
            }
        };

        let mut mask = vec![false; n];
        match condition.operator {
            ComparisonOperator::CrossesAbove | ComparisonOperator::CrossesBelow => {
                let wanted = if condition.operator == ComparisonOperator::CrossesAbove {
                    CrossDirection::Above
                } else {
                    CrossDirection::Below
                };
                for (i, direction) in crossings(&left, &right) {
                    if direction == wanted {
                        mask[i] = true;
                    }
                }
            }
            op => {
                for (i, slot) in mask.iter_mut().enumerate() {
                    *slot = op.compare(left[i], right[i]);
                }
            }
        }
        Ok(mask)
    }
}

/// Distinct indicator requests needed to evaluate `conditions`, in first-use order.
pub fn required_indicators(
    engine: &IndicatorEngine,
    conditions: &[Condition],
) -> Result<Vec<IndicatorRequest>, EngineError> {
    let mut requests: Vec<IndicatorRequest> = Vec::new();
    for condition in conditions {
        let mut push = |request: Option<IndicatorRequest>| {
            if let Some(r) = request {
                if !requests.iter().any(|existing| existing.key() == r.key()) {
                    requests.push(r);
                }
            }
        };
        push(engine.request_for(&condition.variable)?);
        if let Some(other) = condition.target.variable() {
            push(engine.request_for(other)?);
        }
    }
    Ok(requests)
}

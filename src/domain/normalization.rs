//! Normalization of values from different comparison groups onto one scale.
//!
//! Reference statistics are supplied by a `HistoricalRangeProvider`; this
//! module applies them and never derives them.

use crate::domain::error::EngineError;
use crate::domain::variable::ComparisonGroup;
use crate::ports::range_port::HistoricalRangeProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NormalizationMethod {
    MinMax,
    ZScore,
}

impl FromStr for NormalizationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minmax" | "min_max" => Ok(NormalizationMethod::MinMax),
            "zscore" | "z_score" => Ok(NormalizationMethod::ZScore),
            other => Err(format!("unknown normalization method '{other}'")),
        }
    }
}

impl fmt::Display for NormalizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizationMethod::MinMax => f.write_str("minmax"),
            NormalizationMethod::ZScore => f.write_str("zscore"),
        }
    }
}

/// Reference statistics of one comparison group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl ReferenceStats {
    fn apply(&self, value: f64, method: NormalizationMethod) -> Option<f64> {
        match method {
            NormalizationMethod::MinMax => {
                let range = self.max - self.min;
                (range.is_finite() && range > 0.0).then(|| (value - self.min) / range)
            }
            NormalizationMethod::ZScore => (self.std_dev.is_finite() && self.std_dev > 0.0)
                .then(|| (value - self.mean) / self.std_dev),
        }
    }
}

pub struct NormalizationService {
    provider: Arc<dyn HistoricalRangeProvider>,
    default_method: NormalizationMethod,
}

impl NormalizationService {
    pub fn new(
        provider: Arc<dyn HistoricalRangeProvider>,
        default_method: NormalizationMethod,
    ) -> Self {
        Self {
            provider,
            default_method,
        }
    }

    pub fn default_method(&self) -> NormalizationMethod {
        self.default_method
    }

    /// Map both values onto a common scale. Same-group input is returned unchanged.
    pub fn normalize(
        &self,
        value1: f64,
        group1: ComparisonGroup,
        value2: f64,
        group2: ComparisonGroup,
        method: NormalizationMethod,
    ) -> Result<(f64, f64), EngineError> {
        if group1 == group2 {
            return Ok((value1, value2));
        }
        let left = self.scale(value1, group1, group2, method)?;
        let right = self.scale(value2, group2, group1, method)?;
        Ok((left, right))
    }

    /// Normalize two aligned series element-wise. NaN inputs stay NaN.
    pub fn normalize_series(
        &self,
        values1: &[f64],
        group1: ComparisonGroup,
        values2: &[f64],
        group2: ComparisonGroup,
        method: NormalizationMethod,
    ) -> Result<(Vec<f64>, Vec<f64>), EngineError> {
        if group1 == group2 {
            return Ok((values1.to_vec(), values2.to_vec()));
        }
        let left = self.stats_for(group1, group2)?;
        let right = self.stats_for(group2, group1)?;
        let map = |values: &[f64], stats: &ReferenceStats, group, other| {
            values
                .iter()
                .map(|v| {
                    stats
                        .apply(*v, method)
                        .ok_or_else(|| degenerate(group, other, method))
                })
                .collect::<Result<Vec<f64>, EngineError>>()
        };
        Ok((
            map(values1, &left, group1, group2)?,
            map(values2, &right, group2, group1)?,
        ))
    }

    fn scale(
        &self,
        value: f64,
        group: ComparisonGroup,
        other: ComparisonGroup,
        method: NormalizationMethod,
    ) -> Result<f64, EngineError> {
        self.stats_for(group, other)?
            .apply(value, method)
            .ok_or_else(|| degenerate(group, other, method))
    }

    fn stats_for(
        &self,
        group: ComparisonGroup,
        other: ComparisonGroup,
    ) -> Result<ReferenceStats, EngineError> {
        self.provider
            .reference_stats(group)
            .ok_or_else(|| EngineError::UnsupportedGroupPair {
                left: group.to_string(),
                right: other.to_string(),
                reason: format!("no reference statistics for {group}"),
            })
    }
}

fn degenerate(
    group: ComparisonGroup,
    other: ComparisonGroup,
    method: NormalizationMethod,
) -> EngineError {
    EngineError::UnsupportedGroupPair {
        left: group.to_string(),
        right: other.to_string(),
        reason: format!("reference statistics for {group} are degenerate under {method}"),
    }
}

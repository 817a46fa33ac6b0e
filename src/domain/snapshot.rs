//! Point-in-time view of prices and indicator values at one bar.

use crate::domain::error::EngineError;
use crate::domain::indicator::{IndicatorSet, column_name};
use crate::domain::ohlcv::{OhlcvBar, PriceField, PriceSeries};
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::Arc;

/// An indicator column sampled at the snapshot bar and the bar before it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampledValue {
    pub current: f64,
    pub previous: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    bar: OhlcvBar,
    previous_bar: Option<OhlcvBar>,
    indicators: HashMap<String, SampledValue>,
    history: Option<Arc<PriceSeries>>,
}

impl MarketSnapshot {
    /// A snapshot holding only the bar; indicator values are added with
    /// `with_indicator` or computed on demand from `with_history`.
    pub fn new(bar: OhlcvBar) -> Self {
        Self {
            bar,
            previous_bar: None,
            indicators: HashMap::new(),
            history: None,
        }
    }

    /// Snapshot of bar `index`, sampling every column of `indicators` and
    /// keeping the price history up to and including that bar.
    pub fn at(
        series: &PriceSeries,
        indicators: &IndicatorSet,
        index: usize,
    ) -> Result<Self, EngineError> {
        let bar = series.bar(index).ok_or_else(|| EngineError::MissingData {
            what: format!("bar {index} of a {}-bar series", series.len()),
        })?;
        let previous_bar = index.checked_sub(1).and_then(|i| series.bar(i));

        let mut sampled = HashMap::new();
        for (key, output) in indicators.iter() {
            for (field, column) in output.columns() {
                let Some(current) = column.get(index).copied() else {
                    continue;
                };
                let previous = index.checked_sub(1).and_then(|i| column.get(i).copied());
                sampled.insert(column_name(key, field), SampledValue { current, previous });
            }
        }

        Ok(Self {
            bar,
            previous_bar,
            indicators: sampled,
            history: Some(Arc::new(series.prefix(index + 1))),
        })
    }

    pub fn with_previous_bar(mut self, bar: OhlcvBar) -> Self {
        self.previous_bar = Some(bar);
        self
    }

    pub fn with_indicator(mut self, column: &str, current: f64, previous: Option<f64>) -> Self {
        self.indicators
            .insert(column.to_string(), SampledValue { current, previous });
        self
    }

    pub fn with_history(mut self, history: Arc<PriceSeries>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.bar.timestamp
    }

    pub fn bar(&self) -> &OhlcvBar {
        &self.bar
    }

    pub fn price(&self, field: PriceField) -> SampledValue {
        SampledValue {
            current: field.of(&self.bar),
            previous: self.previous_bar.as_ref().map(|b| field.of(b)),
        }
    }

    pub fn indicator(&self, column: &str) -> Option<SampledValue> {
        self.indicators.get(column).copied()
    }

    /// Prices up to and including the snapshot bar, when known.
    pub fn history(&self) -> Option<&PriceSeries> {
        self.history.as_deref()
    }
}

//! Indicator calculation engine.
//!
//! This module provides:
//! - `IndicatorOutput`: the aligned output columns of one indicator run
//! - `IndicatorField`: which column of a multi-output indicator to read
//! - `IndicatorRequest`: indicator name + parameters (its key names the result)
//! - `IndicatorSet`: the results of one batch, keyed by request key
//! - `IndicatorEngine`: a registration table mapping name to a pure function
//!
//! Every output column has the same length as the input series; warm-up
//! positions hold NaN.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod obv;
pub mod roc;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod stochastic;
pub mod wma;

use crate::domain::error::EngineError;
use crate::domain::ohlcv::{PriceField, PriceSeries};
use crate::domain::variable::{Parameters, TradingVariable, format_params};
use crate::ports::cache_port::{CacheKey, IndicatorCache};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndicatorField {
    Value,
    MacdLine,
    MacdSignal,
    MacdHistogram,
    BollingerUpper,
    BollingerMiddle,
    BollingerLower,
    StochasticK,
    StochasticD,
}

impl IndicatorField {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorField::Value => "value",
            IndicatorField::MacdLine => "line",
            IndicatorField::MacdSignal => "signal",
            IndicatorField::MacdHistogram => "histogram",
            IndicatorField::BollingerUpper => "upper",
            IndicatorField::BollingerMiddle => "middle",
            IndicatorField::BollingerLower => "lower",
            IndicatorField::StochasticK => "k",
            IndicatorField::StochasticD => "d",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorOutput {
    Single(Vec<f64>),
    Macd {
        line: Vec<f64>,
        signal: Vec<f64>,
        histogram: Vec<f64>,
    },
    Bollinger {
        upper: Vec<f64>,
        middle: Vec<f64>,
        lower: Vec<f64>,
    },
    Stochastic {
        k: Vec<f64>,
        d: Vec<f64>,
    },
}

impl IndicatorOutput {
    pub fn len(&self) -> usize {
        self.columns().first().map(|(_, c)| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn field(&self, field: IndicatorField) -> Option<&[f64]> {
        self.columns()
            .into_iter()
            .find(|(f, _)| *f == field)
            .map(|(_, c)| c)
    }

    pub fn columns(&self) -> Vec<(IndicatorField, &[f64])> {
        match self {
            IndicatorOutput::Single(values) => vec![(IndicatorField::Value, values.as_slice())],
            IndicatorOutput::Macd {
                line,
                signal,
                histogram,
            } => vec![
                (IndicatorField::MacdLine, line.as_slice()),
                (IndicatorField::MacdSignal, signal.as_slice()),
                (IndicatorField::MacdHistogram, histogram.as_slice()),
            ],
            IndicatorOutput::Bollinger {
                upper,
                middle,
                lower,
            } => vec![
                (IndicatorField::BollingerUpper, upper.as_slice()),
                (IndicatorField::BollingerMiddle, middle.as_slice()),
                (IndicatorField::BollingerLower, lower.as_slice()),
            ],
            IndicatorOutput::Stochastic { k, d } => vec![
                (IndicatorField::StochasticK, k.as_slice()),
                (IndicatorField::StochasticD, d.as_slice()),
            ],
        }
    }
}

/// Name of one output column: `SMA(period=5)` for single-output indicators,
/// `MACD.signal` style for multi-output ones.
pub fn column_name(indicator_key: &str, field: IndicatorField) -> String {
    match field {
        IndicatorField::Value => indicator_key.to_string(),
        other => format!("{indicator_key}.{}", other.as_str()),
    }
}

/// A named indicator with parameters. Names are stored upper-case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRequest {
    pub name: String,
    pub params: Parameters,
}

impl IndicatorRequest {
    pub fn new(name: &str, params: Parameters) -> Self {
        Self {
            name: name.trim().to_ascii_uppercase(),
            params,
        }
    }

    /// Canonical key, e.g. `SMA(period=5)`.
    pub fn key(&self) -> String {
        format!("{}{}", self.name, format_params(&self.params))
    }
}

impl fmt::Display for IndicatorRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Indicator results of one series, keyed by request key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorSet {
    outputs: HashMap<String, IndicatorOutput>,
}

impl IndicatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, request: &IndicatorRequest, output: IndicatorOutput) {
        self.outputs.insert(request.key(), output);
    }

    pub fn get(&self, request: &IndicatorRequest) -> Option<&IndicatorOutput> {
        self.outputs.get(&request.key())
    }

    pub fn contains(&self, request: &IndicatorRequest) -> bool {
        self.outputs.contains_key(&request.key())
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &IndicatorOutput)> {
        self.outputs.iter()
    }

    /// One named column per output, see `column_name`.
    pub fn columns(&self) -> BTreeMap<String, Vec<f64>> {
        let mut out = BTreeMap::new();
        for (key, output) in &self.outputs {
            for (field, column) in output.columns() {
                out.insert(column_name(key, field), column.to_vec());
            }
        }
        out
    }
}

/// Results of a batch where some requests may have failed.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub computed: IndicatorSet,
    pub failures: Vec<(String, EngineError)>,
}

/// Where a variable's values come from.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableSource {
    Price(PriceField),
    Indicator {
        request: IndicatorRequest,
        field: IndicatorField,
    },
}

const VARIABLE_SOURCES: &[(&str, &str, IndicatorField)] = &[
    ("sma", "SMA", IndicatorField::Value),
    ("ema", "EMA", IndicatorField::Value),
    ("wma", "WMA", IndicatorField::Value),
    ("rsi", "RSI", IndicatorField::Value),
    ("roc", "ROC", IndicatorField::Value),
    ("stddev", "STDDEV", IndicatorField::Value),
    ("obv", "OBV", IndicatorField::Value),
    ("macd", "MACD", IndicatorField::MacdLine),
    ("macd_line", "MACD", IndicatorField::MacdLine),
    ("macd_signal", "MACD", IndicatorField::MacdSignal),
    ("macd_histogram", "MACD", IndicatorField::MacdHistogram),
    ("bb_upper", "BOLLINGER", IndicatorField::BollingerUpper),
    ("bb_middle", "BOLLINGER", IndicatorField::BollingerMiddle),
    ("bb_lower", "BOLLINGER", IndicatorField::BollingerLower),
    ("stochastic", "STOCHASTIC", IndicatorField::StochasticK),
    ("stoch_k", "STOCHASTIC", IndicatorField::StochasticK),
    ("stoch_d", "STOCHASTIC", IndicatorField::StochasticD),
];

pub type IndicatorFn = fn(&PriceSeries, &Parameters) -> Result<IndicatorOutput, EngineError>;

pub struct IndicatorEngine {
    registry: HashMap<String, IndicatorFn>,
    cache: Option<Arc<dyn IndicatorCache>>,
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl IndicatorEngine {
    /// An engine with an empty registration table.
    pub fn new() -> Self {
        Self {
            registry: HashMap::new(),
            cache: None,
        }
    }

    pub fn with_defaults() -> Self {
        let mut engine = Self::new();
        engine.register("SMA", sma_fn);
        engine.register("EMA", ema_fn);
        engine.register("WMA", wma_fn);
        engine.register("RSI", rsi_fn);
        engine.register("MACD", macd_fn);
        engine.register("BOLLINGER", bollinger_fn);
        engine.register("STOCHASTIC", stochastic_fn);
        engine.register("ROC", roc_fn);
        engine.register("STDDEV", stddev_fn);
        engine.register("OBV", obv_fn);
        engine
    }

    /// Consult `cache` before computing. The engine never writes to it.
    pub fn with_cache(mut self, cache: Arc<dyn IndicatorCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn register(&mut self, name: &str, function: IndicatorFn) {
        self.registry.insert(name.trim().to_ascii_uppercase(), function);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains_key(&name.trim().to_ascii_uppercase())
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.registry.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn calculate(
        &self,
        name: &str,
        series: &PriceSeries,
        params: &Parameters,
    ) -> Result<IndicatorOutput, EngineError> {
        self.calculate_request(&IndicatorRequest::new(name, params.clone()), series)
    }

    pub fn calculate_request(
        &self,
        request: &IndicatorRequest,
        series: &PriceSeries,
    ) -> Result<IndicatorOutput, EngineError> {
        self.compute(request, series, None)
    }

    /// Compute several indicators over one series, failing on the first error
    /// in request order.
    pub fn calculate_batch(
        &self,
        series: &PriceSeries,
        requests: &[IndicatorRequest],
    ) -> Result<IndicatorSet, EngineError> {
        let outcome = self.calculate_batch_partial(series, requests);
        match outcome.failures.into_iter().next() {
            Some((_, err)) => Err(err),
            None => Ok(outcome.computed),
        }
    }

    /// Compute several indicators over one series, keeping whatever succeeded.
    /// Duplicate requests are computed once; distinct ones run in parallel.
    pub fn calculate_batch_partial(
        &self,
        series: &PriceSeries,
        requests: &[IndicatorRequest],
    ) -> BatchOutcome {
        let mut seen = HashSet::new();
        let unique: Vec<&IndicatorRequest> = requests
            .iter()
            .filter(|r| seen.insert(r.key()))
            .collect();

        let fingerprint = self.cache.as_ref().map(|_| series.fingerprint());
        let results: Vec<(&IndicatorRequest, Result<IndicatorOutput, EngineError>)> = unique
            .par_iter()
            .map(|req| (*req, self.compute(req, series, fingerprint.as_deref())))
            .collect();

        let mut outcome = BatchOutcome::default();
        for (request, result) in results {
            match result {
                Ok(output) => outcome.computed.insert(request, output),
                Err(err) => outcome.failures.push((request.key(), err)),
            }
        }
        debug!(
            computed = outcome.computed.len(),
            failed = outcome.failures.len(),
            "indicator batch finished"
        );
        outcome
    }

    /// Resolve where a variable's values come from.
    pub fn source_of(&self, variable: &TradingVariable) -> Result<VariableSource, EngineError> {
        let id = variable.variable_id();
        if let Some(field) = PriceField::from_id(id) {
            return Ok(VariableSource::Price(field));
        }
        if let Some((_, name, field)) = VARIABLE_SOURCES.iter().find(|(v, _, _)| *v == id) {
            return Ok(VariableSource::Indicator {
                request: IndicatorRequest::new(name, variable.parameters().clone()),
                field: *field,
            });
        }
        if self.contains(id) {
            return Ok(VariableSource::Indicator {
                request: IndicatorRequest::new(id, variable.parameters().clone()),
                field: IndicatorField::Value,
            });
        }
        Err(EngineError::UnknownVariable {
            variable_id: id.to_string(),
        })
    }

    /// The indicator a variable needs, or `None` for price fields.
    pub fn request_for(
        &self,
        variable: &TradingVariable,
    ) -> Result<Option<IndicatorRequest>, EngineError> {
        Ok(match self.source_of(variable)? {
            VariableSource::Price(_) => None,
            VariableSource::Indicator { request, .. } => Some(request),
        })
    }

    /// Full aligned column for a variable, reusing `available` when it already
    /// holds the indicator.
    pub fn resolve_series<'a>(
        &self,
        variable: &TradingVariable,
        series: &'a PriceSeries,
        available: &'a IndicatorSet,
    ) -> Result<Cow<'a, [f64]>, EngineError> {
        match self.source_of(variable)? {
            VariableSource::Price(field) => Ok(Cow::Borrowed(series.column(field))),
            VariableSource::Indicator { request, field } => {
                if let Some(output) = available.get(&request) {
                    return field_of(output, field, &request).map(Cow::Borrowed);
                }
                let output = self.calculate_request(&request, series)?;
                field_of(&output, field, &request).map(|c| Cow::Owned(c.to_vec()))
            }
        }
    }

    fn compute(
        &self,
        request: &IndicatorRequest,
        series: &PriceSeries,
        fingerprint: Option<&str>,
    ) -> Result<IndicatorOutput, EngineError> {
        let function = self
            .registry
            .get(&request.name)
            .ok_or_else(|| EngineError::UnknownIndicator {
                name: request.name.clone(),
            })?;

        if let Some(cache) = &self.cache {
            let key = CacheKey {
                indicator: request.key(),
                fingerprint: fingerprint
                    .map(str::to_string)
                    .unwrap_or_else(|| series.fingerprint()),
            };
            if let Some(hit) = cache.get(&key) {
                if hit.len() == series.len() {
                    debug!(indicator = %key.indicator, "indicator cache hit");
                    return Ok(hit);
                }
            }
        }

        let output = function(series, &request.params)?;
        debug!(indicator = %request, len = series.len(), "indicator computed");
        Ok(output)
    }
}

fn field_of<'o>(
    output: &'o IndicatorOutput,
    field: IndicatorField,
    request: &IndicatorRequest,
) -> Result<&'o [f64], EngineError> {
    output.field(field).ok_or_else(|| {
        EngineError::invalid_param(&request.name, field.as_str(), "indicator has no such output")
    })
}

fn check_params(indicator: &str, params: &Parameters, allowed: &[&str]) -> Result<(), EngineError> {
    match params.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(unknown) => Err(EngineError::invalid_param(indicator, unknown, "unknown parameter")),
        None => Ok(()),
    }
}

fn period_param(
    indicator: &str,
    params: &Parameters,
    name: &str,
    default: usize,
) -> Result<usize, EngineError> {
    let value = params.get(name).copied().unwrap_or(default as f64);
    if !value.is_finite() || value < 1.0 || value.fract() != 0.0 {
        return Err(EngineError::invalid_param(
            indicator,
            name,
            format!("expected a positive integer, got {value}"),
        ));
    }
    Ok(value as usize)
}

fn float_param(
    indicator: &str,
    params: &Parameters,
    name: &str,
    default: f64,
) -> Result<f64, EngineError> {
    let value = params.get(name).copied().unwrap_or(default);
    if !value.is_finite() || value <= 0.0 {
        return Err(EngineError::invalid_param(
            indicator,
            name,
            format!("expected a positive number, got {value}"),
        ));
    }
    Ok(value)
}

fn require(
    indicator: &str,
    params: &Parameters,
    available: usize,
    required: usize,
) -> Result<(), EngineError> {
    if available < required {
        return Err(EngineError::InsufficientData {
            indicator: format!("{indicator}{}", format_params(params)),
            available,
            required,
        });
    }
    Ok(())
}

fn sma_fn(series: &PriceSeries, params: &Parameters) -> Result<IndicatorOutput, EngineError> {
    check_params("SMA", params, &["period"])?;
    let period = period_param("SMA", params, "period", 20)?;
    require("SMA", params, series.len(), period)?;
    Ok(IndicatorOutput::Single(sma::calculate_sma(&series.close, period)))
}

fn ema_fn(series: &PriceSeries, params: &Parameters) -> Result<IndicatorOutput, EngineError> {
    check_params("EMA", params, &["period"])?;
    let period = period_param("EMA", params, "period", 20)?;
    require("EMA", params, series.len(), period)?;
    Ok(IndicatorOutput::Single(ema::calculate_ema(&series.close, period)))
}

fn wma_fn(series: &PriceSeries, params: &Parameters) -> Result<IndicatorOutput, EngineError> {
    check_params("WMA", params, &["period"])?;
    let period = period_param("WMA", params, "period", 20)?;
    require("WMA", params, series.len(), period)?;
    Ok(IndicatorOutput::Single(wma::calculate_wma(&series.close, period)))
}

fn rsi_fn(series: &PriceSeries, params: &Parameters) -> Result<IndicatorOutput, EngineError> {
    check_params("RSI", params, &["period"])?;
    let period = period_param("RSI", params, "period", 14)?;
    require("RSI", params, series.len(), period + 1)?;
    Ok(IndicatorOutput::Single(rsi::calculate_rsi(&series.close, period)))
}

fn macd_fn(series: &PriceSeries, params: &Parameters) -> Result<IndicatorOutput, EngineError> {
    check_params("MACD", params, &["fast", "slow", "signal"])?;
    let fast = period_param("MACD", params, "fast", macd::DEFAULT_FAST)?;
    let slow = period_param("MACD", params, "slow", macd::DEFAULT_SLOW)?;
    let signal = period_param("MACD", params, "signal", macd::DEFAULT_SIGNAL)?;
    if fast >= slow {
        return Err(EngineError::invalid_param(
            "MACD",
            "fast",
            format!("fast ({fast}) must be shorter than slow ({slow})"),
        ));
    }
    require("MACD", params, series.len(), slow + signal - 1)?;
    let lines = macd::calculate_macd(&series.close, fast, slow, signal);
    Ok(IndicatorOutput::Macd {
        line: lines.line,
        signal: lines.signal,
        histogram: lines.histogram,
    })
}

fn bollinger_fn(series: &PriceSeries, params: &Parameters) -> Result<IndicatorOutput, EngineError> {
    check_params("BOLLINGER", params, &["period", "std_dev"])?;
    let period = period_param("BOLLINGER", params, "period", 20)?;
    let multiplier = float_param("BOLLINGER", params, "std_dev", 2.0)?;
    require("BOLLINGER", params, series.len(), period)?;
    let bands = bollinger::calculate_bollinger(&series.close, period, multiplier);
    Ok(IndicatorOutput::Bollinger {
        upper: bands.upper,
        middle: bands.middle,
        lower: bands.lower,
    })
}

fn stochastic_fn(
    series: &PriceSeries,
    params: &Parameters,
) -> Result<IndicatorOutput, EngineError> {
    check_params("STOCHASTIC", params, &["k_period", "d_period"])?;
    let k_period = period_param("STOCHASTIC", params, "k_period", 14)?;
    let d_period = period_param("STOCHASTIC", params, "d_period", 3)?;
    require("STOCHASTIC", params, series.len(), k_period + d_period - 1)?;
    let lines = stochastic::calculate_stochastic(
        &series.high,
        &series.low,
        &series.close,
        k_period,
        d_period,
    );
    Ok(IndicatorOutput::Stochastic {
        k: lines.k,
        d: lines.d,
    })
}

fn roc_fn(series: &PriceSeries, params: &Parameters) -> Result<IndicatorOutput, EngineError> {
    check_params("ROC", params, &["period"])?;
    let period = period_param("ROC", params, "period", 12)?;
    require("ROC", params, series.len(), period + 1)?;
    Ok(IndicatorOutput::Single(roc::calculate_roc(&series.close, period)))
}

fn stddev_fn(series: &PriceSeries, params: &Parameters) -> Result<IndicatorOutput, EngineError> {
    check_params("STDDEV", params, &["period"])?;
    let period = period_param("STDDEV", params, "period", 20)?;
    require("STDDEV", params, series.len(), period)?;
    Ok(IndicatorOutput::Single(stddev::calculate_stddev(&series.close, period)))
}

fn obv_fn(series: &PriceSeries, params: &Parameters) -> Result<IndicatorOutput, EngineError> {
    check_params("OBV", params, &[])?;
    require("OBV", params, series.len(), 1)?;
    Ok(IndicatorOutput::Single(obv::calculate_obv(&series.close, &series.volume)))
}

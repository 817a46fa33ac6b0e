//! Trading variables and their category labels.
//!
//! A variable carries three independent labels:
//! - `PurposeCategory`: what the variable measures (advisory for compatibility)
//! - `ChartCategory`: where it is drawn (display only)
//! - `ComparisonGroup`: which raw values are numerically comparable (decisive)

use crate::domain::error::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Named numeric parameters, ordered so that keys render deterministically.
pub type Parameters = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurposeCategory {
    Trend,
    Momentum,
    Volatility,
    Volume,
    Price,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartCategory {
    Overlay,
    Subplot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonGroup {
    PriceComparable,
    PercentageComparable,
    ZeroCentered,
    VolumeBased,
}

impl PurposeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurposeCategory::Trend => "trend",
            PurposeCategory::Momentum => "momentum",
            PurposeCategory::Volatility => "volatility",
            PurposeCategory::Volume => "volume",
            PurposeCategory::Price => "price",
        }
    }
}

impl ChartCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartCategory::Overlay => "overlay",
            ChartCategory::Subplot => "subplot",
        }
    }
}

impl ComparisonGroup {
    pub const ALL: [ComparisonGroup; 4] = [
        ComparisonGroup::PriceComparable,
        ComparisonGroup::PercentageComparable,
        ComparisonGroup::ZeroCentered,
        ComparisonGroup::VolumeBased,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonGroup::PriceComparable => "price_comparable",
            ComparisonGroup::PercentageComparable => "percentage_comparable",
            ComparisonGroup::ZeroCentered => "zero_centered",
            ComparisonGroup::VolumeBased => "volume_based",
        }
    }
}

impl FromStr for PurposeCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trend" => Ok(PurposeCategory::Trend),
            "momentum" => Ok(PurposeCategory::Momentum),
            "volatility" => Ok(PurposeCategory::Volatility),
            "volume" => Ok(PurposeCategory::Volume),
            "price" => Ok(PurposeCategory::Price),
            other => Err(format!("unknown purpose category '{other}'")),
        }
    }
}

impl FromStr for ChartCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overlay" => Ok(ChartCategory::Overlay),
            "subplot" => Ok(ChartCategory::Subplot),
            other => Err(format!("unknown chart category '{other}'")),
        }
    }
}

impl FromStr for ComparisonGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "price_comparable" => Ok(ComparisonGroup::PriceComparable),
            "percentage_comparable" => Ok(ComparisonGroup::PercentageComparable),
            "zero_centered" => Ok(ComparisonGroup::ZeroCentered),
            "volume_based" => Ok(ComparisonGroup::VolumeBased),
            other => Err(format!("unknown comparison group '{other}'")),
        }
    }
}

impl fmt::Display for PurposeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ChartCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ComparisonGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable trading variable definition. Equality is by id and parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingVariable {
    variable_id: String,
    display_name: String,
    purpose_category: PurposeCategory,
    chart_category: ChartCategory,
    comparison_group: ComparisonGroup,
    parameters: Parameters,
}

impl TradingVariable {
    pub fn new(
        variable_id: &str,
        display_name: &str,
        purpose_category: PurposeCategory,
        chart_category: ChartCategory,
        comparison_group: ComparisonGroup,
    ) -> Result<Self, EngineError> {
        let id = variable_id.trim();
        if id.is_empty()
            || !id
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(EngineError::UnknownVariable {
                variable_id: variable_id.to_string(),
            });
        }
        Ok(Self {
            variable_id: id.to_string(),
            display_name: display_name.to_string(),
            purpose_category,
            chart_category,
            comparison_group,
            parameters: Parameters::new(),
        })
    }

    /// Returns a copy with `params` merged over the current parameters.
    pub fn with_params(&self, params: &Parameters) -> Self {
        let mut merged = self.parameters.clone();
        for (k, v) in params {
            merged.insert(k.clone(), *v);
        }
        Self {
            parameters: merged,
            ..self.clone()
        }
    }

    pub fn with_param(&self, name: &str, value: f64) -> Self {
        let mut params = Parameters::new();
        params.insert(name.to_string(), value);
        self.with_params(&params)
    }

    pub fn variable_id(&self) -> &str {
        &self.variable_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn purpose_category(&self) -> PurposeCategory {
        self.purpose_category
    }

    pub fn chart_category(&self) -> ChartCategory {
        self.chart_category
    }

    pub fn comparison_group(&self) -> ComparisonGroup {
        self.comparison_group
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Canonical key, e.g. `sma(period=5)` or `close`.
    pub fn key(&self) -> String {
        format!("{}{}", self.variable_id, format_params(&self.parameters))
    }
}

impl PartialEq for TradingVariable {
    fn eq(&self, other: &Self) -> bool {
        self.variable_id == other.variable_id && self.parameters == other.parameters
    }
}

impl fmt::Display for TradingVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Render parameters as `(a=1,b=2)`, or nothing when empty.
pub fn format_params(params: &Parameters) -> String {
    if params.is_empty() {
        return String::new();
    }
    let inner: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("({})", inner.join(","))
}

/// The externally supplied set of known variables.
#[derive(Debug, Clone, Default)]
pub struct VariableCatalog {
    variables: BTreeMap<String, TradingVariable>,
}

impl VariableCatalog {
    pub fn new(variables: Vec<TradingVariable>) -> Result<Self, EngineError> {
        let mut map = BTreeMap::new();
        for var in variables {
            let id = var.variable_id().to_string();
            if map.insert(id.clone(), var).is_some() {
                return Err(EngineError::config_invalid(
                    &format!("variable.{id}"),
                    "id",
                    "variable defined more than once",
                ));
            }
        }
        Ok(Self { variables: map })
    }

    pub fn lookup(&self, variable_id: &str) -> Result<&TradingVariable, EngineError> {
        self.variables
            .get(variable_id)
            .ok_or_else(|| EngineError::UnknownVariable {
                variable_id: variable_id.to_string(),
            })
    }

    /// Catalog entry with `params` applied over its default parameters.
    pub fn resolve(
        &self,
        variable_id: &str,
        params: &Parameters,
    ) -> Result<TradingVariable, EngineError> {
        Ok(self.lookup(variable_id)?.with_params(params))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TradingVariable> {
        self.variables.values()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sma() -> TradingVariable {
        TradingVariable::new(
            "sma",
            "Simple Moving Average",
            PurposeCategory::Trend,
            ChartCategory::Overlay,
            ComparisonGroup::PriceComparable,
        )
        .unwrap()
    }

    #[test]
    fn equality_ignores_labels() {
        let a = sma().with_param("period", 5.0);
        let b = TradingVariable::new(
            "sma",
            "SMA",
            PurposeCategory::Trend,
            ChartCategory::Subplot,
            ComparisonGroup::PriceComparable,
        )
        .unwrap()
        .with_param("period", 5.0);
        assert_eq!(a, b);
        assert_ne!(a, sma().with_param("period", 6.0));
    }

    #[test]
    fn key_includes_sorted_params() {
        let v = sma().with_param("period", 5.0).with_param("offset", 1.0);
        assert_eq!(v.key(), "sma(offset=1,period=5)");
        assert_eq!(sma().key(), "sma");
    }

    #[test]
    fn with_params_does_not_mutate_original() {
        let base = sma();
        let derived = base.with_param("period", 10.0);
        assert!(base.parameters().is_empty());
        assert_eq!(derived.parameters().get("period"), Some(&10.0));
    }

    #[test]
    fn new_rejects_bad_ids() {
        for id in ["", "SMA", "sma-5", "sma 5"] {
            let result = TradingVariable::new(
                id,
                "x",
                PurposeCategory::Trend,
                ChartCategory::Overlay,
                ComparisonGroup::PriceComparable,
            );
            assert!(result.is_err(), "{id:?} should be rejected");
        }
    }

    #[test]
    fn category_parsing() {
        assert_eq!(
            "Percentage_Comparable".parse::<ComparisonGroup>(),
            Ok(ComparisonGroup::PercentageComparable)
        );
        assert_eq!("overlay".parse::<ChartCategory>(), Ok(ChartCategory::Overlay));
        assert_eq!("momentum".parse::<PurposeCategory>(), Ok(PurposeCategory::Momentum));
        assert!("sideways".parse::<PurposeCategory>().is_err());
    }

    #[test]
    fn catalog_lookup_and_resolve() {
        let catalog = VariableCatalog::new(vec![sma().with_param("period", 20.0)]).unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.lookup("sma").is_ok());
        assert!(matches!(
            catalog.lookup("rsi"),
            Err(EngineError::UnknownVariable { .. })
        ));

        let mut params = Parameters::new();
        params.insert("period".into(), 5.0);
        let resolved = catalog.resolve("sma", &params).unwrap();
        assert_eq!(resolved.key(), "sma(period=5)");
    }

    #[test]
    fn catalog_rejects_duplicates() {
        let result = VariableCatalog::new(vec![sma(), sma()]);
        assert!(matches!(result, Err(EngineError::ConfigInvalid { .. })));
    }
}

//! Variable compatibility classification.
//!
//! The comparison group decides; the purpose category only advises; the chart
//! category is never consulted. Rules come from an injected, symmetric
//! `RuleTable` rather than being hard-coded.

use crate::domain::error::EngineError;
use crate::domain::variable::{ComparisonGroup, PurposeCategory, TradingVariable};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Ordered by restrictiveness: `Compatible < Warning < Incompatible`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompatibilityLevel {
    Compatible,
    Warning,
    Incompatible,
}

impl CompatibilityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompatibilityLevel::Compatible => "compatible",
            CompatibilityLevel::Warning => "warning",
            CompatibilityLevel::Incompatible => "incompatible",
        }
    }
}

impl FromStr for CompatibilityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compatible" => Ok(CompatibilityLevel::Compatible),
            "warning" => Ok(CompatibilityLevel::Warning),
            "incompatible" => Ok(CompatibilityLevel::Incompatible),
            other => Err(format!("unknown compatibility level '{other}'")),
        }
    }
}

impl fmt::Display for CompatibilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityResult {
    pub level: CompatibilityLevel,
    pub message: String,
    pub warnings: Vec<String>,
}

impl CompatibilityResult {
    pub fn is_compatible(&self) -> bool {
        self.level != CompatibilityLevel::Incompatible
    }
}

fn ordered<T: Ord>(a: T, b: T) -> (T, T) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Symmetric group matrix plus purpose advisories.
#[derive(Debug, Clone)]
pub struct RuleTable {
    groups: HashMap<(ComparisonGroup, ComparisonGroup), CompatibilityLevel>,
    advisories: HashMap<(PurposeCategory, PurposeCategory), String>,
    default_level: CompatibilityLevel,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self {
            groups: HashMap::new(),
            advisories: HashMap::new(),
            default_level: CompatibilityLevel::Incompatible,
        }
    }
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Level used for cross-group pairs with no explicit cell.
    pub fn with_default_level(mut self, level: CompatibilityLevel) -> Self {
        self.default_level = level;
        self
    }

    /// Declare the cell for an unordered group pair. Re-declaring a pair with a
    /// different level is rejected so the matrix stays symmetric.
    pub fn set_group_rule(
        &mut self,
        a: ComparisonGroup,
        b: ComparisonGroup,
        level: CompatibilityLevel,
    ) -> Result<(), EngineError> {
        if a == b && level != CompatibilityLevel::Compatible {
            return Err(EngineError::config_invalid(
                "comparison_groups",
                &format!("{a}.{b}"),
                "a group is always compatible with itself",
            ));
        }
        let key = ordered(a, b);
        match self.groups.get(&key) {
            Some(existing) if *existing != level => Err(EngineError::config_invalid(
                "comparison_groups",
                &format!("{}.{}", key.0, key.1),
                format!("declared as both {existing} and {level}"),
            )),
            _ => {
                self.groups.insert(key, level);
                Ok(())
            }
        }
    }

    pub fn set_advisory(&mut self, a: PurposeCategory, b: PurposeCategory, message: &str) {
        self.advisories.insert(ordered(a, b), message.to_string());
    }

    pub fn group_level(&self, a: ComparisonGroup, b: ComparisonGroup) -> CompatibilityLevel {
        if a == b {
            return CompatibilityLevel::Compatible;
        }
        self.groups
            .get(&ordered(a, b))
            .copied()
            .unwrap_or(self.default_level)
    }

    pub fn advisory(&self, a: PurposeCategory, b: PurposeCategory) -> Option<&str> {
        self.advisories.get(&ordered(a, b)).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct CompatibilityClassifier {
    rules: RuleTable,
}

impl CompatibilityClassifier {
    pub fn new(rules: RuleTable) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn check_group(&self, a: ComparisonGroup, b: ComparisonGroup) -> CompatibilityLevel {
        self.rules.group_level(a, b)
    }

    /// Whether `a` and `b` must be rescaled before comparison. Only the
    /// group table decides this; purpose advisories never do.
    pub fn needs_normalization(&self, a: &TradingVariable, b: &TradingVariable) -> bool {
        self.check_group(a.comparison_group(), b.comparison_group()) == CompatibilityLevel::Warning
    }

    pub fn check_pair(&self, a: &TradingVariable, b: &TradingVariable) -> CompatibilityResult {
        self.check(std::slice::from_ref(a), b)
    }

    pub fn check(
        &self,
        existing: &[TradingVariable],
        candidate: &TradingVariable,
    ) -> CompatibilityResult {
        if existing.is_empty() {
            return CompatibilityResult {
                level: CompatibilityLevel::Compatible,
                message: "first variable".to_string(),
                warnings: Vec::new(),
            };
        }

        let mut level = CompatibilityLevel::Compatible;
        let mut warnings = Vec::new();

        for other in existing {
            let (g_other, g_cand) = (other.comparison_group(), candidate.comparison_group());
            match self.rules.group_level(g_other, g_cand) {
                CompatibilityLevel::Incompatible => {
                    debug!(existing = %other, candidate = %candidate, "incompatible groups");
                    return CompatibilityResult {
                        level: CompatibilityLevel::Incompatible,
                        message: format!(
                            "{} ({}) cannot be compared with {} ({})",
                            candidate, g_cand, other, g_other
                        ),
                        warnings,
                    };
                }
                CompatibilityLevel::Warning => {
                    level = level.max(CompatibilityLevel::Warning);
                    warnings.push(format!(
                        "{} ({}) and {} ({}) are comparable only after normalization",
                        other, g_other, candidate, g_cand
                    ));
                }
                CompatibilityLevel::Compatible => {}
            }

            let (p_other, p_cand) = (other.purpose_category(), candidate.purpose_category());
            if let Some(advice) = self.rules.advisory(p_other, p_cand) {
                level = level.max(CompatibilityLevel::Warning);
                warnings.push(format!("{} vs {}: {}", p_other, p_cand, advice));
            }
        }

        let message = match level {
            CompatibilityLevel::Compatible => {
                format!("compatible with {} existing variable(s)", existing.len())
            }
            _ => format!(
                "compatible with {} existing variable(s), {} warning(s)",
                existing.len(),
                warnings.len()
            ),
        };

        CompatibilityResult {
            level,
            message,
            warnings,
        }
    }
}

//! Comparison operators and their numeric semantics.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Absolute tolerance for `EQ` / `NEQ`.
pub const EQ_EPSILON: f64 = 1e-6;

/// Relative tolerance for `APPROX_EQ`, as a fraction of the larger magnitude.
pub const APPROX_TOLERANCE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonOperator {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Neq,
    ApproxEq,
    CrossesAbove,
    CrossesBelow,
}

impl ComparisonOperator {
    pub fn is_crossing(&self) -> bool {
        matches!(
            self,
            ComparisonOperator::CrossesAbove | ComparisonOperator::CrossesBelow
        )
    }

    /// Point comparison. Any NaN operand compares false, crossing operators
    /// always return false here (they need two samples, see `cross_signal`).
    pub fn compare(&self, value: f64, target: f64) -> bool {
        if value.is_nan() || target.is_nan() {
            return false;
        }
        match self {
            ComparisonOperator::Gt => value > target,
            ComparisonOperator::Lt => value < target,
            ComparisonOperator::Ge => value >= target,
            ComparisonOperator::Le => value <= target,
            ComparisonOperator::Eq => (value - target).abs() < EQ_EPSILON,
            ComparisonOperator::Neq => (value - target).abs() >= EQ_EPSILON,
            ComparisonOperator::ApproxEq => {
                let scale = value.abs().max(target.abs());
                (value - target).abs() <= APPROX_TOLERANCE * scale
            }
            ComparisonOperator::CrossesAbove | ComparisonOperator::CrossesBelow => false,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOperator::Gt => ">",
            ComparisonOperator::Lt => "<",
            ComparisonOperator::Ge => ">=",
            ComparisonOperator::Le => "<=",
            ComparisonOperator::Eq => "==",
            ComparisonOperator::Neq => "!=",
            ComparisonOperator::ApproxEq => "~=",
            ComparisonOperator::CrossesAbove => "crosses_above",
            ComparisonOperator::CrossesBelow => "crosses_below",
        }
    }
}

impl FromStr for ComparisonOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            ">" | "gt" => Ok(ComparisonOperator::Gt),
            "<" | "lt" => Ok(ComparisonOperator::Lt),
            ">=" | "ge" => Ok(ComparisonOperator::Ge),
            "<=" | "le" => Ok(ComparisonOperator::Le),
            "==" | "eq" => Ok(ComparisonOperator::Eq),
            "!=" | "neq" => Ok(ComparisonOperator::Neq),
            "~=" | "approx_eq" => Ok(ComparisonOperator::ApproxEq),
            "crosses_above" => Ok(ComparisonOperator::CrossesAbove),
            "crosses_below" => Ok(ComparisonOperator::CrossesBelow),
            other => Err(format!("unknown operator '{other}'")),
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

//! A single comparison between a variable and a literal or another variable.

use crate::domain::compatibility::{
    CompatibilityClassifier, CompatibilityLevel, CompatibilityResult,
};
use crate::domain::error::EngineError;
use crate::domain::operator::ComparisonOperator;
use crate::domain::variable::TradingVariable;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Value(f64),
    Variable(TradingVariable),
}

impl Target {
    pub fn variable(&self) -> Option<&TradingVariable> {
        match self {
            Target::Variable(v) => Some(v),
            Target::Value(_) => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Value(v) => write!(f, "{v}"),
            Target::Variable(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub variable: TradingVariable,
    pub operator: ComparisonOperator,
    pub target: Target,
}

impl Condition {
    pub fn new(variable: TradingVariable, operator: ComparisonOperator, target: Target) -> Self {
        Self {
            variable,
            operator,
            target,
        }
    }

    pub fn threshold(variable: TradingVariable, operator: ComparisonOperator, value: f64) -> Self {
        Self::new(variable, operator, Target::Value(value))
    }

    pub fn against(
        variable: TradingVariable,
        operator: ComparisonOperator,
        other: TradingVariable,
    ) -> Self {
        Self::new(variable, operator, Target::Variable(other))
    }

    /// Classify the two operands. Literal targets are always comparable;
    /// an incompatible variable pair is an error, never a silent `false`.
    pub fn check_operands(
        &self,
        classifier: &CompatibilityClassifier,
    ) -> Result<CompatibilityResult, EngineError> {
        let Some(other) = self.target.variable() else {
            return Ok(CompatibilityResult {
                level: CompatibilityLevel::Compatible,
                message: "literal target".to_string(),
                warnings: Vec::new(),
            });
        };
        let result = classifier.check_pair(&self.variable, other);
        if result.level == CompatibilityLevel::Incompatible {
            return Err(EngineError::IncompatibleComparison {
                left: self.variable.key(),
                right: other.key(),
                reason: result.message,
            });
        }
        Ok(result)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.variable, self.operator, self.target)
    }
}

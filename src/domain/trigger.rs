//! Triggers: a condition tagged as entry, exit or management, with a weight.

use crate::domain::compatibility::CompatibilityClassifier;
use crate::domain::condition::{Condition, Target};
use crate::domain::error::EngineError;
use crate::domain::operator::ComparisonOperator;
use crate::domain::variable::TradingVariable;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerType {
    Entry,
    Exit,
    Management,
}

impl TriggerType {
    pub const ALL: [TriggerType; 3] = [
        TriggerType::Entry,
        TriggerType::Exit,
        TriggerType::Management,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::Entry => "entry",
            TriggerType::Exit => "exit",
            TriggerType::Management => "management",
        }
    }
}

impl FromStr for TriggerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "entry" => Ok(TriggerType::Entry),
            "exit" => Ok(TriggerType::Exit),
            "management" => Ok(TriggerType::Management),
            other => Err(format!("unknown trigger type '{other}'")),
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    trigger_id: String,
    trigger_type: TriggerType,
    condition: Condition,
    weight: f64,
    is_active: bool,
}

impl Trigger {
    /// Build an active trigger with weight 1.0. A variable target must be
    /// comparable with the trigger's variable.
    pub fn new(
        trigger_id: &str,
        trigger_type: TriggerType,
        condition: Condition,
        classifier: &CompatibilityClassifier,
    ) -> Result<Self, EngineError> {
        let id = trigger_id.trim();
        if id.is_empty() {
            return Err(EngineError::invalid_param("trigger", "trigger_id", "must not be empty"));
        }
        condition
            .check_operands(classifier)
            .map_err(|err| EngineError::IncompatibleTrigger {
                trigger_id: id.to_string(),
                reason: err.to_string(),
            })?;
        Ok(Self {
            trigger_id: id.to_string(),
            trigger_type,
            condition,
            weight: 1.0,
            is_active: true,
        })
    }

    pub fn with_weight(mut self, weight: f64) -> Result<Self, EngineError> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(EngineError::invalid_param(
                &self.trigger_id,
                "weight",
                format!("expected a non-negative number, got {weight}"),
            ));
        }
        self.weight = weight;
        Ok(self)
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }

    pub fn trigger_id(&self) -> &str {
        &self.trigger_id
    }

    pub fn trigger_type(&self) -> TriggerType {
        self.trigger_type
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn variable(&self) -> &TradingVariable {
        &self.condition.variable
    }

    pub fn operator(&self) -> ComparisonOperator {
        self.condition.operator
    }

    pub fn target(&self) -> &Target {
        &self.condition.target
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// The trigger's variable, followed by its target when that is a variable.
    pub fn variables(&self) -> Vec<&TradingVariable> {
        let mut vars = vec![&self.condition.variable];
        if let Some(other) = self.condition.target.variable() {
            vars.push(other);
        }
        vars
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.trigger_id, self.trigger_type, self.condition)
    }
}

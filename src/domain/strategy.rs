//! Strategy aggregate: entry, exit and management triggers that must all be
//! pairwise comparable.

use crate::domain::compatibility::{
    CompatibilityClassifier, CompatibilityLevel, CompatibilityResult,
};
use crate::domain::error::EngineError;
use crate::domain::evaluation::EvaluationResult;
use crate::domain::trigger::{Trigger, TriggerType};
use crate::domain::variable::TradingVariable;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    strategy_id: String,
    name: String,
    entry_triggers: Vec<Trigger>,
    exit_triggers: Vec<Trigger>,
    management_triggers: Vec<Trigger>,
    #[serde(default)]
    warnings: Vec<String>,
}

impl Strategy {
    pub fn new(strategy_id: &str, name: &str) -> Self {
        Self::from_parts(strategy_id, name, Vec::new(), Vec::new(), Vec::new())
    }

    /// Assemble a strategy without compatibility checks, e.g. from stored
    /// data. Call `validate` before using it.
    pub fn from_parts(
        strategy_id: &str,
        name: &str,
        entry_triggers: Vec<Trigger>,
        exit_triggers: Vec<Trigger>,
        management_triggers: Vec<Trigger>,
    ) -> Self {
        Self {
            strategy_id: strategy_id.to_string(),
            name: name.to_string(),
            entry_triggers,
            exit_triggers,
            management_triggers,
            warnings: Vec::new(),
        }
    }

    pub fn strategy_id(&self) -> &str {
        &self.strategy_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach a trigger after checking its variables against every variable
    /// already in the strategy. Rejection leaves the strategy untouched.
    pub fn add_trigger(
        &mut self,
        trigger: Trigger,
        classifier: &CompatibilityClassifier,
    ) -> Result<CompatibilityResult, EngineError> {
        trigger
            .condition()
            .check_operands(classifier)
            .map_err(|err| EngineError::IncompatibleTrigger {
                trigger_id: trigger.trigger_id().to_string(),
                reason: err.to_string(),
            })?;
        if self.trigger(trigger.trigger_id()).is_some() {
            return Err(EngineError::DuplicateTrigger {
                trigger_id: trigger.trigger_id().to_string(),
            });
        }

        let existing = self.variables();
        let mut level = CompatibilityLevel::Compatible;
        let mut warnings = Vec::new();
        for candidate in trigger.variables() {
            let result = classifier.check(&existing, candidate);
            if result.level == CompatibilityLevel::Incompatible {
                warn!(
                    strategy = %self.strategy_id,
                    trigger = trigger.trigger_id(),
                    reason = %result.message,
                    "trigger rejected"
                );
                return Err(EngineError::IncompatibleTrigger {
                    trigger_id: trigger.trigger_id().to_string(),
                    reason: result.message,
                });
            }
            level = level.max(result.level);
            warnings.extend(result.warnings);
        }

        let message = if existing.is_empty() {
            "first trigger".to_string()
        } else {
            format!(
                "compatible with {} existing variable(s), {} warning(s)",
                existing.len(),
                warnings.len()
            )
        };
        debug!(
            strategy = %self.strategy_id,
            trigger = trigger.trigger_id(),
            level = %level,
            "trigger added"
        );
        self.warnings.extend(
            warnings
                .iter()
                .map(|w| format!("{}: {}", trigger.trigger_id(), w)),
        );
        self.list_mut(trigger.trigger_type()).push(trigger);

        Ok(CompatibilityResult {
            level,
            message,
            warnings,
        })
    }

    /// Re-check every trigger's own operands and every pair of variables.
    pub fn validate(&self, classifier: &CompatibilityClassifier) -> bool {
        if self
            .all_triggers()
            .any(|t| t.condition().check_operands(classifier).is_err())
        {
            return false;
        }
        let vars = self.variables();
        for (i, a) in vars.iter().enumerate() {
            for b in &vars[i + 1..] {
                if classifier.check_pair(a, b).level == CompatibilityLevel::Incompatible {
                    debug!(
                        strategy = %self.strategy_id,
                        left = %a,
                        right = %b,
                        "incompatible pair"
                    );
                    return false;
                }
            }
        }
        true
    }

    pub fn remove_trigger(&mut self, trigger_id: &str) -> Option<Trigger> {
        for kind in TriggerType::ALL {
            let list = self.list_mut(kind);
            if let Some(pos) = list.iter().position(|t| t.trigger_id() == trigger_id) {
                return Some(list.remove(pos));
            }
        }
        None
    }

    /// Returns false when no trigger has this id.
    pub fn set_trigger_active(&mut self, trigger_id: &str, active: bool) -> bool {
        for kind in TriggerType::ALL {
            if let Some(t) = self
                .list_mut(kind)
                .iter_mut()
                .find(|t| t.trigger_id() == trigger_id)
            {
                t.set_active(active);
                return true;
            }
        }
        false
    }

    pub fn trigger(&self, trigger_id: &str) -> Option<&Trigger> {
        self.all_triggers().find(|t| t.trigger_id() == trigger_id)
    }

    pub fn triggers(&self, kind: TriggerType) -> &[Trigger] {
        match kind {
            TriggerType::Entry => &self.entry_triggers,
            TriggerType::Exit => &self.exit_triggers,
            TriggerType::Management => &self.management_triggers,
        }
    }

    pub fn all_triggers(&self) -> impl Iterator<Item = &Trigger> {
        self.entry_triggers
            .iter()
            .chain(&self.exit_triggers)
            .chain(&self.management_triggers)
    }

    pub fn len(&self) -> usize {
        self.entry_triggers.len() + self.exit_triggers.len() + self.management_triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Distinct variables used by any trigger, in first-use order.
    pub fn variables(&self) -> Vec<TradingVariable> {
        let mut vars: Vec<TradingVariable> = Vec::new();
        for v in self.all_triggers().flat_map(Trigger::variables) {
            if !vars.contains(v) {
                vars.push(v.clone());
            }
        }
        vars
    }

    /// Compatibility warnings recorded when triggers were added.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Weight of the active triggers of `kind` that evaluated true, as a
    /// fraction of the total active weight of that kind.
    pub fn weighted_score(&self, kind: TriggerType, results: &[EvaluationResult]) -> f64 {
        let mut total = 0.0;
        let mut hit = 0.0;
        for trigger in self.triggers(kind).iter().filter(|t| t.is_active()) {
            total += trigger.weight();
            let fired = results
                .iter()
                .any(|r| r.trigger_id == trigger.trigger_id() && r.success && r.result);
            if fired {
                hit += trigger.weight();
            }
        }
        if total > 0.0 { hit / total } else { 0.0 }
    }

    fn list_mut(&mut self, kind: TriggerType) -> &mut Vec<Trigger> {
        match kind {
            TriggerType::Entry => &mut self.entry_triggers,
            TriggerType::Exit => &mut self.exit_triggers,
            TriggerType::Management => &mut self.management_triggers,
        }
    }
}

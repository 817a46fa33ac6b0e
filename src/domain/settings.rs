//! Building engine inputs from configuration.
//!
//! Every loader validates what it reads and reports the offending section and
//! key through `EngineError::ConfigMissing` / `EngineError::ConfigInvalid`.

use crate::domain::backtest::{AnalysisOptions, CrossPair};
use crate::domain::compatibility::{CompatibilityClassifier, CompatibilityLevel, RuleTable};
use crate::domain::condition_parser::{
    parse_condition, parse_cross_pair, parse_indicator_request, parse_parameter_list,
};
use crate::domain::error::EngineError;
use crate::domain::indicator::IndicatorRequest;
use crate::domain::normalization::{NormalizationMethod, ReferenceStats};
use crate::domain::strategy::Strategy;
use crate::domain::trigger::{Trigger, TriggerType};
use crate::domain::variable::{
    ChartCategory, ComparisonGroup, PurposeCategory, TradingVariable, VariableCatalog,
};
use crate::ports::config_port::ConfigPort;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;

const GROUPS_SECTION: &str = "comparison_groups";
const ADVISORIES_SECTION: &str = "purpose_advisories";
const VARIABLE_PREFIX: &str = "variable.";
const STATS_PREFIX: &str = "reference_stats.";
const TRIGGER_PREFIX: &str = "trigger.";

fn required(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, EngineError> {
    config
        .get_string(section, key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| EngineError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        })
}

fn parse_value<T: FromStr<Err = String>>(
    section: &str,
    key: &str,
    value: &str,
) -> Result<T, EngineError> {
    value
        .parse()
        .map_err(|reason: String| EngineError::config_invalid(section, key, reason))
}

fn parse_number(section: &str, key: &str, value: &str) -> Result<f64, EngineError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            EngineError::config_invalid(section, key, format!("expected a number, got '{value}'"))
        })
}

/// Sections named `<prefix><name>`, as `(section, name)` sorted by name.
fn prefixed_sections(config: &dyn ConfigPort, prefix: &str) -> Vec<(String, String)> {
    let mut found: Vec<(String, String)> = config
        .sections()
        .into_iter()
        .filter_map(|s| {
            let name = s.strip_prefix(prefix)?.to_string();
            Some((s, name))
        })
        .collect();
    found.sort_by(|a, b| a.1.cmp(&b.1));
    found
}

fn split_pair<'a>(section: &str, key: &'a str) -> Result<(&'a str, &'a str), EngineError> {
    key.split_once('.').ok_or_else(|| {
        EngineError::config_invalid(section, key, "expected '<left>.<right>' as the key")
    })
}

/// `[comparison_groups]` and `[purpose_advisories]`.
pub fn load_rule_table(config: &dyn ConfigPort) -> Result<RuleTable, EngineError> {
    let mut table = RuleTable::new();
    for key in config.keys(GROUPS_SECTION) {
        let value = required(config, GROUPS_SECTION, &key)?;
        let level: CompatibilityLevel = parse_value(GROUPS_SECTION, &key, &value)?;
        if key == "default" {
            table = table.with_default_level(level);
            continue;
        }
        let (a, b) = split_pair(GROUPS_SECTION, &key)?;
        let a: ComparisonGroup = parse_value(GROUPS_SECTION, &key, a)?;
        let b: ComparisonGroup = parse_value(GROUPS_SECTION, &key, b)?;
        table.set_group_rule(a, b, level)?;
    }
    for key in config.keys(ADVISORIES_SECTION) {
        let message = required(config, ADVISORIES_SECTION, &key)?;
        let (a, b) = split_pair(ADVISORIES_SECTION, &key)?;
        let a: PurposeCategory = parse_value(ADVISORIES_SECTION, &key, a)?;
        let b: PurposeCategory = parse_value(ADVISORIES_SECTION, &key, b)?;
        table.set_advisory(a, b, &message);
    }
    Ok(table)
}

pub fn load_classifier(config: &dyn ConfigPort) -> Result<CompatibilityClassifier, EngineError> {
    Ok(CompatibilityClassifier::new(load_rule_table(config)?))
}

/// `[variable.<id>]` sections.
pub fn load_catalog(config: &dyn ConfigPort) -> Result<VariableCatalog, EngineError> {
    let mut variables = Vec::new();
    for (section, id) in prefixed_sections(config, VARIABLE_PREFIX) {
        let display_name = config
            .get_string(&section, "display_name")
            .unwrap_or_else(|| id.clone());
        let purpose: PurposeCategory =
            parse_value(&section, "purpose", &required(config, &section, "purpose")?)?;
        let chart: ChartCategory =
            parse_value(&section, "chart", &required(config, &section, "chart")?)?;
        let group: ComparisonGroup =
            parse_value(&section, "group", &required(config, &section, "group")?)?;

        let mut variable = TradingVariable::new(&id, &display_name, purpose, chart, group)
            .map_err(|_| EngineError::config_invalid(&section, "id", "ids use a-z, 0-9 and '_'"))?;
        if let Some(params) = config.get_string(&section, "params") {
            let params = parse_parameter_list(&params)
                .map_err(|e| EngineError::config_invalid(&section, "params", e.to_string()))?;
            variable = variable.with_params(&params);
        }
        variables.push(variable);
    }
    let catalog = VariableCatalog::new(variables)?;
    debug!(variables = catalog.len(), "variable catalog loaded");
    Ok(catalog)
}

/// `[reference_stats.<group>]` sections.
pub fn load_reference_stats(
    config: &dyn ConfigPort,
) -> Result<HashMap<ComparisonGroup, ReferenceStats>, EngineError> {
    let mut stats = HashMap::new();
    for (section, name) in prefixed_sections(config, STATS_PREFIX) {
        let group: ComparisonGroup = parse_value(&section, "group", &name)?;
        let field = |key: &str| -> Result<f64, EngineError> {
            parse_number(&section, key, &required(config, &section, key)?)
        };
        let entry = ReferenceStats {
            min: field("min")?,
            max: field("max")?,
            mean: field("mean")?,
            std_dev: field("std_dev")?,
        };
        if entry.max < entry.min {
            return Err(EngineError::config_invalid(&section, "max", "max is below min"));
        }
        if entry.std_dev < 0.0 {
            return Err(EngineError::config_invalid(&section, "std_dev", "must be non-negative"));
        }
        stats.insert(group, entry);
    }
    Ok(stats)
}

/// `[normalization] method`, defaulting to min-max.
pub fn load_normalization_method(
    config: &dyn ConfigPort,
) -> Result<NormalizationMethod, EngineError> {
    match config.get_string("normalization", "method") {
        Some(value) => parse_value("normalization", "method", &value),
        None => Ok(NormalizationMethod::MinMax),
    }
}

/// `[strategy]` plus `[trigger.<id>]` sections, added in id order through
/// `Strategy::add_trigger`.
pub fn load_strategy(
    config: &dyn ConfigPort,
    catalog: &VariableCatalog,
    classifier: &CompatibilityClassifier,
) -> Result<Strategy, EngineError> {
    let id = config
        .get_string("strategy", "id")
        .unwrap_or_else(|| "strategy".to_string());
    let name = config.get_string("strategy", "name").unwrap_or_else(|| id.clone());
    let mut strategy = Strategy::new(&id, &name);

    for (section, trigger_id) in prefixed_sections(config, TRIGGER_PREFIX) {
        let kind: TriggerType =
            parse_value(&section, "type", &required(config, &section, "type")?)?;
        let text = required(config, &section, "condition")?;
        let condition = parse_condition(&text)?.resolve(catalog)?;

        let weight = match config.get_string(&section, "weight") {
            Some(w) => parse_number(&section, "weight", &w)?,
            None => 1.0,
        };
        let mut trigger =
            Trigger::new(&trigger_id, kind, condition, classifier)?.with_weight(weight)?;
        trigger.set_active(config.get_bool(&section, "active", true));
        strategy.add_trigger(trigger, classifier)?;
    }
    Ok(strategy)
}

/// `[backtest]` `indicator.<n>` and `cross.<n>` keys.
pub fn load_analysis(
    config: &dyn ConfigPort,
    catalog: &VariableCatalog,
) -> Result<(Vec<IndicatorRequest>, AnalysisOptions), EngineError> {
    let mut indicators = Vec::new();
    let mut options = AnalysisOptions::default();
    for key in config.keys("backtest") {
        let value = required(config, "backtest", &key)?;
        if key.starts_with("indicator") {
            indicators.push(parse_indicator_request(&value)?);
        } else if key.starts_with("cross") {
            let pair = parse_cross_pair(&value)?;
            let (left, right) = pair.resolve(catalog)?;
            options.cross_pairs.push(CrossPair {
                left,
                right,
                signal_type: pair.signal_type,
            });
        }
    }
    Ok((indicators, options))
}

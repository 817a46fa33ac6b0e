//! Compatibility classification and strategy composition.

mod common;

use common::*;
use proptest::prelude::*;
use triggerlab::domain::compatibility::CompatibilityLevel;
use triggerlab::domain::condition::Condition;
use triggerlab::domain::error::EngineError;
use triggerlab::domain::operator::ComparisonOperator;
use triggerlab::domain::strategy::Strategy;
use triggerlab::domain::trigger::{Trigger, TriggerType};
use triggerlab::domain::variable::{ComparisonGroup, TradingVariable};

fn pool() -> Vec<TradingVariable> {
    vec![
        close_var(),
        sma_var(20),
        sma_var(50),
        rsi_var(14),
        stoch_var(),
        macd_var(),
        volume_var(),
    ]
}

mod classification {
    use super::*;

    #[test]
    fn same_group_oscillators_are_compatible() {
        let result = classifier().check(&[rsi_var(14)], &stoch_var());
        assert_eq!(result.level, CompatibilityLevel::Compatible);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn percentage_against_zero_centered_is_incompatible() {
        let result = classifier().check(&[rsi_var(14)], &macd_var());
        assert_eq!(result.level, CompatibilityLevel::Incompatible);
        assert!(!result.is_compatible());
    }

    #[test]
    fn price_against_percentage_warns() {
        let result = classifier().check(&[close_var()], &rsi_var(14));
        assert_eq!(result.level, CompatibilityLevel::Warning);
        assert!(!result.warnings.is_empty());
        assert!(result.is_compatible());
    }

    #[test]
    fn first_variable_is_always_compatible() {
        let result = classifier().check(&[], &macd_var());
        assert_eq!(result.level, CompatibilityLevel::Compatible);
    }

    #[test]
    fn incompatible_existing_short_circuits() {
        let existing = vec![rsi_var(14), close_var(), macd_var()];
        let result = classifier().check(&existing, &stoch_var());
        assert_eq!(result.level, CompatibilityLevel::Incompatible);
    }

    #[test]
    fn purpose_advisory_adds_warning() {
        let c = classifier();
        let same_group = c.check(&[sma_var(20)], &close_var());
        assert_eq!(same_group.level, CompatibilityLevel::Compatible);

        let advised = c.check(&[sma_var(20)], &rsi_var(14));
        assert_eq!(advised.level, CompatibilityLevel::Warning);
        assert!(advised.warnings.iter().any(|w| w.contains("momentum against trend lags")));
    }

    #[test]
    fn undeclared_pairs_use_default_level() {
        let c = classifier();
        assert_eq!(
            c.check_group(ComparisonGroup::ZeroCentered, ComparisonGroup::VolumeBased),
            CompatibilityLevel::Incompatible
        );
    }

    proptest! {
        #[test]
        fn group_rules_are_symmetric(a in 0usize..4, b in 0usize..4) {
            let c = classifier();
            let (ga, gb) = (ComparisonGroup::ALL[a], ComparisonGroup::ALL[b]);
            prop_assert_eq!(c.check_group(ga, gb), c.check_group(gb, ga));
            if a == b {
                prop_assert_eq!(c.check_group(ga, gb), CompatibilityLevel::Compatible);
            }
        }

        #[test]
        fn pair_levels_are_symmetric(a in 0usize..7, b in 0usize..7) {
            let c = classifier();
            let vars = pool();
            prop_assert_eq!(
                c.check_pair(&vars[a], &vars[b]).level,
                c.check_pair(&vars[b], &vars[a]).level
            );
        }
    }
}

mod strategy_composition {
    use super::*;

    fn threshold_trigger(id: &str, variable: TradingVariable) -> Trigger {
        let condition = Condition::threshold(variable, ComparisonOperator::Gt, 1.0);
        Trigger::new(id, TriggerType::Entry, condition, &classifier()).unwrap()
    }

    #[test]
    fn rejected_trigger_leaves_strategy_unchanged() {
        let c = classifier();
        let mut strategy = Strategy::new("s1", "Oscillators");
        strategy.add_trigger(threshold_trigger("rsi_low", rsi_var(14)), &c).unwrap();
        strategy.add_trigger(threshold_trigger("stoch_low", stoch_var()), &c).unwrap();
        let before = strategy.clone();

        let err = strategy
            .add_trigger(threshold_trigger("macd_up", macd_var()), &c)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::IncompatibleTrigger { ref trigger_id, .. } if trigger_id == "macd_up"
        ));
        assert_eq!(strategy, before);
        assert_eq!(strategy.len(), 2);
    }

    #[test]
    fn warnings_accumulate_with_trigger_prefix() {
        let c = classifier();
        let mut strategy = Strategy::new("s2", "Mixed");
        strategy.add_trigger(threshold_trigger("price", close_var()), &c).unwrap();
        let result = strategy
            .add_trigger(threshold_trigger("momentum", rsi_var(14)), &c)
            .unwrap();
        assert_eq!(result.level, CompatibilityLevel::Warning);
        assert!(!strategy.warnings().is_empty());
        assert!(strategy.warnings().iter().all(|w| w.starts_with("momentum: ")));
        assert!(strategy.validate(&c));
    }

    #[test]
    fn variable_target_must_be_comparable() {
        let condition = Condition::against(rsi_var(14), ComparisonOperator::Gt, macd_var());
        let err = Trigger::new("bad", TriggerType::Exit, condition, &classifier()).unwrap_err();
        assert!(matches!(err, EngineError::IncompatibleTrigger { .. }));
    }

    proptest! {
        #[test]
        fn accepted_strategies_never_hold_incompatible_pairs(
            picks in proptest::collection::vec(0usize..7, 1..12)
        ) {
            let c = classifier();
            let vars = pool();
            let mut strategy = Strategy::new("prop", "Property");
            for (i, pick) in picks.iter().enumerate() {
                let before = strategy.len();
                let trigger = threshold_trigger(&format!("t{i}"), vars[*pick].clone());
                match strategy.add_trigger(trigger, &c) {
                    Ok(_) => prop_assert_eq!(strategy.len(), before + 1),
                    Err(_) => prop_assert_eq!(strategy.len(), before),
                }
            }
            let held = strategy.variables();
            for (i, a) in held.iter().enumerate() {
                for b in &held[i + 1..] {
                    prop_assert_ne!(c.check_pair(a, b).level, CompatibilityLevel::Incompatible);
                }
            }
            prop_assert!(strategy.validate(&c));
        }
    }
}

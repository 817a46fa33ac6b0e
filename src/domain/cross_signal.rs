//! Crossing detection between two aligned series.
//!
//! A crossing at index `i` requires `i >= 1` and a change in the sign of
//! `a - b` between `i - 1` and `i`; the sign after the change gives the
//! direction. Positions where any operand is NaN are unknown and never cross.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossDirection {
    Above,
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalType {
    /// `a` crosses above `b`.
    GoldenCross,
    /// `a` crosses below `b`.
    DeathCross,
    AnyCross,
}

impl SignalType {
    pub fn accepts(&self, direction: CrossDirection) -> bool {
        match self {
            SignalType::GoldenCross => direction == CrossDirection::Above,
            SignalType::DeathCross => direction == CrossDirection::Below,
            SignalType::AnyCross => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::GoldenCross => "golden_cross",
            SignalType::DeathCross => "death_cross",
            SignalType::AnyCross => "any_cross",
        }
    }
}

impl FromStr for SignalType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "golden_cross" | "golden" => Ok(SignalType::GoldenCross),
            "death_cross" | "death" => Ok(SignalType::DeathCross),
            "any_cross" | "any" => Ok(SignalType::AnyCross),
            other => Err(format!("unknown signal type '{other}'")),
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A crossing found by the analyzer, with the values on both sides of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossSignalEvent {
    pub left: String,
    pub right: String,
    pub signal_type: SignalType,
    pub direction: CrossDirection,
    pub index: usize,
    pub left_value: f64,
    pub right_value: f64,
}

fn sign(x: f64) -> i8 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

/// Direction of the crossing between two consecutive samples, if any.
pub fn crossed(prev_a: f64, prev_b: f64, a: f64, b: f64) -> Option<CrossDirection> {
    if prev_a.is_nan() || prev_b.is_nan() || a.is_nan() || b.is_nan() {
        return None;
    }
    let (before, after) = (sign(prev_a - prev_b), sign(a - b));
    if before == after {
        return None;
    }
    match after {
        1 => Some(CrossDirection::Above),
        -1 => Some(CrossDirection::Below),
        _ => None,
    }
}

/// Every crossing of `a` relative to `b`, ascending by index.
/// Only the overlapping prefix of unequal-length inputs is scanned.
pub fn crossings(a: &[f64], b: &[f64]) -> Vec<(usize, CrossDirection)> {
    let n = a.len().min(b.len());
    (1..n)
        .filter_map(|i| crossed(a[i - 1], b[i - 1], a[i], b[i]).map(|d| (i, d)))
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CrossSignalAnalyzer;

impl CrossSignalAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(
        &self,
        series_a: &[f64],
        series_b: &[f64],
        signal_type: SignalType,
    ) -> Vec<usize> {
        crossings(series_a, series_b)
            .into_iter()
            .filter(|(_, d)| signal_type.accepts(*d))
            .map(|(i, _)| i)
            .collect()
    }

    /// Like `analyze`, but keeps the direction and operand values of each event.
    pub fn events(
        &self,
        left: &str,
        series_a: &[f64],
        right: &str,
        series_b: &[f64],
        signal_type: SignalType,
    ) -> Vec<CrossSignalEvent> {
        crossings(series_a, series_b)
            .into_iter()
            .filter(|(_, d)| signal_type.accepts(*d))
            .map(|(index, direction)| CrossSignalEvent {
                left: left.to_string(),
                right: right.to_string(),
                signal_type,
                direction,
                index,
                left_value: series_a[index],
                right_value: series_b[index],
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAN: f64 = f64::NAN;

    #[test]
    fn golden_and_death_crosses() {
        let a = [1.0, 2.0, 4.0, 3.0, 1.0];
        let b = [3.0, 3.0, 3.0, 3.0, 3.0];
        let analyzer = CrossSignalAnalyzer::new();
        assert_eq!(analyzer.analyze(&a, &b, SignalType::GoldenCross), vec![2]);
        // a touches b at index 3, then drops below at index 4
        assert_eq!(analyzer.analyze(&a, &b, SignalType::DeathCross), vec![4]);
        assert_eq!(analyzer.analyze(&a, &b, SignalType::AnyCross), vec![2, 4]);
    }

    #[test]
    fn index_zero_never_crosses() {
        let analyzer = CrossSignalAnalyzer::new();
        assert!(analyzer.analyze(&[5.0], &[1.0], SignalType::AnyCross).is_empty());
    }

    #[test]
    fn nan_positions_are_skipped() {
        let a = [NAN, NAN, 1.0, 5.0, NAN, 1.0];
        let b = [2.0, 2.0, 2.0, 2.0, 2.0, 2.0];
        let analyzer = CrossSignalAnalyzer::new();
        assert_eq!(analyzer.analyze(&a, &b, SignalType::GoldenCross), vec![3]);
        // the drop through NaN at index 4 is unknown, not a cross
        assert!(analyzer.analyze(&a, &b, SignalType::DeathCross).is_empty());
    }

    #[test]
    fn touching_without_passing_is_not_a_cross() {
        let a = [1.0, 2.0, 1.0];
        let b = [2.0, 2.0, 2.0];
        assert!(crossings(&a, &b).is_empty());
    }

    #[test]
    fn events_carry_values() {
        let analyzer = CrossSignalAnalyzer::new();
        let events =
            analyzer.events("fast", &[1.0, 3.0], "slow", &[2.0, 2.0], SignalType::AnyCross);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].direction, CrossDirection::Above);
        assert_eq!(events[0].left_value, 3.0);
        assert_eq!(events[0].right, "slow");
    }

    #[test]
    fn signal_type_parsing() {
        assert_eq!("GOLDEN_CROSS".parse(), Ok(SignalType::GoldenCross));
        assert_eq!("any".parse(), Ok(SignalType::AnyCross));
        assert!("silver".parse::<SignalType>().is_err());
    }
}

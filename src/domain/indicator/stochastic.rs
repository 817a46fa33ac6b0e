//! Stochastic oscillator.
//!
//! %K(n)[i] = 100 * (C[i] - LL) / (HH - LL) over the last n highs/lows.
//! %D(m) = SMA(m) of %K. A flat window (HH == LL) yields 50.
//! Warmup: %K from n-1, %D from n-1 + m-1.

use crate::domain::indicator::sma::calculate_sma;

#[derive(Debug, Clone, PartialEq)]
pub struct StochasticLines {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
}

pub fn calculate_stochastic(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    k_period: usize,
    d_period: usize,
) -> StochasticLines {
    let len = closes.len();
    let mut k = vec![f64::NAN; len];

    if k_period > 0 && len >= k_period && highs.len() == len && lows.len() == len {
        let windows = highs.windows(k_period).zip(lows.windows(k_period));
        for ((slot, close), (hw, lw)) in k[k_period - 1..]
            .iter_mut()
            .zip(&closes[k_period - 1..])
            .zip(windows)
        {
            let hh = hw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let ll = lw.iter().copied().fold(f64::INFINITY, f64::min);
            let range = hh - ll;
            *slot = if range > 0.0 {
                (100.0 * (close - ll) / range).clamp(0.0, 100.0)
            } else {
                50.0
            };
        }
    }

    let d = calculate_sma(&k, d_period);
    StochasticLines { k, d }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stochastic_k_position_in_range() {
        let highs = [10.0, 12.0, 14.0];
        let lows = [8.0, 9.0, 10.0];
        let closes = [9.0, 11.0, 13.0];
        let out = calculate_stochastic(&highs, &lows, &closes, 3, 1);
        // HH 14, LL 8 => 100 * (13 - 8) / 6
        assert!((out.k[2] - 500.0 / 6.0).abs() < 1e-12);
        assert!(out.k[1].is_nan());
        assert_eq!(out.d[2], out.k[2]);
    }

    #[test]
    fn stochastic_flat_window_is_midpoint() {
        let flat = [5.0; 4];
        let out = calculate_stochastic(&flat, &flat, &flat, 2, 2);
        assert_eq!(out.k[1], 50.0);
        assert!(out.d[1].is_nan());
        assert_eq!(out.d[2], 50.0);
    }

    #[test]
    fn stochastic_bounds() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + ((i * 7) % 11) as f64).collect();
        let highs: Vec<f64> = closes.iter().map(|c| c + 1.0).collect();
        let lows: Vec<f64> = closes.iter().map(|c| c - 1.0).collect();
        let out = calculate_stochastic(&highs, &lows, &closes, 5, 3);
        for v in out.k.iter().chain(&out.d).filter(|v| !v.is_nan()) {
            assert!((0.0..=100.0).contains(v));
        }
    }
}

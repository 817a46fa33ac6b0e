//! Simple Moving Average.
//!
//! SMA(n)[i] = mean(V[i-n+1..=i]). Warmup: first (n-1) values are NaN.

/// Each output slot is computed from its own window, so no running-sum drift.
pub fn calculate_sma(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let n = period as f64;
    for (slot, window) in out[period - 1..].iter_mut().zip(values.windows(period)) {
        *slot = window.iter().sum::<f64>() / n;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_warmup_and_values() {
        let out = calculate_sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert_eq!(&out[2..], &[2.0, 3.0, 4.0]);
    }

    #[test]
    fn sma_period_1_is_identity() {
        let input = [10.0, 20.0, 30.0];
        assert_eq!(calculate_sma(&input, 1), input.to_vec());
    }

    #[test]
    fn sma_short_input_is_all_nan() {
        let out = calculate_sma(&[1.0, 2.0], 3);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn sma_propagates_nan_windows() {
        let out = calculate_sma(&[f64::NAN, 2.0, 4.0, 6.0], 2);
        assert!(out[1].is_nan());
        assert_eq!(out[2], 3.0);
        assert_eq!(out[3], 5.0);
    }

    #[test]
    fn sma_period_0() {
        let out = calculate_sma(&[1.0, 2.0], 0);
        assert!(out.iter().all(|v| v.is_nan()));
    }
}

//! Weighted Moving Average.
//!
//! Linear weights 1..=n, newest value weighted n.
//! WMA(n)[i] = sum(w_j * V[i-n+j]) / (n*(n+1)/2). Warmup: first (n-1) values are NaN.

pub fn calculate_wma(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let denom = (period * (period + 1)) as f64 / 2.0;
    for (slot, window) in out[period - 1..].iter_mut().zip(values.windows(period)) {
        *slot = window
            .iter()
            .enumerate()
            .map(|(j, v)| (j + 1) as f64 * v)
            .sum::<f64>()
            / denom;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wma_weights_recent_values_more() {
        let out = calculate_wma(&[10.0, 20.0, 30.0], 3);
        // (1*10 + 2*20 + 3*30) / 6 = 140 / 6
        assert!((out[2] - 140.0 / 6.0).abs() < 1e-12);
        assert!(out[1].is_nan());
    }

    #[test]
    fn wma_constant_input() {
        let out = calculate_wma(&[5.0; 4], 2);
        assert!(out[1..].iter().all(|v| (v - 5.0).abs() < 1e-12));
    }

    #[test]
    fn wma_short_input() {
        assert!(calculate_wma(&[1.0], 2)[0].is_nan());
    }
}

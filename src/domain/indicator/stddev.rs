//! Population standard deviation over a rolling window.
//!
//! Divides by N, not N-1. Warmup: first (n-1) values are NaN.

pub fn calculate_stddev(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let n = period as f64;
    for (slot, window) in out[period - 1..].iter_mut().zip(values.windows(period)) {
        let mean = window.iter().sum::<f64>() / n;
        let variance = window.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        *slot = variance.sqrt();
    }
    out
}

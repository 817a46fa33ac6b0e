//! Rate of Change.
//!
//! ROC(n)[i] = (V[i] - V[i-n]) / V[i-n] * 100. Warmup: first n values are NaN.
//! A zero base value yields NaN.

pub fn calculate_roc(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() <= period {
        return out;
    }

    for (slot, (curr, base)) in out[period..]
        .iter_mut()
        .zip(values[period..].iter().zip(values.iter()))
    {
        if *base != 0.0 {
            *slot = (curr - base) / base * 100.0;
        }
    }
    out
}

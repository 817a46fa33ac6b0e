//! On-Balance Volume.
//!
//! OBV[0] = volume[0]; then add volume on an up close, subtract on a down
//! close, carry on an unchanged close. No warmup.

pub fn calculate_obv(closes: &[f64], volumes: &[f64]) -> Vec<f64> {
    let len = closes.len().min(volumes.len());
    let mut out = Vec::with_capacity(len);
    if len == 0 {
        return out;
    }

    let mut obv = volumes[0];
    out.push(obv);
    for i in 1..len {
        if closes[i] > closes[i - 1] {
            obv += volumes[i];
        } else if closes[i] < closes[i - 1] {
            obv -= volumes[i];
        }
        out.push(obv);
    }
    out
}

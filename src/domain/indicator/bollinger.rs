//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//!
//! Default parameters: period=20, multiplier=2.0
//! Warmup: first (period-1) values are NaN.

use crate::domain::indicator::sma::calculate_sma;
use crate::domain::indicator::stddev::calculate_stddev;

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn calculate_bollinger(values: &[f64], period: usize, multiplier: f64) -> BollingerBands {
    let middle = calculate_sma(values, period);
    let stddev = calculate_stddev(values, period);

    let upper = middle.iter().zip(&stddev).map(|(m, s)| m + multiplier * s).collect();
    let lower = middle.iter().zip(&stddev).map(|(m, s)| m - multiplier * s).collect();

    BollingerBands {
        upper,
        middle,
        lower,
    }
}

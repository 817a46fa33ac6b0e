//! OHLCV bars and the columnar price series the engine computes over.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Price fields addressable directly by variable id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl PriceField {
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "open" => Some(PriceField::Open),
            "high" => Some(PriceField::High),
            "low" => Some(PriceField::Low),
            "close" | "price" => Some(PriceField::Close),
            "volume" => Some(PriceField::Volume),
            _ => None,
        }
    }

    pub fn of(&self, bar: &OhlcvBar) -> f64 {
        match self {
            PriceField::Open => bar.open,
            PriceField::High => bar.high,
            PriceField::Low => bar.low,
            PriceField::Close => bar.close,
            PriceField::Volume => bar.volume,
        }
    }
}

/// Column-oriented view of a bar sequence. Indicators work on whole columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    pub timestamps: Vec<NaiveDateTime>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl PriceSeries {
    pub fn from_bars(bars: &[OhlcvBar]) -> Self {
        Self {
            timestamps: bars.iter().map(|b| b.timestamp).collect(),
            open: bars.iter().map(|b| b.open).collect(),
            high: bars.iter().map(|b| b.high).collect(),
            low: bars.iter().map(|b| b.low).collect(),
            close: bars.iter().map(|b| b.close).collect(),
            volume: bars.iter().map(|b| b.volume).collect(),
        }
    }

    /// Close-only series; other price columns mirror the close and volume is zero.
    pub fn from_closes(timestamps: Vec<NaiveDateTime>, closes: &[f64]) -> Self {
        Self {
            timestamps,
            open: closes.to_vec(),
            high: closes.to_vec(),
            low: closes.to_vec(),
            close: closes.to_vec(),
            volume: vec![0.0; closes.len()],
        }
    }

    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    pub fn column(&self, field: PriceField) -> &[f64] {
        match field {
            PriceField::Open => &self.open,
            PriceField::High => &self.high,
            PriceField::Low => &self.low,
            PriceField::Close => &self.close,
            PriceField::Volume => &self.volume,
        }
    }

    pub fn bar(&self, index: usize) -> Option<OhlcvBar> {
        Some(OhlcvBar {
            timestamp: *self.timestamps.get(index)?,
            open: *self.open.get(index)?,
            high: *self.high.get(index)?,
            low: *self.low.get(index)?,
            close: *self.close.get(index)?,
            volume: *self.volume.get(index)?,
        })
    }

    /// The first `len` bars, used when computing indicators as of a past index.
    pub fn prefix(&self, len: usize) -> Self {
        let len = len.min(self.len());
        Self {
            timestamps: self.timestamps[..len].to_vec(),
            open: self.open[..len].to_vec(),
            high: self.high[..len].to_vec(),
            low: self.low[..len].to_vec(),
            close: self.close[..len].to_vec(),
            volume: self.volume[..len].to_vec(),
        }
    }

    /// Stable content hash of the timestamps and every price column.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for ts in &self.timestamps {
            hasher.update(&ts.and_utc().timestamp_micros().to_le_bytes());
        }
        hasher.update(b"|");
        for column in [&self.open, &self.high, &self.low, &self.close, &self.volume] {
            for v in column {
                hasher.update(&v.to_le_bytes());
            }
            hasher.update(b"|");
        }
        hasher.finalize().to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn sample_bars() -> Vec<OhlcvBar> {
        vec![
            OhlcvBar {
                timestamp: ts(1),
                open: 100.0,
                high: 110.0,
                low: 90.0,
                close: 105.0,
                volume: 50_000.0,
            },
            OhlcvBar {
                timestamp: ts(2),
                open: 105.0,
                high: 112.0,
                low: 101.0,
                close: 111.0,
                volume: 42_000.0,
            },
        ]
    }

    #[test]
    fn from_bars_splits_columns() {
        let series = PriceSeries::from_bars(&sample_bars());
        assert_eq!(series.len(), 2);
        assert_eq!(series.close, vec![105.0, 111.0]);
        assert_eq!(series.volume, vec![50_000.0, 42_000.0]);
        assert_eq!(series.column(PriceField::High), &[110.0, 112.0]);
    }

    #[test]
    fn bar_round_trips_index() {
        let bars = sample_bars();
        let series = PriceSeries::from_bars(&bars);
        assert_eq!(series.bar(1), Some(bars[1].clone()));
        assert_eq!(series.bar(2), None);
    }

    #[test]
    fn prefix_truncates_all_columns() {
        let series = PriceSeries::from_bars(&sample_bars());
        let head = series.prefix(1);
        assert_eq!(head.len(), 1);
        assert_eq!(head.timestamps.len(), 1);
        assert_eq!(head.low, vec![90.0]);
        assert_eq!(series.prefix(10).len(), 2);
    }

    #[test]
    fn price_field_ids() {
        assert_eq!(PriceField::from_id("close"), Some(PriceField::Close));
        assert_eq!(PriceField::from_id("price"), Some(PriceField::Close));
        assert_eq!(PriceField::from_id("volume"), Some(PriceField::Volume));
        assert_eq!(PriceField::from_id("sma"), None);
    }

    #[test]
    fn fingerprint_depends_on_content() {
        let a = PriceSeries::from_bars(&sample_bars());
        let mut b = a.clone();
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.close[1] = 111.5;
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_covers_open_and_timestamps() {
        let a = PriceSeries::from_bars(&sample_bars());
        let mut opened = a.clone();
        opened.open[0] = 1.0;
        assert_ne!(a.fingerprint(), opened.fingerprint());

        let mut shifted = a.clone();
        shifted.timestamps[0] -= chrono::Duration::days(7);
        assert_ne!(a.fingerprint(), shifted.fingerprint());
    }
}

//! CSV file price adapter.
//!
//! One file per symbol, `<base>/<SYMBOL>.csv`, with the columns
//! `timestamp,open,high,low,close,volume`. Timestamps are `YYYY-MM-DD` or
//! `YYYY-MM-DD HH:MM:SS`.

use crate::domain::error::EngineError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::PriceDataPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }

    /// Symbols with a CSV file under the base path, sorted.
    pub fn list_symbols(&self) -> Result<Vec<String>, EngineError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| EngineError::PriceData {
            reason: format!("failed to read directory {}: {}", self.base_path.display(), e),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| EngineError::PriceData {
                reason: format!("directory entry error: {}", e),
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("csv") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    symbols.push(stem.to_string());
                }
            }
        }
        symbols.sort();
        Ok(symbols)
    }
}

impl PriceDataPort for CsvAdapter {
    fn fetch_bars(&self, symbol: &str) -> Result<Vec<OhlcvBar>, EngineError> {
        read_bars(&self.csv_path(symbol))
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn number(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    line: u64,
) -> Result<f64, EngineError> {
    let raw = record.get(index).ok_or_else(|| EngineError::PriceData {
        reason: format!("line {line}: missing {name} column"),
    })?;
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| EngineError::PriceData {
            reason: format!("line {line}: invalid {name} value '{raw}'"),
        })
}

/// Read one CSV file into bars sorted by timestamp.
pub fn read_bars(path: &Path) -> Result<Vec<OhlcvBar>, EngineError> {
    let content = fs::read_to_string(path).map_err(|e| EngineError::PriceData {
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let mut bars = Vec::new();

    for result in rdr.records() {
        let record = result.map_err(|e| EngineError::PriceData {
            reason: format!("CSV parse error: {}", e),
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let raw_ts = record.get(0).ok_or_else(|| EngineError::PriceData {
            reason: format!("line {line}: missing timestamp column"),
        })?;
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| EngineError::PriceData {
            reason: format!("line {line}: invalid timestamp '{raw_ts}'"),
        })?;

        bars.push(OhlcvBar {
            timestamp,
            open: number(&record, 1, "open", line)?,
            high: number(&record, 2, "high", line)?,
            low: number(&record, 3, "low", line)?,
            close: number(&record, 4, "close", line)?,
            volume: number(&record, 5, "volume", line)?,
        });
    }

    bars.sort_by_key(|b| b.timestamp);
    if let Some(dup) = bars.windows(2).find(|w| w[0].timestamp == w[1].timestamp) {
        return Err(EngineError::PriceData {
            reason: format!("duplicate timestamp {}", dup[0].timestamp),
        });
    }
    Ok(bars)
}

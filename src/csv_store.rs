use crate::data_structures::{InMemoryData, PriceRecord, normalize_symbol};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug)]
pub enum CsvStoreError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidDate(String),
    NoData,
}

impl From<std::io::Error> for CsvStoreError {
    fn from(error: std::io::Error) -> Self {
        CsvStoreError::Io(error)
    }
}

impl From<csv::Error> for CsvStoreError {
    fn from(error: csv::Error) -> Self {
        CsvStoreError::Csv(error)
    }
}

// yfinance CSV export column layout
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Open")]
    open: f64,
    #[serde(rename = "High")]
    high: f64,
    #[serde(rename = "Low")]
    low: f64,
    #[serde(rename = "Close")]
    close: f64,
    #[serde(rename = "Adj Close")]
    adjusted_close: Option<f64>,
    #[serde(rename = "Volume")]
    volume: Option<f64>,
}

/// Parse one symbol's daily series from CSV, ascending by date.
pub fn parse_csv<R: Read>(symbol: &str, reader: R) -> Result<Vec<PriceRecord>, CsvStoreError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();

    for row in csv_reader.deserialize::<CsvRow>() {
        let row = row?;
        let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d")
            .map_err(|_| CsvStoreError::InvalidDate(row.date.clone()))?;

        records.push(PriceRecord {
            symbol: symbol.to_string(),
            date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            adjusted_close: row.adjusted_close,
            volume: row.volume,
            daily_return: None,
            ma_7: None,
            high_52w: None,
            low_52w: None,
            volatility_30d: None,
        });
    }

    if records.is_empty() {
        return Err(CsvStoreError::NoData);
    }

    records.sort_by_key(|r| r.date);
    Ok(records)
}

/// Load every `*.csv` file in `dir` as one symbol's series, keyed by the
/// normalized file stem. Unreadable files are skipped with a warning so one
/// bad file cannot block the seed.
pub fn load_dir(dir: &Path) -> Result<InMemoryData, CsvStoreError> {
    let mut data = InMemoryData::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }

        let stem = match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => stem,
            None => continue,
        };
        let symbol = normalize_symbol(stem);

        match File::open(&path).map_err(CsvStoreError::from).and_then(|f| parse_csv(&symbol, f)) {
            Ok(records) => {
                debug!(symbol, rows = records.len(), "Loaded CSV seed series");
                data.insert(symbol, records);
            }
            Err(e) => {
                warn!(?path, error = ?e, "Skipping unreadable CSV seed file");
            }
        }
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Date,Open,High,Low,Close,Adj Close,Volume
2024-01-03,101.0,106.0,100.0,104.0,103.5,12000
2024-01-02,100.0,105.0,99.0,102.0,101.5,10000
";

    #[test]
    fn test_parse_csv_sorts_ascending() {
        let records = parse_csv("TCS.NS", SAMPLE.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(records[0].close, 102.0);
        assert_eq!(records[1].adjusted_close, Some(103.5));
    }

    #[test]
    fn test_parse_csv_empty_is_no_data() {
        let header_only = "Date,Open,High,Low,Close,Adj Close,Volume\n";
        assert!(matches!(
            parse_csv("TCS.NS", header_only.as_bytes()),
            Err(CsvStoreError::NoData)
        ));
    }

    #[test]
    fn test_parse_csv_rejects_bad_date() {
        let bad = "Date,Open,High,Low,Close,Adj Close,Volume\n03-01-2024,1,1,1,1,1,1\n";
        assert!(matches!(
            parse_csv("TCS.NS", bad.as_bytes()),
            Err(CsvStoreError::InvalidDate(_))
        ));
    }
}

use crate::config::MarketHoursConfig;
use chrono::{Datelike, NaiveDate, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

// --- Core Data Structures ---

/// One observed close for one trading day. The minimal unit the analytics
/// functions operate on; dates are strictly increasing within a series.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Full daily row as stored per symbol: raw OHLCV from the provider plus the
/// derived columns filled in by `metrics::enrich`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PriceRecord {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adjusted_close: Option<f64>,
    pub volume: Option<f64>,
    pub daily_return: Option<f64>,
    pub ma_7: Option<f64>,
    pub high_52w: Option<f64>,
    pub low_52w: Option<f64>,
    pub volatility_30d: Option<f64>,
}

impl PriceRecord {
    pub fn point(&self) -> PricePoint {
        PricePoint {
            date: self.date,
            close: self.close,
        }
    }
}

/// Project a stored series down to the close-only view the analytics take.
pub fn to_points(records: &[PriceRecord]) -> Vec<PricePoint> {
    records.iter().map(PriceRecord::point).collect()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompanyInfo {
    pub symbol: String,
    pub name: String,
    pub exchange: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub symbol: String,
    pub high_52w: f64,
    pub low_52w: f64,
    pub avg_close: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompareMetrics {
    pub symbol: String,
    pub return_30d: f64,
    pub avg_volatility_30d: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompareResponse {
    pub symbol1: CompareMetrics,
    pub symbol2: CompareMetrics,
}

// --- Type Aliases for Shared State ---

// Main in-memory store: full enriched history per normalized symbol
pub type InMemoryData = HashMap<String, Vec<PriceRecord>>;
pub type SharedData = Arc<Mutex<InMemoryData>>;

// --- Symbol Normalization ---

pub const NSE_SUFFIX: &str = ".NS";

/// Uppercase and append the NSE suffix when missing, matching the symbols
/// the provider and the in-memory store key on.
pub fn normalize_symbol(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    if upper.ends_with(NSE_SUFFIX) {
        upper
    } else {
        format!("{}{}", upper, NSE_SUFFIX)
    }
}

/// Symbol without the exchange suffix, for display names.
pub fn display_name(symbol: &str) -> String {
    symbol.trim_end_matches(NSE_SUFFIX).to_string()
}

// --- Market Hours Utility Functions ---

pub fn is_within_market_hours(config: &MarketHoursConfig) -> bool {
    let hours = &config.default_market_hours;

    let tz: Tz = match hours.timezone.parse() {
        Ok(tz) => tz,
        Err(e) => {
            tracing::warn!("Failed to parse timezone '{}': {}", hours.timezone, e);
            return false; // Default to closed if timezone parsing fails
        }
    };

    let now_local = Utc::now().with_timezone(&tz);

    if hours.weekdays_only {
        match now_local.weekday() {
            Weekday::Sat | Weekday::Sun => return false,
            _ => {}
        }
    }

    let current_hour = now_local.hour();
    current_hour >= hours.open_hour && current_hour < hours.close_hour
}

pub fn current_refresh_interval(
    config: &MarketHoursConfig,
    market_interval: Duration,
    off_hours_interval: Duration,
    enable_market_hours: bool,
) -> Duration {
    if !enable_market_hours {
        return market_interval;
    }

    if is_within_market_hours(config) {
        market_interval
    } else {
        off_hours_interval
    }
}

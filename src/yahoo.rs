use crate::data_structures::PriceRecord;
use chrono::DateTime;
use rand::prelude::*;
use reqwest::{Client, Error as ReqwestError};
use serde_json::Value;
use std::time::{Duration as StdDuration, SystemTime};
use tokio::time::sleep;

#[derive(Debug)]
pub enum YahooError {
    Http(ReqwestError),
    Serialization(serde_json::Error),
    InvalidResponse(String),
    RateLimit,
    NoData,
}

impl From<ReqwestError> for YahooError {
    fn from(error: ReqwestError) -> Self {
        YahooError::Http(error)
    }
}

impl From<serde_json::Error> for YahooError {
    fn from(error: serde_json::Error) -> Self {
        YahooError::Serialization(error)
    }
}

/// Client for the Yahoo Finance chart API. All retry and backoff behavior
/// lives here; callers see a single success-or-failure per request.
pub struct YahooClient {
    client: Client,
    base_url: String,
    rate_limit_per_minute: u32,
    request_timestamps: Vec<SystemTime>,
    user_agents: Vec<String>,
    random_agent: bool,
}

impl YahooClient {
    pub fn new(random_agent: bool, rate_limit_per_minute: u32) -> Result<Self, YahooError> {
        let client = Client::builder()
            .timeout(StdDuration::from_secs(30))
            .build()?;

        let user_agents = vec![
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0".to_string(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.3 Safari/605.1.15".to_string(),
        ];

        Ok(YahooClient {
            client,
            base_url: "https://query1.finance.yahoo.com/v8/finance/chart/".to_string(),
            rate_limit_per_minute,
            request_timestamps: Vec::new(),
            user_agents,
            random_agent,
        })
    }

    fn get_user_agent(&self) -> String {
        if self.random_agent {
            self.user_agents
                .choose(&mut rand::rng())
                .unwrap_or(&self.user_agents[0])
                .clone()
        } else {
            self.user_agents[0].clone()
        }
    }

    async fn enforce_rate_limit(&mut self) {
        let current_time = SystemTime::now();

        // Remove timestamps older than 1 minute
        self.request_timestamps.retain(|&timestamp| {
            current_time
                .duration_since(timestamp)
                .unwrap_or(StdDuration::from_secs(0))
                < StdDuration::from_secs(60)
        });

        if self.request_timestamps.len() >= self.rate_limit_per_minute as usize {
            if let Some(&oldest_request) = self.request_timestamps.first() {
                let wait_time = StdDuration::from_secs(60)
                    - current_time
                        .duration_since(oldest_request)
                        .unwrap_or(StdDuration::from_secs(0));
                if !wait_time.is_zero() {
                    sleep(wait_time + StdDuration::from_millis(100)).await;
                }
            }
        }

        self.request_timestamps.push(current_time);
    }

    async fn make_request(&mut self, url: &str) -> Result<Value, YahooError> {
        const MAX_RETRIES: u32 = 5;

        for attempt in 0..MAX_RETRIES {
            self.enforce_rate_limit().await;

            if attempt > 0 {
                let delay =
                    StdDuration::from_secs_f64(2.0_f64.powi(attempt as i32 - 1) + rand::random::<f64>());
                let delay = delay.min(StdDuration::from_secs(60));
                sleep(delay).await;
            }

            let user_agent = self.get_user_agent();

            let response = self
                .client
                .get(url)
                .header("Accept", "application/json, text/plain, */*")
                .header("Accept-Language", "en-US,en;q=0.9")
                .header("User-Agent", user_agent)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_success() {
                        match resp.json::<Value>().await {
                            Ok(data) => return Ok(data),
                            Err(_) => continue,
                        }
                    } else if status == 429 {
                        continue;
                    } else if status.is_server_error() {
                        continue;
                    } else if status.is_client_error() {
                        break;
                    } else {
                        continue;
                    }
                }
                Err(_) => continue,
            }
        }

        Err(YahooError::InvalidResponse("Max retries exceeded".to_string()))
    }

    /// Fetch daily history for one symbol, ascending by date. `range` uses
    /// Yahoo's range syntax ("1y", "6mo", "max").
    pub async fn get_history(
        &mut self,
        symbol: &str,
        range: &str,
    ) -> Result<Vec<PriceRecord>, YahooError> {
        let url = format!(
            "{}{}?range={}&interval=1d&events=div%2Csplit",
            self.base_url, symbol, range
        );

        let response_data = self.make_request(&url).await?;
        parse_chart_response(symbol, &response_data)
    }
}

/// Decode one chart-API payload into price records. Rows with a null close
/// (holidays, halted sessions) are dropped.
pub fn parse_chart_response(symbol: &str, payload: &Value) -> Result<Vec<PriceRecord>, YahooError> {
    let result = payload
        .pointer("/chart/result/0")
        .ok_or(YahooError::NoData)?;

    let timestamps = result
        .get("timestamp")
        .and_then(|v| v.as_array())
        .ok_or_else(|| YahooError::InvalidResponse("Missing timestamps".to_string()))?;

    let quote = result
        .pointer("/indicators/quote/0")
        .ok_or_else(|| YahooError::InvalidResponse("Missing quote block".to_string()))?;

    let required_keys = ["open", "high", "low", "close", "volume"];
    for key in &required_keys {
        if quote.get(key).is_none() {
            return Err(YahooError::InvalidResponse(format!("Missing key: {}", key)));
        }
    }

    let opens = quote["open"].as_array().ok_or_else(|| YahooError::InvalidResponse("Invalid opens".to_string()))?;
    let highs = quote["high"].as_array().ok_or_else(|| YahooError::InvalidResponse("Invalid highs".to_string()))?;
    let lows = quote["low"].as_array().ok_or_else(|| YahooError::InvalidResponse("Invalid lows".to_string()))?;
    let closes = quote["close"].as_array().ok_or_else(|| YahooError::InvalidResponse("Invalid closes".to_string()))?;
    let volumes = quote["volume"].as_array().ok_or_else(|| YahooError::InvalidResponse("Invalid volumes".to_string()))?;

    let adj_closes = result
        .pointer("/indicators/adjclose/0/adjclose")
        .and_then(|v| v.as_array());

    let length = timestamps.len();
    if [opens.len(), highs.len(), lows.len(), closes.len(), volumes.len()]
        .iter()
        .any(|&len| len != length)
    {
        return Err(YahooError::InvalidResponse("Inconsistent array lengths".to_string()));
    }

    if length == 0 {
        return Err(YahooError::NoData);
    }

    let mut records = Vec::with_capacity(length);
    for i in 0..length {
        let timestamp = timestamps[i].as_i64().ok_or_else(|| {
            YahooError::InvalidResponse(format!("Invalid timestamp at index {}", i))
        })?;
        let time = DateTime::from_timestamp(timestamp, 0).ok_or_else(|| {
            YahooError::InvalidResponse(format!("Cannot convert timestamp {} at index {}", timestamp, i))
        })?;

        let close = match closes[i].as_f64() {
            Some(close) => close,
            None => continue,
        };

        records.push(PriceRecord {
            symbol: symbol.to_string(),
            date: time.date_naive(),
            open: opens[i].as_f64().unwrap_or(close),
            high: highs[i].as_f64().unwrap_or(close),
            low: lows[i].as_f64().unwrap_or(close),
            close,
            adjusted_close: adj_closes.and_then(|a| a.get(i)).and_then(|v| v.as_f64()),
            volume: volumes[i].as_f64(),
            daily_return: None,
            ma_7: None,
            high_52w: None,
            low_52w: None,
            volatility_30d: None,
        });
    }

    if records.is_empty() {
        return Err(YahooError::NoData);
    }

    records.sort_by_key(|r| r.date);
    Ok(records)
}

use crate::analytics::chart_for_range;
use crate::data_structures::{
    CompanyInfo, CompareMetrics, CompareResponse, SharedData, SummaryStats, normalize_symbol,
    to_points,
};
use crate::metrics::{self, AnalyticsError};
use crate::movers::{self, DEFAULT_TOP_N};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

// --- Shared API State ---

pub type SharedCompanies = Arc<Vec<CompanyInfo>>;

/// TTL cache for summary responses; aggregation over a year of rows is cheap
/// but the dashboard polls it on every selection change.
pub struct SummaryCache {
    entries: Mutex<HashMap<String, (SummaryStats, Instant)>>,
    ttl: Duration,
}

pub type SharedSummaryCache = Arc<SummaryCache>;

impl SummaryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    async fn get(&self, symbol: &str) -> Option<SummaryStats> {
        let entries = self.entries.lock().await;
        entries.get(symbol).and_then(|(stats, cached_at)| {
            if cached_at.elapsed() < self.ttl {
                Some(stats.clone())
            } else {
                None
            }
        })
    }

    async fn put(&self, symbol: String, stats: SummaryStats) {
        let mut entries = self.entries.lock().await;
        entries.insert(symbol, (stats, Instant::now()));
    }
}

fn analytics_error_response(symbol: &str, error: AnalyticsError) -> Response {
    match error {
        AnalyticsError::InsufficientData => (
            StatusCode::BAD_REQUEST,
            format!("Insufficient data for {}", symbol),
        )
            .into_response(),
        AnalyticsError::InvalidBaseline => (
            StatusCode::BAD_REQUEST,
            format!("Invalid price data for {}", symbol),
        )
            .into_response(),
    }
}

// --- Handlers ---

pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

#[instrument(skip(companies))]
pub async fn get_companies_handler(State(companies): State<SharedCompanies>) -> impl IntoResponse {
    debug!(company_count = companies.len(), "Returning company list");
    Json(companies.as_ref().clone())
}

#[derive(Debug, Deserialize)]
pub struct SeriesParams {
    pub days: Option<usize>,
}

#[instrument(skip(data))]
pub async fn get_series_handler(
    State(data): State<SharedData>,
    Path(symbol): Path<String>,
    Query(params): Query<SeriesParams>,
) -> Response {
    let norm_symbol = normalize_symbol(&symbol);

    let data_guard = data.lock().await;
    let Some(records) = data_guard.get(&norm_symbol) else {
        warn!(symbol = %norm_symbol, "Series requested for unknown symbol");
        return (StatusCode::NOT_FOUND, "Symbol not found").into_response();
    };

    let window = match params.days {
        Some(days) => crate::analytics::slice_range(records, days),
        None => &records[..],
    };

    info!(symbol = %norm_symbol, rows = window.len(), "Returning series");
    Json(window.to_vec()).into_response()
}

#[instrument(skip(data, cache))]
pub async fn get_summary_handler(
    State(data): State<SharedData>,
    State(cache): State<SharedSummaryCache>,
    Path(symbol): Path<String>,
) -> Response {
    let norm_symbol = normalize_symbol(&symbol);

    if let Some(cached) = cache.get(&norm_symbol).await {
        debug!(symbol = %norm_symbol, "Summary cache hit");
        return Json(cached).into_response();
    }

    let data_guard = data.lock().await;
    let Some(records) = data_guard.get(&norm_symbol) else {
        return (StatusCode::NOT_FOUND, "Symbol not found").into_response();
    };

    match metrics::summary(&norm_symbol, records) {
        Ok(stats) => {
            drop(data_guard);
            cache.put(norm_symbol.clone(), stats.clone()).await;
            info!(symbol = %norm_symbol, "Computed summary");
            Json(stats).into_response()
        }
        Err(e) => analytics_error_response(&norm_symbol, e),
    }
}

#[derive(Debug, Deserialize)]
pub struct CompareParams {
    pub symbol1: String,
    pub symbol2: String,
}

#[instrument(skip(data), fields(symbol1 = %params.symbol1, symbol2 = %params.symbol2))]
pub async fn compare_handler(
    State(data): State<SharedData>,
    axum_extra::extract::Query(params): axum_extra::extract::Query<CompareParams>,
) -> Response {
    let norm_symbol1 = normalize_symbol(&params.symbol1);
    let norm_symbol2 = normalize_symbol(&params.symbol2);

    let data_guard = data.lock().await;

    let metrics_for = |norm_symbol: &str| -> Result<CompareMetrics, Response> {
        let records = data_guard
            .get(norm_symbol)
            .ok_or_else(|| (StatusCode::NOT_FOUND, "Symbol not found").into_response())?;
        metrics::compare_metrics(norm_symbol, records)
            .map_err(|e| analytics_error_response(norm_symbol, e))
    };

    let metrics1 = match metrics_for(&norm_symbol1) {
        Ok(m) => m,
        Err(resp) => return resp,
    };
    let metrics2 = match metrics_for(&norm_symbol2) {
        Ok(m) => m,
        Err(resp) => return resp,
    };

    info!("Computed comparison metrics");
    Json(CompareResponse {
        symbol1: metrics1,
        symbol2: metrics2,
    })
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct ChartParams {
    pub days: Option<usize>,
}

/// Sliced history, fitted trend and assembled gap-padded chart series for
/// one symbol, ready for the dashboard's line chart.
#[instrument(skip(data))]
pub async fn get_chart_handler(
    State(data): State<SharedData>,
    Path(symbol): Path<String>,
    Query(params): Query<ChartParams>,
) -> Response {
    let norm_symbol = normalize_symbol(&symbol);
    let window_days = params.days.unwrap_or(30);

    let data_guard = data.lock().await;
    let Some(records) = data_guard.get(&norm_symbol) else {
        return (StatusCode::NOT_FOUND, "Symbol not found").into_response();
    };

    let points = to_points(records);
    drop(data_guard);

    let chart = chart_for_range(&points, window_days);
    info!(symbol = %norm_symbol, window_days, labels = chart.labels.len(), "Assembled chart series");
    Json(chart).into_response()
}

#[derive(Debug, Deserialize)]
pub struct MoversParams {
    pub top: Option<usize>,
}

#[instrument(skip(data))]
pub async fn get_movers_handler(
    State(data): State<SharedData>,
    Query(params): Query<MoversParams>,
) -> impl IntoResponse {
    let top_n = params.top.unwrap_or(DEFAULT_TOP_N);

    // Sorted for a deterministic accumulation order
    let mut symbols: Vec<String> = {
        let data_guard = data.lock().await;
        data_guard.keys().cloned().collect()
    };
    symbols.sort();

    let ranked = movers::rank(
        &symbols,
        |symbol| {
            let data = data.clone();
            async move {
                let data_guard = data.lock().await;
                data_guard
                    .get(&symbol)
                    .map(|records| to_points(records))
                    .ok_or("symbol missing from store")
            }
        },
        top_n,
    )
    .await;

    info!(
        gainers = ranked.gainers.len(),
        losers = ranked.losers.len(),
        "Ranked top movers"
    );
    Json(ranked)
}

use crate::data_structures::PricePoint;
use crate::metrics::series_return;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::Debug;
use std::future::Future;
use tracing::{debug, instrument, warn};

pub const DEFAULT_TOP_N: usize = 5;

/// One ranked symbol. `pct_return` spans the entire supplied series; the
/// dashboard labels it a "30d return" because the provider historically
/// served 30-row windows, but nothing here enforces that window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoverEntry {
    pub symbol: String,
    pub pct_return: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RankedMovers {
    pub gainers: Vec<MoverEntry>,
    pub losers: Vec<MoverEntry>,
}

/// Rank a batch of symbols by whole-series return, fetching each series
/// sequentially through `fetch`. A symbol whose fetch fails, whose series is
/// too short, or whose baseline close is non-positive is skipped; the batch
/// itself never fails. When fewer entries than `top_n` survive, gainers and
/// losers overlap rather than being deduplicated.
#[instrument(skip(symbols, fetch), fields(symbol_count = symbols.len()))]
pub async fn rank<F, Fut, E>(symbols: &[String], mut fetch: F, top_n: usize) -> RankedMovers
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Vec<PricePoint>, E>>,
    E: Debug,
{
    let mut entries: Vec<MoverEntry> = Vec::with_capacity(symbols.len());

    for symbol in symbols {
        let series = match fetch(symbol.clone()).await {
            Ok(series) => series,
            Err(e) => {
                warn!(symbol, error = ?e, "Failed to fetch series, skipping symbol");
                continue;
            }
        };

        match series_return(&series) {
            Ok(pct_return) => {
                debug!(symbol, pct_return, points = series.len(), "Computed return");
                entries.push(MoverEntry {
                    symbol: symbol.clone(),
                    pct_return,
                });
            }
            Err(e) => {
                warn!(symbol, error = ?e, "Excluding symbol from ranking");
            }
        }
    }

    entries.sort_by(|a, b| {
        b.pct_return
            .partial_cmp(&a.pct_return)
            .unwrap_or(Ordering::Equal)
    });

    let gainers: Vec<MoverEntry> = entries.iter().take(top_n).cloned().collect();
    let start = entries.len().saturating_sub(top_n);
    let losers: Vec<MoverEntry> = entries[start..].iter().rev().cloned().collect();

    RankedMovers { gainers, losers }
}

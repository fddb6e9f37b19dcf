use crate::config::AppConfig;
use crate::data_structures::{SharedData, current_refresh_interval, normalize_symbol};
use crate::metrics;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Background refresh loop: seed the store from the CSV directory when one
/// is configured, then keep every configured symbol's history fresh from the
/// provider. The cadence tightens during exchange hours and relaxes outside
/// them.
#[instrument(skip(data, config))]
pub async fn run(data: SharedData, config: AppConfig) {
    if let Some(dir) = &config.data_dir {
        seed_from_csv(&data, Path::new(dir)).await;
    }

    if config.symbols.is_empty() {
        info!("No symbols configured, worker exiting after seed");
        return;
    }

    let mut client = match crate::yahoo::YahooClient::new(true, 30) {
        Ok(client) => {
            info!("Yahoo client initialized successfully");
            client
        }
        Err(e) => {
            error!(?e, "Failed to initialize Yahoo client");
            return;
        }
    };

    let symbols: Vec<String> = config.symbols.iter().map(|s| normalize_symbol(s)).collect();
    info!(total_symbols = symbols.len(), "Loaded symbol list");

    let mut iteration_count = 0u64;

    loop {
        iteration_count += 1;
        debug!(iteration = iteration_count, "Starting data fetch cycle");

        for symbol in &symbols {
            match client.get_history(symbol, &config.history_range).await {
                Ok(mut records) => {
                    metrics::enrich(&mut records);
                    let data_points = records.len();

                    let mut data_guard = data.lock().await;
                    data_guard.insert(symbol.clone(), records);
                    drop(data_guard);

                    debug!(symbol, data_points, "Updated symbol data");
                }
                Err(e) => {
                    // Stale data stays in place; the failed refresh is retried
                    // on the next cycle
                    warn!(iteration = iteration_count, symbol, error = ?e, "Failed to fetch history");
                }
            }

            // Sleep 1-2 seconds between symbols
            let sleep_duration = Duration::from_millis(1000 + (rand::random::<u64>() % 1000));
            debug!(symbol, sleep_ms = sleep_duration.as_millis(), "Sleeping between symbols");
            tokio::time::sleep(sleep_duration).await;
        }

        let interval = current_refresh_interval(
            &config.market_hours_config,
            config.market_refresh_interval,
            config.off_hours_interval,
            config.enable_market_hours,
        );
        info!(iteration = iteration_count, next_refresh = ?interval, "Completed full refresh cycle");
        tokio::time::sleep(interval).await;
    }
}

#[instrument(skip(data))]
async fn seed_from_csv(data: &SharedData, dir: &Path) {
    match crate::csv_store::load_dir(dir) {
        Ok(mut seeded) => {
            metrics::enrich_all(&mut seeded);
            let symbol_count = seeded.len();

            let mut data_guard = data.lock().await;
            for (symbol, records) in seeded {
                data_guard.entry(symbol).or_insert(records);
            }
            drop(data_guard);

            info!(symbol_count, "Seeded store from CSV directory");
        }
        Err(e) => {
            warn!(?dir, error = ?e, "Failed to seed from CSV directory");
        }
    }
}

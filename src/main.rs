pub mod analytics;
pub mod api;
pub mod config;
pub mod csv_store;
pub mod data_structures;
pub mod metrics;
pub mod movers;
pub mod worker;
pub mod yahoo;

use crate::api::{SharedCompanies, SharedSummaryCache, SummaryCache};
use crate::data_structures::{CompanyInfo, InMemoryData, SharedData, display_name, normalize_symbol};
use axum::{Router, extract::FromRef, http::HeaderValue, routing::get};
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

#[derive(Clone)]
struct AppState {
    data: SharedData,
    companies: SharedCompanies,
    summary_cache: SharedSummaryCache,
}

impl FromRef<AppState> for SharedData {
    fn from_ref(app_state: &AppState) -> SharedData {
        app_state.data.clone()
    }
}

impl FromRef<AppState> for SharedCompanies {
    fn from_ref(app_state: &AppState) -> SharedCompanies {
        app_state.companies.clone()
    }
}

impl FromRef<AppState> for SharedSummaryCache {
    fn from_ref(app_state: &AppState) -> SharedSummaryCache {
        app_state.summary_cache.clone()
    }
}

fn build_companies(symbols: &[String]) -> SharedCompanies {
    let mut companies: Vec<CompanyInfo> = symbols
        .iter()
        .map(|raw| {
            let symbol = normalize_symbol(raw);
            CompanyInfo {
                name: display_name(&symbol),
                symbol,
                exchange: "NSE".to_string(),
            }
        })
        .collect();
    companies.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    Arc::new(companies)
}

#[tokio::main]
async fn main() {
    let app_config = config::AppConfig::load();

    // Initialize tracing with node_name in all logs
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let _span = tracing::info_span!("node", name = %app_config.node_name).entered();

    tracing::info!("Starting stockintel");
    tracing::info!(?app_config.environment, port = app_config.port, symbols = app_config.symbols.len(), "Loaded configuration");

    let shared_data: SharedData = Arc::new(Mutex::new(InMemoryData::new()));
    let companies = build_companies(&app_config.symbols);
    let summary_cache: SharedSummaryCache = Arc::new(SummaryCache::new(app_config.cache_ttl));

    let app_state = AppState {
        data: shared_data.clone(),
        companies,
        summary_cache,
    };

    tracing::info!("Spawning background worker");
    tokio::spawn(worker::run(shared_data.clone(), app_config.clone()));

    let allowed_origins: Vec<HeaderValue> = app_config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods(Any)
        .allow_headers(Any);

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default().per_second(10).burst_size(20).finish().unwrap(),
    );

    let app = Router::new()
        .route("/health", get(api::health_handler))
        .route("/companies", get(api::get_companies_handler))
        .route("/data/{symbol}", get(api::get_series_handler))
        .route("/summary/{symbol}", get(api::get_summary_handler))
        .route("/compare", get(api::compare_handler))
        .route("/chart/{symbol}", get(api::get_chart_handler))
        .route(
            "/movers",
            get(api::get_movers_handler).layer(GovernorLayer::new(governor_conf)),
        )
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], app_config.port));
    tracing::info!(%addr, "Server listening");
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .unwrap();
}

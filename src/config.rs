use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::time::Duration;

// Exchange session hours driving the worker refresh cadence
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MarketHours {
    pub open_hour: u32,      // e.g., 9 for 9am
    pub close_hour: u32,     // e.g., 16 for 4pm
    pub timezone: String,    // e.g., "Asia/Kolkata"
    pub weekdays_only: bool, // true for Monday-Friday only
}

impl Default for MarketHours {
    fn default() -> Self {
        Self {
            open_hour: 9,
            close_hour: 16,
            timezone: "Asia/Kolkata".to_string(),
            weekdays_only: true,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MarketHoursConfig {
    #[serde(default)]
    pub default_market_hours: MarketHours,
    #[serde(default)]
    pub symbol_specific: HashMap<String, MarketHours>, // Future: per-symbol hours
}

// YAML-serializable configuration structure
#[derive(Serialize, Deserialize, Debug)]
pub struct ConfigYaml {
    pub node_name: String,
    pub symbols: Vec<String>,
    pub data_dir: Option<String>,
    pub history_range: Option<String>,
    pub market_refresh_interval_secs: u64,
    pub off_hours_interval_secs: Option<u64>,
    pub enable_market_hours: Option<bool>,
    pub market_hours_config: Option<MarketHoursConfig>,
    pub cache_ttl_secs: Option<u64>,
    pub allowed_origins: Option<Vec<String>>,
    pub environment: String,
    pub port: u16,
}

// Holds application-wide settings
#[derive(Clone)]
pub struct AppConfig {
    pub node_name: String,
    pub symbols: Vec<String>,
    pub data_dir: Option<String>,
    pub history_range: String,
    pub market_refresh_interval: Duration,
    pub off_hours_interval: Duration,
    pub enable_market_hours: bool,
    pub market_hours_config: MarketHoursConfig,
    pub cache_ttl: Duration,
    pub allowed_origins: Vec<String>,
    pub environment: String,
    pub port: u16,
}

const DEFAULT_SYMBOLS: &[&str] = &["RELIANCE", "TCS", "INFY", "HDFCBANK", "ICICIBANK"];

fn default_origins() -> Vec<String> {
    vec![
        "http://127.0.0.1:5500".to_string(),
        "http://localhost:5500".to_string(),
    ]
}

impl AppConfig {
    // Load configuration from YAML file or environment variables
    pub fn load() -> Self {
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            Self::from_yaml(&config_file)
        } else {
            Self::from_env()
        }
    }

    // Load configuration from YAML file
    pub fn from_yaml(file_path: &str) -> Self {
        let yaml_content = fs::read_to_string(file_path)
            .unwrap_or_else(|e| panic!("Failed to read config file {}: {}", file_path, e));

        let yaml_config: ConfigYaml = serde_yaml::from_str(&yaml_content)
            .unwrap_or_else(|e| panic!("Failed to parse YAML config: {}", e));

        Self {
            node_name: yaml_config.node_name,
            symbols: yaml_config.symbols,
            data_dir: yaml_config.data_dir,
            history_range: yaml_config.history_range.unwrap_or_else(|| "1y".to_string()),
            market_refresh_interval: Duration::from_secs(yaml_config.market_refresh_interval_secs),
            off_hours_interval: Duration::from_secs(yaml_config.off_hours_interval_secs.unwrap_or(3600)),
            enable_market_hours: yaml_config.enable_market_hours.unwrap_or(true),
            market_hours_config: yaml_config.market_hours_config.unwrap_or_default(),
            cache_ttl: Duration::from_secs(yaml_config.cache_ttl_secs.unwrap_or(300)),
            allowed_origins: yaml_config.allowed_origins.unwrap_or_else(default_origins),
            environment: yaml_config.environment,
            port: yaml_config.port,
        }
    }

    // Load all configuration from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok(); // Load .env file if present

        let symbols = env::var("SYMBOLS")
            .map(|raw| {
                raw.split(',')
                    .filter(|s| !s.is_empty())
                    .map(|s| s.trim().to_string())
                    .collect::<Vec<String>>()
            })
            .unwrap_or_else(|_| DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect());

        let data_dir = env::var("DATA_DIR").ok();

        let history_range = env::var("HISTORY_RANGE").unwrap_or_else(|_| "1y".to_string());

        let market_refresh_interval_secs = env::var("MARKET_REFRESH_INTERVAL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(300); // Default to 5 minutes

        let off_hours_interval_secs = env::var("OFF_HOURS_INTERVAL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3600); // Default to 1 hour

        let enable_market_hours = env::var("ENABLE_MARKET_HOURS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(true);

        let cache_ttl_secs = env::var("CACHE_TTL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(300); // Default to 5 minutes

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect::<Vec<String>>()
            })
            .unwrap_or_else(|_| default_origins());

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8000); // Default to 8000

        let node_name = env::var("NODE_NAME").unwrap_or_else(|_| "stockintel".to_string());

        Self {
            node_name,
            symbols,
            data_dir,
            history_range,
            market_refresh_interval: Duration::from_secs(market_refresh_interval_secs),
            off_hours_interval: Duration::from_secs(off_hours_interval_secs),
            enable_market_hours,
            market_hours_config: MarketHoursConfig::default(), // Default NSE session hours
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            allowed_origins,
            environment,
            port,
        }
    }
}

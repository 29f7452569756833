//! Environment driven settings of the dashboard binary.

use std::path::PathBuf;

use binance_datafeed::DatafeedSettings;

use super::dashboard::ViewMode;

pub const DEFAULT_PRIMARY_SYMBOL: &str = "NEOUSDT";
pub const DEFAULT_SECONDARY_SYMBOL: &str = "BTCUSDT";
pub const DEFAULT_LOG_FILE: &str = "crypto-charts.log";

/// Directory holding the data files when `WATCHLIST_DIR` is unset.
const DATA_DIR_NAME: &str = ".crypto-charts";

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub datafeed: DatafeedSettings,
    pub watchlist_dir: PathBuf,
    pub log_file: PathBuf,
    pub primary_symbol: String,
    pub secondary_symbol: String,
    pub view_mode: ViewMode,
}

impl AppSettings {
    /// Read `WATCHLIST_DIR`, `LOG_FILE`, `PRIMARY_SYMBOL`, `SECONDARY_SYMBOL` and `VIEW_MODE`,
    /// plus the data-feed variables.
    pub fn from_env() -> Self {
        Self::from_lookup(DatafeedSettings::from_env(), |key| std::env::var(key).ok())
    }

    fn from_lookup<F>(datafeed: DatafeedSettings, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            datafeed,
            watchlist_dir: non_empty("WATCHLIST_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| default_data_dir(lookup("HOME"))),
            log_file: non_empty("LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
            primary_symbol: non_empty("PRIMARY_SYMBOL")
                .map(|symbol| symbol.to_uppercase())
                .unwrap_or_else(|| DEFAULT_PRIMARY_SYMBOL.to_string()),
            secondary_symbol: non_empty("SECONDARY_SYMBOL")
                .map(|symbol| symbol.to_uppercase())
                .unwrap_or_else(|| DEFAULT_SECONDARY_SYMBOL.to_string()),
            view_mode: non_empty("VIEW_MODE")
                .and_then(|mode| ViewMode::parse(&mode))
                .unwrap_or_default(),
        }
    }
}

fn default_data_dir(home: Option<String>) -> PathBuf {
    match home {
        Some(home) if !home.trim().is_empty() => PathBuf::from(home).join(DATA_DIR_NAME),
        _ => PathBuf::from(DATA_DIR_NAME),
    }
}

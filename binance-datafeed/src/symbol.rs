//! Symbol search over the known trading pairs, and static symbol resolution.

use crate::{
    config::{EXCHANGE_NAME, SYMBOL_TYPE},
    resolution::Resolution,
};
use serde::{Deserialize, Serialize};

/// Trading pairs offered by symbol search.
pub const POPULAR_SYMBOLS: [&str; 16] = [
    "BTCUSDT", "ETHUSDT", "BNBUSDT", "ADAUSDT", "DOGEUSDT", "XRPUSDT", "DOTUSDT", "UNIUSDT",
    "SOLUSDT", "MATICUSDT", "LTCUSDT", "LINKUSDT", "AVAXUSDT", "ATOMUSDT", "ETCUSDT", "NEOUSDT",
];

/// Human readable pair name, eg/ "BTCUSDT" -> "BTC/USDT".
pub fn display_name(symbol: &str) -> String {
    symbol.replacen("USDT", "/USDT", 1)
}

/// One symbol search match.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct SearchSymbolResult {
    pub symbol: String,
    pub full_name: String,
    pub description: String,
    pub exchange: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Case-insensitive substring search of `user_input` against each known pair's symbol
/// and display name.
///
/// There is a single exchange and symbol type, so the `exchange` and `symbol_type` filters
/// requested by the chart never narrow the result.
pub fn search_symbols(
    user_input: &str,
    _exchange: &str,
    _symbol_type: &str,
) -> Vec<SearchSymbolResult> {
    let needle = user_input.to_lowercase();

    POPULAR_SYMBOLS
        .iter()
        .filter(|symbol| {
            symbol.to_lowercase().contains(&needle)
                || display_name(symbol).to_lowercase().contains(&needle)
        })
        .map(|symbol| SearchSymbolResult {
            symbol: symbol.to_string(),
            full_name: format!("{EXCHANGE_NAME}:{symbol}"),
            description: display_name(symbol),
            exchange: EXCHANGE_NAME.to_string(),
            kind: SYMBOL_TYPE.to_string(),
        })
        .collect()
}

/// Static metadata the chart needs to draw a symbol.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct SymbolInfo {
    pub ticker: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub session: String,
    pub timezone: String,
    pub exchange: String,
    pub listed_exchange: String,
    pub minmov: u32,
    pub pricescale: u32,
    pub has_intraday: bool,
    pub has_weekly_and_monthly: bool,
    pub supported_resolutions: Vec<Resolution>,
    pub volume_precision: u8,
    pub data_status: DataStatus,
    pub format: String,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataStatus {
    Streaming,
    EndOfDay,
    DelayedStreaming,
}

impl SymbolInfo {
    /// Symbol used for exchange requests: the ticker, or the name if the ticker is empty.
    pub fn exchange_symbol(&self) -> &str {
        if self.ticker.is_empty() {
            &self.name
        } else {
            &self.ticker
        }
    }
}

/// Synthesise [`SymbolInfo`] for any symbol string. The symbol is not checked against the
/// exchange, an unknown pair resolves and later yields no bars.
pub fn resolve_symbol(symbol_name: &str) -> SymbolInfo {
    SymbolInfo {
        ticker: symbol_name.to_string(),
        name: symbol_name.to_string(),
        description: display_name(symbol_name),
        kind: SYMBOL_TYPE.to_string(),
        session: "24x7".to_string(),
        timezone: "Etc/UTC".to_string(),
        exchange: EXCHANGE_NAME.to_string(),
        listed_exchange: EXCHANGE_NAME.to_string(),
        minmov: 1,
        pricescale: 100,
        has_intraday: true,
        has_weekly_and_monthly: true,
        supported_resolutions: Resolution::supported(),
        volume_precision: 2,
        data_status: DataStatus::Streaming,
        format: "price".to_string(),
    }
}

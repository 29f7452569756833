//! Watchlist model and the catalog of pairs offered by the add menu.

use binance_datafeed::symbol::display_name;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Symbol shown when the watchlist would otherwise start empty.
pub const DEFAULT_SYMBOL: &str = "NEOUSDT";
pub const DEFAULT_NAME: &str = "NEO";

/// One watched pair. Serialised with the `addedAt` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistItem {
    pub symbol: String,
    pub name: String,
    /// Milliseconds since the unix epoch
    pub added_at: i64,
}

/// Watchlist entry used on first run and whenever the stored list is empty or unreadable.
pub fn default_item(now_ms: i64) -> WatchlistItem {
    WatchlistItem {
        symbol: DEFAULT_SYMBOL.to_string(),
        name: DEFAULT_NAME.to_string(),
        added_at: now_ms,
    }
}

/// Catalog entry of the add menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub symbol: &'static str,
    pub name: &'static str,
}

pub const POPULAR_CRYPTOS: [CatalogEntry; 9] = [
    CatalogEntry { symbol: "NEOUSDT", name: "NEO" },
    CatalogEntry { symbol: "BTCUSDT", name: "Bitcoin" },
    CatalogEntry { symbol: "ETHUSDT", name: "Ethereum" },
    CatalogEntry { symbol: "BNBUSDT", name: "BNB" },
    CatalogEntry { symbol: "ADAUSDT", name: "Cardano" },
    CatalogEntry { symbol: "DOGEUSDT", name: "Dogecoin" },
    CatalogEntry { symbol: "XRPUSDT", name: "Ripple" },
    CatalogEntry { symbol: "SOLUSDT", name: "Solana" },
    CatalogEntry { symbol: "MATICUSDT", name: "Polygon" },
];

/// Catalog entries whose name or symbol contains `term`, ignoring case.
pub fn filter_catalog(term: &str) -> Vec<&'static CatalogEntry> {
    let needle = term.to_lowercase();
    POPULAR_CRYPTOS
        .iter()
        .filter(|entry| {
            entry.name.to_lowercase().contains(&needle)
                || entry.symbol.to_lowercase().contains(&needle)
        })
        .collect()
}

/// Ordered list of watched pairs, unique by symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watchlist {
    items: Vec<WatchlistItem>,
}

impl Watchlist {
    pub fn new(items: Vec<WatchlistItem>) -> Self {
        Self { items }
    }

    /// Append `symbol` stamped with the current time. See [`Watchlist::add_at`].
    pub fn add(&mut self, symbol: &str, name: Option<&str>) -> bool {
        self.add_at(symbol, name, Utc::now().timestamp_millis())
    }

    /// Append `symbol` unless it is already watched. Without a name the display name
    /// (eg/ "BTC/USDT") is used. Returns whether the list changed.
    pub fn add_at(&mut self, symbol: &str, name: Option<&str>, added_at: i64) -> bool {
        if self.contains(symbol) {
            return false;
        }

        self.items.push(WatchlistItem {
            symbol: symbol.to_string(),
            name: name.map_or_else(|| display_name(symbol), str::to_string),
            added_at,
        });
        true
    }

    /// Remove `symbol`, returning whether it was present.
    pub fn remove(&mut self, symbol: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.symbol != symbol);
        self.items.len() != before
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.items.iter().any(|item| item.symbol == symbol)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[WatchlistItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&WatchlistItem> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

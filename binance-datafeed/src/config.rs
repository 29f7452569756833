//! Data-feed configuration: what the chart is told on ready, and how the feed connects.

use crate::resolution::Resolution;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Name of the only exchange this data feed serves.
pub const EXCHANGE_NAME: &str = "Binance";

/// The only symbol type this data feed serves.
pub const SYMBOL_TYPE: &str = "crypto";

/// Default Binance spot REST API base url.
pub const DEFAULT_REST_URL: &str = "https://api.binance.com";

/// Default Binance spot raw stream url. All kline streams share this one socket.
///
/// See docs: <https://developers.binance.com/docs/binance-spot-api-docs/web-socket-streams>
pub const DEFAULT_WS_URL: &str = "wss://stream.binance.com:9443/ws";

/// Fixed delay before re-opening a closed socket.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Maximum klines requested per historical bars call.
pub const KLINES_REQUEST_LIMIT: u16 = 1_000;

/// Default timeout for a single klines request.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration handed to the chart when the data feed is ready.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct DatafeedConfiguration {
    pub supported_resolutions: Vec<Resolution>,
    pub exchanges: Vec<ExchangeDescriptor>,
    pub symbols_types: Vec<SymbolTypeDescriptor>,
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct ExchangeDescriptor {
    pub value: String,
    pub name: String,
    pub desc: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct SymbolTypeDescriptor {
    pub name: String,
    pub value: String,
}

impl Default for DatafeedConfiguration {
    fn default() -> Self {
        Self {
            supported_resolutions: Resolution::supported(),
            exchanges: vec![ExchangeDescriptor {
                value: EXCHANGE_NAME.to_string(),
                name: EXCHANGE_NAME.to_string(),
                desc: "Binance Exchange".to_string(),
            }],
            symbols_types: vec![SymbolTypeDescriptor {
                name: SYMBOL_TYPE.to_string(),
                value: SYMBOL_TYPE.to_string(),
            }],
        }
    }
}

/// How live kline ticks from the shared socket reach registered listeners.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TickRouting {
    /// Deliver a tick only to listeners subscribed to the tick's symbol.
    #[default]
    BySymbol,
    /// Deliver every tick to every listener, whatever symbol it subscribed to.
    Broadcast,
}

impl TickRouting {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "by_symbol" | "symbol" => Some(Self::BySymbol),
            "broadcast" | "all" => Some(Self::Broadcast),
            _ => None,
        }
    }
}

/// Connection settings for [`BinanceDatafeed`](crate::datafeed::BinanceDatafeed).
#[derive(Clone, Debug)]
pub struct DatafeedSettings {
    /// Binance REST base url
    pub rest_url: String,
    /// Binance raw stream WebSocket url
    pub ws_url: String,
    /// Fixed delay before reconnecting a closed socket
    pub reconnect_delay: Duration,
    /// Maximum klines per historical request
    pub klines_limit: u16,
    /// Timeout for each klines request
    pub http_timeout: Duration,
    /// Live tick routing
    pub tick_routing: TickRouting,
}

impl Default for DatafeedSettings {
    fn default() -> Self {
        Self {
            rest_url: DEFAULT_REST_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            klines_limit: KLINES_REQUEST_LIMIT,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            tick_routing: TickRouting::default(),
        }
    }
}

impl DatafeedSettings {
    /// Defaults overridden by `BINANCE_REST_URL`, `BINANCE_WS_URL`, `DATAFEED_RECONNECT_SECS`
    /// and `DATAFEED_TICK_ROUTING`. Malformed values, and a zero reconnect delay, keep the
    /// default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            rest_url: non_empty("BINANCE_REST_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.rest_url),
            ws_url: non_empty("BINANCE_WS_URL").unwrap_or(defaults.ws_url),
            reconnect_delay: non_empty("DATAFEED_RECONNECT_SECS")
                .and_then(|secs| secs.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.reconnect_delay),
            tick_routing: non_empty("DATAFEED_TICK_ROUTING")
                .and_then(|value| TickRouting::parse(&value))
                .unwrap_or(defaults.tick_routing),
            ..defaults
        }
    }

    pub fn with_rest_url(mut self, url: impl Into<String>) -> Self {
        self.rest_url = url.into();
        self
    }

    pub fn with_ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = url.into();
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_tick_routing(mut self, routing: TickRouting) -> Self {
        self.tick_routing = routing;
        self
    }
}

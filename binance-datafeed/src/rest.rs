//! Historical klines over the Binance REST API.

use crate::{
    bar::Bar,
    config::{DatafeedSettings, KLINES_REQUEST_LIMIT},
    error::DataFeedError,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Parameters of one historical klines request.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct KlineRequest {
    /// Exchange symbol, eg/ "BTCUSDT"
    pub symbol: String,
    /// Binance kline interval, eg/ "1h"
    pub interval: &'static str,
    /// Inclusive start, milliseconds since the unix epoch
    pub start_time_ms: i64,
    /// End, milliseconds since the unix epoch
    pub end_time_ms: i64,
    pub limit: u16,
}

impl KlineRequest {
    /// Build a request from a chart period given in seconds.
    pub fn from_period(symbol: &str, interval: &'static str, from_secs: i64, to_secs: i64) -> Self {
        Self {
            symbol: symbol.to_string(),
            interval,
            start_time_ms: from_secs.saturating_mul(1_000),
            end_time_ms: to_secs.saturating_mul(1_000),
            limit: KLINES_REQUEST_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: u16) -> Self {
        self.limit = limit;
        self
    }
}

/// Source of historical bars. The data feed only talks to candles through this trait.
#[async_trait]
pub trait KlineSource: Send + Sync {
    async fn fetch_klines(&self, request: &KlineRequest) -> Result<Vec<Bar>, DataFeedError>;
}

/// [`KlineSource`] backed by the Binance spot `/api/v3/klines` endpoint.
#[derive(Clone, Debug)]
pub struct BinanceRestClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl BinanceRestClient {
    pub fn new(settings: &DatafeedSettings) -> Self {
        Self::with_client(Client::new(), settings)
    }

    pub fn with_client(client: Client, settings: &DatafeedSettings) -> Self {
        Self {
            client,
            base_url: settings.rest_url.clone(),
            timeout: settings.http_timeout,
        }
    }

    fn klines_endpoint(&self, request: &KlineRequest) -> String {
        format!("{}/api/v3/klines", self.base_url)
            + &format!(
                "?symbol={}&interval={}&startTime={}&endTime={}&limit={}",
                request.symbol.to_ascii_uppercase(),
                request.interval,
                request.start_time_ms,
                request.end_time_ms,
                request.limit
            )
    }
}

#[async_trait]
impl KlineSource for BinanceRestClient {
    async fn fetch_klines(&self, request: &KlineRequest) -> Result<Vec<Bar>, DataFeedError> {
        let endpoint = self.klines_endpoint(request);
        debug!(%endpoint, "requesting klines");

        let response = self
            .client
            .get(&endpoint)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        let rows = response.json::<Vec<Vec<Value>>>().await?;
        rows.iter().map(|row| Bar::from_kline_row(row)).collect()
    }
}

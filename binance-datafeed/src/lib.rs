#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cast_possible_truncation,
    clippy::unused_self,
    clippy::cast_possible_wrap,
    rust_2018_idioms,
    missing_debug_implementations
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments, type_alias_bounds)]

//! # Binance Datafeed
//! Charting data-feed adapter over Binance public market data:
//! * **Historical**: OHLCV bars from the spot `/api/v3/klines` REST endpoint.
//! * **Live**: kline updates for every subscribed symbol multiplexed over one shared
//!   WebSocket, re-subscribed after a fixed reconnect delay.
//! * **Listener registry**: one exchange subscription per symbol, however many chart
//!   listeners share it.
//!
//! ## Examples
//! See `examples/live_klines.rs` for a runnable demo.
//!
//! ```rust,no_run
//! use binance_datafeed::{
//!     BinanceDatafeed, ChartDatafeed, DatafeedSettings, PeriodParams, Resolution,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let feed = BinanceDatafeed::new(DatafeedSettings::from_env());
//!     let info = feed.resolve_symbol("BTCUSDT");
//!     let resolution = Resolution::new("60");
//!
//!     let now = chrono::Utc::now().timestamp();
//!     let history = feed
//!         .get_bars(&info, &resolution, PeriodParams { from: now - 86_400, to: now, first_data_request: true })
//!         .await
//!         .unwrap();
//!     println!("{} bars", history.bars().len());
//!
//!     feed.subscribe_bars(&info, &resolution, Arc::new(|bar| println!("{bar:?}")), "demo".into())
//!         .unwrap();
//! }
//! ```

/// Historical and live [`Bar`](bar::Bar)s and the Binance wire formats they are decoded from.
pub mod bar;

/// [`DatafeedConfiguration`](config::DatafeedConfiguration) announced on ready, and
/// environment driven [`DatafeedSettings`](config::DatafeedSettings).
pub mod config;

/// The [`ChartDatafeed`](datafeed::ChartDatafeed) contract and its Binance implementation.
pub mod datafeed;

/// All [`Error`](std::error::Error)s generated in binance-datafeed.
pub mod error;

/// Chart [`Resolution`](resolution::Resolution) codes and Binance kline intervals.
pub mod resolution;

/// Historical klines [`KlineSource`](rest::KlineSource) over the Binance REST API.
pub mod rest;

/// Shared WebSocket task carrying every subscribed kline stream.
pub mod stream;

/// Listener registry de-duplicating exchange subscriptions per symbol.
pub mod subscription;

/// Symbol search and resolution.
pub mod symbol;

pub use bar::Bar;
pub use config::{DatafeedConfiguration, DatafeedSettings, TickRouting};
pub use datafeed::{BinanceDatafeed, ChartDatafeed, History, PeriodParams};
pub use error::DataFeedError;
pub use resolution::Resolution;
pub use rest::{BinanceRestClient, KlineRequest, KlineSource};
pub use stream::ConnectionStatus;
pub use subscription::{ListenerGuid, TickCallback};
pub use symbol::{SearchSymbolResult, SymbolInfo};


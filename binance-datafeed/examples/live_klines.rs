use binance_datafeed::{
    BinanceDatafeed, ChartDatafeed, DatafeedSettings, History, PeriodParams, Resolution,
};
use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    // Initialise INFO Tracing log subscriber
    init_logging();

    let feed = BinanceDatafeed::new(DatafeedSettings::from_env());
    let resolution = Resolution::new("1");

    for symbol in ["BTCUSDT", "ETHUSDT"] {
        let info = feed.resolve_symbol(symbol);

        // Last hour of 1m bars
        let now = Utc::now().timestamp();
        let period = PeriodParams {
            from: now - 60 * resolution.duration_secs(),
            to: now,
            first_data_request: true,
        };

        match feed.get_bars(&info, &resolution, period).await {
            Ok(History::Bars(bars)) => info!(symbol, bars = bars.len(), last = ?bars.last(), "history"),
            Ok(History::NoData) => warn!(symbol, "no history"),
            Err(error) => warn!(symbol, %error, "history request failed"),
        }

        let label = info.description.clone();
        let on_tick = Arc::new(move |bar: binance_datafeed::Bar| {
            info!(pair = %label, time = ?bar.open_time(), close = bar.close, "live bar");
        });
        if let Err(error) = feed.subscribe_bars(&info, &resolution, on_tick, symbol.into()) {
            warn!(symbol, %error, "subscribe failed");
        }
    }

    let mut status = feed.status();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            info!(status = ?*status.borrow(), "connection status");
        }
    });

    tokio::time::sleep(Duration::from_secs(30)).await;
    feed.shutdown();
}

// Initialise an INFO `Subscriber` for `Tracing` Json logs and install it as the global default.
fn init_logging() {
    tracing_subscriber::fmt()
        // Filter messages based on the INFO level
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        // Disable colours on release builds
        .with_ansi(cfg!(debug_assertions))
        // Install this Tracing subscriber as global default
        .init()
}

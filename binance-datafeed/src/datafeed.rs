use crate::{
    bar::Bar,
    config::{DatafeedConfiguration, DatafeedSettings},
    error::DataFeedError,
    resolution::Resolution,
    rest::{BinanceRestClient, KlineRequest, KlineSource},
    stream::{
        ConnectionStatus, FeedState, StreamCommand, StreamConfig, StreamHandle,
        spawn_kline_stream,
    },
    subscription::{ListenerGuid, StreamChanges, SubscriptionRegistry, TickCallback},
    symbol::{self, SearchSymbolResult, SymbolInfo},
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Time window of one historical bars request, in unix seconds.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Deserialize, Serialize)]
pub struct PeriodParams {
    pub from: i64,
    pub to: i64,
    /// True for the first request a chart makes for a symbol and resolution
    pub first_data_request: bool,
}

/// Outcome of a historical bars request.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub enum History {
    /// Non-empty bars in ascending open time
    Bars(Vec<Bar>),
    /// The exchange returned nothing for the requested window
    NoData,
}

impl History {
    pub fn bars(&self) -> &[Bar] {
        match self {
            Self::Bars(bars) => bars,
            Self::NoData => &[],
        }
    }
}

/// Data-feed contract a chart drives.
///
/// A chart calls [`on_ready`](ChartDatafeed::on_ready) once, searches and resolves symbols,
/// loads history with [`get_bars`](ChartDatafeed::get_bars), and keeps the latest bar live
/// through [`subscribe_bars`](ChartDatafeed::subscribe_bars) until it unsubscribes its
/// listener.
#[async_trait]
pub trait ChartDatafeed: Send + Sync {
    fn on_ready(&self) -> DatafeedConfiguration;

    fn search_symbols(
        &self,
        user_input: &str,
        exchange: &str,
        symbol_type: &str,
    ) -> Vec<SearchSymbolResult>;

    fn resolve_symbol(&self, symbol_name: &str) -> SymbolInfo;

    async fn get_bars(
        &self,
        symbol_info: &SymbolInfo,
        resolution: &Resolution,
        period: PeriodParams,
    ) -> Result<History, DataFeedError>;

    fn subscribe_bars(
        &self,
        symbol_info: &SymbolInfo,
        resolution: &Resolution,
        on_tick: TickCallback,
        listener_guid: ListenerGuid,
    ) -> Result<(), DataFeedError>;

    fn unsubscribe_bars(&self, listener_guid: &ListenerGuid) -> Result<(), DataFeedError>;
}

/// [`ChartDatafeed`] over Binance public market data.
///
/// History comes from a [`KlineSource`] (the Binance REST API by default). Live bars of
/// every subscribed symbol share one WebSocket, opened lazily by the first
/// [`subscribe_bars`](ChartDatafeed::subscribe_bars) call. The socket task ends on
/// [`shutdown`](BinanceDatafeed::shutdown) or when the data feed is dropped.
///
/// Live subscriptions need a running tokio runtime.
#[derive(Debug)]
pub struct BinanceDatafeed<S = BinanceRestClient> {
    settings: DatafeedSettings,
    source: S,
    state: Arc<FeedState>,
    stream: Mutex<Option<StreamHandle>>,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    shut_down: AtomicBool,
}

impl BinanceDatafeed<BinanceRestClient> {
    pub fn new(settings: DatafeedSettings) -> Self {
        let source = BinanceRestClient::new(&settings);
        Self::with_source(settings, source)
    }
}

impl<S> BinanceDatafeed<S>
where
    S: KlineSource,
{
    pub fn with_source(settings: DatafeedSettings, source: S) -> Self {
        let registry = SubscriptionRegistry::new(settings.tick_routing);
        let (status_tx, _) = watch::channel(ConnectionStatus::Idle);

        Self {
            settings,
            source,
            state: Arc::new(FeedState::new(registry)),
            stream: Mutex::new(None),
            status_tx: Arc::new(status_tx),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &DatafeedSettings {
        &self.settings
    }

    /// Most recent bar seen for `symbol`, from history or the live stream.
    pub fn last_bar(&self, symbol: &str) -> Option<Bar> {
        self.state.last_bars.read().get(&symbol.to_uppercase()).copied()
    }

    /// Receiver of the shared socket's [`ConnectionStatus`].
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// Stop the shared socket. Later subscriptions fail with [`DataFeedError::Shutdown`].
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        if self.stream.lock().take().is_some() {
            info!("Binance data feed shut down");
        }
        self.status_tx.send_replace(ConnectionStatus::Disconnected);
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Send the socket commands for `changes`, spawning the socket on first use.
    ///
    /// Callers hold the `stream` lock from the registry update through this call, so
    /// commands reach the socket in the order the registry changed.
    fn apply_stream_changes(
        &self,
        stream: &mut Option<StreamHandle>,
        changes: StreamChanges,
    ) -> Result<(), DataFeedError> {
        if let Some(released) = changes.unsubscribe {
            if let Some(handle) = stream.as_ref() {
                handle.send(StreamCommand::Unsubscribe(released))?;
            }
        }

        if let Some(stream_name) = changes.subscribe {
            let handle = match stream.take() {
                Some(handle) => handle,
                None => self.spawn_stream()?,
            };
            let sent = handle.send(StreamCommand::Subscribe(stream_name));
            *stream = Some(handle);
            sent?;
        }

        Ok(())
    }

    fn spawn_stream(&self) -> Result<StreamHandle, DataFeedError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(DataFeedError::Socket(
                "live bars require a tokio runtime".to_string(),
            ));
        }

        Ok(spawn_kline_stream(
            StreamConfig {
                url: self.settings.ws_url.clone(),
                reconnect_delay: self.settings.reconnect_delay,
            },
            Arc::clone(&self.state),
            Arc::clone(&self.status_tx),
        ))
    }
}

#[async_trait]
impl<S> ChartDatafeed for BinanceDatafeed<S>
where
    S: KlineSource,
{
    fn on_ready(&self) -> DatafeedConfiguration {
        DatafeedConfiguration::default()
    }

    fn search_symbols(
        &self,
        user_input: &str,
        exchange: &str,
        symbol_type: &str,
    ) -> Vec<SearchSymbolResult> {
        symbol::search_symbols(user_input, exchange, symbol_type)
    }

    fn resolve_symbol(&self, symbol_name: &str) -> SymbolInfo {
        symbol::resolve_symbol(symbol_name)
    }

    async fn get_bars(
        &self,
        symbol_info: &SymbolInfo,
        resolution: &Resolution,
        period: PeriodParams,
    ) -> Result<History, DataFeedError> {
        let symbol = symbol_info.exchange_symbol();
        let request =
            KlineRequest::from_period(symbol, resolution.interval(), period.from, period.to)
                .with_limit(self.settings.klines_limit);

        let bars = self.source.fetch_klines(&request).await.map_err(|error| {
            error!(%symbol, %resolution, %error, "failed to fetch historical bars");
            error
        })?;

        let Some(last) = bars.last().copied() else {
            debug!(%symbol, %resolution, "no historical bars in period");
            return Ok(History::NoData);
        };

        if period.first_data_request {
            self.state.cache_bar(symbol, last);
        }

        debug!(%symbol, %resolution, count = bars.len(), "historical bars");
        Ok(History::Bars(bars))
    }

    fn subscribe_bars(
        &self,
        symbol_info: &SymbolInfo,
        resolution: &Resolution,
        on_tick: TickCallback,
        listener_guid: ListenerGuid,
    ) -> Result<(), DataFeedError> {
        if self.is_shut_down() {
            return Err(DataFeedError::Shutdown);
        }

        let symbol = symbol_info.exchange_symbol();
        info!(%symbol, %resolution, listener = %listener_guid, "subscribe bars");

        let mut stream = self.stream.lock();
        let changes = self.state.registry.write().register(
            listener_guid,
            symbol,
            resolution.interval(),
            on_tick,
        );
        self.apply_stream_changes(&mut stream, changes)
    }

    fn unsubscribe_bars(&self, listener_guid: &ListenerGuid) -> Result<(), DataFeedError> {
        info!(listener = %listener_guid, "unsubscribe bars");

        let mut stream = self.stream.lock();
        let released = self.state.registry.write().remove(listener_guid);
        if self.is_shut_down() {
            return Ok(());
        }

        self.apply_stream_changes(&mut stream, StreamChanges {
            subscribe: None,
            unsubscribe: released,
        })
    }
}

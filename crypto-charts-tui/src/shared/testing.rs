use std::sync::Mutex;

use async_trait::async_trait;
use binance_datafeed::{
    ChartDatafeed, DataFeedError, DatafeedConfiguration, History, ListenerGuid, PeriodParams,
    Resolution, SearchSymbolResult, SymbolInfo, TickCallback,
};

/// Datafeed double recording calls and replaying a fixed history.
#[derive(Default)]
pub(crate) struct RecordingFeed {
    /// `None` fails every history request with a 500
    pub(crate) history: Option<History>,
    pub(crate) periods: Mutex<Vec<PeriodParams>>,
    pub(crate) subscribed: Mutex<Vec<(String, String, ListenerGuid, TickCallback)>>,
    pub(crate) unsubscribed: Mutex<Vec<ListenerGuid>>,
}

impl RecordingFeed {
    pub(crate) fn subscribed_guids(&self) -> Vec<ListenerGuid> {
        self.subscribed
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, guid, _)| guid.clone())
            .collect()
    }
}

#[async_trait]
impl ChartDatafeed for RecordingFeed {
    fn on_ready(&self) -> DatafeedConfiguration {
        DatafeedConfiguration::default()
    }

    fn search_symbols(&self, _: &str, _: &str, _: &str) -> Vec<SearchSymbolResult> {
        Vec::new()
    }

    fn resolve_symbol(&self, symbol_name: &str) -> SymbolInfo {
        binance_datafeed::symbol::resolve_symbol(symbol_name)
    }

    async fn get_bars(
        &self,
        _: &SymbolInfo,
        _: &Resolution,
        period: PeriodParams,
    ) -> Result<History, DataFeedError> {
        self.periods.lock().unwrap().push(period);
        self.history.clone().ok_or(DataFeedError::Status(500))
    }

    fn subscribe_bars(
        &self,
        symbol_info: &SymbolInfo,
        resolution: &Resolution,
        on_tick: TickCallback,
        listener_guid: ListenerGuid,
    ) -> Result<(), DataFeedError> {
        self.subscribed.lock().unwrap().push((
            symbol_info.name.clone(),
            resolution.to_string(),
            listener_guid,
            on_tick,
        ));
        Ok(())
    }

    fn unsubscribe_bars(&self, listener_guid: &ListenerGuid) -> Result<(), DataFeedError> {
        self.unsubscribed.lock().unwrap().push(listener_guid.clone());
        Ok(())
    }
}

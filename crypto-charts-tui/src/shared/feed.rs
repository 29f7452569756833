//! Bridge between the data feed and the UI loop.
//!
//! Mounting a panel loads its history and then subscribes its live bars. Everything the
//! data feed produces for a panel arrives on one channel as [`PanelEvent`]s tagged with the
//! panel's listener guid.

use std::sync::Arc;

use binance_datafeed::{ChartDatafeed, DataFeedError, History, ListenerGuid, TickCallback};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use super::chart::ChartPanel;

#[derive(Debug, Clone, PartialEq)]
pub enum PanelEvent {
    History {
        guid: ListenerGuid,
        result: Result<History, DataFeedError>,
    },
    Tick {
        guid: ListenerGuid,
        bar: binance_datafeed::Bar,
    },
}

impl PanelEvent {
    pub fn guid(&self) -> &ListenerGuid {
        match self {
            Self::History { guid, .. } | Self::Tick { guid, .. } => guid,
        }
    }
}

/// Load `panel`'s history and subscribe its live bars in the background.
///
/// Mirrors a chart widget mounting: resolve, `get_bars` with `first_data_request`, then
/// `subscribe_bars`. Live bars are only subscribed once history succeeded.
pub fn mount_panel<D>(
    datafeed: Arc<D>,
    panel: &ChartPanel,
    now_secs: i64,
    events_tx: mpsc::UnboundedSender<PanelEvent>,
) -> JoinHandle<()>
where
    D: ChartDatafeed + 'static,
{
    let guid = panel.listener_guid().clone();
    let resolution = panel.resolution().clone();
    let period = panel.history_period(now_secs);
    let symbol_info = datafeed.resolve_symbol(panel.symbol());

    tokio::spawn(async move {
        info!(symbol = %symbol_info.name, %resolution, %guid, "mounting chart panel");

        let result = datafeed.get_bars(&symbol_info, &resolution, period).await;
        let loaded = result.is_ok();

        if events_tx
            .send(PanelEvent::History {
                guid: guid.clone(),
                result,
            })
            .is_err()
        {
            debug!(%guid, "ui gone before history arrived");
            return;
        }

        if !loaded {
            return;
        }

        let tick_tx = events_tx.clone();
        let tick_guid = guid.clone();
        let on_tick: TickCallback = Arc::new(move |bar| {
            let _ = tick_tx.send(PanelEvent::Tick {
                guid: tick_guid.clone(),
                bar,
            });
        });

        if let Err(error) = datafeed.subscribe_bars(&symbol_info, &resolution, on_tick, guid.clone()) {
            warn!(%guid, %error, "failed to subscribe live bars");
        }
    })
}

/// Release a panel's live subscription.
pub fn unmount_panel<D>(datafeed: &D, guid: &ListenerGuid)
where
    D: ChartDatafeed + ?Sized,
{
    debug!(%guid, "unmounting chart panel");
    if let Err(error) = datafeed.unsubscribe_bars(guid) {
        warn!(%guid, %error, "failed to unsubscribe live bars");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{dashboard::PanelSlot, testing::RecordingFeed};
    use binance_datafeed::{Bar, Resolution};

    fn bar(time: i64) -> Bar {
        Bar {
            time,
            close: 1.0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_mount_loads_history_then_subscribes() {
        let feed = Arc::new(RecordingFeed {
            history: Some(History::Bars(vec![bar(0)])),
            ..Default::default()
        });
        let panel = ChartPanel::new(PanelSlot::Primary, "BTCUSDT", Resolution::new("15"));
        let (tx, mut rx) = mpsc::unbounded_channel();

        mount_panel(Arc::clone(&feed), &panel, 1_000_000, tx).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.guid(), panel.listener_guid());
        assert_eq!(
            event,
            PanelEvent::History {
                guid: panel.listener_guid().clone(),
                result: Ok(History::Bars(vec![bar(0)])),
            }
        );
        assert_eq!(*feed.periods.lock().unwrap(), vec![panel.history_period(1_000_000)]);

        // Live bars flow through the registered callback, tagged with the panel guid
        let callback = {
            let subscribed = feed.subscribed.lock().unwrap();
            assert_eq!(subscribed.len(), 1);
            assert_eq!(subscribed[0].0, "BTCUSDT");
            assert_eq!(subscribed[0].1, "15");
            assert_eq!(&subscribed[0].2, panel.listener_guid());
            Arc::clone(&subscribed[0].3)
        };
        callback(bar(900_000));

        assert_eq!(
            rx.recv().await.unwrap(),
            PanelEvent::Tick {
                guid: panel.listener_guid().clone(),
                bar: bar(900_000),
            }
        );
    }

    #[tokio::test]
    async fn test_mount_failure_skips_subscription() {
        let feed = Arc::new(RecordingFeed::default());
        let panel = ChartPanel::new(PanelSlot::Secondary, "ETHUSDT", Resolution::new("1"));
        let (tx, mut rx) = mpsc::unbounded_channel();

        mount_panel(Arc::clone(&feed), &panel, 0, tx).await.unwrap();

        assert!(matches!(
            rx.recv().await,
            Some(PanelEvent::History { result: Err(DataFeedError::Status(500)), .. })
        ));
        assert!(feed.subscribed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unmount_unsubscribes_guid() {
        let feed = RecordingFeed::default();
        let guid = ListenerGuid::new("primary_BTCUSDT_60#0");

        unmount_panel(&feed, &guid);
        assert_eq!(*feed.unsubscribed.lock().unwrap(), vec![guid]);
    }
}

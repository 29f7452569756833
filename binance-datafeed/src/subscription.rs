//! Registry of live bar listeners sharing one exchange subscription per symbol.

use crate::{
    bar::{Bar, kline_stream_name},
    config::TickRouting,
};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::Arc,
};

/// Opaque identifier the chart supplies with each live bar subscription.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Deserialize, Serialize)]
pub struct ListenerGuid(pub SmolStr);

impl ListenerGuid {
    pub fn new<S: Into<SmolStr>>(guid: S) -> Self {
        Self(guid.into())
    }
}

impl From<&str> for ListenerGuid {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ListenerGuid {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Callback invoked with every live bar delivered to a listener.
pub type TickCallback = Arc<dyn Fn(Bar) + Send + Sync>;

struct Listener {
    symbol: String,
    /// Binance kline interval the listener charts, eg/ "1h"
    interval: String,
    callback: TickCallback,
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("symbol", &self.symbol)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

/// Exchange stream changes the shared socket must apply after a registry update.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct StreamChanges {
    pub subscribe: Option<String>,
    pub unsubscribe: Option<String>,
}

/// Listener registry.
///
/// Listeners are keyed by [`ListenerGuid`]. Exchange subscriptions are de-duplicated per
/// lowercase symbol: only the first listener for a symbol opens a stream, and the stream is
/// released when the last listener for that symbol leaves. A later listener asking for a
/// different resolution of an already streamed symbol shares the existing stream, but with
/// [`TickRouting::BySymbol`] it only receives ticks of its own interval.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    routing: TickRouting,
    listeners: HashMap<ListenerGuid, Listener>,
    streams: BTreeMap<String, String>,
}

impl SubscriptionRegistry {
    pub fn new(routing: TickRouting) -> Self {
        Self {
            routing,
            ..Default::default()
        }
    }

    pub fn routing(&self) -> TickRouting {
        self.routing
    }

    /// Register (or replace) the listener `guid` for `symbol` at kline `interval`.
    pub fn register(
        &mut self,
        guid: ListenerGuid,
        symbol: &str,
        interval: &str,
        callback: TickCallback,
    ) -> StreamChanges {
        let symbol = symbol.to_lowercase();

        // Re-registering a guid on another symbol may release the old symbol's stream
        let moves_symbol = self
            .listeners
            .get(&guid)
            .is_some_and(|existing| existing.symbol != symbol);
        let unsubscribe = if moves_symbol { self.remove(&guid) } else { None };

        self.listeners.insert(
            guid,
            Listener {
                symbol: symbol.clone(),
                interval: interval.to_string(),
                callback,
            },
        );

        let subscribe = if self.streams.contains_key(&symbol) {
            None
        } else {
            let stream = kline_stream_name(&symbol, interval);
            self.streams.insert(symbol, stream.clone());
            Some(stream)
        };

        StreamChanges {
            subscribe,
            unsubscribe,
        }
    }

    /// Remove the listener `guid`, returning the stream to release if it was the last
    /// listener for its symbol. Unknown guids are ignored.
    pub fn remove(&mut self, guid: &ListenerGuid) -> Option<String> {
        let listener = self.listeners.remove(guid)?;

        let symbol_still_wanted = self
            .listeners
            .values()
            .any(|other| other.symbol == listener.symbol);

        if symbol_still_wanted {
            None
        } else {
            self.streams.remove(&listener.symbol)
        }
    }

    /// Callbacks that should receive a tick of `symbol` at kline `interval`, according to the
    /// routing mode.
    pub fn callbacks_for(&self, symbol: &str, interval: &str) -> Vec<TickCallback> {
        let symbol = symbol.to_lowercase();
        self.listeners
            .values()
            .filter(|listener| match self.routing {
                TickRouting::BySymbol => {
                    listener.symbol == symbol && listener.interval == interval
                }
                TickRouting::Broadcast => true,
            })
            .map(|listener| Arc::clone(&listener.callback))
            .collect()
    }

    /// Stream names of every currently subscribed symbol, sorted by symbol.
    pub fn active_streams(&self) -> Vec<String> {
        self.streams.values().cloned().collect()
    }

    pub fn is_symbol_subscribed(&self, symbol: &str) -> bool {
        self.streams.contains_key(&symbol.to_lowercase())
    }

    pub fn has_subscriptions(&self) -> bool {
        !self.streams.is_empty()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recording_callback() -> (TickCallback, Arc<Mutex<Vec<Bar>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let callback: TickCallback = Arc::new(move |bar| sink.lock().push(bar));
        (callback, received)
    }

    fn noop() -> TickCallback {
        Arc::new(|_| {})
    }

    fn deliver(registry: &SubscriptionRegistry, symbol: &str, interval: &str, bar: Bar) -> usize {
        let callbacks = registry.callbacks_for(symbol, interval);
        callbacks.iter().for_each(|callback| callback(bar));
        callbacks.len()
    }

    #[test]
    fn test_first_subscriber_per_symbol_opens_stream() {
        let mut registry = SubscriptionRegistry::default();

        let first = registry.register("a".into(), "BTCUSDT", "1m", noop());
        assert_eq!(first.subscribe.as_deref(), Some("btcusdt@kline_1m"));

        // Same symbol, different case and resolution: shares the stream
        let second = registry.register("b".into(), "btcusdt", "1h", noop());
        assert_eq!(second, StreamChanges::default());

        let third = registry.register("c".into(), "ETHUSDT", "5m", noop());
        assert_eq!(third.subscribe.as_deref(), Some("ethusdt@kline_5m"));

        assert_eq!(registry.listener_count(), 3);
        assert_eq!(
            registry.active_streams(),
            vec!["btcusdt@kline_1m".to_string(), "ethusdt@kline_5m".to_string()]
        );
    }

    #[test]
    fn test_last_listener_releases_stream() {
        let mut registry = SubscriptionRegistry::default();
        registry.register("a".into(), "BTCUSDT", "1m", noop());
        registry.register("b".into(), "BTCUSDT", "1m", noop());

        assert_eq!(registry.remove(&"a".into()), None);
        assert!(registry.is_symbol_subscribed("BTCUSDT"));

        assert_eq!(registry.remove(&"b".into()), Some("btcusdt@kline_1m".to_string()));
        assert!(!registry.has_subscriptions());

        // A new listener is once again the first for the symbol
        let changes = registry.register("c".into(), "BTCUSDT", "15m", noop());
        assert_eq!(changes.subscribe.as_deref(), Some("btcusdt@kline_15m"));
    }

    #[test]
    fn test_remove_unknown_listener_is_noop() {
        let mut registry = SubscriptionRegistry::default();
        registry.register("a".into(), "BTCUSDT", "1m", noop());

        assert_eq!(registry.remove(&"missing".into()), None);
        assert_eq!(registry.listener_count(), 1);
        assert!(registry.has_subscriptions());
    }

    #[test]
    fn test_reregister_guid_on_new_symbol_moves_stream() {
        let mut registry = SubscriptionRegistry::default();
        registry.register("panel".into(), "BTCUSDT", "1m", noop());

        let changes = registry.register("panel".into(), "ETHUSDT", "1m", noop());
        assert_eq!(
            changes,
            StreamChanges {
                subscribe: Some("ethusdt@kline_1m".to_string()),
                unsubscribe: Some("btcusdt@kline_1m".to_string()),
            }
        );
        assert_eq!(registry.listener_count(), 1);
    }

    #[test]
    fn test_reregister_guid_on_same_symbol_replaces_callback() {
        let mut registry = SubscriptionRegistry::default();
        let (old, old_received) = recording_callback();
        let (new, new_received) = recording_callback();

        registry.register("panel".into(), "BTCUSDT", "1m", old);
        let changes = registry.register("panel".into(), "BTCUSDT", "1m", new);
        assert_eq!(changes, StreamChanges::default());

        deliver(&registry, "BTCUSDT", "1m", Bar::default());
        assert!(old_received.lock().is_empty());
        assert_eq!(new_received.lock().len(), 1);
    }

    #[test]
    fn test_routing_by_symbol_only_reaches_matching_listeners() {
        let mut registry = SubscriptionRegistry::new(TickRouting::BySymbol);
        let (btc, btc_received) = recording_callback();
        let (eth, eth_received) = recording_callback();
        registry.register("btc".into(), "BTCUSDT", "1m", btc);
        registry.register("eth".into(), "ETHUSDT", "1m", eth);

        let bar = Bar {
            time: 60_000,
            close: 42.0,
            ..Default::default()
        };
        assert_eq!(deliver(&registry, "BTCUSDT", "1m", bar), 1);

        assert_eq!(*btc_received.lock(), vec![bar]);
        assert!(eth_received.lock().is_empty());
    }

    #[test]
    fn test_routing_broadcast_reaches_every_listener() {
        let mut registry = SubscriptionRegistry::new(TickRouting::Broadcast);
        let (btc, btc_received) = recording_callback();
        let (eth, eth_received) = recording_callback();
        registry.register("btc".into(), "BTCUSDT", "1m", btc);
        registry.register("eth".into(), "ETHUSDT", "1m", eth);

        assert_eq!(deliver(&registry, "BTCUSDT", "1m", Bar::default()), 2);
        assert_eq!(btc_received.lock().len(), 1);
        assert_eq!(eth_received.lock().len(), 1);
    }

    #[test]
    fn test_routing_by_symbol_keeps_intervals_apart() {
        let mut registry = SubscriptionRegistry::new(TickRouting::BySymbol);
        let (hourly, hourly_received) = recording_callback();
        let (two_hourly, two_hourly_received) = recording_callback();

        // The first listener picks the shared stream's interval
        let first = registry.register("primary".into(), "NEOUSDT", "1h", hourly);
        assert_eq!(first.subscribe.as_deref(), Some("neousdt@kline_1h"));
        let second = registry.register("secondary".into(), "NEOUSDT", "2h", two_hourly);
        assert_eq!(second.subscribe, None);

        let bar = Bar {
            time: 10_800_000,
            close: 7.0,
            ..Default::default()
        };
        assert_eq!(deliver(&registry, "NEOUSDT", "1h", bar), 1);

        assert_eq!(*hourly_received.lock(), vec![bar]);
        assert!(two_hourly_received.lock().is_empty());
    }
}

//! Shared Binance raw stream socket.
//!
//! A single background task owns one WebSocket that carries the kline streams of every
//! subscribed symbol. The data feed mutates the [`SubscriptionRegistry`] first and then
//! notifies the task with a [`StreamCommand`], so on every (re)connect the registry is the
//! source of truth for which streams to subscribe.
//!
//! Reconnection uses a fixed delay, and only happens while at least one symbol remains
//! subscribed. With nothing subscribed the task idles until the next command.

use crate::{
    bar::{Bar, ControlMethod, ControlRequest, KlineTick, StreamEvent, StreamMessage},
    error::DataFeedError,
    subscription::SubscriptionRegistry,
};
use futures::{Sink, SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Connection status of the shared socket.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Deserialize, Serialize)]
pub enum ConnectionStatus {
    /// No symbol subscribed, no socket open
    Idle,
    Connecting,
    Connected,
    Disconnected,
    Reconnecting,
}

/// Notification from the data feed that a stream should be (un)subscribed.
#[derive(Clone, Eq, PartialEq, Debug)]
pub(crate) enum StreamCommand {
    Subscribe(String),
    Unsubscribe(String),
}

/// State shared between the data feed and the socket task.
#[derive(Debug, Default)]
pub(crate) struct FeedState {
    pub(crate) registry: RwLock<SubscriptionRegistry>,
    /// Most recent bar per uppercase symbol, last write wins
    pub(crate) last_bars: RwLock<HashMap<String, Bar>>,
}

impl FeedState {
    pub(crate) fn new(registry: SubscriptionRegistry) -> Self {
        Self {
            registry: RwLock::new(registry),
            last_bars: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn cache_bar(&self, symbol: &str, bar: Bar) {
        self.last_bars.write().insert(symbol.to_uppercase(), bar);
    }

    /// Cache the tick's bar, then deliver it to the listeners chosen by the registry.
    ///
    /// Callbacks run after the registry lock is released so they may call back into the feed.
    pub(crate) fn apply_tick(&self, tick: &KlineTick) -> usize {
        self.cache_bar(&tick.symbol, tick.bar);

        let callbacks = self.registry.read().callbacks_for(&tick.symbol, &tick.interval);
        for callback in &callbacks {
            callback(tick.bar);
        }
        callbacks.len()
    }
}

/// Socket task configuration.
#[derive(Clone, Debug)]
pub(crate) struct StreamConfig {
    pub(crate) url: String,
    pub(crate) reconnect_delay: Duration,
}

/// Handle to the running socket task. Dropping it stops the task.
#[derive(Debug)]
pub(crate) struct StreamHandle {
    command_tx: mpsc::UnboundedSender<StreamCommand>,
    task: JoinHandle<()>,
}

impl StreamHandle {
    pub(crate) fn send(&self, command: StreamCommand) -> Result<(), DataFeedError> {
        self.command_tx
            .send(command)
            .map_err(|_| DataFeedError::Shutdown)
    }
}

#[cfg(test)]
impl StreamHandle {
    /// Handle without a socket task, forwarding commands to `command_tx`.
    pub(crate) fn detached(command_tx: mpsc::UnboundedSender<StreamCommand>) -> Self {
        Self {
            command_tx,
            task: tokio::spawn(std::future::pending::<()>()),
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn the shared socket task on the current tokio runtime.
pub(crate) fn spawn_kline_stream(
    config: StreamConfig,
    state: Arc<FeedState>,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
) -> StreamHandle {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run_kline_stream(config, state, command_rx, status_tx));
    StreamHandle { command_tx, task }
}

/// Main socket loop with fixed-delay reconnect.
async fn run_kline_stream(
    config: StreamConfig,
    state: Arc<FeedState>,
    mut command_rx: mpsc::UnboundedReceiver<StreamCommand>,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
) {
    info!("Starting Binance kline stream for {}", config.url);

    let mut next_request_id: u64 = 1;
    let mut reconnecting = false;

    loop {
        // Idle until at least one symbol is subscribed
        if !state.registry.read().has_subscriptions() {
            status_tx.send_replace(ConnectionStatus::Idle);
            reconnecting = false;
            match command_rx.recv().await {
                Some(_) => continue,
                None => break,
            }
        }

        status_tx.send_replace(if reconnecting {
            ConnectionStatus::Reconnecting
        } else {
            ConnectionStatus::Connecting
        });

        match connect_async(config.url.as_str()).await {
            Ok((ws_stream, _)) => {
                info!("Connected to Binance stream at {}", config.url);
                status_tx.send_replace(ConnectionStatus::Connected);

                let (mut write, mut read) = ws_stream.split();

                // Queued commands are already reflected in the registry snapshot below
                while command_rx.try_recv().is_ok() {}

                let streams = state.registry.read().active_streams();
                if !streams.is_empty() {
                    let id = take_id(&mut next_request_id);
                    if let Err(error) =
                        send_control(&mut write, ControlMethod::Subscribe, streams, id).await
                    {
                        error!(%error, "Failed to subscribe streams after connect");
                    }
                }

                let mut shutdown = false;
                loop {
                    tokio::select! {
                        command = command_rx.recv() => {
                            let Some(command) = command else {
                                let _ = write.send(Message::Close(None)).await;
                                shutdown = true;
                                break;
                            };

                            let (method, stream) = match command {
                                StreamCommand::Subscribe(stream) => (ControlMethod::Subscribe, stream),
                                StreamCommand::Unsubscribe(stream) => (ControlMethod::Unsubscribe, stream),
                            };
                            debug!(?method, %stream, "Sending stream control frame");

                            let id = take_id(&mut next_request_id);
                            if let Err(error) = send_control(&mut write, method, vec![stream], id).await {
                                warn!(%error, "Failed to send control frame, connection likely dead");
                                break;
                            }
                        }
                        message = read.next() => {
                            match message {
                                Some(Ok(Message::Text(text))) => handle_text(&state, &text),
                                Some(Ok(Message::Close(frame))) => {
                                    info!(?frame, "Binance stream closed connection");
                                    break;
                                }
                                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                                    // Heartbeat - tungstenite queues the pong reply
                                }
                                Some(Ok(_)) => {}
                                Some(Err(error)) => {
                                    let error = DataFeedError::from(error);
                                    error!(%error, "Binance stream error");
                                    if error.is_terminal() {
                                        break;
                                    }
                                }
                                None => {
                                    info!("Binance stream ended");
                                    break;
                                }
                            }
                        }
                    }
                }

                status_tx.send_replace(ConnectionStatus::Disconnected);
                if shutdown {
                    break;
                }
            }
            Err(error) => {
                error!("Failed to connect to {}: {}", config.url, error);
                status_tx.send_replace(ConnectionStatus::Disconnected);
            }
        }

        debug!(
            "Waiting {:?} before reconnecting to Binance stream...",
            config.reconnect_delay
        );
        tokio::time::sleep(config.reconnect_delay).await;
        reconnecting = true;
    }

    info!("Binance kline stream stopped");
}

fn take_id(next: &mut u64) -> u64 {
    let id = *next;
    *next = next.wrapping_add(1);
    id
}

async fn send_control<S>(
    write: &mut S,
    method: ControlMethod,
    params: Vec<String>,
    id: u64,
) -> Result<(), DataFeedError>
where
    S: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let request = ControlRequest { method, params, id };
    let payload = serde_json::to_string(&request)?;
    write.send(Message::Text(payload.into())).await?;
    Ok(())
}

fn handle_text(state: &FeedState, text: &str) {
    match serde_json::from_str::<StreamMessage>(text) {
        Ok(StreamMessage::Event(StreamEvent::Kline(event))) => {
            let tick = KlineTick::from(event);
            let delivered = state.apply_tick(&tick);
            debug!(symbol = %tick.symbol, delivered, "kline tick");
        }
        Ok(StreamMessage::Response(response)) => {
            debug!(id = response.id, result = ?response.result, "control frame acknowledged");
        }
        Err(error) => {
            // Don't spam logs for every unparseable message
            let preview: String = text.chars().take(100).collect();
            debug!("Failed to parse stream message: {} - {}", error, preview);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::TickRouting, subscription::TickCallback};
    use tokio::{net::TcpListener, sync::mpsc::UnboundedReceiver};
    use tokio_tungstenite::{WebSocketStream, accept_async};

    const KLINE: &str = r#"{"e":"kline","E":1,"s":"BTCUSDT","k":{"t":60000,"T":119999,"s":"BTCUSDT","i":"1m","o":"1.0","c":"2.0","h":"3.0","l":"0.5","v":"10","x":false}}"#;

    fn channel_callback() -> (TickCallback, UnboundedReceiver<Bar>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback: TickCallback = Arc::new(move |bar| {
            let _ = tx.send(bar);
        });
        (callback, rx)
    }

    async fn next_control(ws: &mut WebSocketStream<tokio::net::TcpStream>) -> serde_json::Value {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
                Some(Ok(_)) => continue,
                other => panic!("expected control frame, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_handle_text_caches_and_dispatches() {
        let state = FeedState::new(SubscriptionRegistry::new(TickRouting::BySymbol));
        let (callback, mut rx) = channel_callback();
        state
            .registry
            .write()
            .register("a".into(), "btcusdt", "1m", callback);

        handle_text(&state, KLINE);

        let bar = rx.try_recv().expect("tick should be delivered");
        assert_eq!(bar.time, 60_000);
        assert_eq!(bar.close, 2.0);
        assert_eq!(state.last_bars.read().get("BTCUSDT"), Some(&bar));
    }

    #[test]
    fn test_handle_text_ignores_acks_and_garbage() {
        let state = FeedState::default();
        handle_text(&state, r#"{"result":null,"id":1}"#);
        handle_text(&state, "not json");
        handle_text(&state, "ünïcödé ".repeat(50).as_str());
        assert!(state.last_bars.read().is_empty());
    }

    #[tokio::test]
    async fn test_socket_subscribes_streams_and_reconnects_after_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        let state = Arc::new(FeedState::default());
        let (callback, mut ticks) = channel_callback();
        let changes = state
            .registry
            .write()
            .register("a".into(), "BTCUSDT", "1m", callback);

        let (status_tx, mut status_rx) = watch::channel(ConnectionStatus::Idle);
        let status_tx = Arc::new(status_tx);
        let handle = spawn_kline_stream(
            StreamConfig {
                url,
                reconnect_delay: Duration::from_millis(50),
            },
            Arc::clone(&state),
            status_tx,
        );
        handle
            .send(StreamCommand::Subscribe(changes.subscribe.unwrap()))
            .unwrap();

        // First connection: one SUBSCRIBE for the active stream, then a tick
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(tcp).await.unwrap();
        let control = next_control(&mut ws).await;
        assert_eq!(control["method"], "SUBSCRIBE");
        assert_eq!(control["params"], serde_json::json!(["btcusdt@kline_1m"]));

        ws.send(Message::Text(KLINE.into())).await.unwrap();
        let bar = ticks.recv().await.unwrap();
        assert_eq!(bar.high, 3.0);

        status_rx
            .wait_for(|status| *status == ConnectionStatus::Connected)
            .await
            .unwrap();

        // Server drops the socket: the task reconnects and re-subscribes
        ws.close(None).await.unwrap();
        drop(ws);

        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(tcp).await.unwrap();
        let control = next_control(&mut ws).await;
        assert_eq!(control["method"], "SUBSCRIBE");
        assert_eq!(control["params"], serde_json::json!(["btcusdt@kline_1m"]));

        drop(handle);
    }

    #[tokio::test]
    async fn test_socket_does_not_reconnect_without_subscriptions() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        let state = Arc::new(FeedState::default());
        let changes = state
            .registry
            .write()
            .register("a".into(), "ETHUSDT", "5m", Arc::new(|_| {}));

        let (status_tx, mut status_rx) = watch::channel(ConnectionStatus::Idle);
        let status_tx = Arc::new(status_tx);
        let handle = spawn_kline_stream(
            StreamConfig {
                url,
                reconnect_delay: Duration::from_millis(20),
            },
            Arc::clone(&state),
            status_tx,
        );
        handle
            .send(StreamCommand::Subscribe(changes.subscribe.unwrap()))
            .unwrap();

        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(tcp).await.unwrap();
        let _ = next_control(&mut ws).await;

        // Last listener leaves, then the server closes
        let released = state.registry.write().remove(&"a".into()).unwrap();
        handle.send(StreamCommand::Unsubscribe(released)).unwrap();
        let control = next_control(&mut ws).await;
        assert_eq!(control["method"], "UNSUBSCRIBE");
        assert_eq!(control["params"], serde_json::json!(["ethusdt@kline_5m"]));

        ws.close(None).await.unwrap();
        drop(ws);

        status_rx
            .wait_for(|status| *status == ConnectionStatus::Idle)
            .await
            .unwrap();

        let reconnect =
            tokio::time::timeout(Duration::from_millis(200), listener.accept()).await;
        assert!(reconnect.is_err(), "socket should stay closed with no subscriptions");

        drop(handle);
    }
}

pub mod events;
pub mod subscriber;

use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{self, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{HyperliquidError, Result};
use crate::types::{Candle, CandleInterval, L2Book, TradeBatch};

use events::*;
use subscriber::*;

const PING_INTERVAL: Duration = Duration::from_secs(30);
const PONG_TIMEOUT: Duration = Duration::from_secs(10);
const STALE_THRESHOLD: Duration = Duration::from_secs(60);
const STALE_CHECK_INTERVAL: Duration = Duration::from_secs(10);
const RECONNECT_DELAY: Duration = Duration::from_secs(3);
const CHANNEL_CAPACITY: usize = 256;

/// Fan-out senders shared by every connection attempt.
#[derive(Debug, Clone)]
struct Channels {
    book_tx: broadcast::Sender<L2Book>,
    trade_tx: broadcast::Sender<TradeBatch>,
    candle_tx: broadcast::Sender<Candle>,
}

impl Channels {
    fn dispatch(&self, event: WsEvent) {
        match event {
            WsEvent::Book(book) => {
                let _ = self.book_tx.send(book);
            }
            WsEvent::Trades(batch) => {
                let _ = self.trade_tx.send(batch);
            }
            WsEvent::Candle(candle) => {
                let _ = self.candle_tx.send(candle);
            }
            WsEvent::Pong | WsEvent::Ack => {}
        }
    }
}

/// WebSocket subscription client.
///
/// Manages a persistent connection with auto-reconnect and heartbeat.
/// Subscription handles are reference counted per channel so several
/// consumers can watch the same coin; active subscriptions are replayed
/// after every reconnect.
#[derive(Debug)]
pub struct SubscriptionClient {
    url: String,
    channels: Channels,
    cmd_tx: mpsc::UnboundedSender<Command>,
    cmd_rx: Option<mpsc::UnboundedReceiver<Command>>,
    cancel: CancellationToken,
}

impl SubscriptionClient {
    /// Create a new client (does not connect yet). Subscriptions taken
    /// before [`connect`](Self::connect) are sent once connected.
    pub fn new(url: String) -> Self {
        let (book_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (trade_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (candle_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        Self {
            url,
            channels: Channels {
                book_tx,
                trade_tx,
                candle_tx,
            },
            cmd_tx,
            cmd_rx: Some(cmd_rx),
            cancel: CancellationToken::new(),
        }
    }

    /// Subscribe to L2 book pushes for `coin`.
    pub fn subscribe_l2_book(&self, coin: &str) -> BookSubscription {
        BookSubscription::new(
            coin.to_string(),
            self.channels.book_tx.subscribe(),
            self.cmd_tx.clone(),
        )
    }

    /// Subscribe to trade pushes for `coin`.
    pub fn subscribe_trades(&self, coin: &str) -> TradeSubscription {
        TradeSubscription::new(
            coin.to_string(),
            self.channels.trade_tx.subscribe(),
            self.cmd_tx.clone(),
        )
    }

    /// Subscribe to candle pushes for `coin` at `interval`.
    pub fn subscribe_candles(&self, coin: &str, interval: CandleInterval) -> CandleSubscription {
        CandleSubscription::new(
            SubscriptionKey::Candle {
                coin: coin.to_string(),
                interval,
            },
            self.channels.candle_tx.subscribe(),
            self.cmd_tx.clone(),
        )
    }

    /// Connect and start processing messages in the background.
    ///
    /// # Errors
    ///
    /// Returns [`HyperliquidError::WebSocket`] if called twice.
    pub fn connect(&mut self) -> Result<()> {
        let mut cmd_rx = self
            .cmd_rx
            .take()
            .ok_or_else(|| HyperliquidError::WebSocket("connect() called twice".into()))?;

        let url = self.url.clone();
        let channels = self.channels.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let mut registry = SubscriptionRegistry::default();
            info!(url = %url, "subscription client starting");
            loop {
                match run_connection(&url, &channels, &mut cmd_rx, &mut registry, &cancel).await {
                    Ok(()) => {
                        info!("WebSocket connection closed gracefully");
                        return;
                    }
                    Err(e) => {
                        if cancel.is_cancelled() {
                            return;
                        }
                        warn!(error = %e, delay = ?RECONNECT_DELAY, "WebSocket connection error, reconnecting");
                        tokio::select! {
                            _ = time::sleep(RECONNECT_DELAY) => {}
                            _ = cancel.cancelled() => return,
                        }
                    }
                }
            }
        });

        Ok(())
    }

    /// Close the WebSocket connection.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for SubscriptionClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// Single WebSocket connection lifetime.
async fn run_connection(
    url: &str,
    channels: &Channels,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    registry: &mut SubscriptionRegistry,
    cancel: &CancellationToken,
) -> Result<()> {
    let (ws_stream, _) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| HyperliquidError::WebSocket(format!("connect failed: {e}")))?;
    let (mut sink, mut stream) = ws_stream.split();

    info!("WebSocket connected to {url}");

    for key in registry.active() {
        debug!(?key, "resubscribing");
        send_text(&mut sink, WsRequest::subscribe(key).to_text()).await?;
    }

    let mut last_message_time = Instant::now();
    let mut ping_interval = time::interval(PING_INTERVAL);
    ping_interval.tick().await;
    let mut stale_interval = time::interval(STALE_CHECK_INTERVAL);
    stale_interval.tick().await;
    let mut pong_deadline: Option<Instant> = None;

    loop {
        let pong_timeout_fut = match pong_deadline {
            Some(d) => time::sleep_until(d),
            None => time::sleep_until(Instant::now() + Duration::from_secs(86400)),
        };
        let pong_active = pong_deadline.is_some();

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("WebSocket shutdown requested");
                let _ = sink.send(Message::Close(None)).await;
                return Ok(());
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::Subscribe(key)) => {
                        if registry.acquire(key.clone()) {
                            debug!(?key, "subscribe");
                            send_text(&mut sink, WsRequest::subscribe(&key).to_text()).await?;
                        }
                    }
                    Some(Command::Unsubscribe(key)) => {
                        if registry.release(&key) {
                            debug!(?key, "unsubscribe");
                            send_text(&mut sink, WsRequest::unsubscribe(&key).to_text()).await?;
                        }
                    }
                    // Client and every handle dropped.
                    None => {
                        let _ = sink.send(Message::Close(None)).await;
                        return Ok(());
                    }
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        last_message_time = Instant::now();
                        match parse_frame(&text) {
                            Some(WsEvent::Pong) => pong_deadline = None,
                            Some(event) => channels.dispatch(event),
                            None => {}
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        last_message_time = Instant::now();
                        sink.send(Message::Pong(data))
                            .await
                            .map_err(|e| HyperliquidError::WebSocket(format!("send failed: {e}")))?;
                    }
                    Some(Ok(Message::Close(_))) => {
                        return Err(HyperliquidError::WebSocket("server closed connection".into()));
                    }
                    Some(Ok(_)) => {
                        last_message_time = Instant::now();
                    }
                    Some(Err(e)) => {
                        return Err(HyperliquidError::WebSocket(format!("read error: {e}")));
                    }
                    None => {
                        return Err(HyperliquidError::WebSocket("stream ended".into()));
                    }
                }
            }
            _ = ping_interval.tick() => {
                send_text(&mut sink, WsRequest::ping().to_text()).await?;
                pong_deadline = Some(Instant::now() + PONG_TIMEOUT);
            }
            _ = stale_interval.tick() => {
                let elapsed = last_message_time.elapsed();
                if elapsed > STALE_THRESHOLD {
                    warn!(elapsed_ms = elapsed.as_millis() as u64, "WebSocket connection stale");
                    return Err(HyperliquidError::WebSocket(format!(
                        "stale connection: {}ms since last message",
                        elapsed.as_millis()
                    )));
                }
            }
            _ = pong_timeout_fut, if pong_active => {
                return Err(HyperliquidError::WebSocket("pong timeout".into()));
            }
        }
    }
}

async fn send_text<S>(sink: &mut S, text: String) -> Result<()>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    sink.send(Message::Text(text))
        .await
        .map_err(|e| HyperliquidError::WebSocket(format!("send failed: {e}")))
}

use std::collections::HashMap;

use tokio::sync::{broadcast, mpsc};

use super::events::SubscriptionKey;
use crate::types::{Candle, L2Book, TradeBatch};

/// Request from a subscription handle to the connection task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Subscribe(SubscriptionKey),
    Unsubscribe(SubscriptionKey),
}

/// Reference counts per wire subscription. Owned by the connection task.
#[derive(Debug, Default)]
pub(crate) struct SubscriptionRegistry {
    counts: HashMap<SubscriptionKey, usize>,
}

impl SubscriptionRegistry {
    /// Add a subscriber. Returns `true` when it is the first one and the
    /// wire `subscribe` must be sent.
    pub(crate) fn acquire(&mut self, key: SubscriptionKey) -> bool {
        let count = self.counts.entry(key).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Remove a subscriber. Returns `true` when it was the last one and the
    /// wire `unsubscribe` must be sent.
    pub(crate) fn release(&mut self, key: &SubscriptionKey) -> bool {
        match self.counts.get_mut(key) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                self.counts.remove(key);
                true
            }
            None => false,
        }
    }

    /// Keys with at least one subscriber, replayed after a reconnect.
    pub(crate) fn active(&self) -> impl Iterator<Item = &SubscriptionKey> {
        self.counts.keys()
    }
}

/// Sends `Unsubscribe` exactly once, on explicit release or drop.
#[derive(Debug)]
struct SubscriptionGuard {
    key: Option<SubscriptionKey>,
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl SubscriptionGuard {
    fn new(key: SubscriptionKey, cmd_tx: mpsc::UnboundedSender<Command>) -> Self {
        let _ = cmd_tx.send(Command::Subscribe(key.clone()));
        Self {
            key: Some(key),
            cmd_tx,
        }
    }

    fn release(&mut self) {
        if let Some(key) = self.key.take() {
            let _ = self.cmd_tx.send(Command::Unsubscribe(key));
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Receive the next message for `coin`, skipping other coins and
/// tolerating lag. `None` once the channel is closed.
async fn next_for<T: Clone>(
    rx: &mut broadcast::Receiver<T>,
    label: &str,
    matches: impl Fn(&T) -> bool,
) -> Option<T> {
    loop {
        match rx.recv().await {
            Ok(msg) if matches(&msg) => return Some(msg),
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("{label} subscription lagged by {n} messages");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

/// Live L2 book updates for one coin.
#[derive(Debug)]
pub struct BookSubscription {
    coin: String,
    rx: broadcast::Receiver<L2Book>,
    guard: SubscriptionGuard,
}

impl BookSubscription {
    pub(crate) fn new(
        coin: String,
        rx: broadcast::Receiver<L2Book>,
        cmd_tx: mpsc::UnboundedSender<Command>,
    ) -> Self {
        let guard = SubscriptionGuard::new(SubscriptionKey::L2Book { coin: coin.clone() }, cmd_tx);
        Self { coin, rx, guard }
    }

    /// Receive the next book. Returns `None` if the client shut down.
    pub async fn next(&mut self) -> Option<L2Book> {
        let coin = &self.coin;
        next_for(&mut self.rx, "l2Book", |b: &L2Book| &b.coin == coin).await
    }

    pub fn coin(&self) -> &str {
        &self.coin
    }

    /// Stop the server push for this coin (unless other handles share it).
    pub fn unsubscribe(mut self) {
        self.guard.release();
    }
}

/// Live trade batches for one coin.
#[derive(Debug)]
pub struct TradeSubscription {
    coin: String,
    rx: broadcast::Receiver<TradeBatch>,
    guard: SubscriptionGuard,
}

impl TradeSubscription {
    pub(crate) fn new(
        coin: String,
        rx: broadcast::Receiver<TradeBatch>,
        cmd_tx: mpsc::UnboundedSender<Command>,
    ) -> Self {
        let guard = SubscriptionGuard::new(SubscriptionKey::Trades { coin: coin.clone() }, cmd_tx);
        Self { coin, rx, guard }
    }

    pub async fn next(&mut self) -> Option<TradeBatch> {
        let coin = &self.coin;
        next_for(&mut self.rx, "trade", |b: &TradeBatch| &b.coin == coin).await
    }

    pub fn coin(&self) -> &str {
        &self.coin
    }

    pub fn unsubscribe(mut self) {
        self.guard.release();
    }
}

/// Live candles for one coin and interval.
#[derive(Debug)]
pub struct CandleSubscription {
    key: SubscriptionKey,
    rx: broadcast::Receiver<Candle>,
    guard: SubscriptionGuard,
}

impl CandleSubscription {
    pub(crate) fn new(
        key: SubscriptionKey,
        rx: broadcast::Receiver<Candle>,
        cmd_tx: mpsc::UnboundedSender<Command>,
    ) -> Self {
        let guard = SubscriptionGuard::new(key.clone(), cmd_tx);
        Self { key, rx, guard }
    }

    pub async fn next(&mut self) -> Option<Candle> {
        let key = &self.key;
        next_for(&mut self.rx, "candle", |c: &Candle| match key {
            SubscriptionKey::Candle { coin, interval } => {
                &c.coin == coin && c.interval == *interval
            }
            _ => false,
        })
        .await
    }

    pub fn unsubscribe(mut self) {
        self.guard.release();
    }
}

//! Recent trades tape for one coin.
//!
//! [`TradeTape`] holds the ordering and capping rules; [`TradeFeed`] runs the
//! task that fills it from the REST page and the trade subscription.

use std::collections::VecDeque;
use std::future::Future;

use futures_util::{Stream, StreamExt};
use hyperliquid::{InfoClient, SubscriptionClient, Trade, TradeBatch, TradeSubscription};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Newest-first list of trades with a fixed capacity.
#[derive(Debug, Clone)]
pub struct TradeTape {
    trades: VecDeque<Trade>,
    capacity: usize,
}

impl TradeTape {
    pub fn new(capacity: usize) -> Self {
        Self {
            trades: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Replace the tape with a fetched page, sorted newest first.
    pub fn replace_page(&mut self, mut page: Vec<Trade>) {
        page.sort_by(|a, b| b.time.cmp(&a.time));
        page.truncate(self.capacity);
        self.trades = page.into();
    }

    /// Put a pushed batch in front of the tape, keeping the batch's own
    /// order, then drop the oldest entries beyond capacity.
    pub fn prepend_batch(&mut self, batch: Vec<Trade>) {
        for trade in batch.into_iter().rev() {
            self.trades.push_front(trade);
        }
        self.trades.truncate(self.capacity);
    }

    pub fn trades(&self) -> &VecDeque<Trade> {
        &self.trades
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn to_vec(&self) -> Vec<Trade> {
        self.trades.iter().cloned().collect()
    }
}

/// Published state of a trade feed.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeView {
    pub coin: String,
    /// Newest first.
    pub trades: Vec<Trade>,
}

/// Handle to a running trade task. Dropping it stops the task and
/// unsubscribes.
pub struct TradeFeed {
    view_rx: watch::Receiver<Option<TradeView>>,
    cancel: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl TradeFeed {
    /// Start following trades for `coin`: one REST page of `page_size`
    /// trades plus live pushes, capped at `capacity`.
    pub fn start(
        coin: &str,
        info: &InfoClient,
        subs: &SubscriptionClient,
        page_size: usize,
        capacity: usize,
        cancel: &CancellationToken,
    ) -> Self {
        let info = info.clone();
        let page_coin = coin.to_string();
        let page = async move { info.recent_trades(&page_coin, page_size).await };
        let updates = trade_updates(subs.subscribe_trades(coin));
        Self::spawn(coin, page, updates, capacity, cancel.child_token())
    }

    pub(crate) fn spawn<F, S>(
        coin: &str,
        page: F,
        updates: S,
        capacity: usize,
        cancel: CancellationToken,
    ) -> Self
    where
        F: Future<Output = hyperliquid::Result<Vec<Trade>>> + Send + 'static,
        S: Stream<Item = TradeBatch> + Send + 'static,
    {
        let (view_tx, view_rx) = watch::channel(None);
        let handle = tokio::spawn(run_trade_task(
            coin.to_string(),
            page,
            updates,
            TradeTape::new(capacity),
            view_tx,
            cancel.clone(),
        ));

        Self {
            view_rx,
            cancel,
            task_handle: Some(handle),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<TradeView>> {
        self.view_rx.clone()
    }

    pub fn close(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

impl Drop for TradeFeed {
    fn drop(&mut self) {
        self.close();
    }
}

fn trade_updates(subscription: TradeSubscription) -> impl Stream<Item = TradeBatch> + Send {
    futures_util::stream::unfold(subscription, |mut sub| async move {
        let batch = sub.next().await?;
        Some((batch, sub))
    })
}

async fn run_trade_task<F, S>(
    coin: String,
    page: F,
    updates: S,
    mut tape: TradeTape,
    view_tx: watch::Sender<Option<TradeView>>,
    cancel: CancellationToken,
) where
    F: Future<Output = hyperliquid::Result<Vec<Trade>>>,
    S: Stream<Item = TradeBatch>,
{
    let mut page = std::pin::pin!(page);
    let mut page_pending = true;
    let mut updates = std::pin::pin!(updates);
    let mut updates_open = true;

    let publish = |tape: &TradeTape| {
        let _ = view_tx.send(Some(TradeView {
            coin: coin.clone(),
            trades: tape.to_vec(),
        }));
    };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            result = &mut page, if page_pending => {
                page_pending = false;
                if cancel.is_cancelled() {
                    break;
                }
                let trades = result.unwrap_or_else(|e| {
                    warn!(coin = %coin, error = %e, "recent trades fetch failed");
                    Vec::new()
                });
                tape.replace_page(trades);
                debug!(coin = %coin, count = tape.len(), "recent trades loaded");
                publish(&tape);
            }

            update = updates.next(), if updates_open => {
                let Some(batch) = update else {
                    info!(coin = %coin, "trade subscription closed");
                    updates_open = false;
                    continue;
                };
                if cancel.is_cancelled() {
                    break;
                }
                tape.prepend_batch(batch.trades);
                publish(&tape);
            }
        }
    }
}

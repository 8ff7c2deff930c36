//! Live aggregated depth for one coin.
//!
//! A background task owns the latest raw book and publishes an aggregated
//! [`DepthView`] on a `watch` channel whenever the book or the bucket size
//! changes.
//!
//! ```text
//!   REST l2Book snapshot ---+
//!                           +--> background task (latest raw L2Book)
//!   WS l2Book pushes -------+            |
//!                                        | aggregate(bucket)
//!   watch<BucketSize> -------------------+
//!                                        v
//!                          watch::Sender<Option<DepthView>>
//! ```
//!
//! The snapshot and the push subscription start together and are not
//! sequenced: whichever book arrives last is shown.

use std::future::Future;
use std::time::{SystemTime, UNIX_EPOCH};

use futures_util::{Stream, StreamExt};
use hyperliquid::{BookSubscription, InfoClient, L2Book, SubscriptionClient};
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::BucketSize;
use crate::depth::{aggregate_book, mid_price, AggregatedBook};
use crate::error::ViewerError;

/// Where the book behind a view came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookSource {
    Snapshot,
    Push,
}

/// Aggregated depth ready for presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthView {
    pub coin: String,
    pub bucket: BucketSize,
    pub book: AggregatedBook,
    /// Normalization max shared by both sides' bars.
    pub max: Decimal,
    pub mid: Option<Decimal>,
    pub source: BookSource,
    /// Local epoch milliseconds when the view was built.
    pub updated_ms: u64,
}

impl DepthView {
    /// Aggregate a raw book at `bucket`.
    pub fn build(
        coin: &str,
        raw: &L2Book,
        bucket: BucketSize,
        source: BookSource,
    ) -> Result<Self, ViewerError> {
        let book = aggregate_book(raw, bucket.value())?;
        Ok(Self {
            coin: coin.to_string(),
            bucket,
            max: book.normalization_max(),
            mid: mid_price(raw),
            book,
            source,
            updated_ms: epoch_ms(),
        })
    }
}

/// Handle to a running book task.
///
/// Dropping the feed (or calling [`close`](Self::close)) stops the task and
/// releases the push subscription.
pub struct BookFeed {
    coin: String,
    view_rx: watch::Receiver<Option<DepthView>>,
    cancel: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl BookFeed {
    /// Start fetching and following the book for `coin`.
    ///
    /// `cancel` is the parent token; the feed also stops when it fires.
    pub fn start(
        coin: &str,
        info: &InfoClient,
        subs: &SubscriptionClient,
        bucket_rx: watch::Receiver<BucketSize>,
        cancel: &CancellationToken,
    ) -> Self {
        let info = info.clone();
        let snapshot_coin = coin.to_string();
        let snapshot = async move { info.l2_book(&snapshot_coin).await };
        let updates = book_updates(subs.subscribe_l2_book(coin));
        Self::spawn(coin, snapshot, updates, bucket_rx, cancel.child_token())
    }

    /// Spawn the task over an arbitrary snapshot future and update stream.
    pub(crate) fn spawn<F, S>(
        coin: &str,
        snapshot: F,
        updates: S,
        bucket_rx: watch::Receiver<BucketSize>,
        cancel: CancellationToken,
    ) -> Self
    where
        F: Future<Output = hyperliquid::Result<L2Book>> + Send + 'static,
        S: Stream<Item = L2Book> + Send + 'static,
    {
        let (view_tx, view_rx) = watch::channel(None);
        let handle = tokio::spawn(run_book_task(
            coin.to_string(),
            snapshot,
            updates,
            bucket_rx,
            view_tx,
            cancel.clone(),
        ));

        Self {
            coin: coin.to_string(),
            view_rx,
            cancel,
            task_handle: Some(handle),
        }
    }

    pub fn coin(&self) -> &str {
        &self.coin
    }

    /// Clone a `watch::Receiver` for async consumption.
    pub fn subscribe(&self) -> watch::Receiver<Option<DepthView>> {
        self.view_rx.clone()
    }

    /// Stop the task. Results still in flight are discarded.
    pub fn close(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

impl Drop for BookFeed {
    fn drop(&mut self) {
        self.close();
    }
}

/// Adapt a push subscription into a stream. Dropping the stream drops the
/// subscription, which unsubscribes.
fn book_updates(subscription: BookSubscription) -> impl Stream<Item = L2Book> + Send {
    futures_util::stream::unfold(subscription, |mut sub| async move {
        let book = sub.next().await?;
        Some((book, sub))
    })
}

// ---------------------------------------------------------------------------
// Background task
// ---------------------------------------------------------------------------

/// Latest raw book plus the bucket it is shown at.
struct BookState {
    coin: String,
    raw: Option<(L2Book, BookSource)>,
    bucket: BucketSize,
}

impl BookState {
    fn publish(&self, view_tx: &watch::Sender<Option<DepthView>>) {
        let Some((raw, source)) = &self.raw else {
            return;
        };
        match DepthView::build(&self.coin, raw, self.bucket, *source) {
            Ok(view) => {
                let _ = view_tx.send(Some(view));
            }
            Err(e) => warn!(coin = %self.coin, error = %e, "failed to aggregate book"),
        }
    }
}

async fn run_book_task<F, S>(
    coin: String,
    snapshot: F,
    updates: S,
    mut bucket_rx: watch::Receiver<BucketSize>,
    view_tx: watch::Sender<Option<DepthView>>,
    cancel: CancellationToken,
) where
    F: Future<Output = hyperliquid::Result<L2Book>>,
    S: Stream<Item = L2Book>,
{
    let bucket = *bucket_rx.borrow_and_update();
    let mut state = BookState {
        coin,
        raw: None,
        bucket,
    };

    let mut snapshot = std::pin::pin!(snapshot);
    let mut snapshot_pending = true;
    let mut updates = std::pin::pin!(updates);
    let mut updates_open = true;
    let mut bucket_open = true;

    debug!(coin = %state.coin, bucket = %state.bucket, "book feed starting");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            result = &mut snapshot, if snapshot_pending => {
                snapshot_pending = false;
                if cancel.is_cancelled() {
                    break;
                }
                match result {
                    Ok(book) => {
                        info!(
                            coin = %state.coin,
                            bids = book.bids().len(),
                            asks = book.asks().len(),
                            "order book snapshot loaded"
                        );
                        state.raw = Some((book, BookSource::Snapshot));
                        state.publish(&view_tx);
                    }
                    Err(e) => {
                        warn!(coin = %state.coin, error = %e, "order book snapshot failed, waiting for pushes");
                    }
                }
            }

            update = updates.next(), if updates_open => {
                let Some(book) = update else {
                    // A pending snapshot can still land; the task idles until closed.
                    info!(coin = %state.coin, "book subscription closed");
                    updates_open = false;
                    continue;
                };
                if cancel.is_cancelled() {
                    break;
                }
                state.raw = Some((book, BookSource::Push));
                state.publish(&view_tx);
            }

            changed = bucket_rx.changed(), if bucket_open => {
                if changed.is_err() {
                    // Sender gone: keep the current bucket.
                    bucket_open = false;
                    continue;
                }
                let bucket = *bucket_rx.borrow_and_update();
                if bucket != state.bucket {
                    debug!(coin = %state.coin, %bucket, "bucket changed");
                    state.bucket = bucket;
                    state.publish(&view_tx);
                }
            }
        }
    }

    debug!(coin = %state.coin, "book feed stopped");
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

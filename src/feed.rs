//! Headless depth stream: aggregated book rows to stdout.

use std::io::{self, BufWriter};

use hyperliquid::Hyperliquid;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::book::BookFeed;
use crate::config::{BucketSize, ViewerConfig};
use crate::error::ViewerError;
use crate::market::{MarketList, SelectedMarket};
use crate::output;

/// Options for [`run_depth_feed`].
#[derive(Debug, Clone)]
pub struct DepthFeedOptions {
    pub market: SelectedMarket,
    pub bucket: BucketSize,
    /// Rows per side.
    pub levels: usize,
    pub json: bool,
    /// Exit after the first view.
    pub once: bool,
}

/// Stream aggregated depth for one market until cancelled.
///
/// # Errors
///
/// [`ViewerError::MarketNotFound`] if the exchange does not list the coin,
/// or [`ViewerError::Io`] if stdout fails for a reason other than a closed
/// pipe.
pub async fn run_depth_feed(
    options: DepthFeedOptions,
    config: &ViewerConfig,
    cancel: CancellationToken,
) -> Result<(), ViewerError> {
    let client = Hyperliquid::new(config.endpoints.clone())?;
    let coin = match MarketList::fetch(&client.info).await {
        Ok(markets) => markets
            .resolve(&options.market.symbol)
            .ok_or_else(|| ViewerError::MarketNotFound(options.market.symbol.clone()))?
            .symbol,
        Err(e) => {
            warn!(error = %e, "market list unavailable, not validating symbol");
            options.market.symbol.clone()
        }
    };

    let mut subs = client.create_subscription_client();
    subs.connect()?;

    // The bucket never changes here; keep the sender alive for the feed.
    let (_bucket_tx, bucket_rx) = watch::channel(options.bucket);
    let mut book = BookFeed::start(&coin, &client.info, &subs, bucket_rx, &cancel);
    let mut view_rx = book.subscribe();

    info!(coin = %coin, bucket = %options.bucket, json = options.json, "depth stream starting");

    let mut writer = BufWriter::new(io::stdout());
    let mut buf = String::with_capacity(4096);

    let result = loop {
        tokio::select! {
            _ = cancel.cancelled() => break Ok(()),
            changed = view_rx.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let Some(view) = view_rx.borrow_and_update().clone() else {
                    continue;
                };
                match output::write_depth(&view, options.levels, options.json, &mut buf, &mut writer) {
                    Ok(()) => {}
                    Err(ViewerError::Io(e)) if e.kind() == io::ErrorKind::BrokenPipe => {
                        debug!("stdout closed");
                        break Ok(());
                    }
                    Err(e) => break Err(e),
                }
                if options.once {
                    break Ok(());
                }
            }
        }
    };

    book.close();
    subs.close();
    info!(coin = %coin, "depth stream stopped");
    result
}

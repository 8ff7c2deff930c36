//! Selected market cell and the market selector list.

use std::fmt;
use std::sync::Arc;

use hyperliquid::{coin_from_label, pair_label, InfoClient};
use tokio::sync::watch;
use tracing::debug;

use crate::error::ViewerError;

/// Instrument type of a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarketKind {
    Spot,
    #[default]
    Perp,
}

impl fmt::Display for MarketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketKind::Spot => write!(f, "Spot"),
            MarketKind::Perp => write!(f, "Perp"),
        }
    }
}

/// The market every panel is currently showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedMarket {
    /// Exchange coin, e.g. `"BTC"`.
    pub symbol: String,
    pub kind: MarketKind,
}

impl SelectedMarket {
    pub fn perp(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            kind: MarketKind::Perp,
        }
    }

    /// Build from user input: accepts `"btc"` as well as `"BTC-USDT"`.
    pub fn from_input(input: &str) -> Self {
        Self::perp(coin_from_label(input.trim()).to_uppercase())
    }

    pub fn label(&self) -> String {
        pair_label(&self.symbol)
    }
}

impl Default for SelectedMarket {
    fn default() -> Self {
        Self::perp("BTC")
    }
}

/// Shared, observable holder of the [`SelectedMarket`].
///
/// Cloning shares the same cell. Readers never block; subscribers see the
/// latest value and are woken only when the selection actually changes.
#[derive(Debug, Clone)]
pub struct MarketSelection {
    tx: Arc<watch::Sender<SelectedMarket>>,
}

impl MarketSelection {
    pub fn new(initial: SelectedMarket) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> SelectedMarket {
        self.tx.borrow().clone()
    }

    /// Replace the selection. Returns `true` if the value changed (and
    /// subscribers were notified).
    pub fn select(&self, market: SelectedMarket) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == market {
                false
            } else {
                *current = market;
                true
            }
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<SelectedMarket> {
        self.tx.subscribe()
    }
}

impl Default for MarketSelection {
    fn default() -> Self {
        Self::new(SelectedMarket::default())
    }
}

/// Pair labels for the market selector, in exchange order, with a cursor.
#[derive(Debug, Clone, Default)]
pub struct MarketList {
    labels: Vec<String>,
    cursor: usize,
}

impl MarketList {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels, cursor: 0 }
    }

    /// Load the pair labels from exchange metadata.
    pub async fn fetch(info: &InfoClient) -> Result<Self, ViewerError> {
        let labels = info.markets().await?;
        debug!(count = labels.len(), "markets loaded");
        Ok(Self::new(labels))
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn move_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.cursor + 1 < self.labels.len() {
            self.cursor += 1;
        }
    }

    /// Put the cursor on `symbol` if it is listed.
    pub fn focus(&mut self, symbol: &str) {
        if let Some(i) = self.labels.iter().position(|l| coin_from_label(l) == symbol) {
            self.cursor = i;
        }
    }

    /// The first listed market, used when nothing was requested.
    pub fn default_selection(&self) -> Option<SelectedMarket> {
        self.labels
            .first()
            .map(|l| SelectedMarket::perp(coin_from_label(l)))
    }

    /// The market under the cursor.
    pub fn highlighted(&self) -> Option<SelectedMarket> {
        self.labels
            .get(self.cursor)
            .map(|l| SelectedMarket::perp(coin_from_label(l)))
    }

    /// Match user input (`"eth"`, `"ETH-USDT"`) against the listed coins,
    /// ignoring ASCII case. Returns the coin spelled as the exchange lists it.
    pub fn resolve(&self, input: &str) -> Option<SelectedMarket> {
        let wanted = coin_from_label(input.trim());
        self.labels
            .iter()
            .map(|l| coin_from_label(l))
            .find(|coin| coin.eq_ignore_ascii_case(wanted))
            .map(SelectedMarket::perp)
    }
}

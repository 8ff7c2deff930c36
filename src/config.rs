//! Viewer configuration: endpoint resolution, tunables and the bucket menu.

use std::fmt;
use std::time::Duration;

use hyperliquid::{parse_decimal, HyperliquidConfig};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::ViewerError;

/// Price bucket sizes offered to the user, smallest first.
pub const BUCKET_MENU: [Decimal; 8] = [
    dec!(0.1),
    dec!(0.5),
    dec!(1),
    dec!(2),
    dec!(5),
    dec!(10),
    dec!(50),
    dec!(100),
];

/// Menu entry selected when nothing else is requested.
pub const DEFAULT_BUCKET: Decimal = dec!(1);

const ENV_NETWORK: &str = "HYPERLIQUID_NETWORK";
const ENV_API_URL: &str = "HYPERLIQUID_API_URL";
const ENV_WS_URL: &str = "HYPERLIQUID_WS_URL";

// ---------------------------------------------------------------------------
// BucketSize
// ---------------------------------------------------------------------------

/// A strictly positive price bucket width.
///
/// The aggregator accepts any positive value; the CLI and the TUI keep to
/// [`BUCKET_MENU`] through [`BucketSize::from_menu`], [`next`](Self::next)
/// and [`prev`](Self::prev).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BucketSize(Decimal);

impl BucketSize {
    /// Wrap a positive decimal.
    ///
    /// # Errors
    ///
    /// [`ViewerError::InvalidArgument`] when `value <= 0`.
    pub fn new(value: Decimal) -> Result<Self, ViewerError> {
        if value <= Decimal::ZERO {
            return Err(ViewerError::InvalidArgument(format!(
                "bucket size must be positive, got {value}"
            )));
        }
        Ok(Self(value))
    }

    /// Parse a user supplied bucket size such as `"0.5"` or `"10"`.
    pub fn parse(s: &str) -> Result<Self, ViewerError> {
        let value = parse_decimal(s.trim())
            .ok_or_else(|| ViewerError::InvalidArgument(format!("not a number: {s:?}")))?;
        Self::new(value)
    }

    /// Accept `value` only if it is one of the [`BUCKET_MENU`] entries.
    pub fn from_menu(value: Decimal) -> Result<Self, ViewerError> {
        if BUCKET_MENU.contains(&value) {
            Ok(Self(value))
        } else {
            Err(ViewerError::InvalidArgument(format!(
                "bucket size {value} is not one of {}",
                menu_text()
            )))
        }
    }

    pub fn value(self) -> Decimal {
        self.0
    }

    /// Next larger menu entry, or `self` when already at (or past) the top.
    pub fn next(self) -> Self {
        BUCKET_MENU
            .iter()
            .find(|&&b| b > self.0)
            .map_or(self, |&b| Self(b))
    }

    /// Next smaller menu entry, or `self` when already at (or below) the bottom.
    pub fn prev(self) -> Self {
        BUCKET_MENU
            .iter()
            .rev()
            .find(|&&b| b < self.0)
            .map_or(self, |&b| Self(b))
    }
}

impl Default for BucketSize {
    fn default() -> Self {
        Self(DEFAULT_BUCKET)
    }
}

impl fmt::Display for BucketSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

fn menu_text() -> String {
    BUCKET_MENU
        .iter()
        .map(|b| b.normalize().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// ViewerConfig
// ---------------------------------------------------------------------------

/// Runtime tunables for the viewer.
///
/// Use [`ViewerConfig::from_env`] in the binary so `.env` overrides apply;
/// [`Default::default()`] talks to mainnet.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// REST and WebSocket endpoints.
    pub endpoints: HyperliquidConfig,
    /// Number of trades fetched for the initial tape page.
    pub trade_page_size: usize,
    /// Maximum trades kept on the tape.
    pub max_trades: usize,
    /// TUI redraw interval (also the keyboard poll interval).
    pub render_interval: Duration,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            endpoints: HyperliquidConfig::mainnet(),
            trade_page_size: 50,
            max_trades: 200,
            render_interval: Duration::from_millis(100), // 10 FPS
        }
    }
}

impl ViewerConfig {
    /// Defaults with endpoints taken from the process environment.
    pub fn from_env() -> Self {
        Self {
            endpoints: endpoints_from(|key| std::env::var(key).ok()),
            ..Default::default()
        }
    }
}

/// Resolve endpoints: `HYPERLIQUID_NETWORK=testnet` switches the base, then
/// `HYPERLIQUID_API_URL` / `HYPERLIQUID_WS_URL` override individual URLs.
fn endpoints_from(lookup: impl Fn(&str) -> Option<String>) -> HyperliquidConfig {
    let mut config = match lookup(ENV_NETWORK).as_deref().map(str::trim) {
        Some(net) if net.eq_ignore_ascii_case("testnet") => HyperliquidConfig::testnet(),
        _ => HyperliquidConfig::mainnet(),
    };
    if let Some(url) = lookup(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
        config.api_url = url.trim().to_string();
    }
    if let Some(url) = lookup(ENV_WS_URL).filter(|u| !u.trim().is_empty()) {
        config.ws_url = url.trim().to_string();
    }
    config
}

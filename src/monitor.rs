//! Market monitor TUI using ratatui + crossterm.
//!
//! Shows bucketed order-book depth with cumulative bars, the recent trades
//! tape, a market selector and a log panel. Selecting another market tears
//! down both feeds and starts new ones for the new coin.

use std::collections::VecDeque;
use std::io::{self, Stdout};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Local};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use hyperliquid::{Hyperliquid, SubscriptionClient, TakerSide, Trade};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::book::{BookFeed, BookSource, DepthView};
use crate::config::{BucketSize, ViewerConfig};
use crate::depth::{fill_fraction, AggregatedRow};
use crate::error::ViewerError;
use crate::market::{MarketList, MarketSelection, SelectedMarket};
use crate::trades::{TradeFeed, TradeView};

/// Decimals shown for sizes and cumulative totals.
const SIZE_DECIMALS: usize = 5;

/// Window for computing updates-per-second.
const STATS_WINDOW_MS: u64 = 60_000;

/// Maximum log lines retained.
const MAX_LOG_LINES: usize = 500;

const BID_COLOR: Color = Color::Green;
const ASK_COLOR: Color = Color::Red;
const BID_BAR: Color = Color::Rgb(0, 60, 0);
const ASK_BAR: Color = Color::Rgb(70, 0, 0);

// ---------------------------------------------------------------------------
// Internal types
// ---------------------------------------------------------------------------

/// Tracks update timestamps for computing rates.
struct RateTracker {
    timestamps: VecDeque<u64>,
}

impl RateTracker {
    fn new() -> Self {
        Self {
            timestamps: VecDeque::new(),
        }
    }

    fn record(&mut self, now_ms: u64) {
        self.timestamps.push_back(now_ms);
        let cutoff = now_ms.saturating_sub(STATS_WINDOW_MS);
        while self.timestamps.front().is_some_and(|&t| t < cutoff) {
            self.timestamps.pop_front();
        }
    }

    fn reset(&mut self) {
        self.timestamps.clear();
    }

    /// Updates per second over the stats window.
    fn per_second(&self, now_ms: u64) -> f64 {
        let cutoff = now_ms.saturating_sub(STATS_WINDOW_MS);
        let count = self.timestamps.iter().filter(|&&t| t > cutoff).count();
        let first = self.timestamps.front().copied().unwrap_or(now_ms);
        let window_s = (now_ms.saturating_sub(first).min(STATS_WINDOW_MS) as f64) / 1000.0;
        if window_s <= 0.0 {
            0.0
        } else {
            count as f64 / window_s
        }
    }
}

/// The two per-market feeds, started and stopped together.
struct MarketFeeds {
    book: BookFeed,
    trades: TradeFeed,
}

impl MarketFeeds {
    fn start(
        coin: &str,
        client: &Hyperliquid,
        subs: &SubscriptionClient,
        bucket_rx: &watch::Receiver<BucketSize>,
        config: &ViewerConfig,
        cancel: &CancellationToken,
    ) -> Self {
        info!(coin = %coin, "starting market feeds");
        Self {
            book: BookFeed::start(coin, &client.info, subs, bucket_rx.clone(), cancel),
            trades: TradeFeed::start(
                coin,
                &client.info,
                subs,
                config.trade_page_size,
                config.max_trades,
                cancel,
            ),
        }
    }

    fn close(&mut self) {
        info!(coin = %self.book.coin(), "stopping market feeds");
        self.book.close();
        self.trades.close();
    }
}

/// What a key press asks the monitor to do.
#[derive(Debug, Clone, PartialEq, Eq)]
enum KeyAction {
    Quit,
    Bucket(BucketSize),
    Select(SelectedMarket),
    Redraw,
    Ignore,
}

/// Everything the renderer needs.
struct MonitorState {
    market: SelectedMarket,
    bucket: BucketSize,
    depth: Option<DepthView>,
    trades: Vec<Trade>,
    markets: MarketList,
    log_lines: VecDeque<String>,
    book_rate: RateTracker,
}

impl MonitorState {
    fn log(&mut self, line: impl Into<String>) {
        self.log_lines.push_back(line.into());
        while self.log_lines.len() > MAX_LOG_LINES {
            self.log_lines.pop_front();
        }
    }

    /// Accept a depth view only if it belongs to the selected market.
    fn apply_depth(&mut self, view: DepthView, now_ms: u64) -> bool {
        if view.coin != self.market.symbol {
            return false;
        }
        self.book_rate.record(now_ms);
        self.depth = Some(view);
        true
    }

    fn apply_trades(&mut self, view: TradeView) -> bool {
        if view.coin != self.market.symbol {
            return false;
        }
        self.trades = view.trades;
        true
    }

    fn switch_market(&mut self, market: SelectedMarket) {
        self.market = market;
        self.depth = None;
        self.trades.clear();
        self.book_rate.reset();
        self.markets.focus(&self.market.symbol);
    }

    fn handle_key(&mut self, code: KeyCode) -> KeyAction {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => KeyAction::Quit,
            KeyCode::Char('+') | KeyCode::Char('=') => self.step_bucket(self.bucket.next()),
            KeyCode::Char('-') | KeyCode::Char('_') => self.step_bucket(self.bucket.prev()),
            KeyCode::Up | KeyCode::Char('k') => {
                self.markets.move_up();
                KeyAction::Redraw
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.markets.move_down();
                KeyAction::Redraw
            }
            KeyCode::Enter => match self.markets.highlighted() {
                Some(market) if market != self.market => KeyAction::Select(market),
                _ => KeyAction::Ignore,
            },
            _ => KeyAction::Ignore,
        }
    }

    fn step_bucket(&mut self, bucket: BucketSize) -> KeyAction {
        if bucket == self.bucket {
            return KeyAction::Ignore;
        }
        self.bucket = bucket;
        KeyAction::Bucket(bucket)
    }
}

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Run the market monitor TUI.
///
/// # Arguments
///
/// * `symbol` - Coin or pair label to open; the first listed market if `None`.
/// * `bucket` - Initial bucket size.
/// * `config` - Endpoints and tunables.
/// * `cancel` - Cancellation token for graceful shutdown.
///
/// # Errors
///
/// Returns [`ViewerError`] on invalid endpoints, an unknown symbol, or
/// terminal setup failure.
pub async fn run_monitor(
    symbol: Option<&str>,
    bucket: BucketSize,
    config: &ViewerConfig,
    cancel: CancellationToken,
) -> Result<(), ViewerError> {
    let client = Hyperliquid::new(config.endpoints.clone())?;

    let mut state = MonitorState {
        market: SelectedMarket::default(),
        bucket,
        depth: None,
        trades: Vec::new(),
        markets: MarketList::default(),
        log_lines: VecDeque::with_capacity(MAX_LOG_LINES),
        book_rate: RateTracker::new(),
    };

    match MarketList::fetch(&client.info).await {
        Ok(markets) => state.markets = markets,
        Err(e) => {
            warn!(error = %e, "market list unavailable");
            state.log(format!("Market list unavailable: {e}"));
        }
    }

    let initial = match symbol {
        Some(input) if state.markets.is_empty() => SelectedMarket::from_input(input),
        Some(input) => state
            .markets
            .resolve(input)
            .ok_or_else(|| ViewerError::MarketNotFound(input.to_string()))?,
        None => state.markets.default_selection().unwrap_or_default(),
    };
    state.switch_market(initial.clone());

    let selection = MarketSelection::new(initial.clone());
    let mut selection_rx = selection.subscribe();

    let mut subs = client.create_subscription_client();
    subs.connect()?;

    let (bucket_tx, bucket_rx) = watch::channel(bucket);
    let mut feeds = MarketFeeds::start(&initial.symbol, &client, &subs, &bucket_rx, config, &cancel);
    let mut depth_rx = feeds.book.subscribe();
    let mut trade_rx = feeds.trades.subscribe();

    state.log(format!("Market: {}, bucket {}", initial.label(), bucket));
    state.log("Keys: q quit, +/- bucket, Up/Down + Enter select market");

    // Set up terminal.
    enable_raw_mode().map_err(|e| ViewerError::Terminal(format!("enable raw mode: {e}")))?;
    if let Err(e) = io::stdout().execute(EnterAlternateScreen) {
        let _ = disable_raw_mode();
        return Err(ViewerError::Terminal(format!("enter alternate screen: {e}")));
    }
    let mut terminal = match Terminal::new(CrosstermBackend::new(io::stdout())) {
        Ok(t) => t,
        Err(e) => {
            let _ = disable_raw_mode();
            let _ = io::stdout().execute(LeaveAlternateScreen);
            return Err(ViewerError::Terminal(format!("create terminal: {e}")));
        }
    };

    let mut render_interval = tokio::time::interval(config.render_interval);
    let mut pending_switch: Option<SelectedMarket> = None;
    let mut quit = false;

    // Main event loop.
    let result: Result<(), ViewerError> = loop {
        if quit {
            break Ok(());
        }

        // Market switches are applied between select! rounds.
        if let Some(market) = pending_switch.take() {
            feeds.close();
            state.switch_market(market.clone());
            feeds = MarketFeeds::start(&market.symbol, &client, &subs, &bucket_rx, config, &cancel);
            depth_rx = feeds.book.subscribe();
            trade_rx = feeds.trades.subscribe();
            state.log(format!("Switched to {}", market.label()));
        }

        tokio::select! {
            Ok(()) = depth_rx.changed() => {
                let view = depth_rx.borrow_and_update().clone();
                if let Some(view) = view {
                    state.apply_depth(view, epoch_ms());
                }
            }

            Ok(()) = trade_rx.changed() => {
                let view = trade_rx.borrow_and_update().clone();
                if let Some(view) = view {
                    state.apply_trades(view);
                }
            }

            Ok(()) = selection_rx.changed() => {
                selection_rx.borrow_and_update();
                let market = selection.current();
                if market != state.market {
                    pending_switch = Some(market);
                }
            }

            // Render tick, also polls keyboard input.
            _ = render_interval.tick() => {
                while event::poll(std::time::Duration::ZERO).unwrap_or(false) {
                    let Ok(Event::Key(key)) = event::read() else {
                        continue;
                    };
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    match state.handle_key(key.code) {
                        KeyAction::Quit => quit = true,
                        KeyAction::Bucket(b) => {
                            let _ = bucket_tx.send(b);
                            state.log(format!("Bucket {b}"));
                        }
                        KeyAction::Select(market) => {
                            selection.select(market);
                        }
                        KeyAction::Redraw | KeyAction::Ignore => {}
                    }
                }

                if !quit {
                    let now = epoch_ms();
                    let _ = terminal.draw(|frame| render_ui(frame, &state, now));
                }
            }

            _ = cancel.cancelled() => {
                break Ok(());
            }
        }
    };

    restore_terminal(&mut terminal);

    feeds.close();
    subs.close();

    result
}

// ---------------------------------------------------------------------------
// Terminal helpers
// ---------------------------------------------------------------------------

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) {
    let _ = terminal.show_cursor();
    let _ = disable_raw_mode();
    let _ = io::stdout().execute(LeaveAlternateScreen);
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ---------------------------------------------------------------------------
// UI rendering
// ---------------------------------------------------------------------------

fn render_ui(frame: &mut Frame, state: &MonitorState, now_ms: u64) {
    let area = frame.area();

    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),   // header
            Constraint::Ratio(3, 4), // panels
            Constraint::Min(5),      // log
        ])
        .split(area);

    let mid = state
        .depth
        .as_ref()
        .and_then(|d| d.mid)
        .map_or_else(|| "--".to_string(), |m| m.normalize().to_string());
    let source = match state.depth.as_ref().map(|d| d.source) {
        Some(BookSource::Snapshot) => "snapshot",
        Some(BookSource::Push) => "live",
        None => "connecting",
    };
    let header_text = format!(
        " DEPTHVIEW - {} ({}) | mid {mid} | agg {} | book {source} {:.1}/s | q quit",
        state.market.label(),
        state.market.kind,
        state.bucket,
        state.book_rate.per_second(now_ms),
    );
    let header = Paragraph::new(header_text)
        .style(Style::default().fg(Color::White).bg(Color::Blue).bold())
        .alignment(Alignment::Center);
    frame.render_widget(header, main_layout[0]);

    // Panels: markets (15%) | order book (50%) | trades (35%).
    let panels = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(15),
            Constraint::Percentage(50),
            Constraint::Percentage(35),
        ])
        .split(main_layout[1]);

    render_markets(frame, panels[0], state);
    render_orderbook(frame, panels[1], state);
    render_trades(frame, panels[2], &state.trades);
    render_log(frame, main_layout[2], &state.log_lines);
}

fn panel_block(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title)
}

fn render_markets(frame: &mut Frame, area: Rect, state: &MonitorState) {
    let visible = area.height.saturating_sub(2) as usize;
    let cursor = state.markets.cursor();
    // Keep the cursor on screen.
    let skip = cursor.saturating_sub(visible.saturating_sub(1));

    let lines: Vec<Line> = state
        .markets
        .labels()
        .iter()
        .enumerate()
        .skip(skip)
        .take(visible)
        .map(|(i, label)| {
            let selected = hyperliquid::coin_from_label(label) == state.market.symbol;
            let marker = if selected { "*" } else { " " };
            let mut style = Style::default();
            if selected {
                style = style.fg(Color::Yellow);
            }
            if i == cursor {
                style = style.add_modifier(Modifier::REVERSED);
            }
            Line::styled(format!("{marker}{label}"), style)
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(panel_block(" Markets ")), area);
}

fn render_orderbook(frame: &mut Frame, area: Rect, state: &MonitorState) {
    let inner_width = area.width.saturating_sub(2) as usize;
    let half = inner_width / 2;
    // Header, column titles and the mid line take three rows.
    let visible = area.height.saturating_sub(2 + 3) as usize;

    let mut lines: Vec<Line> = Vec::with_capacity(visible + 3);

    let title = format!("Bucket {}", state.bucket);
    lines.push(Line::from(Span::styled(
        format!("{title:^inner_width$}"),
        Style::default().fg(Color::DarkGray),
    )));
    lines.push(Line::from(vec![
        Span::styled(split_columns("Total", "Price", half), Style::default().bold()),
        Span::styled(split_columns("Price", "Total", inner_width - half), Style::default().bold()),
    ]));

    match &state.depth {
        None => {
            lines.push(Line::styled("  waiting for book...", Style::default().fg(Color::Yellow)));
        }
        Some(view) => {
            let rows = view.book.depth().min(visible);
            for i in 0..rows {
                let mut spans = bid_cell(view.book.bids.get(i), view, half);
                spans.extend(ask_cell(view.book.asks.get(i), view, inner_width - half));
                lines.push(Line::from(spans));
            }
            let mid = view
                .mid
                .map_or_else(|| "--".to_string(), |m| m.normalize().to_string());
            lines.push(Line::from(format!("{:^inner_width$}", format!("Mid: {mid}"))));
        }
    }

    frame.render_widget(Paragraph::new(lines).block(panel_block(" Order Book ")), area);
}

/// `left` flush left and `right` flush right within `width` columns.
fn split_columns(left: &str, right: &str, width: usize) -> String {
    let pad = width.saturating_sub(left.len() + right.len() + 2);
    fit(&format!(" {left}{}{right} ", " ".repeat(pad)), width)
}

/// Bid half: cumulative left, price right, bar grows from the centre.
fn bid_cell(row: Option<&AggregatedRow>, view: &DepthView, width: usize) -> Vec<Span<'static>> {
    let Some(row) = row else {
        return vec![Span::raw(" ".repeat(width))];
    };
    let text = split_columns(
        &format!("{:.SIZE_DECIMALS$}", row.cumulative),
        &row.price.normalize().to_string(),
        width,
    );
    bar_spans(text, fill_fraction(row, view.max), true, BID_COLOR, BID_BAR)
}

/// Ask half: price left, cumulative right, bar grows from the centre.
fn ask_cell(row: Option<&AggregatedRow>, view: &DepthView, width: usize) -> Vec<Span<'static>> {
    let Some(row) = row else {
        return vec![Span::raw(" ".repeat(width))];
    };
    let text = split_columns(
        &row.price.normalize().to_string(),
        &format!("{:.SIZE_DECIMALS$}", row.cumulative),
        width,
    );
    bar_spans(text, fill_fraction(row, view.max), false, ASK_COLOR, ASK_BAR)
}

/// Split `text` into a plain part and a background-shaded part covering
/// `fill` of its width, anchored right or left.
fn bar_spans(text: String, fill: f64, anchor_right: bool, fg: Color, bar: Color) -> Vec<Span<'static>> {
    let width = text.chars().count();
    let filled = ((fill * width as f64).round() as usize).min(width);
    let split_at = if anchor_right { width - filled } else { filled };
    let byte_idx = text
        .char_indices()
        .nth(split_at)
        .map_or(text.len(), |(i, _)| i);
    let (left, right) = text.split_at(byte_idx);

    let plain = Style::default().fg(fg);
    let shaded = plain.bg(bar);
    let (left_style, right_style) = if anchor_right {
        (plain, shaded)
    } else {
        (shaded, plain)
    };
    vec![
        Span::styled(left.to_string(), left_style),
        Span::styled(right.to_string(), right_style),
    ]
}

/// Pad or truncate to exactly `width` characters.
fn fit(text: &str, width: usize) -> String {
    let mut out: String = text.chars().take(width).collect();
    let len = out.chars().count();
    out.extend(std::iter::repeat(' ').take(width - len));
    out
}

fn render_trades(frame: &mut Frame, area: Rect, trades: &[Trade]) {
    let visible = area.height.saturating_sub(2) as usize;
    let lines: Vec<Line> = trades.iter().take(visible).map(format_trade).collect();
    frame.render_widget(Paragraph::new(lines).block(panel_block(" Trades ")), area);
}

/// Local time, price coloured by aggressor, and size.
fn format_trade(trade: &Trade) -> Line<'static> {
    let time_str = trade
        .time_utc()
        .map(|t| DateTime::<Local>::from(t).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());
    let color = match trade.side {
        TakerSide::Buy => BID_COLOR,
        TakerSide::Sell => ASK_COLOR,
    };

    Line::from(vec![
        Span::raw(format!("{time_str}  ")),
        Span::styled(
            format!("{:>12}", trade.px.normalize().to_string()),
            Style::default().fg(color),
        ),
        Span::raw(format!("  {:>14.SIZE_DECIMALS$}", trade.sz)),
    ])
}

fn render_log(frame: &mut Frame, area: Rect, log_lines: &VecDeque<String>) {
    // Show the tail that fits.
    let visible = area.height.saturating_sub(2) as usize;
    let lines: Vec<Line> = log_lines
        .iter()
        .skip(log_lines.len().saturating_sub(visible))
        .map(|l| Line::from(l.as_str()))
        .collect();

    let paragraph = Paragraph::new(lines)
        .block(panel_block(" Log "))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use hyperliquid::{L2Book, RawLevel};
    use rust_decimal_macros::dec;

    use super::*;

    fn state() -> MonitorState {
        let mut s = MonitorState {
            market: SelectedMarket::default(),
            bucket: BucketSize::default(),
            depth: None,
            trades: Vec::new(),
            markets: MarketList::new(vec!["BTC-USDT".into(), "ETH-USDT".into()]),
            log_lines: VecDeque::new(),
            book_rate: RateTracker::new(),
        };
        s.switch_market(SelectedMarket::perp("BTC"));
        s
    }

    fn view(coin: &str) -> DepthView {
        let raw = L2Book::new(coin, vec![RawLevel::new("100", "1", 1)], vec![]);
        DepthView::build(coin, &raw, BucketSize::default(), BookSource::Push).unwrap()
    }

    #[test]
    fn views_for_other_coins_are_discarded() {
        let mut s = state();
        assert!(!s.apply_depth(view("ETH"), 1));
        assert!(s.depth.is_none());
        assert!(s.apply_depth(view("BTC"), 1));
        assert!(!s.apply_trades(TradeView {
            coin: "ETH".into(),
            trades: Vec::new(),
        }));
    }

    #[test]
    fn bucket_keys_step_and_saturate() {
        let mut s = state();
        assert_eq!(
            s.handle_key(KeyCode::Char('+')),
            KeyAction::Bucket(BucketSize::new(dec!(2)).unwrap())
        );
        s.bucket = BucketSize::new(dec!(0.1)).unwrap();
        assert_eq!(s.handle_key(KeyCode::Char('-')), KeyAction::Ignore);
    }

    #[test]
    fn enter_selects_highlighted_market() {
        let mut s = state();
        assert_eq!(s.handle_key(KeyCode::Enter), KeyAction::Ignore);
        s.handle_key(KeyCode::Down);
        assert_eq!(
            s.handle_key(KeyCode::Enter),
            KeyAction::Select(SelectedMarket::perp("ETH"))
        );
        assert_eq!(s.handle_key(KeyCode::Char('q')), KeyAction::Quit);
    }

    #[test]
    fn switch_market_clears_panels() {
        let mut s = state();
        s.apply_depth(view("BTC"), 1);
        s.switch_market(SelectedMarket::perp("ETH"));
        assert!(s.depth.is_none());
        assert!(s.trades.is_empty());
        assert_eq!(s.markets.cursor(), 1);
    }

    #[test]
    fn bar_spans_anchor_and_width() {
        let spans = bar_spans("abcdefghij".into(), 0.3, true, BID_COLOR, BID_BAR);
        assert_eq!(spans[0].content, "abcdefg");
        assert_eq!(spans[1].content, "hij");

        let spans = bar_spans("abcdefghij".into(), 0.3, false, ASK_COLOR, ASK_BAR);
        assert_eq!(spans[0].content, "abc");
        assert_eq!(spans[1].content, "defghij");

        let full = bar_spans("abcd".into(), 1.0, true, BID_COLOR, BID_BAR);
        assert_eq!(full[0].content, "");
        assert_eq!(full[1].content, "abcd");
    }

    #[test]
    fn split_columns_fills_width() {
        let s = split_columns("1.5", "100", 12);
        assert_eq!(s, " 1.5    100 ");
        assert_eq!(split_columns("123456", "789012", 8).chars().count(), 8);
    }

    #[test]
    fn rate_tracker_counts_window() {
        let mut r = RateTracker::new();
        for t in [0, 500, 1000, 1500, 2000] {
            r.record(t);
        }
        assert_eq!(r.per_second(2000), 2.0);
        r.reset();
        assert_eq!(r.per_second(2000), 0.0);
    }
}

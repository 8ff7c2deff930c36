use clap::{Parser, Subcommand};

use crate::config::BucketSize;

/// depthview: live bucketed order-book depth for Hyperliquid markets.
#[derive(Parser, Debug)]
#[command(name = "depthview", version)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Full-screen order book, trades and market selector
    Monitor(MonitorArgs),

    /// Stream aggregated depth rows to stdout
    Depth(DepthArgs),

    /// List market pair labels
    Markets(MarketsArgs),
}

#[derive(Parser, Debug)]
pub struct MonitorArgs {
    /// Coin or pair label (e.g. BTC, ETH-USDT); defaults to the first listed market
    pub symbol: Option<String>,

    /// Price bucket size (0.1, 0.5, 1, 2, 5, 10, 50, 100)
    #[arg(long, value_parser = parse_bucket)]
    pub bucket: Option<BucketSize>,
}

#[derive(Parser, Debug)]
pub struct DepthArgs {
    /// Coin or pair label (e.g. BTC, ETH-USDT)
    pub symbol: String,

    /// Price bucket size (0.1, 0.5, 1, 2, 5, 10, 50, 100)
    #[arg(long, value_parser = parse_bucket)]
    pub bucket: Option<BucketSize>,

    /// Rows printed per side
    #[arg(long, default_value_t = 20)]
    pub levels: usize,

    /// Output as JSON instead of TSV
    #[arg(long)]
    pub json: bool,

    /// Print one update and exit
    #[arg(long)]
    pub once: bool,
}

#[derive(Parser, Debug)]
pub struct MarketsArgs {
    /// Output a JSON array instead of one label per line
    #[arg(long)]
    pub json: bool,
}

/// Only menu sizes are accepted on the command line.
fn parse_bucket(s: &str) -> Result<BucketSize, String> {
    BucketSize::parse(s)
        .and_then(|b| BucketSize::from_menu(b.value()))
        .map_err(|e| e.to_string())
}

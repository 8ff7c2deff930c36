mod book;
mod cli;
mod config;
mod depth;
mod error;
mod feed;
mod market;
mod monitor;
mod output;
mod trades;

use std::io::{self, Write};

use clap::Parser;
use cli::Command;
use hyperliquid::Hyperliquid;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ViewerConfig;
use crate::error::ViewerError;
use crate::feed::DepthFeedOptions;
use crate::market::SelectedMarket;

#[tokio::main]
async fn main() {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    let cli = cli::Cli::parse();

    // Initialize tracing
    let filter = cli
        .log_level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO);

    tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let _ = dotenvy::dotenv(); // load .env if present
    let config = ViewerConfig::from_env();

    // Shared cancellation token + signal handlers.
    let cancel = setup_signal_handlers();

    let result = match cli.command {
        Command::Monitor(args) => {
            let bucket = args.bucket.unwrap_or_default();
            monitor::run_monitor(args.symbol.as_deref(), bucket, &config, cancel).await
        }

        Command::Depth(args) => {
            let options = DepthFeedOptions {
                market: SelectedMarket::from_input(&args.symbol),
                bucket: args.bucket.unwrap_or_default(),
                levels: args.levels,
                json: args.json,
                once: args.once,
            };
            info!(market = %options.market.label(), levels = options.levels, "depth starting");
            feed::run_depth_feed(options, &config, cancel).await
        }

        Command::Markets(args) => print_markets(&config, args.json).await,
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "fatal error");
        std::process::exit(1);
    }
}

/// Print every pair label, one per line or as a JSON array.
async fn print_markets(config: &ViewerConfig, json: bool) -> Result<(), ViewerError> {
    let client = Hyperliquid::new(config.endpoints.clone())?;
    let labels = client.info.markets().await?;
    let mut out = io::stdout().lock();
    if json {
        let text = serde_json::to_string(&labels)?;
        writeln!(out, "{text}")?;
    } else {
        for label in labels {
            writeln!(out, "{label}")?;
        }
    }
    Ok(())
}

/// Register SIGINT and SIGTERM handlers that trigger the returned token.
fn setup_signal_handlers() -> CancellationToken {
    let cancel = CancellationToken::new();

    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received SIGINT, shutting down");
        cancel_clone.cancel();
    });

    #[cfg(unix)]
    {
        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            let mut sig = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to register SIGTERM handler");
            sig.recv().await;
            info!("received SIGTERM, shutting down");
            cancel_clone.cancel();
        });
    }

    cancel
}

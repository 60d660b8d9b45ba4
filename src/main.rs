use std::sync::Arc;

use color_eyre::eyre;
use structopt::StructOpt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

mod collector;
mod config;
mod model;
mod provider;
mod publisher;

use crate::collector::PollLoop;
use crate::config::{resolve_interval, Config, ConfigError};
use crate::provider::AlpacaClient;
use crate::publisher::Publisher;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "stock-rtd",
    about = "Polls market data for one symbol and publishes snapshots for an RTD display"
)]
struct Opt {
    /// Poll interval in seconds (default 5, minimum 1)
    interval: Option<String>,

    /// Fetch and print the latest trade and quote once, then exit
    #[structopt(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // init error reporting
    color_eyre::install()?;

    // init logging
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    dotenv::dotenv().ok();

    let opt = Opt::from_args();

    let cfg = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("configuration error: {e}");
            if matches!(e, ConfigError::MissingCredentials(_)) {
                eprintln!("Please set your API keys first:");
                eprintln!("  export {}='your_key'", config::API_KEY_VAR);
                eprintln!("  export {}='your_secret'", config::SECRET_KEY_VAR);
            }
            std::process::exit(1);
        }
    };

    let client = Arc::new(AlpacaClient::new(
        cfg.api_key.clone(),
        cfg.secret_key.clone(),
    ));

    if opt.once {
        return probe(&client, &cfg).await;
    }

    let interval = resolve_interval(opt.interval.as_deref());

    // cancel the token on Ctrl-C so the loop drains and exits cleanly
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, shutting down");
                shutdown.cancel();
            }
        });
    }

    let publisher = Publisher::new(cfg.snapshot_path.clone());
    PollLoop::new(
        client,
        publisher,
        cfg.symbol.clone(),
        cfg.feed,
        interval,
        shutdown,
    )
    .run()
    .await;

    info!("service stopped");
    Ok(())
}

/// One-shot probe: fetch the latest trade and quote, print them, exit.
async fn probe(client: &AlpacaClient, cfg: &Config) -> eyre::Result<()> {
    info!("fetching latest {} trade from {} feed...", cfg.symbol, cfg.feed);
    let trade = client.latest_trade(&cfg.symbol, cfg.feed).await?;
    println!("=== {} Latest Trade ({} feed) ===", cfg.symbol, cfg.feed);
    println!("Price: ${}", trade.price);
    println!("Size: {} shares", trade.size);
    println!("Timestamp: {}", trade.timestamp);
    println!("Exchange: {}", trade.exchange);

    info!("fetching latest {} quote from {} feed...", cfg.symbol, cfg.feed);
    let quote = client.latest_quote(&cfg.symbol, cfg.feed).await?;
    println!();
    println!("=== {} Latest Quote ({} feed) ===", cfg.symbol, cfg.feed);
    println!("Bid Price: ${}", quote.bid_price);
    println!("Ask Price: ${}", quote.ask_price);
    println!("Bid Size: {}", quote.bid_size);
    println!("Ask Size: {}", quote.ask_size);
    println!("Timestamp: {}", quote.timestamp);
    println!("Spread: ${:.4}", quote.spread());

    Ok(())
}

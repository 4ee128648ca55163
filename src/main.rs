use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::EnvFilter;

use odl_live::config::{Config, LoggingConfig};
use odl_live::connector::{self, shared_state};
use odl_live::correlation::{self, CorrelationContext};
use odl_live::ledger;
use odl_live::market_queue::{shared_queue, SharedQueue};
use odl_live::price;
use odl_live::reporting;
use odl_live::stats::{self, StatsWindow};
use odl_live::venues::{bitso, bitstamp, btcmarkets, bittrex, coinsph, mercado};
use odl_live::wallet_directory;

#[tokio::main]
async fn main() {
    let config_path = env::args().nth(1).unwrap_or_else(|| "setup.toml".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(error) => {
            // Nothing can run without configuration.
            eprintln!("Error loading {config_path}: {error}");
            std::process::exit(1);
        }
    };
    let _log_guard = init_logging(&config.logging);

    println!("Loading exchange wallet data...\n");
    let wallets =
        wallet_directory::resolve_all(&config.bithomp.userinfo, &config.exchange_names).await;
    info!(addresses = wallets.len(), "loaded wallet data");

    let stats = Arc::new(RwLock::new(StatsWindow::restore(
        &config.statsbackup.file_path,
    )));
    let price = price::shared_price();

    let mut queues: HashMap<String, SharedQueue> = HashMap::new();
    for venue in [
        bitstamp::VENUE_NAME,
        bitso::VENUE_NAME,
        coinsph::VENUE_NAME,
        btcmarkets::VENUE_NAME,
        mercado::VENUE_NAME,
        bittrex::VENUE_NAME,
    ] {
        queues.insert(venue.to_string(), shared_queue());
    }

    tokio::spawn(connector::run_streaming(
        bitstamp::Bitstamp::new(&config.bitstamp),
        queues[bitstamp::VENUE_NAME].clone(),
        shared_state(),
    ));
    tokio::spawn(connector::run_streaming(
        bitso::Bitso::new(&config.bitso),
        queues[bitso::VENUE_NAME].clone(),
        shared_state(),
    ));
    tokio::spawn(connector::run_streaming(
        coinsph::CoinsPh::new(&config.coinsph),
        queues[coinsph::VENUE_NAME].clone(),
        shared_state(),
    ));
    tokio::spawn(connector::run_streaming(
        btcmarkets::BtcMarkets::new(&config.btcmarkets),
        queues[btcmarkets::VENUE_NAME].clone(),
        shared_state(),
    ));
    tokio::spawn(connector::run_polling(
        mercado::Mercado::new(&config.mercado),
        queues[mercado::VENUE_NAME].clone(),
        shared_state(),
    ));
    tokio::spawn(connector::run_polling(
        bittrex::Bittrex::new(&config.bittrex),
        queues[bittrex::VENUE_NAME].clone(),
        shared_state(),
    ));
    info!("listeners have been started");

    tokio::spawn(price::run_price_refresh(
        config.bitstamp.price_ticker.clone(),
        price.clone(),
    ));
    tokio::spawn(stats::run_recompute_timer(stats.clone()));

    reporting::print_banner();

    let ctx = Arc::new(CorrelationContext {
        queues,
        wallets: wallets.clone(),
        odl_tags: config.odl_tags.clone(),
        price,
        stats,
    });

    ledger::run_ledger(&config.xrpledger.server, &wallets, move |payment| {
        let ctx = ctx.clone();
        async move {
            correlation::schedule_evaluation(ctx, payment);
        }
    })
    .await;
}

fn init_logging(config: &LoggingConfig) -> tracing_appender::non_blocking::WorkerGuard {
    let appender = tracing_appender::rolling::daily(&config.directory, &config.file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();
    guard
}

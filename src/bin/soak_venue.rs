//! Soak harness: runs a single venue connector against its live endpoint
//! and prints queue depth and connection state, for checking a venue's
//! wire handling in isolation.

use std::env;
use std::time::Duration;

use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

use odl_live::config::Config;
use odl_live::connector::{self, shared_state};
use odl_live::market_queue::shared_queue;
use odl_live::venues::bittrex::Bittrex;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .init();

    let config_path = env::args().nth(1).unwrap_or_else(|| "setup.toml".to_string());
    let config = Config::load(&config_path)?;

    println!("Start the Test Harness...\n");
    let queue = shared_queue();
    let state = shared_state();
    tokio::spawn(connector::run_polling(
        Bittrex::new(&config.bittrex),
        queue.clone(),
        state.clone(),
    ));
    println!("listener has been started...");

    loop {
        sleep(Duration::from_secs(10)).await;
        println!(
            "state: {:?}, queue depth: {}",
            *state.read().await,
            queue.read().await.len()
        );
    }
}

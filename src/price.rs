use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::{debug, warn};

use crate::connector::USER_AGENT;

/// How often the XRP/USD price is re-fetched.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(120);

/// Last known XRP/USD price, replaced atomically on refresh. `None` until
/// the first successful fetch.
pub type SharedPrice = Arc<RwLock<Option<Decimal>>>;

pub fn shared_price() -> SharedPrice {
    Arc::new(RwLock::new(None))
}

/// Bitstamp public ticker document; only `last` matters here.
#[derive(Debug, Deserialize)]
struct Ticker {
    last: Decimal,
}

async fn fetch_price(client: &reqwest::Client, ticker_url: &str) -> Result<Decimal, reqwest::Error> {
    let ticker: Ticker = client
        .get(ticker_url)
        .header("User-Agent", USER_AGENT)
        .send()
        .await?
        .json()
        .await?;
    Ok(ticker.last)
}

/// Keeps the shared price fresh. A failed fetch keeps the previous value;
/// the first tick fires immediately and doubles as the startup fetch.
pub async fn run_price_refresh(ticker_url: String, price: SharedPrice) {
    let client = reqwest::Client::new();
    let mut timer = interval(REFRESH_INTERVAL);
    loop {
        timer.tick().await;
        match fetch_price(&client, &ticker_url).await {
            Ok(last) => {
                debug!(%last, "fetched current XRP/USD price");
                *price.write().await = Some(last);
            }
            Err(error) => {
                warn!(%error, "price fetch failed, keeping previous value");
            }
        }
    }
}

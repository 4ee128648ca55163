use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::config::PollConfig;
use crate::connector::{PollingVenue, VenueError, USER_AGENT};
use crate::shared_types::{unix_now, MarketEvent, Side};

pub const VENUE_NAME: &str = "mercado bitcoin";

/// Each trade poll asks for the last 30s plus a 5s overlap so a slow poll
/// cannot open a gap.
const TRADE_LOOKBACK_SECS: i64 = 35;

#[derive(Debug, Deserialize)]
struct Trade {
    tid: u64,
    date: i64,
    #[serde(rename = "type")]
    kind: String,
    amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct Book {
    bids: Vec<Vec<Decimal>>,
    asks: Vec<Vec<Decimal>>,
}

pub struct Mercado {
    trades_url: String,
    book_url: String,
}

impl Mercado {
    pub fn new(config: &PollConfig) -> Self {
        Self {
            trades_url: config.trades.clone(),
            book_url: config.orderbook.clone(),
        }
    }
}

fn normalize_trades(body: &str) -> Result<Vec<MarketEvent>, VenueError> {
    let trades: Vec<Trade> = serde_json::from_str(body)?;
    Ok(trades
        .into_iter()
        .map(|trade| MarketEvent {
            side: if trade.kind == "buy" {
                Side::Buy
            } else {
                Side::Sell
            },
            quantity: trade.amount.round_dp(4),
            timestamp: trade.date,
            venue_event_id: Some(trade.tid.to_string()),
        })
        .collect())
}

fn normalize_book(body: &str, received_at: i64) -> Result<Vec<MarketEvent>, VenueError> {
    let book: Book = serde_json::from_str(body)?;
    let mut events = Vec::new();
    for (side, levels) in [(Side::Buy, book.bids), (Side::Sell, book.asks)] {
        for level in levels {
            let Some(amount) = level.get(1) else { continue };
            events.push(MarketEvent {
                side,
                quantity: amount.round_dp(4),
                // The book carries no per-level time; use receipt time.
                timestamp: received_at,
                venue_event_id: None,
            });
        }
    }
    Ok(events)
}

#[async_trait]
impl PollingVenue for Mercado {
    fn name(&self) -> &'static str {
        VENUE_NAME
    }

    fn ttl_interval(&self) -> Duration {
        Duration::from_secs(60)
    }

    async fn fetch_trades(&self, client: &reqwest::Client) -> Result<Vec<MarketEvent>, VenueError> {
        let since = unix_now() - TRADE_LOOKBACK_SECS;
        let url = format!("{}{}", self.trades_url, since);
        let body = client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await?
            .text()
            .await?;
        normalize_trades(&body)
    }

    async fn fetch_book(&self, client: &reqwest::Client) -> Result<Vec<MarketEvent>, VenueError> {
        let body = client
            .get(&self.book_url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await?
            .text()
            .await?;
        normalize_book(&body, unix_now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn normalizes_trades_with_venue_ids() {
        let body = r#"[
            {"tid":4453494,"date":1562005008,"type":"sell","price":1.278,"amount":334.31691},
            {"tid":4453495,"date":1562005010,"type":"buy","price":1.279,"amount":100.0}
        ]"#;
        let events = normalize_trades(body).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].side, Side::Sell);
        assert_eq!(events[0].quantity, dec!(334.3169));
        assert_eq!(events[0].timestamp, 1_562_005_008);
        assert_eq!(events[0].venue_event_id.as_deref(), Some("4453494"));
        assert_eq!(events[1].side, Side::Buy);
    }

    #[test]
    fn normalizes_book_levels_with_receipt_time() {
        let body = r#"{"bids":[[1.278,500.12346],[1.277,200]],"asks":[[1.28,750.5]]}"#;
        let events = normalize_book(body, 1_562_005_100).unwrap();

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].side, Side::Buy);
        assert_eq!(events[0].quantity, dec!(500.1235));
        assert_eq!(events[0].timestamp, 1_562_005_100);
        assert_eq!(events[2].side, Side::Sell);
        assert_eq!(events[2].quantity, dec!(750.5));
    }

    #[test]
    fn malformed_bodies_are_an_error() {
        assert!(normalize_trades("<html>rate limited</html>").is_err());
        assert!(normalize_book("[]", 0).is_err());
    }
}

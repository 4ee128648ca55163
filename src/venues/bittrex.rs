use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::config::PollConfig;
use crate::connector::{PollingVenue, VenueError, USER_AGENT};
use crate::shared_types::{unix_now, MarketEvent, Side};

pub const VENUE_NAME: &str = "bittrex";

#[derive(Debug, Deserialize)]
struct TradesResponse {
    result: Vec<Trade>,
}

#[derive(Debug, Deserialize)]
struct Trade {
    #[serde(rename = "OrderType")]
    order_type: String,
    #[serde(rename = "Quantity")]
    quantity: Decimal,
    #[serde(rename = "TimeStamp")]
    timestamp: String,
    #[serde(rename = "Uuid", default)]
    uuid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BookResponse {
    result: Book,
}

#[derive(Debug, Deserialize)]
struct Book {
    buy: Vec<Level>,
    sell: Vec<Level>,
}

#[derive(Debug, Deserialize)]
struct Level {
    #[serde(rename = "Quantity")]
    quantity: Decimal,
}

pub struct Bittrex {
    trades_url: String,
    book_url: String,
}

impl Bittrex {
    pub fn new(config: &PollConfig) -> Self {
        Self {
            trades_url: config.trades.clone(),
            book_url: config.orderbook.clone(),
        }
    }
}

fn parse_timestamp(raw: &str) -> Result<i64, VenueError> {
    // Bittrex reports "2019-07-03T21:10:15.15" style naive UTC times.
    let parsed = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")?;
    Ok(parsed.and_utc().timestamp())
}

fn normalize_trades(body: &str) -> Result<Vec<MarketEvent>, VenueError> {
    let response: TradesResponse = serde_json::from_str(body)?;
    let mut events = Vec::new();
    for trade in response.result {
        events.push(MarketEvent {
            side: if trade.order_type == "BUY" {
                Side::Buy
            } else {
                Side::Sell
            },
            quantity: trade.quantity.round_dp(4),
            timestamp: parse_timestamp(&trade.timestamp)?,
            venue_event_id: trade.uuid,
        });
    }
    Ok(events)
}

fn normalize_book(body: &str, received_at: i64) -> Result<Vec<MarketEvent>, VenueError> {
    let response: BookResponse = serde_json::from_str(body)?;
    let mut events = Vec::new();
    for (side, levels) in [(Side::Buy, response.result.buy), (Side::Sell, response.result.sell)] {
        for level in levels {
            events.push(MarketEvent {
                side,
                quantity: level.quantity.round_dp(4),
                timestamp: received_at,
                venue_event_id: None,
            });
        }
    }
    Ok(events)
}

#[async_trait]
impl PollingVenue for Bittrex {
    fn name(&self) -> &'static str {
        VENUE_NAME
    }

    fn ttl_interval(&self) -> Duration {
        Duration::from_secs(30)
    }

    async fn fetch_trades(&self, client: &reqwest::Client) -> Result<Vec<MarketEvent>, VenueError> {
        let body = client
            .get(&self.trades_url)
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
    fn normalizes_market_history() {
        let body = r#"{"success":true,"message":"","result":[
            {"Id":319435,"TimeStamp":"2019-07-03T21:10:15.15","Quantity":797.09,"Price":0.3,"Total":239.12,"FillType":"FILL","OrderType":"BUY","Uuid":"a5b6c7d8"},
            {"Id":319436,"TimeStamp":"2019-07-03T21:10:16","Quantity":12.5,"Price":0.3,"Total":3.75,"FillType":"FILL","OrderType":"SELL","Uuid":"e9f0a1b2"}
        ]}"#;
        let events = normalize_trades(body).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].side, Side::Buy);
        assert_eq!(events[0].quantity, dec!(797.09));
        assert_eq!(events[0].timestamp, 1_562_188_215);
        assert_eq!(events[0].venue_event_id.as_deref(), Some("a5b6c7d8"));
        assert_eq!(events[1].side, Side::Sell);
    }

    #[test]
    fn normalizes_both_book_sides() {
        let body = r#"{"success":true,"message":"","result":{
            "buy":[{"Quantity":12.37,"Rate":0.3},{"Quantity":100.0,"Rate":0.29}],
            "sell":[{"Quantity":32.55,"Rate":0.31}]
        }}"#;
        let events = normalize_book(body, 1_562_188_300).unwrap();

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].side, Side::Buy);
        assert_eq!(events[0].quantity, dec!(12.37));
        assert_eq!(events[0].timestamp, 1_562_188_300);
        assert_eq!(events[2].side, Side::Sell);
        assert_eq!(events[2].quantity, dec!(32.55));
    }

    #[test]
    fn rejects_unparseable_timestamps() {
        let body = r#"{"success":true,"message":"","result":[
            {"Id":1,"TimeStamp":"not-a-time","Quantity":1.0,"Price":0.3,"Total":0.3,"FillType":"FILL","OrderType":"BUY","Uuid":"x"}
        ]}"#;
        assert!(normalize_trades(body).is_err());
    }
}

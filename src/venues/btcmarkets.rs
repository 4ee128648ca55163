use std::time::Duration;

use chrono::DateTime;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use crate::config::StreamConfig;
use crate::connector::{Inbound, StreamingVenue, VenueError};
use crate::shared_types::{MarketEvent, Side};

pub const VENUE_NAME: &str = "btc markets";

const MARKET_ID: &str = "XRP-AUD";

#[derive(Debug, Deserialize)]
#[serde(tag = "messageType")]
enum Frame {
    #[serde(rename = "trade")]
    Trade {
        side: String,
        volume: Decimal,
        timestamp: String,
    },
    #[serde(rename = "orderbook")]
    Orderbook {
        timestamp: String,
        bids: Vec<Vec<Decimal>>,
        asks: Vec<Vec<Decimal>>,
    },
    #[serde(rename = "heartbeat")]
    Heartbeat,
    #[serde(other)]
    Other,
}

pub struct BtcMarkets {
    server: String,
}

impl BtcMarkets {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            server: config.server.clone(),
        }
    }
}

fn parse_timestamp(raw: &str) -> Result<i64, VenueError> {
    Ok(DateTime::parse_from_rfc3339(raw)?.timestamp())
}

impl StreamingVenue for BtcMarkets {
    fn name(&self) -> &'static str {
        VENUE_NAME
    }

    fn url(&self) -> &str {
        &self.server
    }

    fn subscribe_frames(&self) -> Vec<String> {
        vec![json!({
            "marketIds": [MARKET_ID],
            "channels": ["orderbook", "trade", "heartbeat"],
            "messageType": "subscribe",
        })
        .to_string()]
    }

    fn parse(&self, text: &str, _received_at: i64) -> Result<Inbound, VenueError> {
        match serde_json::from_str::<Frame>(text)? {
            Frame::Trade {
                side,
                volume,
                timestamp,
            } => {
                let side = if side == "Bid" { Side::Buy } else { Side::Sell };
                Ok(Inbound::events(vec![MarketEvent {
                    side,
                    quantity: volume.round_dp(4),
                    timestamp: parse_timestamp(&timestamp)?,
                    venue_event_id: None,
                }]))
            }
            Frame::Orderbook {
                timestamp,
                bids,
                asks,
            } => {
                let timestamp = parse_timestamp(&timestamp)?;
                // Snapshots carry no diffs; sample only 10s-aligned ones to
                // keep the queue bounded.
                if timestamp % 10 != 0 {
                    return Ok(Inbound::default());
                }
                let mut events = Vec::new();
                for (side, levels) in [(Side::Buy, bids), (Side::Sell, asks)] {
                    for level in levels {
                        let Some(volume) = level.get(1) else { continue };
                        events.push(MarketEvent {
                            side,
                            quantity: volume.round_dp(4),
                            timestamp,
                            venue_event_id: None,
                        });
                    }
                }
                Ok(Inbound::events(events))
            }
            Frame::Heartbeat | Frame::Other => Ok(Inbound::default()),
        }
    }

    fn silence_timeout(&self) -> Duration {
        Duration::from_secs(90)
    }

    fn evict_every(&self) -> u32 {
        20
    }
}

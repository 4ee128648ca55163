use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use crate::config::StreamConfig;
use crate::connector::{Inbound, StreamingVenue, VenueError};
use crate::shared_types::{MarketEvent, Side};

pub const VENUE_NAME: &str = "bitso";

const BOOK: &str = "xrp_mxn";

#[derive(Debug, Deserialize)]
struct Frame {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    payload: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TradePayload {
    t: u8,
    a: Decimal,
}

#[derive(Debug, Deserialize)]
struct DiffOrderPayload {
    t: u8,
    /// Cancelled diffs can omit the amount entirely.
    #[serde(default)]
    a: Option<Decimal>,
    d: i64,
    #[serde(default)]
    s: Option<String>,
}

pub struct Bitso {
    server: String,
}

impl Bitso {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            server: config.server.clone(),
        }
    }
}

impl StreamingVenue for Bitso {
    fn name(&self) -> &'static str {
        VENUE_NAME
    }

    fn url(&self) -> &str {
        &self.server
    }

    fn subscribe_frames(&self) -> Vec<String> {
        // Bitso under-reports on either channel alone; take both.
        vec![
            json!({"action": "subscribe", "book": BOOK, "type": "diff-orders"}).to_string(),
            json!({"action": "subscribe", "book": BOOK, "type": "trades"}).to_string(),
        ]
    }

    fn parse(&self, text: &str, received_at: i64) -> Result<Inbound, VenueError> {
        let frame: Frame = serde_json::from_str(text)?;
        let Some(first) = frame.payload.first() else {
            // Keep-alives ("ka") and subscription acks carry no payload.
            return Ok(Inbound::default());
        };

        match frame.kind.as_deref() {
            Some("trades") => {
                let trade: TradePayload = serde_json::from_value(first.clone())?;
                let side = if trade.t == 0 { Side::Buy } else { Side::Sell };
                Ok(Inbound::events(vec![MarketEvent {
                    side,
                    quantity: trade.a.round_dp(4),
                    // The trade stream carries no timestamp; use receipt time.
                    timestamp: received_at,
                    venue_event_id: None,
                }]))
            }
            Some("diff-orders") => {
                let Ok(diff) = serde_json::from_value::<DiffOrderPayload>(first.clone()) else {
                    return Ok(Inbound::default());
                };
                if diff.s.as_deref() == Some("cancelled") {
                    return Ok(Inbound::default());
                }
                let Some(amount) = diff.a else {
                    return Ok(Inbound::default());
                };
                let side = if diff.t == 0 { Side::Buy } else { Side::Sell };
                Ok(Inbound::events(vec![MarketEvent {
                    side,
                    quantity: amount.round_dp(4),
                    // Diff-order timestamps arrive in milliseconds.
                    timestamp: diff.d / 1000,
                    venue_event_id: None,
                }]))
            }
            _ => Ok(Inbound::default()),
        }
    }

    fn silence_timeout(&self) -> Duration {
        Duration::from_secs(90)
    }

    fn evict_every(&self) -> u32 {
        25
    }
}

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use crate::config::BitstampConfig;
use crate::connector::{Inbound, StreamingVenue, VenueError};
use crate::shared_types::{MarketEvent, Side};

pub const VENUE_NAME: &str = "bitstamp";

/// Bitstamp subscribes to both the live-order and live-trade channels;
/// either alone under-reports liquidity events.
const TRADES_CHANNEL: &str = "live_trades_xrpusd";
const ORDERS_CHANNEL: &str = "live_orders_xrpusd";

#[derive(Debug, Deserialize)]
struct Frame {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct TradeData {
    #[serde(rename = "type")]
    kind: u8,
    amount: Decimal,
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct OrderData {
    order_type: u8,
    amount: Decimal,
    datetime: String,
}

pub struct Bitstamp {
    server: String,
}

impl Bitstamp {
    pub fn new(config: &BitstampConfig) -> Self {
        Self {
            server: config.server.clone(),
        }
    }
}

impl StreamingVenue for Bitstamp {
    fn name(&self) -> &'static str {
        VENUE_NAME
    }

    fn url(&self) -> &str {
        &self.server
    }

    fn subscribe_frames(&self) -> Vec<String> {
        vec![
            json!({"event": "bts:subscribe", "data": {"channel": ORDERS_CHANNEL}}).to_string(),
            json!({"event": "bts:subscribe", "data": {"channel": TRADES_CHANNEL}}).to_string(),
        ]
    }

    fn parse(&self, text: &str, received_at: i64) -> Result<Inbound, VenueError> {
        let frame: Frame = serde_json::from_str(text)?;

        if frame.event.as_deref() == Some("bts:request_reconnect") {
            return Ok(Inbound {
                events: Vec::new(),
                reconnect_requested: true,
            });
        }

        // Subscription acks arrive with an empty data object.
        let has_data = frame
            .data
            .as_object()
            .map_or(false, |data| !data.is_empty());
        if !has_data {
            return Ok(Inbound::default());
        }

        match frame.channel.as_deref() {
            Some(TRADES_CHANNEL) => {
                let trade: TradeData = serde_json::from_value(frame.data)?;
                let side = if trade.kind == 0 { Side::Buy } else { Side::Sell };
                Ok(Inbound::events(vec![MarketEvent {
                    side,
                    quantity: trade.amount.round_dp(4),
                    timestamp: trade.timestamp.parse().unwrap_or(received_at),
                    venue_event_id: None,
                }]))
            }
            Some(ORDERS_CHANNEL) => {
                match frame.event.as_deref() {
                    Some("order_created") | Some("order_changed") => {}
                    _ => return Ok(Inbound::default()),
                }
                let order: OrderData = serde_json::from_value(frame.data)?;
                let side = if order.order_type == 0 {
                    Side::Buy
                } else {
                    Side::Sell
                };
                Ok(Inbound::events(vec![MarketEvent {
                    side,
                    quantity: order.amount.round_dp(4),
                    timestamp: order.datetime.parse().unwrap_or(received_at),
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
        100
    }
}

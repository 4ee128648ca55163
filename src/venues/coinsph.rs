use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use crate::config::StreamConfig;
use crate::connector::{Inbound, StreamingVenue, VenueError};
use crate::shared_types::{MarketEvent, Side};

pub const VENUE_NAME: &str = "coins.ph";

/// AlphaPoint instrument ids on coins.ph: XRP/PHP and XRP/THB.
const INSTRUMENT_XRP_PHP: u32 = 8;
const INSTRUMENT_XRP_THB: u32 = 3;

/// AlphaPoint message frame. `o` is a JSON document encoded as a string.
#[derive(Debug, Deserialize)]
struct Frame {
    m: u8,
    #[serde(default)]
    #[allow(dead_code)]
    i: u64,
    n: String,
    o: String,
}

pub struct CoinsPh {
    server: String,
}

impl CoinsPh {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            server: config.server.clone(),
        }
    }

    fn subscribe_frame(instrument: u32, include_last: u32) -> String {
        let payload = json!({
            "OMSId": 1,
            "InstrumentId": instrument,
            "IncludeLastCount": include_last,
        });
        json!({"m": 0, "i": 0, "n": "SubscribeTrades", "o": payload.to_string()}).to_string()
    }
}

impl StreamingVenue for CoinsPh {
    fn name(&self) -> &'static str {
        VENUE_NAME
    }

    fn url(&self) -> &str {
        &self.server
    }

    fn subscribe_frames(&self) -> Vec<String> {
        vec![
            Self::subscribe_frame(INSTRUMENT_XRP_PHP, 1),
            Self::subscribe_frame(INSTRUMENT_XRP_THB, 0),
        ]
    }

    fn parse(&self, text: &str, _received_at: i64) -> Result<Inbound, VenueError> {
        let frame: Frame = serde_json::from_str(text)?;
        if frame.m != 3 || frame.n != "TradeDataUpdateEvent" {
            return Ok(Inbound::default());
        }

        // Rows are positional: [id, instrument, quantity, price, time-ms, .., side]
        let rows: Vec<Vec<serde_json::Value>> = serde_json::from_str(&frame.o)?;
        let Some(row) = rows.first() else {
            return Ok(Inbound::default());
        };
        let (Some(quantity), Some(time_ms), Some(direction)) =
            (row.get(2), row.get(4), row.get(6))
        else {
            return Ok(Inbound::default());
        };

        let quantity: Decimal = serde_json::from_value(quantity.clone())?;
        let timestamp = time_ms.as_i64().unwrap_or_default() / 1000;
        let side = if direction.as_i64() == Some(0) {
            Side::Buy
        } else {
            Side::Sell
        };

        Ok(Inbound::events(vec![MarketEvent {
            side,
            quantity: quantity.round_dp(4),
            timestamp,
            venue_event_id: None,
        }]))
    }

    fn silence_timeout(&self) -> Duration {
        // Low-traffic venue, give it longer before declaring it dead.
        Duration::from_secs(300)
    }

    fn evict_every(&self) -> u32 {
        10
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn venue() -> CoinsPh {
        CoinsPh {
            server: "wss://api-cx.coins.ph/WSGateway/".to_string(),
        }
    }

    #[test]
    fn normalizes_trade_update_rows() {
        let frame = r#"{"m":3,"i":4,"n":"TradeDataUpdateEvent","o":"[[194,8,\"1500.7777\",\"5.01\",1562005008685,1,0,0,1]]"}"#;
        let inbound = venue().parse(frame, 0).unwrap();

        assert_eq!(inbound.events.len(), 1);
        assert_eq!(inbound.events[0].side, Side::Buy);
        assert_eq!(inbound.events[0].quantity, dec!(1500.7777));
        assert_eq!(inbound.events[0].timestamp, 1_562_005_008);
    }

    #[test]
    fn sell_direction_maps_to_sell() {
        let frame = r#"{"m":3,"i":4,"n":"TradeDataUpdateEvent","o":"[[195,3,250.5,5.02,1562005009000,1,1,0,1]]"}"#;
        let inbound = venue().parse(frame, 0).unwrap();
        assert_eq!(inbound.events[0].side, Side::Sell);
    }

    #[test]
    fn ignores_other_gateway_frames() {
        let ack = r#"{"m":1,"i":0,"n":"SubscribeTrades","o":"[]"}"#;
        assert!(venue().parse(ack, 0).unwrap().events.is_empty());

        let empty = r#"{"m":3,"i":4,"n":"TradeDataUpdateEvent","o":"[]"}"#;
        assert!(venue().parse(empty, 0).unwrap().events.is_empty());
    }

    #[test]
    fn subscribes_to_both_instruments() {
        let frames = venue().subscribe_frames();
        assert_eq!(frames.len(), 2);
        assert!(frames[0].contains("SubscribeTrades"));
        assert!(frames[0].contains("\\\"InstrumentId\\\":8"));
        assert!(frames[1].contains("\\\"InstrumentId\\\":3"));
    }
}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which side of the market an observed venue event sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

/// One normalized trade or order event from a venue. Quantities are always
/// XRP rounded to 4 decimal places, timestamps are epoch seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketEvent {
    pub side: Side,
    pub quantity: Decimal,
    pub timestamp: i64,
    /// Venue-assigned id, used for de-duplication on polled venues.
    pub venue_event_id: Option<String>,
}

/// A ledger payment that passed the qualification filter: successful,
/// native-XRP, and between two addresses the wallet directory recognizes.
#[derive(Debug, Clone, PartialEq)]
pub struct QualifyingPayment {
    pub source_address: String,
    pub destination_address: String,
    pub destination_tag: Option<u32>,
    pub amount: Decimal,
    pub ledger_timestamp: i64,
}

/// An emitted ODL detection. The field names match the persisted stats
/// snapshot format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OdlDetection {
    pub xrp: Decimal,
    pub usd: Decimal,
    pub time: i64,
}

/// Rolling 24-hour aggregates recomputed by the stats window.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StatsTotals {
    pub count: usize,
    pub xrp: Decimal,
    pub usd: Decimal,
}

/// Lifecycle of one venue connection. `Closed -> Connecting` is the only
/// path back to `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Open,
    Degraded,
    Closed,
}

pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

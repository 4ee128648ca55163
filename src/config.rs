use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("unable to parse configuration file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Everything from `setup.toml`. Loaded once at startup; a load failure is
/// fatal for the process.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub xrpledger: LedgerConfig,
    pub bithomp: BithompConfig,
    pub bitstamp: BitstampConfig,
    pub bitso: StreamConfig,
    pub coinsph: StreamConfig,
    pub btcmarkets: StreamConfig,
    pub mercado: PollConfig,
    pub bittrex: PollConfig,
    /// Lowercased exchange names accepted from the wallet directory.
    pub exchange_names: Vec<String>,
    /// Destination tags known to belong to ODL flows, per exchange.
    pub odl_tags: Vec<OdlTag>,
    pub logging: LoggingConfig,
    pub statsbackup: StatsBackupConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    pub server: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BithompConfig {
    pub userinfo: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BitstampConfig {
    pub server: String,
    pub price_ticker: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    pub server: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    pub server: String,
    pub trades: String,
    pub orderbook: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OdlTag {
    pub tag: u32,
    pub exchange: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub directory: String,
    pub file_name: String,
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsBackupConfig {
    pub file_path: String,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        exchange_names = ["bitso", "bitstamp", "coins.ph", "btc markets", "mercado bitcoin", "bittrex"]

        [[odl_tags]]
        tag = 12345
        exchange = "bitso"

        [[odl_tags]]
        tag = 67890
        exchange = "coins.ph"

        [xrpledger]
        server = "wss://s1.ripple.com:443"

        [bithomp]
        userinfo = "https://bithomp.com/api/v1/userinfo"

        [bitstamp]
        server = "wss://ws.bitstamp.net"
        price_ticker = "https://www.bitstamp.net/api/v2/ticker/xrpusd/"

        [bitso]
        server = "wss://ws.bitso.com"

        [coinsph]
        server = "wss://api-cx.coins.ph/WSGateway/"

        [btcmarkets]
        server = "wss://socket.btcmarkets.net/v2"

        [mercado]
        server = "https://www.mercadobitcoin.net"
        trades = "https://www.mercadobitcoin.net/api/XRP/trades/"
        orderbook = "https://www.mercadobitcoin.net/api/XRP/orderbook/"

        [bittrex]
        server = "https://api.bittrex.com"
        trades = "https://api.bittrex.com/api/v1.1/public/getmarkethistory?market=USD-XRP"
        orderbook = "https://api.bittrex.com/api/v1.1/public/getorderbook?market=USD-XRP&type=both"

        [logging]
        directory = "logs"
        file_name = "odl-live.log"
        level = "info"

        [statsbackup]
        file_path = "stats-backup.json"
    "#;

    #[test]
    fn parses_full_config() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.exchange_names.len(), 6);
        assert_eq!(
            config.odl_tags[0],
            OdlTag {
                tag: 12345,
                exchange: "bitso".to_string()
            }
        );
        assert_eq!(config.bitso.server, "wss://ws.bitso.com");
        assert!(config.bittrex.trades.contains("getmarkethistory"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn rejects_malformed_config() {
        assert!(toml::from_str::<Config>("exchange_names = 7").is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(Config::load("/nonexistent/setup.toml").is_err());
    }
}

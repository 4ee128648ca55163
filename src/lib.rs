pub mod config;
pub mod connector;
pub mod correlation;
pub mod ledger;
pub mod market_queue;
pub mod price;
pub mod reporting;
pub mod shared_types;
pub mod stats;
pub mod venues;
pub mod wallet_directory;

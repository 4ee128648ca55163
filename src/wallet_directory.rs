use std::collections::HashMap;

use serde::Deserialize;
use tracing::{info, warn};

use crate::connector::USER_AGENT;

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    usersinfo: Vec<UserInfo>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    address: String,
    name: String,
}

/// Fetches the address directory once and filters it to the configured
/// exchange names (lowercased). A failed fetch degrades to an empty map:
/// without address resolution no payment can qualify, but the process
/// keeps running.
pub async fn resolve_all(
    userinfo_url: &str,
    exchange_names: &[String],
) -> HashMap<String, String> {
    match fetch_directory(userinfo_url, exchange_names).await {
        Ok(wallets) => {
            info!(addresses = wallets.len(), "resolved exchange wallet addresses");
            wallets
        }
        Err(error) => {
            warn!(%error, "unable to gather wallet addresses, try again later");
            HashMap::new()
        }
    }
}

async fn fetch_directory(
    userinfo_url: &str,
    exchange_names: &[String],
) -> Result<HashMap<String, String>, reqwest::Error> {
    let response: UserInfoResponse = reqwest::Client::new()
        .get(userinfo_url)
        .header("User-Agent", USER_AGENT)
        .send()
        .await?
        .json()
        .await?;

    Ok(filter_directory(response.usersinfo, exchange_names))
}

fn filter_directory(
    entries: Vec<UserInfo>,
    exchange_names: &[String],
) -> HashMap<String, String> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let name = entry.name.to_lowercase();
            exchange_names
                .contains(&name)
                .then_some((entry.address, name))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_allow_listed_exchanges() {
        let entries = vec![
            UserInfo {
                address: "rBitstampHot".to_string(),
                name: "Bitstamp".to_string(),
            },
            UserInfo {
                address: "rBitsoHot".to_string(),
                name: "bitso".to_string(),
            },
            UserInfo {
                address: "rSomebody".to_string(),
                name: "Random Whale".to_string(),
            },
        ];
        let names = vec!["bitstamp".to_string(), "bitso".to_string()];

        let wallets = filter_directory(entries, &names);

        assert_eq!(wallets.len(), 2);
        assert_eq!(wallets["rBitstampHot"], "bitstamp");
        assert_eq!(wallets["rBitsoHot"], "bitso");
        assert!(!wallets.contains_key("rSomebody"));
    }
}

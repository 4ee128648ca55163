use std::collections::HashMap;
use std::future::Future;

use futures::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::connector::RECONNECT_DELAY;
use crate::shared_types::QualifyingPayment;

/// Seconds between the Ripple epoch (2000-01-01) and the Unix epoch.
pub const RIPPLE_EPOCH_OFFSET: i64 = 946_684_800;

const DROPS_PER_XRP: i64 = 1_000_000;

#[derive(Debug, Deserialize)]
pub struct LedgerMessage {
    #[serde(default)]
    transaction: Option<Transaction>,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct Transaction {
    #[serde(rename = "TransactionType")]
    transaction_type: String,
    #[serde(rename = "Account")]
    account: String,
    #[serde(rename = "Destination", default)]
    destination: Option<String>,
    /// A string holds an XRP amount in drops; issued currencies arrive as
    /// an object and are not qualifying.
    #[serde(rename = "Amount", default)]
    amount: Option<serde_json::Value>,
    #[serde(rename = "DestinationTag", default)]
    destination_tag: Option<u32>,
    #[serde(rename = "date", default)]
    date: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    #[serde(rename = "TransactionResult")]
    transaction_result: String,
}

/// Filters a raw ledger notification down to a qualifying payment:
/// successful, native XRP, and between two directory-known wallets.
pub fn qualify(
    message: &LedgerMessage,
    wallets: &HashMap<String, String>,
) -> Option<QualifyingPayment> {
    let transaction = message.transaction.as_ref()?;
    let meta = message.meta.as_ref()?;

    if transaction.transaction_type != "Payment" || meta.transaction_result != "tesSUCCESS" {
        return None;
    }
    let destination = transaction.destination.as_deref()?;
    if !wallets.contains_key(&transaction.account) || !wallets.contains_key(destination) {
        return None;
    }
    let drops: i64 = match transaction.amount.as_ref()? {
        serde_json::Value::String(raw) => raw.parse().ok()?,
        _ => return None,
    };
    let amount = (Decimal::from(drops) / Decimal::from(DROPS_PER_XRP)).round_dp(4);
    let ledger_timestamp = transaction.date? + RIPPLE_EPOCH_OFFSET;

    Some(QualifyingPayment {
        source_address: transaction.account.clone(),
        destination_address: destination.to_string(),
        destination_tag: transaction.destination_tag,
        amount,
        ledger_timestamp,
    })
}

/// Subscribes to the ledger feed for the directory's addresses and invokes
/// the callback once per qualifying payment. Runs until process
/// termination, reconnecting on failure.
pub async fn run_ledger<F, Fut>(server: &str, wallets: &HashMap<String, String>, callback: F)
where
    F: Fn(QualifyingPayment) -> Fut,
    Fut: Future<Output = ()>,
{
    info!(url = server, "ledger client connecting");
    loop {
        match ledger_session(server, wallets, &callback).await {
            Ok(()) => info!("ledger session ended"),
            Err(error) => warn!(%error, "ledger connection failure"),
        }
        info!(
            "ledger connection closed, restarting in {} seconds",
            RECONNECT_DELAY.as_secs()
        );
        sleep(RECONNECT_DELAY).await;
    }
}

async fn ledger_session<F, Fut>(
    server: &str,
    wallets: &HashMap<String, String>,
    callback: &F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: Fn(QualifyingPayment) -> Fut,
    Fut: Future<Output = ()>,
{
    let url = Url::parse(server)?;
    let (ws_stream, _) = connect_async(url).await?;
    let (mut write, mut read) = ws_stream.split();

    let accounts: Vec<&String> = wallets.keys().collect();
    info!(accounts = accounts.len(), "subscribing to ledger accounts");
    let subscribe = json!({"command": "subscribe", "accounts": accounts});
    write.send(Message::Text(subscribe.to_string())).await?;

    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => {
                let message: LedgerMessage = match serde_json::from_str(&text) {
                    Ok(message) => message,
                    Err(error) => {
                        debug!(%error, "skipping unparseable ledger frame");
                        continue;
                    }
                };
                if let Some(payment) = qualify(&message, wallets) {
                    callback(payment).await;
                }
            }
            Some(Ok(Message::Ping(payload))) => {
                let _ = write.send(Message::Pong(payload)).await;
            }
            Some(Ok(Message::Close(_))) | None => return Err("connection closed by server".into()),
            Some(Err(error)) => return Err(Box::new(error)),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn wallets() -> HashMap<String, String> {
        HashMap::from([
            ("rSourceAddr".to_string(), "bitstamp".to_string()),
            ("rDestAddr".to_string(), "bitso".to_string()),
        ])
    }

    fn payment_frame(amount: &str) -> String {
        format!(
            r#"{{
                "type": "transaction",
                "validated": true,
                "transaction": {{
                    "TransactionType": "Payment",
                    "Account": "rSourceAddr",
                    "Destination": "rDestAddr",
                    "Amount": {amount},
                    "DestinationTag": 12345,
                    "date": 624489221
                }},
                "meta": {{"TransactionResult": "tesSUCCESS"}}
            }}"#
        )
    }

    #[test]
    fn qualifies_successful_native_payments() {
        let message: LedgerMessage =
            serde_json::from_str(&payment_frame("\"1234567\"")).unwrap();
        let payment = qualify(&message, &wallets()).unwrap();

        assert_eq!(payment.amount, dec!(1.2346));
        assert_eq!(payment.ledger_timestamp, 624_489_221 + RIPPLE_EPOCH_OFFSET);
        assert_eq!(payment.destination_tag, Some(12345));
        assert_eq!(payment.source_address, "rSourceAddr");
        assert_eq!(payment.destination_address, "rDestAddr");
    }

    #[test]
    fn rejects_issued_currency_amounts() {
        let frame =
            payment_frame(r#"{"currency":"USD","issuer":"rIssuer","value":"100"}"#);
        let message: LedgerMessage = serde_json::from_str(&frame).unwrap();
        assert!(qualify(&message, &wallets()).is_none());
    }

    #[test]
    fn rejects_failed_transactions() {
        let frame = payment_frame("\"1234567\"")
            .replace("tesSUCCESS", "tecPATH_DRY");
        let message: LedgerMessage = serde_json::from_str(&frame).unwrap();
        assert!(qualify(&message, &wallets()).is_none());
    }

    #[test]
    fn rejects_non_payment_transactions() {
        let frame = payment_frame("\"1234567\"").replace("Payment", "OfferCreate");
        let message: LedgerMessage = serde_json::from_str(&frame).unwrap();
        assert!(qualify(&message, &wallets()).is_none());
    }

    #[test]
    fn rejects_unknown_addresses() {
        let frame = payment_frame("\"1234567\"").replace("rDestAddr", "rStranger");
        let message: LedgerMessage = serde_json::from_str(&frame).unwrap();
        assert!(qualify(&message, &wallets()).is_none());
    }
}

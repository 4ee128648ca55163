use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::OdlTag;
use crate::market_queue::SharedQueue;
use crate::price::SharedPrice;
use crate::reporting;
use crate::shared_types::{unix_now, MarketEvent, OdlDetection, QualifyingPayment, Side};
use crate::stats::SharedStats;

/// How long to wait after a qualifying payment before correlating, giving
/// the destination-side sell time to complete.
pub const SETTLEMENT_DELAY: Duration = Duration::from_secs(90);

/// Any single corroborating signal is enough to report.
pub const DETECTION_THRESHOLD: u32 = 30;

/// A match must cover at least 90% of the payment amount.
const MATCH_TOLERANCE: Decimal = dec!(0.90);

/// Per-venue time tolerance absorbing that venue's reporting skew.
pub fn drift_for(venue: &str) -> i64 {
    match venue {
        "bitso" => 10,
        "mercado bitcoin" | "bittrex" => 35,
        _ => 2,
    }
}

/// Buy-side candidates: anything reported up to `drift` past the ledger
/// close. The queue's 120s TTL bounds the other side of the window.
pub fn buy_window(events: &[MarketEvent], tx_time: i64, drift: i64) -> Vec<MarketEvent> {
    events
        .iter()
        .filter(|event| event.timestamp <= tx_time + drift)
        .cloned()
        .collect()
}

/// Sell-side candidates: anything from `drift` before the ledger close
/// onward.
pub fn sell_window(events: &[MarketEvent], tx_time: i64, drift: i64) -> Vec<MarketEvent> {
    events
        .iter()
        .filter(|event| event.timestamp >= tx_time - drift)
        .cloned()
        .collect()
}

/// The event whose quantity is nearest the target. On a distance tie the
/// later event wins.
pub fn closest_event(events: &[MarketEvent], target: Decimal) -> Option<&MarketEvent> {
    let mut best: Option<(&MarketEvent, Decimal)> = None;
    for event in events {
        let distance = (event.quantity - target).abs();
        match best {
            Some((_, best_distance)) if distance > best_distance => {}
            _ => best = Some((event, distance)),
        }
    }
    best.map(|(event, _)| event)
}

/// Whether this destination tag is a known ODL tag for the destination
/// exchange.
pub fn is_odl_destination(tag: Option<u32>, dest: &str, odl_tags: &[OdlTag]) -> bool {
    let Some(tag) = tag else { return false };
    odl_tags
        .iter()
        .any(|known| known.tag == tag && known.exchange == dest)
}

/// Scores a payment against the source venue's buys and the destination
/// venue's sells. Each of the three signals contributes exactly 30.
pub fn score_payment(
    payment: &QualifyingPayment,
    source: &str,
    dest: &str,
    source_buys: &[MarketEvent],
    dest_sells: &[MarketEvent],
    odl_tags: &[OdlTag],
) -> u32 {
    let mut score = 0;

    if is_odl_destination(payment.destination_tag, dest, odl_tags) {
        score += 30;
    }

    let buys = buy_window(source_buys, payment.ledger_timestamp, drift_for(source));
    if let Some(buy) = closest_event(&buys, payment.amount) {
        if buy.quantity >= payment.amount
            && !buy.quantity.is_zero()
            && payment.amount / buy.quantity >= MATCH_TOLERANCE
        {
            score += 30;
        }
    }

    let sells = sell_window(dest_sells, payment.ledger_timestamp, drift_for(dest));
    if let Some(sell) = closest_event(&sells, payment.amount) {
        if sell.quantity <= payment.amount
            && !payment.amount.is_zero()
            && sell.quantity / payment.amount >= MATCH_TOLERANCE
        {
            score += 30;
        }
    }

    score
}

/// Everything a deferred evaluation needs, shared across in-flight
/// payments.
pub struct CorrelationContext {
    /// Venue queues keyed by the names the wallet directory resolves to.
    pub queues: HashMap<String, SharedQueue>,
    pub wallets: HashMap<String, String>,
    pub odl_tags: Vec<OdlTag>,
    pub price: SharedPrice,
    pub stats: SharedStats,
}

/// Defers evaluation by the settlement delay without blocking ingestion.
/// Each payment runs independently; evaluations are never cancelled.
pub fn schedule_evaluation(ctx: Arc<CorrelationContext>, payment: QualifyingPayment) {
    debug!(
        amount = %payment.amount,
        "payment observed, deferring evaluation for {} seconds",
        SETTLEMENT_DELAY.as_secs()
    );
    tokio::spawn(async move {
        sleep(SETTLEMENT_DELAY).await;
        evaluate(&ctx, payment).await;
    });
}

pub async fn evaluate(ctx: &CorrelationContext, payment: QualifyingPayment) {
    let Some(source) = ctx.wallets.get(&payment.source_address) else {
        return;
    };
    let Some(dest) = ctx.wallets.get(&payment.destination_address) else {
        return;
    };

    // Snapshot one queue at a time; the windows tolerate the skew.
    let source_buys = match ctx.queues.get(source) {
        Some(queue) => queue.read().await.side_events(Side::Buy),
        None => Vec::new(),
    };
    let dest_sells = match ctx.queues.get(dest) {
        Some(queue) => queue.read().await.side_events(Side::Sell),
        None => Vec::new(),
    };

    let score = score_payment(
        &payment,
        source,
        dest,
        &source_buys,
        &dest_sells,
        &ctx.odl_tags,
    );
    info!(%source, %dest, amount = %payment.amount, score, "payment evaluated");

    if score < DETECTION_THRESHOLD {
        return;
    }

    let usd = match *ctx.price.read().await {
        Some(last) => (last.round_dp(4) * payment.amount).round_dp(2),
        None => {
            warn!("no XRP/USD price available yet, valuing detection at zero");
            Decimal::ZERO
        }
    };
    let detection = OdlDetection {
        xrp: payment.amount,
        usd,
        time: unix_now(),
    };

    let totals = {
        let mut stats = ctx.stats.write().await;
        stats.record(detection.clone());
        stats.recompute(unix_now())
    };
    reporting::print_detection(&detection, source, dest, &totals);
}

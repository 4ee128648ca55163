use chrono::Utc;

use crate::shared_types::{OdlDetection, StatsTotals};

const SEPARATOR_WIDTH: usize = 80;

pub fn print_banner() {
    println!("\n🤖 - Watching transactions for signs of On Demand Liquidity...\n");
    println!("🤖 - This may take time, please be patient... 💤💤💤");
    println!("{}", "-".repeat(SEPARATOR_WIDTH));
}

/// One status block per detection, with the running 24h aggregates.
pub fn print_detection(detection: &OdlDetection, source: &str, dest: &str, totals: &StatsTotals) {
    println!(
        "💰 - Transferred {} XRP, USD Value: {}",
        detection.xrp, detection.usd
    );
    println!(
        "📬 - Transfer from {} to {} at {}",
        source,
        dest,
        Utc::now().to_rfc2822()
    );
    println!(
        "🚀 - In 24 Hours we've seen {} ODL's! Thats {} XRP and {} USD transferred.",
        totals.count, totals.xrp, totals.usd
    );
    println!("{}", "-".repeat(SEPARATOR_WIDTH));
}

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::{info, warn};

use crate::shared_types::{unix_now, OdlDetection, StatsTotals};

/// Width of the rolling window, in seconds.
pub const WINDOW_SECS: i64 = 86_400;

/// Cadence of the standalone recompute pass; keeps the window accurate
/// even with no new detections.
pub const RECOMPUTE_INTERVAL: Duration = Duration::from_secs(300);

/// The rolling 24-hour detection window. The in-memory set is
/// authoritative; the snapshot file is best-effort backup.
#[derive(Debug)]
pub struct StatsWindow {
    detections: Vec<OdlDetection>,
    backup_path: PathBuf,
}

pub type SharedStats = Arc<RwLock<StatsWindow>>;

impl StatsWindow {
    pub fn new(backup_path: impl Into<PathBuf>) -> Self {
        Self {
            detections: Vec::new(),
            backup_path: backup_path.into(),
        }
    }

    /// Starts from the last persisted snapshot when one exists; a missing
    /// or unreadable snapshot is not an error.
    pub fn restore(backup_path: impl Into<PathBuf>) -> Self {
        let mut window = Self::new(backup_path);
        info!(path = %window.backup_path.display(), "attempting recovery of stats data");
        match load_snapshot(&window.backup_path) {
            Ok(detections) => {
                info!(count = detections.len(), "recovered stats data from backup");
                window.detections = detections;
            }
            Err(error) => {
                warn!(%error, "unable to load stats backup, starting empty");
            }
        }
        window
    }

    pub fn record(&mut self, detection: OdlDetection) {
        self.detections.push(detection);
    }

    /// Evicts anything older than 24 hours, recomputes the aggregates, and
    /// rewrites the backup snapshot.
    pub fn recompute(&mut self, now: i64) -> StatsTotals {
        let day_old = now - WINDOW_SECS;
        self.detections.retain(|detection| detection.time > day_old);

        let totals = StatsTotals {
            count: self.detections.len(),
            xrp: self
                .detections
                .iter()
                .map(|detection| detection.xrp)
                .sum::<rust_decimal::Decimal>()
                .round_dp(4),
            usd: self
                .detections
                .iter()
                .map(|detection| detection.usd)
                .sum::<rust_decimal::Decimal>()
                .round_dp(2),
        };
        info!(
            count = totals.count,
            xrp = %totals.xrp,
            usd = %totals.usd,
            "recomputed 24h statistics"
        );

        if let Err(error) = self.persist() {
            warn!(%error, "encountered error in backup of stats data");
        } else {
            info!(path = %self.backup_path.display(), "backup of stats data completed");
        }
        totals
    }

    fn persist(&self) -> anyhow::Result<()> {
        let snapshot = serde_json::to_string_pretty(&self.detections)?;
        fs::write(&self.backup_path, snapshot)?;
        Ok(())
    }

    pub fn detections(&self) -> &[OdlDetection] {
        &self.detections
    }
}

fn load_snapshot(path: &Path) -> anyhow::Result<Vec<OdlDetection>> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Standalone cleanup pass, independent of detection traffic.
pub async fn run_recompute_timer(stats: SharedStats) {
    let mut timer = interval(RECOMPUTE_INTERVAL);
    timer.tick().await; // first tick is immediate; the window just restored
    loop {
        timer.tick().await;
        info!("running stats cleanup/generator");
        stats.write().await.recompute(unix_now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn detection(xrp: rust_decimal::Decimal, usd: rust_decimal::Decimal, time: i64) -> OdlDetection {
        OdlDetection { xrp, usd, time }
    }

    #[test]
    fn window_keeps_only_last_24_hours() {
        let now = 1_600_000_000;
        let dir = tempfile::tempdir().unwrap();
        let mut window = StatsWindow::new(dir.path().join("stats.json"));

        window.record(detection(dec!(100), dec!(30), now - 25 * 3600));
        window.record(detection(dec!(200.5), dec!(60.25), now - 23 * 3600));
        window.record(detection(dec!(300), dec!(90.1), now - 3600));

        let totals = window.recompute(now);

        assert_eq!(totals.count, 2);
        assert_eq!(totals.xrp, dec!(500.5));
        assert_eq!(totals.usd, dec!(150.35));
        assert_eq!(window.detections().len(), 2);
    }

    #[test]
    fn snapshot_round_trips_across_restart() {
        let now = 1_600_000_000;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");

        let mut window = StatsWindow::new(&path);
        window.record(detection(dec!(1000), dec!(302.1), now - 60));
        window.record(detection(dec!(42.4242), dec!(12.81), now - 30));
        window.recompute(now);

        let restored = StatsWindow::restore(&path);
        assert_eq!(restored.detections(), window.detections());
    }

    #[test]
    fn missing_backup_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let window = StatsWindow::restore(dir.path().join("absent.json"));
        assert!(window.detections().is_empty());
    }

    #[test]
    fn corrupt_backup_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        fs::write(&path, "not json at all").unwrap();

        let window = StatsWindow::restore(&path);
        assert!(window.detections().is_empty());
    }

    #[test]
    fn recompute_is_stable_without_traffic() {
        let now = 1_600_000_000;
        let dir = tempfile::tempdir().unwrap();
        let mut window = StatsWindow::new(dir.path().join("stats.json"));
        window.record(detection(dec!(10), dec!(3), now - 100));

        let first = window.recompute(now);
        let second = window.recompute(now);
        assert_eq!(first, second);
    }
}

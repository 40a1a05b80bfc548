//! Continuous telemetry feed: simulator -> store at a fixed interval.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::generator::{SimulatedTick, TelemetrySimulator};
use crate::storage::{StorageError, TelemetryStore};

/// Counters reported when the feed stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub ticks: u64,
    pub rows_written: u64,
    pub faults_emitted: u64,
    pub rows_pruned: u64,
}

/// Owns one simulator and advances it once per interval, writing each tick's
/// rows in a single transaction.
///
/// Built with [`new()`](LiveFeed::new), then consumed by [`run()`](LiveFeed::run).
pub struct LiveFeed {
    store: TelemetryStore,
    simulator: TelemetrySimulator,
    interval: Duration,
    /// Rows kept after each tick; 0 keeps everything
    retention: usize,
    stats: FeedStats,
}

impl LiveFeed {
    pub fn new(
        store: TelemetryStore,
        simulator: TelemetrySimulator,
        interval: Duration,
        retention: usize,
    ) -> Self {
        Self {
            store,
            simulator,
            interval,
            retention,
            stats: FeedStats::default(),
        }
    }

    pub fn stats(&self) -> FeedStats {
        self.stats
    }

    /// Simulated seconds per tick, never less than one.
    fn elapsed_secs(&self) -> u32 {
        let secs = (self.interval.as_millis() + 500) / 1000;
        secs.clamp(1, u32::MAX as u128) as u32
    }

    /// Run one tick stamped `now`: generate, persist, apply retention.
    pub fn step(&mut self, now: DateTime<Utc>) -> Result<SimulatedTick, StorageError> {
        let tick = self.simulator.tick(now, self.elapsed_secs());
        self.store.insert_batch(tick.rows.clone())?;

        self.stats.ticks += 1;
        self.stats.rows_written += tick.rows.len() as u64;
        if tick.fault.is_some() {
            self.stats.faults_emitted += 1;
        }

        if self.retention > 0 {
            self.stats.rows_pruned += self.store.retain_latest(self.retention)? as u64;
        }

        debug!(
            rpm = tick.rpm,
            pto = tick.pto_engaged,
            fault = ?tick.fault.as_ref().map(|f| (f.spn, f.fmi)),
            "[LiveFeed] Tick"
        );
        Ok(tick)
    }

    /// Tick until cancelled. A store failure stops the feed and is returned
    /// to the caller; the store is flushed on every exit path.
    pub async fn run(mut self, cancel_token: CancellationToken) -> Result<FeedStats, StorageError> {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            retention = self.retention,
            "[LiveFeed] Starting telemetry feed"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let outcome = loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    info!("[LiveFeed] Shutdown signal received");
                    break Ok(());
                }
                _ = interval.tick() => {
                    if let Err(e) = self.step(Utc::now()) {
                        break Err(e);
                    }
                }
            }
        };

        self.store.flush()?;
        info!(
            ticks = self.stats.ticks,
            rows = self.stats.rows_written,
            faults = self.stats.faults_emitted,
            pruned = self.stats.rows_pruned,
            "[LiveFeed] Stopped"
        );
        outcome.map(|_| self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::SimulationParams;
    use crate::storage::RecordFilter;
    use crate::types::Channel;
    use chrono::TimeZone;

    fn feed(retention: usize) -> LiveFeed {
        let store = TelemetryStore::open_temporary().unwrap();
        let sim = TelemetrySimulator::seeded(SimulationParams::default(), 21);
        LiveFeed::new(store, sim, Duration::from_millis(1000), retention)
    }

    #[test]
    fn test_step_writes_pto_and_rpm() {
        let mut feed = feed(0);
        let t0 = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let tick = feed.step(t0).unwrap();
        assert_eq!(feed.store.count(), tick.rows.len());
        assert_eq!(feed.store.query(&RecordFilter::channel(Channel::Rpm)).unwrap().len(), 1);
        assert_eq!(feed.stats().ticks, 1);
    }

    #[test]
    fn test_retention_caps_row_count() {
        let mut feed = feed(10);
        let t0 = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        for i in 0..20 {
            feed.step(t0 + chrono::Duration::seconds(i)).unwrap();
        }
        assert_eq!(feed.store.count(), 10);
        let stats = feed.stats();
        assert_eq!(stats.rows_written - stats.rows_pruned, 10);
    }

    #[test]
    fn test_elapsed_secs_rounding() {
        let store = TelemetryStore::open_temporary().unwrap();
        let sim = || TelemetrySimulator::seeded(SimulationParams::default(), 1);
        let fast = LiveFeed::new(store.clone(), sim(), Duration::from_millis(100), 0);
        assert_eq!(fast.elapsed_secs(), 1);
        let slow = LiveFeed::new(store, sim(), Duration::from_millis(2600), 0);
        assert_eq!(slow.elapsed_secs(), 3);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let store = TelemetryStore::open_temporary().unwrap();
        let sim = TelemetrySimulator::seeded(SimulationParams::default(), 3);
        let feed = LiveFeed::new(store.clone(), sim, Duration::from_millis(10), 0);
        let token = CancellationToken::new();
        let handle = tokio::spawn(feed.run(token.clone()));

        tokio::time::sleep(Duration::from_millis(80)).await;
        token.cancel();
        let stats = handle.await.unwrap().unwrap();
        assert!(stats.ticks >= 1);
        assert_eq!(store.count() as u64, stats.rows_written);
    }
}

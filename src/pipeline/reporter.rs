//! Periodic queue-health report.

use metrics::{counter, gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::pipeline::queue::{QueueInfo, QueueStats};

/// Reads and resets the hand-off counters on a fixed interval.
///
/// Purely advisory: it never touches the queue itself.
#[derive(Debug, Clone)]
pub struct MetricsReporter {
    info: Arc<QueueInfo>,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(info: Arc<QueueInfo>, interval: Duration) -> Self {
        Self { info, interval }
    }

    /// Take one report, log it and publish it to the metrics recorder.
    pub fn report_once(&self) -> QueueStats {
        let stats = self.info.take_report();

        gauge!("sigstream_queue_depth").set(stats.queued as f64);
        counter!("sigstream_snapshots_skipped_total").increment(stats.skipped);

        info!(
            queued = stats.queued,
            skipped = stats.skipped,
            processed = stats.processed,
            "Queue health"
        );
        stats
    }

    /// Report every interval until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Metrics reporter stopped");
                    break;
                }
                _ = ticker.tick() => {
                    self.report_once();
                }
            }
        }
    }
}

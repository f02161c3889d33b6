//! Relay run statistics.

use std::fmt;
use std::time::Duration;

use dispatcher::{SchedulerStats, WorkerStats};
use observability::RelayMetricsAggregator;

/// Why the relay left the Running state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownReason {
    /// Ctrl+C or SIGTERM
    #[default]
    Signal,
    /// `--timeout` elapsed
    Timeout,
    /// The broker subscription ended on its own
    SubscriptionEnded,
}

impl ShutdownReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Signal => "signal",
            Self::Timeout => "timeout",
            Self::SubscriptionEnded => "subscription_ended",
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statistics from a relay run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Why the run ended
    pub shutdown_reason: ShutdownReason,

    /// Messages received from the broker
    pub messages_received: u64,

    /// Number of workers
    pub workers: usize,

    /// Timer totals
    pub scheduler: SchedulerStats,

    /// Aggregated worker / sink results
    pub metrics: RelayMetricsAggregator,
}

impl PipelineStats {
    /// Fold worker, scheduler and error-sink results into one record
    pub fn collect(
        worker_stats: &[WorkerStats],
        scheduler: SchedulerStats,
        bulk_errors: u64,
    ) -> Self {
        let mut metrics = RelayMetricsAggregator::new();
        for s in worker_stats {
            observability::record_worker_stats(
                s.worker_id,
                s.processed,
                s.decode_failures,
                s.alerts_sent,
                s.alerts_failed,
            );
            metrics.update_worker(
                s.worker_id,
                s.processed,
                s.decode_failures,
                s.alerts_sent,
                s.alerts_failed,
            );
        }
        metrics.update_scheduler(scheduler.flushes, scheduler.documents_flushed);
        metrics.set_bulk_errors(bulk_errors);

        Self {
            workers: worker_stats.len(),
            scheduler,
            metrics,
            ..Default::default()
        }
    }

    /// Events handled per second
    pub fn events_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.metrics.total_processed as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                      Relay Statistics                        ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Stopped by: {}", self.shutdown_reason);
        println!("   ├─ Messages received: {}", self.messages_received);
        println!("   ├─ Events/s: {:.2}", self.events_per_sec());
        println!("   └─ Workers: {}", self.workers);

        println!("\n⏱  Timers");
        println!("   ├─ Flushes: {}", self.scheduler.flushes);
        println!("   ├─ Reports: {}", self.scheduler.reports);
        println!("   └─ Documents flushed: {}", self.scheduler.documents_flushed);

        println!("\n{}", self.metrics.summary());
    }
}

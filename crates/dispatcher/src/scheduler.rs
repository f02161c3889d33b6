//! Scheduler - periodic bulk flush and progress reports

use std::sync::Arc;
use std::time::Duration;

use contracts::{BulkSink, WorkerConfig};
use metrics::{counter, histogram};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::DispatcherError;
use crate::metrics::DispatchCounters;

/// Broadcast to every worker on each report interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportTick {
    /// 1-based tick number
    pub seq: u64,
}

/// Timer configuration
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub flush_interval: Duration,
    pub report_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&WorkerConfig::default())
    }
}

impl From<&WorkerConfig> for SchedulerConfig {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            flush_interval: config.flush_interval(),
            report_interval: config.report_interval(),
        }
    }
}

/// What the scheduler did over its lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Periodic flushes (excluding the final one)
    pub flushes: u64,
    pub reports: u64,
    /// Documents taken from the buffer, final flush included
    pub documents_flushed: u64,
}

/// Drives the flush and report timers
///
/// Both timers first fire one full period after `run` starts.
pub struct Scheduler<B> {
    bulk: Arc<B>,
    counters: Arc<DispatchCounters>,
    config: SchedulerConfig,
    report_tx: broadcast::Sender<ReportTick>,
}

impl<B> Scheduler<B>
where
    B: BulkSink + Send + Sync + 'static,
{
    pub fn new(bulk: Arc<B>, counters: Arc<DispatchCounters>, config: SchedulerConfig) -> Self {
        let (report_tx, _) = broadcast::channel(16);
        Self {
            bulk,
            counters,
            config,
            report_tx,
        }
    }

    /// Sender workers subscribe to for report ticks
    pub fn report_sender(&self) -> broadcast::Sender<ReportTick> {
        self.report_tx.clone()
    }

    /// Run until `cancel`, then flush one last time
    ///
    /// Report ticks come from their own task, so a slow bulk round-trip never
    /// holds them back. A flush already in flight when `cancel` fires finishes
    /// before the final one.
    #[instrument(name = "scheduler_run", skip(self, cancel))]
    pub async fn run(self, cancel: CancellationToken) -> SchedulerStats {
        let mut stats = SchedulerStats::default();
        let start = Instant::now();

        info!(
            flush_secs = self.config.flush_interval.as_secs_f64(),
            report_secs = self.config.report_interval.as_secs_f64(),
            "Scheduler started"
        );

        let reporter = tokio::spawn(report_loop(
            self.report_tx.clone(),
            self.bulk.clone(),
            start,
            self.config.report_interval,
            cancel.clone(),
        ));

        let mut flush = interval_at(start + self.config.flush_interval, self.config.flush_interval);
        flush.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = flush.tick() => {
                    let flushed = self.flush_once().await;
                    stats.flushes += 1;
                    stats.documents_flushed += flushed as u64;
                }
            }
        }

        stats.reports = match reporter.await {
            Ok(reports) => reports,
            Err(e) => {
                warn!(error = %e, "Report task failed");
                0
            }
        };

        let flushed = self.bulk.flush().await;
        stats.documents_flushed += flushed as u64;
        info!(
            final_documents = flushed,
            flushes = stats.flushes,
            reports = stats.reports,
            "Scheduler stopped after final flush"
        );
        stats
    }

    /// Spawn `run` as a background task
    pub fn spawn(self, cancel: CancellationToken) -> SchedulerHandle {
        SchedulerHandle {
            handle: tokio::spawn(self.run(cancel)),
        }
    }

    async fn flush_once(&self) -> usize {
        let flushed = self.bulk.flush().await;
        let snapshot = self.counters.snapshot();
        self.counters.reset();

        counter!("eve_relay_flushes_total").increment(1);
        histogram!("eve_relay_flush_documents").record(flushed as f64);
        debug!(
            sink = %self.bulk.name(),
            documents = flushed,
            all = snapshot.all,
            sent = snapshot.total_sent(),
            "Flush tick"
        );
        flushed
    }
}

/// Running scheduler task
pub struct SchedulerHandle {
    handle: JoinHandle<SchedulerStats>,
}

impl SchedulerHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the scheduler to stop after its cancel token fired
    ///
    /// # Errors
    /// The scheduler task panicked, for example inside the bulk sink.
    pub async fn join(self) -> Result<SchedulerStats, DispatcherError> {
        self.handle.await.map_err(|e| {
            error!(error = %e, "Scheduler task failed");
            DispatcherError::scheduler_failed(e)
        })
    }
}

/// Broadcast a `ReportTick` every `period` until `cancel`; returns the tick count
async fn report_loop<B>(
    report_tx: broadcast::Sender<ReportTick>,
    bulk: Arc<B>,
    start: Instant,
    period: Duration,
    cancel: CancellationToken,
) -> u64
where
    B: BulkSink + Send + Sync + 'static,
{
    let mut report = interval_at(start + period, period);
    report.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut seq = 0;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = report.tick() => {
                seq += 1;
                // No receivers just means no workers are listening yet
                let receivers = report_tx.send(ReportTick { seq }).unwrap_or(0);
                debug!(seq, receivers, pending = bulk.pending(), "Report tick");
            }
        }
    }
    seq
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::tests::RecordingBulkSink;
    use contracts::BulkDocument;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            flush_interval: Duration::from_secs(10),
            report_interval: Duration::from_secs(3),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_cadence() {
        let bulk = Arc::new(RecordingBulkSink::default());
        let counters = Arc::new(DispatchCounters::new(1));
        let scheduler = Scheduler::new(bulk.clone(), counters, config());
        let mut reports = scheduler.report_sender().subscribe();
        let cancel = CancellationToken::new();
        let handle = scheduler.spawn(cancel.clone());

        tokio::time::sleep(Duration::from_secs(31)).await;
        cancel.cancel();
        let stats = handle.join().await.unwrap();

        assert_eq!(stats.flushes, 3);
        assert_eq!(stats.reports, 10);
        // Three periodic flushes plus the final one
        assert_eq!(bulk.flushes.lock().unwrap().len(), 4);

        let mut seqs = Vec::new();
        while let Ok(tick) = reports.try_recv() {
            seqs.push(tick.seq);
        }
        assert_eq!(seqs, (1..=10).collect::<Vec<_>>());
    }

    /// Bulk sink whose flush takes `delay` to complete
    struct SlowBulkSink {
        delay: Duration,
        flushes: AtomicUsize,
    }

    impl BulkSink for SlowBulkSink {
        fn name(&self) -> &str {
            "slow"
        }

        fn add_document(&self, _document: BulkDocument) {}

        async fn flush(&self) -> usize {
            tokio::time::sleep(self.delay).await;
            self.flushes.fetch_add(1, Ordering::SeqCst);
            0
        }

        fn pending(&self) -> usize {
            0
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_flush_does_not_delay_reports() {
        let bulk = Arc::new(SlowBulkSink {
            delay: Duration::from_secs(25),
            flushes: AtomicUsize::new(0),
        });
        let scheduler = Scheduler::new(bulk.clone(), Arc::new(DispatchCounters::new(1)), config());
        let mut reports = scheduler.report_sender().subscribe();
        let cancel = CancellationToken::new();
        let handle = scheduler.spawn(cancel.clone());

        // The first flush starts at 10s and is still running at 34s
        tokio::time::sleep(Duration::from_secs(34)).await;
        let mut seqs = Vec::new();
        while let Ok(tick) = reports.try_recv() {
            seqs.push(tick.seq);
        }
        assert_eq!(seqs, (1..=11).collect::<Vec<_>>());
        assert_eq!(bulk.flushes.load(Ordering::SeqCst), 0);

        cancel.cancel();
        let stats = handle.join().await.unwrap();
        assert_eq!(stats.reports, 11);
        assert_eq!(stats.flushes, 1);
        // The in-flight flush completed, then the final one ran
        assert_eq!(bulk.flushes.load(Ordering::SeqCst), 2);
    }

    struct PanickingBulkSink;

    impl BulkSink for PanickingBulkSink {
        fn name(&self) -> &str {
            "panicking"
        }

        fn add_document(&self, _document: BulkDocument) {}

        async fn flush(&self) -> usize {
            panic!("bulk sink exploded");
        }

        fn pending(&self) -> usize {
            0
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_reports_scheduler_failure() {
        let scheduler = Scheduler::new(
            Arc::new(PanickingBulkSink),
            Arc::new(DispatchCounters::new(1)),
            config(),
        );
        let handle = scheduler.spawn(CancellationToken::new());

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(handle.is_finished());

        let err = handle.join().await.unwrap_err();
        assert!(matches!(err, DispatcherError::SchedulerFailed { .. }));
        assert!(err.to_string().contains("scheduler terminated abnormally"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_fires_before_first_period() {
        let bulk = Arc::new(RecordingBulkSink::default());
        let scheduler = Scheduler::new(bulk.clone(), Arc::new(DispatchCounters::new(1)), config());
        let cancel = CancellationToken::new();
        let handle = scheduler.spawn(cancel.clone());

        tokio::time::sleep(Duration::from_millis(2900)).await;
        cancel.cancel();
        let stats = handle.join().await.unwrap();

        assert_eq!(stats.flushes, 0);
        assert_eq!(stats.reports, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_resets_counters() {
        let bulk = Arc::new(RecordingBulkSink::default());
        let counters = Arc::new(DispatchCounters::new(2));
        let scheduler = Scheduler::new(bulk.clone(), counters.clone(), config());
        let cancel = CancellationToken::new();
        let handle = scheduler.spawn(cancel.clone());

        bulk.add_document(BulkDocument::new("suricata-2024.03.01", json!({})));
        counters.inc_all();
        counters.inc_sent(1);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(counters.all(), 0);
        assert_eq!(counters.sent(1), 0);
        assert_eq!(*bulk.flushes.lock().unwrap(), vec![1]);

        cancel.cancel();
        let stats = handle.join().await.unwrap();
        assert_eq!(stats.documents_flushed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_flush_on_cancel() {
        let bulk = Arc::new(RecordingBulkSink::default());
        let scheduler = Scheduler::new(bulk.clone(), Arc::new(DispatchCounters::new(1)), config());
        let cancel = CancellationToken::new();
        let handle = scheduler.spawn(cancel.clone());

        bulk.add_document(BulkDocument::new("suricata-2024.03.01", json!({})));
        bulk.add_document(BulkDocument::new("suricata-2024.03.01", json!({})));
        cancel.cancel();

        let stats = handle.join().await.unwrap();
        assert_eq!(stats.flushes, 0);
        assert_eq!(stats.documents_flushed, 2);
        assert_eq!(bulk.pending(), 0);
    }
}

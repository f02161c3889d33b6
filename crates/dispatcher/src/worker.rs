//! WorkerPool - parallel consumers of the shared work queue

use std::fmt;
use std::sync::Arc;

use async_channel::Receiver;
use contracts::{AlertSink, BulkSink, EventDecoder, RawMessage};
use metrics::counter;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::dispatcher::{DispatchOutcome, EventDispatcher};
use crate::enrichment::Enricher;
use crate::error::DispatcherError;
use crate::metrics::DispatchCounters;
use crate::scheduler::ReportTick;

/// Per-worker totals over the worker's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub worker_id: usize,
    pub processed: u64,
    pub decode_failures: u64,
    pub alerts_sent: u64,
    pub alerts_failed: u64,
    /// Report ticks answered
    pub reports: u64,
    /// What the most recent report said
    pub last_report: Option<ProgressReport>,
}

/// A worker's answer to a report tick: alerts sent since the last flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressReport {
    pub worker_id: usize,
    pub sent: u64,
}

impl ProgressReport {
    pub fn for_worker(worker_id: usize, counters: &DispatchCounters) -> Self {
        Self {
            worker_id,
            sent: counters.sent(worker_id),
        }
    }
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Worker {} sent {} alerts", self.worker_id, self.sent)
    }
}

/// Handles of running workers
pub struct WorkerPool {
    handles: Vec<JoinHandle<WorkerStats>>,
}

impl WorkerPool {
    /// Spawn `count` workers on the shared queue
    ///
    /// Each worker gets its own enricher clone and report subscription. A
    /// worker stops on cancellation or once the queue is closed and drained.
    #[instrument(
        name = "worker_pool_spawn",
        skip(rx, decoder, enricher, dispatcher, reports, cancel)
    )]
    pub fn spawn<D, B, A>(
        count: usize,
        rx: Receiver<RawMessage>,
        decoder: Arc<D>,
        enricher: Enricher,
        dispatcher: EventDispatcher<B, A>,
        reports: &broadcast::Sender<ReportTick>,
        cancel: CancellationToken,
    ) -> Self
    where
        D: EventDecoder + 'static,
        B: BulkSink + Send + Sync + 'static,
        A: AlertSink + Send + Sync + 'static,
    {
        let handles = (0..count)
            .map(|worker_id| {
                let worker = Worker {
                    id: worker_id,
                    rx: rx.clone(),
                    decoder: Arc::clone(&decoder),
                    enricher: enricher.clone(),
                    dispatcher: dispatcher.clone(),
                    reports: Some(reports.subscribe()),
                    cancel: cancel.clone(),
                    stats: WorkerStats {
                        worker_id,
                        ..WorkerStats::default()
                    },
                };
                tokio::spawn(worker.run())
            })
            .collect();

        info!(workers = count, "Worker pool started");
        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Whether every worker has exited
    pub fn is_finished(&self) -> bool {
        self.handles.iter().all(JoinHandle::is_finished)
    }

    /// Wait for every worker
    ///
    /// # Errors
    /// The first worker that panicked; the rest are still awaited.
    #[instrument(name = "worker_pool_join", skip(self))]
    pub async fn join(self) -> Result<Vec<WorkerStats>, DispatcherError> {
        let mut stats = Vec::with_capacity(self.handles.len());
        let mut failure = None;

        for (worker_id, handle) in self.handles.into_iter().enumerate() {
            match handle.await {
                Ok(s) => stats.push(s),
                Err(e) => {
                    error!(worker_id, error = %e, "Worker task failed");
                    failure.get_or_insert(DispatcherError::WorkerFailed {
                        worker_id,
                        message: e.to_string(),
                    });
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(stats),
        }
    }
}

struct Worker<D, B, A> {
    id: usize,
    rx: Receiver<RawMessage>,
    decoder: Arc<D>,
    enricher: Enricher,
    dispatcher: EventDispatcher<B, A>,
    reports: Option<broadcast::Receiver<ReportTick>>,
    cancel: CancellationToken,
    stats: WorkerStats,
}

impl<D, B, A> Worker<D, B, A>
where
    D: EventDecoder + 'static,
    B: BulkSink + Send + Sync + 'static,
    A: AlertSink + Send + Sync + 'static,
{
    async fn run(mut self) -> WorkerStats {
        debug!(worker_id = self.id, "Worker started");

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                tick = next_tick(&mut self.reports) => match tick {
                    Ok(_) | Err(RecvError::Lagged(_)) => self.report(),
                    Err(RecvError::Closed) => self.reports = None,
                },
                message = self.rx.recv() => match message {
                    Ok(message) => self.handle(message).await,
                    Err(_) => break,
                },
            }
        }

        debug!(worker_id = self.id, processed = self.stats.processed, "Worker stopped");
        self.stats
    }

    async fn handle(&mut self, message: RawMessage) {
        self.stats.processed += 1;

        let event = match self.decoder.decode(&message.payload) {
            Ok(event) => event,
            Err(e) => {
                self.stats.decode_failures += 1;
                counter!("eve_relay_decode_failures_total").increment(1);
                warn!(
                    worker_id = self.id,
                    topic = %message.topic,
                    bytes = message.payload.len(),
                    error = %e,
                    "Failed to decode event"
                );
                return;
            }
        };

        match self
            .dispatcher
            .dispatch(self.id, &event, &self.enricher, &self.cancel)
            .await
        {
            DispatchOutcome::AlertSent => self.stats.alerts_sent += 1,
            DispatchOutcome::AlertFailed => self.stats.alerts_failed += 1,
            DispatchOutcome::Indexed | DispatchOutcome::Skipped => {}
        }
    }

    fn report(&mut self) {
        let report = ProgressReport::for_worker(self.id, self.dispatcher.counters());
        info!(worker_id = report.worker_id, sent = report.sent, "{report}");
        self.stats.reports += 1;
        self.stats.last_report = Some(report);
    }
}

/// Next report tick; never resolves once the scheduler is gone
async fn next_tick(
    reports: &mut Option<broadcast::Receiver<ReportTick>>,
) -> Result<ReportTick, RecvError> {
    match reports {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

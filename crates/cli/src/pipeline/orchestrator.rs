//! Relay orchestrator - wires every component and drives the lifecycle.
//!
//! Starting -> Running -> Draining -> Stopped.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use contracts::RelayConfig;
use dispatcher::{
    spawn_error_sink, AlertTemplate, AlertaSender, AssetTable, DispatchCounters,
    ElasticBulkSink, Enricher, EventDispatcher, Scheduler, SchedulerConfig, WorkerPool,
};
use ingestion::{EveDecoder, RedisSource, Subscription, SubscriptionConfig};
use observability::{record_pipeline_state, record_queue_depth, record_shutdown};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{PipelineStats, ShutdownReason};
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Validated relay configuration
    pub relay: RelayConfig,

    /// Stop after this long (None = run until signalled)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main relay orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` resolves, the timeout elapses or the subscription ends
    ///
    /// Any startup failure is fatal. Once running, the relay always drains:
    /// workers are stopped, the bulk buffer gets a final flush, and the
    /// error sink is joined before the stats are returned.
    pub async fn run<F>(self, shutdown: F) -> Result<PipelineStats>
    where
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let relay = &self.config.relay;

        // Starting
        record_pipeline_state("starting");

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
        }

        info!(url = %relay.broker.url, topic = %relay.broker.topic, "Connecting to broker...");
        let source = RedisSource::connect(&relay.broker.url, &relay.broker.topic)
            .await
            .map_err(|e| CliError::startup("broker subscription", e))?;

        let (bulk, bulk_errors) =
            ElasticBulkSink::new(&relay.bulk).map_err(|e| CliError::startup("bulk sink", e))?;
        if relay.bulk.verify_on_start {
            bulk.check_connection()
                .await
                .map_err(|e| CliError::startup("bulk sink", e))?;
        }
        let bulk = Arc::new(bulk);
        let alerts =
            Arc::new(AlertaSender::new(&relay.alert).map_err(|e| CliError::startup("alert sender", e))?);

        let assets = AssetTable::from_config(&relay.assets)
            .map_err(|e| CliError::startup("enrichment", e))?;
        let enricher = Enricher::new(assets, AlertTemplate::from(&relay.alert));

        let error_sink = spawn_error_sink(bulk_errors);

        let workers = relay.workers.count;
        let counters = Arc::new(DispatchCounters::new(workers));
        let event_dispatcher = EventDispatcher::new(
            Arc::clone(&bulk),
            alerts,
            Arc::clone(&counters),
            relay.bulk.index_prefix.clone(),
        );
        let scheduler = Scheduler::new(
            Arc::clone(&bulk),
            counters,
            SchedulerConfig::from(&relay.workers),
        );

        let mut subscription = Subscription::spawn(
            source,
            SubscriptionConfig::new(relay.broker.channel_capacity),
        );

        let worker_cancel = CancellationToken::new();
        let scheduler_cancel = CancellationToken::new();

        let pool = WorkerPool::spawn(
            workers,
            subscription.receiver(),
            Arc::new(EveDecoder::new()),
            enricher,
            event_dispatcher,
            &scheduler.report_sender(),
            worker_cancel.clone(),
        );
        let scheduler_handle = scheduler.spawn(scheduler_cancel.clone());

        // Running
        record_pipeline_state("running");
        info!(workers, "Relay running");

        let reason = self
            .wait_for_shutdown(&subscription, relay.workers.report_interval(), shutdown)
            .await;
        record_shutdown(reason.as_str());

        // Draining
        record_pipeline_state("draining");
        info!(reason = %reason, "Draining relay...");

        // A finished subscription leaves the queue for the workers to empty
        if reason != ShutdownReason::SubscriptionEnded {
            worker_cancel.cancel();
        }
        if let Err(e) = subscription.close().await {
            warn!(error = %e, "Subscription close failed");
        }
        let discarded = subscription.queue_len();
        if discarded > 0 {
            warn!(discarded, "Queued messages left unprocessed");
        }

        let worker_stats = pool.join().await.map_err(CliError::shutdown)?;

        scheduler_cancel.cancel();
        let scheduler_stats = scheduler_handle.join().await.map_err(CliError::shutdown)?;

        // Last bulk sink handle; dropping it closes the error channel
        drop(bulk);
        let bulk_error_count = error_sink.await.map_err(CliError::shutdown)?;

        // Stopped
        record_pipeline_state("stopped");

        let mut stats = PipelineStats::collect(&worker_stats, scheduler_stats, bulk_error_count);
        stats.duration = start_time.elapsed();
        stats.shutdown_reason = reason;
        stats.messages_received = subscription.metrics().snapshot().messages_received;

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            events_per_sec = format!("{:.2}", stats.events_per_sec()),
            bulk_errors = bulk_error_count,
            "Relay shutdown complete"
        );

        Ok(stats)
    }

    /// Block in Running, publishing queue depth once per report interval
    async fn wait_for_shutdown<F>(
        &self,
        subscription: &Subscription,
        progress_every: Duration,
        shutdown: F,
    ) -> ShutdownReason
    where
        F: Future<Output = ()>,
    {
        let deadline = async {
            match self.config.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(shutdown, deadline);

        let mut progress = tokio::time::interval(progress_every);

        loop {
            tokio::select! {
                _ = &mut shutdown => return ShutdownReason::Signal,
                _ = &mut deadline => {
                    info!(timeout_secs = self.config.timeout.map(|t| t.as_secs()), "Relay timeout reached");
                    return ShutdownReason::Timeout;
                }
                _ = subscription.ended() => return ShutdownReason::SubscriptionEnded,
                _ = progress.tick() => {
                    let depth = subscription.queue_len();
                    record_queue_depth(depth);
                    debug!(
                        queue = depth,
                        received = subscription.metrics().snapshot().messages_received,
                        "Relay progress"
                    );
                }
            }
        }
    }
}

//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置 -> 富化表的集成
//! - Mock 订阅 -> worker 池 -> 双 sink 的 e2e 场景
//! - 定时器在空闲流量下的行为

#[cfg(test)]
mod support {
    use std::sync::Mutex;

    use contracts::{BulkDocument, BulkSink};

    /// Bulk sink that keeps documents in memory and records every flush
    #[derive(Default)]
    pub struct MemoryBulkSink {
        pub documents: Mutex<Vec<BulkDocument>>,
        pub flushes: Mutex<Vec<usize>>,
    }

    impl BulkSink for MemoryBulkSink {
        fn name(&self) -> &str {
            "memory"
        }

        fn add_document(&self, document: BulkDocument) {
            self.documents.lock().unwrap().push(document);
        }

        async fn flush(&self) -> usize {
            let n = std::mem::take(&mut *self.documents.lock().unwrap()).len();
            self.flushes.lock().unwrap().push(n);
            n
        }

        fn pending(&self) -> usize {
            self.documents.lock().unwrap().len()
        }
    }
}

#[cfg(test)]
mod config_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use dispatcher::{AlertTemplate, AssetTable, Enricher};

    #[test]
    fn test_config_drives_enrichment() {
        let config = ConfigLoader::load_from_str(
            r#"
            [alert]
            environment = "Staging"
            group = "ids"

            [assets]
            "10.1.1.1" = "gateway"
            "#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let assets = AssetTable::from_config(&config.assets).unwrap();
        let enricher = Enricher::new(assets, AlertTemplate::from(&config.alert));

        let src = "10.1.1.1".parse().unwrap();
        let dest = "192.168.144.10".parse().unwrap();
        // An explicit [assets] table replaces the built-in one
        assert_eq!(enricher.resolve_asset(&src, &dest), "gateway");
        assert_eq!(enricher.resolve_asset(&dest, &dest), "192.168.144.10");
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{default_assets, AlertConfig, BulkSink, RelayConfig};
    use dispatcher::{
        AlertTemplate, AlertaSender, AssetTable, DispatchCounters, Enricher, EventDispatcher,
        ReportTick, Scheduler, SchedulerConfig, WorkerPool, WorkerStats,
    };
    use ingestion::{EveDecoder, MockSource, Subscription, SubscriptionConfig};
    use mockito::{Matcher, Server};
    use observability::RelayMetricsAggregator;
    use serde_json::json;
    use tokio::sync::broadcast;
    use tokio_util::sync::CancellationToken;

    use crate::support::MemoryBulkSink;

    const SCAN_ALERT: &str = r#"{"timestamp":"2024-03-01T12:34:56.789012+0000","event_type":"alert","src_ip":"192.168.144.10","src_port":51234,"dest_ip":"8.8.8.8","dest_port":53,"proto":"UDP","alert":{"signature_id":2010935,"signature":"ET SCAN","severity":1}}"#;
    const DNS_EVENT: &str = r#"{"timestamp":"2024-03-01T12:35:00.000000+0000","event_type":"dns","src_ip":"192.168.144.15","dest_ip":"192.168.144.5","dns":{"type":"query","rrname":"example.org"}}"#;

    struct Run {
        bulk: Arc<MemoryBulkSink>,
        counters: Arc<DispatchCounters>,
        stats: Vec<WorkerStats>,
    }

    /// Push `payloads` through a one-worker relay until the mock source is drained
    async fn relay(payloads: Vec<&'static str>, alert_url: String) -> Run {
        let bulk = Arc::new(MemoryBulkSink::default());
        let counters = Arc::new(DispatchCounters::new(1));
        let alerts = Arc::new(
            AlertaSender::new(&AlertConfig {
                url: alert_url,
                ..AlertConfig::default()
            })
            .unwrap(),
        );
        let dispatcher =
            EventDispatcher::new(bulk.clone(), alerts, counters.clone(), "suricata");
        let enricher = Enricher::new(
            AssetTable::from_config(&default_assets()).unwrap(),
            AlertTemplate::default(),
        );

        let subscription = Subscription::spawn(
            MockSource::new("suricata", payloads),
            SubscriptionConfig::default(),
        );
        let (reports, _) = broadcast::channel::<ReportTick>(4);
        let pool = WorkerPool::spawn(
            1,
            subscription.receiver(),
            Arc::new(EveDecoder::new()),
            enricher,
            dispatcher,
            &reports,
            CancellationToken::new(),
        );

        let stats = pool.join().await.unwrap();
        Run {
            bulk,
            counters,
            stats,
        }
    }

    /// Scenario 1: detection from a known asset
    #[tokio::test]
    async fn test_alert_event_is_indexed_and_notified() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/alert")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({
                "event": "ET SCAN",
                "service": ["minion"],
                "resource": "minion",
                "severity": "major",
                "value": "1",
                "timeout": 300,
                "environment": "Production",
                "text": "Alert from 192.168.144.10 to 8.8.8.8"
            })))
            .with_status(201)
            .expect(1)
            .create_async()
            .await;

        let run = relay(vec![SCAN_ALERT], format!("{}/api/alert", server.url())).await;

        mock.assert_async().await;
        assert_eq!(run.bulk.pending(), 1);
        assert_eq!(run.counters.all(), 1);
        assert_eq!(run.counters.sent(0), 1);
        assert_eq!(run.stats[0].alerts_sent, 1);

        let documents = run.bulk.documents.lock().unwrap();
        assert_eq!(documents[0].index, "suricata-2024.03.01");
        assert_eq!(documents[0].body["timestamp"], "2024-03-01T12:34:56.789012+00:00");
        assert_eq!(documents[0].body["alert"]["signature_id"], 2010935);
    }

    /// Scenario 2: no alert block
    #[tokio::test]
    async fn test_event_without_alert_is_only_indexed() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let run = relay(vec![DNS_EVENT], server.url()).await;

        mock.assert_async().await;
        assert_eq!(run.bulk.pending(), 1);
        assert_eq!(run.counters.all(), 1);
        assert_eq!(run.counters.sent(0), 0);
        assert_eq!(
            run.bulk.documents.lock().unwrap()[0].body["dns"]["rrname"],
            "example.org"
        );
    }

    /// Scenario 3: malformed payload
    #[tokio::test]
    async fn test_malformed_payload_is_dropped() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let run = relay(vec!["{\"timestamp\": oops", DNS_EVENT], server.url()).await;

        mock.assert_async().await;
        assert_eq!(run.stats[0].processed, 2);
        assert_eq!(run.stats[0].decode_failures, 1);
        // Only the valid event that follows is indexed; the worker kept going
        assert_eq!(run.bulk.pending(), 1);
        assert_eq!(run.counters.all(), 1);
    }

    /// Scenario 4: alert endpoint failure
    #[tokio::test]
    async fn test_alert_endpoint_error_keeps_document() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/alert")
            .with_status(500)
            .with_body("internal error")
            .expect(1)
            .create_async()
            .await;

        let run = relay(vec![SCAN_ALERT], format!("{}/api/alert", server.url())).await;

        mock.assert_async().await;
        assert_eq!(run.counters.sent(0), 0);
        assert_eq!(run.stats[0].alerts_failed, 1);
        assert_eq!(run.bulk.pending(), 1);
    }

    /// Scenario 5: ten idle seconds
    #[tokio::test(start_paused = true)]
    async fn test_idle_relay_flushes_once() {
        let config = RelayConfig::default();
        let workers = 2;

        let bulk = Arc::new(MemoryBulkSink::default());
        let counters = Arc::new(DispatchCounters::new(workers));
        let alerts = Arc::new(AlertaSender::new(&config.alert).unwrap());
        let dispatcher =
            EventDispatcher::new(bulk.clone(), alerts, counters.clone(), "suricata");
        let scheduler = Scheduler::new(
            bulk.clone(),
            counters.clone(),
            SchedulerConfig::from(&config.workers),
        );
        let mut reports = scheduler.report_sender().subscribe();

        let mut subscription =
            Subscription::spawn(MockSource::idle("suricata"), SubscriptionConfig::default());
        let worker_cancel = CancellationToken::new();
        let scheduler_cancel = CancellationToken::new();
        let pool = WorkerPool::spawn(
            workers,
            subscription.receiver(),
            Arc::new(EveDecoder::new()),
            Enricher::default(),
            dispatcher,
            &scheduler.report_sender(),
            worker_cancel.clone(),
        );
        let scheduler_handle = scheduler.spawn(scheduler_cancel.clone());

        let mut ticks = 0;
        let idle = tokio::time::sleep(Duration::from_millis(10_500));
        tokio::pin!(idle);
        loop {
            tokio::select! {
                _ = &mut idle => break,
                tick = reports.recv() => {
                    tick.unwrap();
                    ticks += 1;
                    for worker in 0..workers {
                        assert_eq!(counters.sent(worker), 0);
                    }
                }
            }
        }

        assert_eq!(ticks, 3);
        assert_eq!(*bulk.flushes.lock().unwrap(), vec![0]);
        assert_eq!(counters.snapshot().all, 0);
        assert_eq!(counters.snapshot().total_sent(), 0);

        worker_cancel.cancel();
        subscription.close().await.unwrap();
        let worker_stats = pool.join().await.unwrap();
        scheduler_cancel.cancel();
        let scheduler_stats = scheduler_handle.join().await.unwrap();

        assert_eq!(scheduler_stats.flushes, 1);
        assert_eq!(scheduler_stats.reports, 3);

        let mut aggregator = RelayMetricsAggregator::new();
        for s in &worker_stats {
            aggregator.update_worker(
                s.worker_id,
                s.processed,
                s.decode_failures,
                s.alerts_sent,
                s.alerts_failed,
            );
        }
        aggregator.update_scheduler(scheduler_stats.flushes, scheduler_stats.documents_flushed);
        let summary = aggregator.summary();
        assert_eq!(summary.total_processed, 0);
        assert_eq!(summary.flushes, 1);
    }
}

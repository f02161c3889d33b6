//! # Dispatcher
//!
//! 事件分发模块。
//!
//! 负责：
//! - Worker 池：消费工作队列，解码并分发事件
//! - 富化：资产名、严重级别、告警通知
//! - 双 sink：批量索引 (Elasticsearch) 与告警 API (Alerta)
//! - 定时器：周期 flush 与进度报告
//! - 错误 sink：异步汇报批量索引失败

pub mod dispatcher;
pub mod enrichment;
pub mod error;
pub mod error_sink;
pub mod metrics;
pub mod scheduler;
pub mod sinks;
pub mod worker;

pub use contracts::{AlertSink, BulkSink, SecurityEvent};
pub use dispatcher::{DispatchOutcome, EventDispatcher};
pub use enrichment::{AlertTemplate, AssetTable, Enricher, SeverityTable};
pub use error::DispatcherError;
pub use error_sink::spawn_error_sink;
pub use metrics::{CountersSnapshot, DispatchCounters};
pub use scheduler::{ReportTick, Scheduler, SchedulerConfig, SchedulerHandle, SchedulerStats};
pub use sinks::{AlertaSender, BulkErrorReceiver, ElasticBulkSink};
pub use worker::{WorkerPool, WorkerStats};

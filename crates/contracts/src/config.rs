//! RelayConfig - Config Loader 输出
//!
//! 描述完整的运行配置：broker、bulk sink、告警端点、worker 池、资产表。
//! 所有字段都有默认值，空配置文件即为参考部署。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的运行配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 消息 broker 设置
    #[serde(default)]
    pub broker: BrokerConfig,

    /// 批量索引 sink 设置
    #[serde(default)]
    pub bulk: BulkConfig,

    /// 告警 API 设置
    #[serde(default)]
    pub alert: AlertConfig,

    /// Worker 池与定时器
    #[serde(default)]
    pub workers: WorkerConfig,

    /// IP 地址 -> 资产名称
    #[serde(default = "default_assets")]
    pub assets: BTreeMap<String, String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            version: ConfigVersion::V1,
            broker: BrokerConfig::default(),
            bulk: BulkConfig::default(),
            alert: AlertConfig::default(),
            workers: WorkerConfig::default(),
            assets: default_assets(),
        }
    }
}

/// Broker 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Redis URL
    #[serde(default = "default_broker_url")]
    pub url: String,

    /// 订阅的 topic
    #[serde(default = "default_topic")]
    pub topic: String,

    /// 共享工作队列容量
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: default_broker_url(),
            topic: default_topic(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Bulk sink 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkConfig {
    /// 搜索引擎地址列表 (轮询)
    #[serde(default = "default_bulk_endpoints")]
    pub endpoints: Vec<String>,

    /// 索引名前缀，实际索引为 `<prefix>-<YYYY.MM.DD>`
    #[serde(default = "default_index_prefix")]
    pub index_prefix: String,

    /// 单个 `_bulk` 请求的最大文档数
    #[serde(default = "default_max_batch_docs")]
    pub max_batch_docs: usize,

    /// 单个请求超时 (秒)
    #[serde(default = "default_bulk_timeout_secs")]
    pub request_timeout_secs: u64,

    /// 启动时检查连通性
    #[serde(default = "default_true")]
    pub verify_on_start: bool,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            endpoints: default_bulk_endpoints(),
            index_prefix: default_index_prefix(),
            max_batch_docs: default_max_batch_docs(),
            request_timeout_secs: default_bulk_timeout_secs(),
            verify_on_start: true,
        }
    }
}

impl BulkConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// 告警 API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// 告警提交地址
    #[serde(default = "default_alert_url")]
    pub url: String,

    #[serde(default = "default_environment")]
    pub environment: String,

    /// 告警过期时间 (秒)
    #[serde(default = "default_alert_timeout")]
    pub timeout: u32,

    #[serde(default)]
    pub origin: String,

    #[serde(default)]
    pub group: String,

    /// 对应告警体中的 `type`
    #[serde(default)]
    pub event_type: String,

    /// 对应 `attributes.region`
    #[serde(default)]
    pub region: String,

    /// 单个请求超时 (秒)
    #[serde(default = "default_alert_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            url: default_alert_url(),
            environment: default_environment(),
            timeout: default_alert_timeout(),
            origin: String::new(),
            group: String::new(),
            event_type: String::new(),
            region: String::new(),
            request_timeout_secs: default_alert_request_timeout_secs(),
        }
    }
}

impl AlertConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Worker 池与定时器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// 并行 worker 数量
    #[serde(default = "default_worker_count")]
    pub count: usize,

    /// 进度报告间隔 (秒)
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,

    /// Bulk flush 间隔 (秒)
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            report_interval_secs: default_report_interval_secs(),
            flush_interval_secs: default_flush_interval_secs(),
        }
    }
}

impl WorkerConfig {
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }
}

fn default_broker_url() -> String {
    "redis://localhost:6379/0".to_string()
}

fn default_topic() -> String {
    "suricata".to_string()
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_bulk_endpoints() -> Vec<String> {
    vec!["http://localhost:9200".to_string()]
}

fn default_index_prefix() -> String {
    "suricata".to_string()
}

fn default_max_batch_docs() -> usize {
    5000
}

fn default_bulk_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_alert_url() -> String {
    "http://localhost:8080/api/alert".to_string()
}

fn default_environment() -> String {
    "Production".to_string()
}

fn default_alert_timeout() -> u32 {
    300
}

fn default_alert_request_timeout_secs() -> u64 {
    10
}

fn default_worker_count() -> usize {
    8
}

fn default_report_interval_secs() -> u64 {
    3
}

fn default_flush_interval_secs() -> u64 {
    10
}

/// 参考部署的资产表
pub fn default_assets() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("192.168.144.10".to_string(), "minion".to_string()),
        ("192.168.144.15".to_string(), "shadow".to_string()),
        ("192.168.144.5".to_string(), "pihole".to_string()),
    ])
}

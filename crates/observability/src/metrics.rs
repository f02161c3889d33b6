//! Relay 指标收集模块
//!
//! 运行期 Prometheus 指标，以及运行结束时的内存聚合摘要。

use std::collections::BTreeMap;

use metrics::{counter, gauge};

/// 记录单个 worker 的累计统计
///
/// Worker 退出后调用，标签为 worker 编号。
pub fn record_worker_stats(
    worker_id: usize,
    processed: u64,
    decode_failures: u64,
    alerts_sent: u64,
    alerts_failed: u64,
) {
    let worker = worker_id.to_string();
    gauge!("eve_relay_worker_processed", "worker" => worker.clone()).set(processed as f64);
    gauge!("eve_relay_worker_decode_failures", "worker" => worker.clone())
        .set(decode_failures as f64);
    gauge!("eve_relay_worker_alerts_sent", "worker" => worker.clone()).set(alerts_sent as f64);
    gauge!("eve_relay_worker_alerts_failed", "worker" => worker).set(alerts_failed as f64);
}

/// 记录工作队列深度
pub fn record_queue_depth(depth: usize) {
    gauge!("eve_relay_queue_depth").set(depth as f64);
}

/// 记录生命周期状态切换
pub fn record_pipeline_state(state: &str) {
    counter!("eve_relay_state_transitions_total", "state" => state.to_string()).increment(1);
}

/// 记录关闭原因
pub fn record_shutdown(reason: &str) {
    counter!("eve_relay_shutdowns_total", "reason" => reason.to_string()).increment(1);
}

/// Relay 指标聚合器
///
/// 在内存中聚合各 worker 与定时器的结果，便于输出摘要。
#[derive(Debug, Clone, Default)]
pub struct RelayMetricsAggregator {
    /// 处理的消息总数
    pub total_processed: u64,

    /// 解码失败总数
    pub total_decode_failures: u64,

    /// 告警成功数
    pub total_alerts_sent: u64,

    /// 告警失败数
    pub total_alerts_failed: u64,

    /// 周期 flush 次数
    pub flushes: u64,

    /// flush 的文档总数 (含最终 flush)
    pub documents_flushed: u64,

    /// 批量索引错误数
    pub bulk_errors: u64,

    /// 各 worker 处理量统计 (负载均衡)
    pub worker_load: RunningStats,

    /// 各 worker 告警成功数
    pub worker_alerts: BTreeMap<usize, u64>,
}

impl RelayMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 合并一个 worker 的结果
    pub fn update_worker(
        &mut self,
        worker_id: usize,
        processed: u64,
        decode_failures: u64,
        alerts_sent: u64,
        alerts_failed: u64,
    ) {
        self.total_processed += processed;
        self.total_decode_failures += decode_failures;
        self.total_alerts_sent += alerts_sent;
        self.total_alerts_failed += alerts_failed;
        self.worker_load.push(processed as f64);
        *self.worker_alerts.entry(worker_id).or_insert(0) += alerts_sent;
    }

    /// 合并定时器结果
    pub fn update_scheduler(&mut self, flushes: u64, documents_flushed: u64) {
        self.flushes += flushes;
        self.documents_flushed += documents_flushed;
    }

    /// 记录错误 sink 的计数
    pub fn set_bulk_errors(&mut self, errors: u64) {
        self.bulk_errors = errors;
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        let alerts_attempted = self.total_alerts_sent + self.total_alerts_failed;
        MetricsSummary {
            total_processed: self.total_processed,
            total_decode_failures: self.total_decode_failures,
            total_alerts_sent: self.total_alerts_sent,
            total_alerts_failed: self.total_alerts_failed,
            flushes: self.flushes,
            documents_flushed: self.documents_flushed,
            bulk_errors: self.bulk_errors,
            decode_failure_rate: percent(self.total_decode_failures, self.total_processed),
            alert_success_rate: percent(self.total_alerts_sent, alerts_attempted),
            worker_load: StatsSummary::from(&self.worker_load),
            worker_alerts: self.worker_alerts.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total > 0 {
        part as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_processed: u64,
    pub total_decode_failures: u64,
    pub total_alerts_sent: u64,
    pub total_alerts_failed: u64,
    pub flushes: u64,
    pub documents_flushed: u64,
    pub bulk_errors: u64,
    pub decode_failure_rate: f64,
    pub alert_success_rate: f64,
    pub worker_load: StatsSummary,
    pub worker_alerts: BTreeMap<usize, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Relay Metrics Summary ===")?;
        writeln!(f, "Messages processed: {}", self.total_processed)?;
        writeln!(
            f,
            "Decode failures: {} ({:.2}%)",
            self.total_decode_failures, self.decode_failure_rate
        )?;
        writeln!(
            f,
            "Alerts sent: {} / failed: {} ({:.2}% accepted)",
            self.total_alerts_sent, self.total_alerts_failed, self.alert_success_rate
        )?;
        writeln!(
            f,
            "Flushes: {} ({} documents)",
            self.flushes, self.documents_flushed
        )?;
        writeln!(f, "Bulk errors: {}", self.bulk_errors)?;
        writeln!(f, "Worker load: {}", self.worker_load)?;

        if !self.worker_alerts.is_empty() {
            writeln!(f, "Alerts per worker:")?;
            for (worker, count) in &self.worker_alerts {
                writeln!(f, "  {}: {}", worker, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

//! 配置校验模块
//!
//! 校验规则：
//! - broker url 为 redis:// 或 rediss://，topic 非空
//! - 至少一个 bulk endpoint，且均为 http(s)
//! - 告警地址为 http(s)
//! - 所有地址都必须能被 `url::Url` 解析
//! - worker 数量与定时器间隔 > 0
//! - 资产表的键均为合法 IP 地址

use std::net::IpAddr;

use contracts::{ContractError, RelayConfig};
use url::Url;

/// 校验 RelayConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &RelayConfig) -> Result<(), ContractError> {
    validate_broker(config)?;
    validate_bulk(config)?;
    validate_alert(config)?;
    validate_workers(config)?;
    validate_assets(config)?;
    Ok(())
}

/// 校验 broker 配置
fn validate_broker(config: &RelayConfig) -> Result<(), ContractError> {
    let broker = &config.broker;
    check_url("broker.url", &broker.url, &["redis", "rediss"])?;
    if broker.topic.trim().is_empty() {
        return Err(ContractError::config_validation(
            "broker.topic",
            "topic cannot be empty",
        ));
    }
    if broker.channel_capacity == 0 {
        return Err(ContractError::config_validation(
            "broker.channel_capacity",
            "channel_capacity must be > 0",
        ));
    }
    Ok(())
}

/// 校验 bulk sink 配置
fn validate_bulk(config: &RelayConfig) -> Result<(), ContractError> {
    let bulk = &config.bulk;
    if bulk.endpoints.is_empty() {
        return Err(ContractError::config_validation(
            "bulk.endpoints",
            "at least one endpoint is required",
        ));
    }
    for (idx, endpoint) in bulk.endpoints.iter().enumerate() {
        check_url(&format!("bulk.endpoints[{}]", idx), endpoint, &["http", "https"])?;
    }
    if bulk.index_prefix.trim().is_empty() {
        return Err(ContractError::config_validation(
            "bulk.index_prefix",
            "index_prefix cannot be empty",
        ));
    }
    if bulk.max_batch_docs == 0 {
        return Err(ContractError::config_validation(
            "bulk.max_batch_docs",
            "max_batch_docs must be > 0",
        ));
    }
    if bulk.request_timeout_secs == 0 {
        return Err(ContractError::config_validation(
            "bulk.request_timeout_secs",
            "request_timeout_secs must be > 0",
        ));
    }
    Ok(())
}

/// 校验告警配置
fn validate_alert(config: &RelayConfig) -> Result<(), ContractError> {
    let alert = &config.alert;
    check_url("alert.url", &alert.url, &["http", "https"])?;
    if alert.request_timeout_secs == 0 {
        return Err(ContractError::config_validation(
            "alert.request_timeout_secs",
            "request_timeout_secs must be > 0",
        ));
    }
    Ok(())
}

/// 校验 worker 与定时器
fn validate_workers(config: &RelayConfig) -> Result<(), ContractError> {
    let workers = &config.workers;
    if workers.count == 0 {
        return Err(ContractError::config_validation(
            "workers.count",
            "count must be > 0",
        ));
    }
    if workers.report_interval_secs == 0 {
        return Err(ContractError::config_validation(
            "workers.report_interval_secs",
            "report_interval_secs must be > 0",
        ));
    }
    if workers.flush_interval_secs == 0 {
        return Err(ContractError::config_validation(
            "workers.flush_interval_secs",
            "flush_interval_secs must be > 0",
        ));
    }
    Ok(())
}

/// 校验资产表
fn validate_assets(config: &RelayConfig) -> Result<(), ContractError> {
    for (addr, name) in &config.assets {
        if addr.parse::<IpAddr>().is_err() {
            return Err(ContractError::config_validation(
                format!("assets[{}]", addr),
                "key is not a valid IP address",
            ));
        }
        if name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("assets[{}]", addr),
                "asset name cannot be empty",
            ));
        }
    }
    Ok(())
}

/// 可解析、scheme 在允许列表中、且带 host 的 URL
fn check_url(field: &str, value: &str, schemes: &[&str]) -> Result<(), ContractError> {
    let url = Url::parse(value).map_err(|e| {
        ContractError::config_validation(field, format!("invalid url '{value}': {e}"))
    })?;

    if !schemes.contains(&url.scheme()) {
        return Err(ContractError::config_validation(
            field,
            format!(
                "expected {} url, got '{value}'",
                schemes.iter().map(|s| format!("{s}://")).collect::<Vec<_>>().join(" or ")
            ),
        ));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ContractError::config_validation(
            field,
            format!("url '{value}' has no host"),
        ));
    }
    Ok(())
}

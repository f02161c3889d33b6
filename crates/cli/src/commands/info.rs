//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use contracts::RelayConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo<'a> {
    version: String,
    broker: BrokerInfo<'a>,
    bulk: BulkInfo<'a>,
    alert: AlertInfo<'a>,
    workers: WorkerInfo,
    asset_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    assets: Option<&'a BTreeMap<String, String>>,
}

#[derive(Serialize)]
struct BrokerInfo<'a> {
    url: &'a str,
    topic: &'a str,
    channel_capacity: usize,
}

#[derive(Serialize)]
struct BulkInfo<'a> {
    endpoints: &'a [String],
    index_pattern: String,
    max_batch_docs: usize,
}

#[derive(Serialize)]
struct AlertInfo<'a> {
    url: &'a str,
    environment: &'a str,
    timeout: u32,
}

#[derive(Serialize)]
struct WorkerInfo {
    count: usize,
    report_interval_secs: u64,
    flush_interval_secs: u64,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let config = if args.config.exists() {
        config_loader::ConfigLoader::load_from_path(&args.config).map_err(|e| {
            CliError::config_load(args.config.display().to_string(), e.to_string())
        })?
    } else {
        info!("Configuration file not found, showing built-in defaults");
        RelayConfig::default()
    };

    if args.json {
        let info = build_config_info(&config, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config, args);
    }

    Ok(())
}

fn build_config_info<'a>(config: &'a RelayConfig, args: &InfoArgs) -> ConfigInfo<'a> {
    ConfigInfo {
        version: format!("{:?}", config.version),
        broker: BrokerInfo {
            url: &config.broker.url,
            topic: &config.broker.topic,
            channel_capacity: config.broker.channel_capacity,
        },
        bulk: BulkInfo {
            endpoints: &config.bulk.endpoints,
            index_pattern: format!("{}-YYYY.MM.DD", config.bulk.index_prefix),
            max_batch_docs: config.bulk.max_batch_docs,
        },
        alert: AlertInfo {
            url: &config.alert.url,
            environment: &config.alert.environment,
            timeout: config.alert.timeout,
        },
        workers: WorkerInfo {
            count: config.workers.count,
            report_interval_secs: config.workers.report_interval_secs,
            flush_interval_secs: config.workers.flush_interval_secs,
        },
        asset_count: config.assets.len(),
        assets: args.assets.then_some(&config.assets),
    }
}

fn print_config_info(config: &RelayConfig, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  EVE Relay Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📡 Broker");
    println!("   ├─ Version: {:?}", config.version);
    println!("   ├─ URL: {}", config.broker.url);
    println!("   ├─ Topic: {}", config.broker.topic);
    println!("   └─ Queue capacity: {}", config.broker.channel_capacity);

    println!("\n🗄  Bulk Index");
    for endpoint in &config.bulk.endpoints {
        println!("   ├─ {}", endpoint);
    }
    println!("   ├─ Index: {}-YYYY.MM.DD", config.bulk.index_prefix);
    println!("   └─ Max batch: {} documents", config.bulk.max_batch_docs);

    println!("\n🚨 Alerts");
    println!("   ├─ URL: {}", config.alert.url);
    println!("   ├─ Environment: {}", config.alert.environment);
    println!("   └─ Timeout: {}s", config.alert.timeout);

    println!("\n⚙️  Workers");
    println!("   ├─ Count: {}", config.workers.count);
    println!("   ├─ Report every: {}s", config.workers.report_interval_secs);
    println!("   └─ Flush every: {}s", config.workers.flush_interval_secs);

    println!("\n🖥  Assets ({})", config.assets.len());
    if args.assets {
        let last = config.assets.len().saturating_sub(1);
        for (i, (ip, name)) in config.assets.iter().enumerate() {
            let prefix = if i == last { "└─" } else { "├─" };
            println!("   {} {} → {}", prefix, ip, name);
        }
    }

    println!();
}

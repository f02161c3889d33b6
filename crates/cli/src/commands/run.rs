//! `run` command implementation.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use config_loader::ConfigLoader;
use contracts::RelayConfig;
use tracing::{error, info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_relay(args: &RunArgs) -> Result<()> {
    let mut config = load_config(&args.config)?;
    apply_overrides(&mut config, args);
    ConfigLoader::validate(&config).map_err(|e| CliError::config_validation(e.to_string()))?;

    info!(
        broker = %config.broker.url,
        topic = %config.broker.topic,
        workers = config.workers.count,
        endpoints = config.bulk.endpoints.len(),
        alert_url = %config.alert.url,
        assets = config.assets.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        relay: config,
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    });

    let stats = pipeline.run(shutdown_signal()).await?;

    info!(
        processed = stats.metrics.total_processed,
        alerts_sent = stats.metrics.total_alerts_sent,
        documents = stats.metrics.documents_flushed,
        duration_secs = stats.duration.as_secs_f64(),
        reason = %stats.shutdown_reason,
        "Relay stopped"
    );
    stats.print_summary();

    Ok(())
}

/// Load the configuration file, or the built-in defaults if it does not exist
fn load_config(path: &Path) -> Result<RelayConfig, CliError> {
    if !path.exists() {
        warn!(config = %path.display(), "Configuration file not found, using built-in defaults");
        return Ok(RelayConfig::default());
    }

    info!(config = %path.display(), "Loading configuration");
    ConfigLoader::load_from_path(path)
        .map_err(|e| CliError::config_load(path.display().to_string(), e.to_string()))
}

fn apply_overrides(config: &mut RelayConfig, args: &RunArgs) {
    if let Some(ref url) = args.broker_url {
        info!(url = %url, "Overriding broker URL from CLI");
        config.broker.url = url.clone();
    }
    if let Some(ref topic) = args.topic {
        info!(topic = %topic, "Overriding topic from CLI");
        config.broker.topic = topic.clone();
    }
    if let Some(workers) = args.workers {
        info!(workers, "Overriding worker count from CLI");
        config.workers.count = workers;
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &RelayConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Broker:");
    println!("  URL: {}", config.broker.url);
    println!("  Topic: {}", config.broker.topic);
    println!("  Queue capacity: {}", config.broker.channel_capacity);

    println!("\nBulk index ({} endpoint(s)):", config.bulk.endpoints.len());
    for endpoint in &config.bulk.endpoints {
        println!("  - {}", endpoint);
    }
    println!("  Index: {}-YYYY.MM.DD", config.bulk.index_prefix);
    println!("  Max batch: {} documents", config.bulk.max_batch_docs);

    println!("\nAlerts:");
    println!("  URL: {}", config.alert.url);
    println!("  Environment: {}", config.alert.environment);
    println!("  Timeout: {}s", config.alert.timeout);

    println!("\nWorkers:");
    println!("  Count: {}", config.workers.count);
    println!("  Report every: {}s", config.workers.report_interval_secs);
    println!("  Flush every: {}s", config.workers.flush_interval_secs);

    println!("\nAssets: {}", config.assets.len());
    println!();
}

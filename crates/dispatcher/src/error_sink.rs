//! Error sink - drains asynchronous bulk failures

use contracts::BulkError;
use metrics::counter;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Log every bulk failure until all senders are gone
///
/// Resolves to the number of errors seen.
pub fn spawn_error_sink(rx: mpsc::UnboundedReceiver<BulkError>) -> JoinHandle<u64> {
    tokio::spawn(drain_errors(rx))
}

async fn drain_errors(mut rx: mpsc::UnboundedReceiver<BulkError>) -> u64 {
    let mut count = 0u64;
    while let Some(err) = rx.recv().await {
        count += 1;
        counter!("eve_relay_bulk_errors_total").increment(1);
        error!(error = %err, "Bulk indexing error");
    }
    debug!(errors = count, "Error sink closed");
    count
}

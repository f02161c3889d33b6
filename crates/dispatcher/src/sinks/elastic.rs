//! ElasticBulkSink - buffered NDJSON `_bulk` indexing

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use contracts::{BulkConfig, BulkDocument, BulkError, BulkSink, ContractError};
use metrics::counter;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::error::DispatcherError;

/// Receiving end of the sink's asynchronous error channel
pub type BulkErrorReceiver = mpsc::UnboundedReceiver<BulkError>;

/// Bulk-indexing sink for Elasticsearch-compatible endpoints
///
/// Documents are buffered in memory and sent on `flush`, split into requests
/// of at most `max_batch_docs` documents, round-robin across endpoints.
/// Failures go to the error channel handed out by [`ElasticBulkSink::new`].
pub struct ElasticBulkSink {
    name: String,
    client: reqwest::Client,
    endpoints: Vec<String>,
    next_endpoint: AtomicUsize,
    max_batch_docs: usize,
    buffer: Mutex<Vec<BulkDocument>>,
    errors: mpsc::UnboundedSender<BulkError>,
}

/// Subset of the `_bulk` response we inspect
#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    #[serde(default)]
    status: u16,
    #[serde(default)]
    error: Option<Value>,
}

impl BulkResponse {
    /// Failed item count and the first failure reason
    fn rejections(&self) -> (usize, String) {
        let mut failed = 0;
        let mut reason = None;
        for item in self.items.iter().flat_map(|op| op.values()) {
            if item.error.is_some() || item.status >= 300 {
                failed += 1;
                if reason.is_none() {
                    reason = item.error.as_ref().map(describe_item_error);
                }
            }
        }
        (failed, reason.unwrap_or_else(|| "unknown".to_string()))
    }
}

fn describe_item_error(error: &Value) -> String {
    match (error.get("type"), error.get("reason")) {
        (Some(Value::String(kind)), Some(Value::String(reason))) => format!("{kind}: {reason}"),
        _ => error.to_string(),
    }
}

impl ElasticBulkSink {
    /// Create the sink and its error channel
    #[instrument(name = "elastic_sink_new", skip(config), fields(endpoints = config.endpoints.len()))]
    pub fn new(config: &BulkConfig) -> Result<(Self, BulkErrorReceiver), DispatcherError> {
        if config.endpoints.is_empty() {
            return Err(DispatcherError::sink_creation(
                "elasticsearch",
                "no endpoints configured",
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| DispatcherError::sink_creation("elasticsearch", e.to_string()))?;

        let (errors, rx) = mpsc::unbounded_channel();

        let sink = Self {
            name: "elasticsearch".to_string(),
            client,
            endpoints: config
                .endpoints
                .iter()
                .map(|e| e.trim_end_matches('/').to_string())
                .collect(),
            next_endpoint: AtomicUsize::new(0),
            max_batch_docs: config.max_batch_docs.max(1),
            buffer: Mutex::new(Vec::new()),
            errors,
        };
        Ok((sink, rx))
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Verify at least one endpoint answers
    ///
    /// # Errors
    /// `ContractError::SinkConnection` if none does.
    #[instrument(name = "elastic_sink_check_connection", skip(self))]
    pub async fn check_connection(&self) -> Result<(), ContractError> {
        let mut reachable = 0usize;

        for endpoint in &self.endpoints {
            match self.client.get(endpoint).send().await {
                Ok(response) if response.status().is_success() => {
                    reachable += 1;
                    info!(endpoint = %endpoint, "Bulk endpoint reachable");
                }
                Ok(response) => {
                    warn!(endpoint = %endpoint, status = %response.status(), "Bulk endpoint unhealthy");
                }
                Err(e) => {
                    warn!(endpoint = %endpoint, error = %e, "Bulk endpoint unreachable");
                }
            }
        }

        if reachable == 0 {
            return Err(ContractError::sink_connection(
                &self.name,
                format!("none of {} endpoint(s) answered", self.endpoints.len()),
            ));
        }
        Ok(())
    }

    fn take_buffer(&self) -> Vec<BulkDocument> {
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *buffer)
    }

    fn pick_endpoint(&self) -> &str {
        let i = self.next_endpoint.fetch_add(1, Ordering::Relaxed);
        &self.endpoints[i % self.endpoints.len()]
    }

    fn report(&self, err: BulkError) {
        if let Err(mpsc::error::SendError(err)) = self.errors.send(err) {
            // Error sink already gone (shutdown); keep the failure visible
            error!(sink = %self.name, error = %err, "Bulk error");
        }
    }

    async fn send_batch(&self, endpoint: &str, body: Vec<u8>, count: usize) {
        let url = format!("{endpoint}/_bulk");
        let response = match self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                self.report(BulkError::Request {
                    endpoint: endpoint.to_string(),
                    message: e.to_string(),
                });
                return;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            self.report(BulkError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
            return;
        }

        match response.json::<BulkResponse>().await {
            Ok(parsed) if parsed.errors => {
                let (failed, reason) = parsed.rejections();
                counter!("eve_relay_documents_indexed_total")
                    .increment(count.saturating_sub(failed) as u64);
                self.report(BulkError::Rejected {
                    endpoint: endpoint.to_string(),
                    failed,
                    total: count,
                    reason,
                });
            }
            Ok(_) => {
                counter!("eve_relay_documents_indexed_total").increment(count as u64);
                debug!(sink = %self.name, endpoint = %endpoint, documents = count, "Bulk request indexed");
            }
            Err(e) => self.report(BulkError::UnreadableResponse {
                endpoint: endpoint.to_string(),
                documents: count,
                message: e.to_string(),
            }),
        }
    }
}

/// NDJSON body: one action line and one source line per document
fn encode_batch(documents: &[BulkDocument]) -> Result<Vec<u8>, BulkError> {
    let mut body = Vec::with_capacity(documents.len() * 512);
    for doc in documents {
        let encode_err = |e: serde_json::Error| BulkError::Encode {
            index: doc.index.clone(),
            message: e.to_string(),
        };
        serde_json::to_writer(&mut body, &json!({ "index": { "_index": doc.index } }))
            .map_err(encode_err)?;
        body.push(b'\n');
        serde_json::to_writer(&mut body, &doc.body).map_err(encode_err)?;
        body.push(b'\n');
    }
    Ok(body)
}

impl BulkSink for ElasticBulkSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_document(&self, document: BulkDocument) {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(document);
    }

    async fn flush(&self) -> usize {
        let documents = self.take_buffer();
        if documents.is_empty() {
            return 0;
        }

        for chunk in documents.chunks(self.max_batch_docs) {
            let endpoint = self.pick_endpoint().to_string();
            match encode_batch(chunk) {
                Ok(body) => self.send_batch(&endpoint, body, chunk.len()).await,
                Err(e) => self.report(e),
            }
        }

        debug!(sink = %self.name, documents = documents.len(), "Flushed bulk buffer");
        documents.len()
    }

    fn pending(&self) -> usize {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn config(endpoints: Vec<String>, max_batch_docs: usize) -> BulkConfig {
        BulkConfig {
            endpoints,
            max_batch_docs,
            ..BulkConfig::default()
        }
    }

    fn doc(i: usize) -> BulkDocument {
        BulkDocument::new("suricata-2024.03.01", json!({ "n": i }))
    }

    #[test]
    fn test_encode_batch_ndjson() {
        let body = encode_batch(&[doc(1), doc(2)]).unwrap();
        let text = String::from_utf8(body).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], r#"{"index":{"_index":"suricata-2024.03.01"}}"#);
        assert_eq!(lines[1], r#"{"n":1}"#);
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_rejections() {
        let response: BulkResponse = serde_json::from_value(json!({
            "errors": true,
            "items": [
                { "index": { "status": 201 } },
                { "index": { "status": 400, "error": { "type": "mapper_parsing_exception", "reason": "bad field" } } }
            ]
        }))
        .unwrap();
        let (failed, reason) = response.rejections();
        assert_eq!(failed, 1);
        assert_eq!(reason, "mapper_parsing_exception: bad field");
    }

    #[test]
    fn test_new_without_endpoints_fails() {
        assert!(ElasticBulkSink::new(&config(Vec::new(), 10)).is_err());
    }

    #[tokio::test]
    async fn test_add_and_pending() {
        let (sink, _rx) = ElasticBulkSink::new(&config(vec!["http://127.0.0.1:9".into()], 10)).unwrap();
        sink.add_document(doc(1));
        sink.add_document(doc(2));
        assert_eq!(sink.pending(), 2);
    }

    #[tokio::test]
    async fn test_flush_empty_buffer_sends_nothing() {
        let mut server = Server::new_async().await;
        let mock = server.mock("POST", "/_bulk").expect(0).create_async().await;

        let (sink, _rx) = ElasticBulkSink::new(&config(vec![server.url()], 10)).unwrap();
        assert_eq!(sink.flush().await, 0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_flush_splits_into_batches() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/_bulk")
            .match_header("content-type", "application/x-ndjson")
            .with_status(200)
            .with_body(r#"{"took":1,"errors":false,"items":[]}"#)
            .expect(3)
            .create_async()
            .await;

        let (sink, mut rx) = ElasticBulkSink::new(&config(vec![server.url()], 2)).unwrap();
        for i in 0..5 {
            sink.add_document(doc(i));
        }

        assert_eq!(sink.flush().await, 5);
        assert_eq!(sink.pending(), 0);
        mock.assert_async().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_flush_body_contains_documents() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/_bulk")
            .match_body(Matcher::Regex(r#"\{"n":7\}"#.to_string()))
            .with_status(200)
            .with_body(r#"{"errors":false}"#)
            .create_async()
            .await;

        let (sink, _rx) = ElasticBulkSink::new(&config(vec![server.url()], 10)).unwrap();
        sink.add_document(doc(7));
        sink.flush().await;
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/_bulk")
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;

        let (sink, mut rx) = ElasticBulkSink::new(&config(vec![server.url()], 10)).unwrap();
        sink.add_document(doc(1));
        assert_eq!(sink.flush().await, 1);

        match rx.recv().await {
            Some(BulkError::Status { status, body, .. }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "unavailable");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_item_rejections_are_reported() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/_bulk")
            .with_status(200)
            .with_body(
                r#"{"errors":true,"items":[{"index":{"status":400,"error":{"type":"x","reason":"y"}}}]}"#,
            )
            .create_async()
            .await;

        let (sink, mut rx) = ElasticBulkSink::new(&config(vec![server.url()], 10)).unwrap();
        sink.add_document(doc(1));
        sink.flush().await;

        assert!(matches!(
            rx.recv().await,
            Some(BulkError::Rejected { failed: 1, total: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_unreadable_success_body_is_reported() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/_bulk")
            .with_status(200)
            .with_body("<html>proxy login</html>")
            .create_async()
            .await;

        let (sink, mut rx) = ElasticBulkSink::new(&config(vec![server.url()], 10)).unwrap();
        sink.add_document(doc(1));
        sink.add_document(doc(2));
        assert_eq!(sink.flush().await, 2);

        match rx.recv().await {
            Some(BulkError::UnreadableResponse {
                endpoint,
                documents,
                ..
            }) => {
                assert_eq!(endpoint, server.url());
                assert_eq!(documents, 2);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_round_robin_endpoints() {
        let mut first = Server::new_async().await;
        let mut second = Server::new_async().await;
        let ok = r#"{"errors":false}"#;
        let m1 = first.mock("POST", "/_bulk").with_body(ok).expect(1).create_async().await;
        let m2 = second.mock("POST", "/_bulk").with_body(ok).expect(1).create_async().await;

        let (sink, _rx) =
            ElasticBulkSink::new(&config(vec![first.url(), second.url()], 1)).unwrap();
        sink.add_document(doc(1));
        sink.add_document(doc(2));
        sink.flush().await;

        m1.assert_async().await;
        m2.assert_async().await;
    }

    #[tokio::test]
    async fn test_check_connection() {
        let mut server = Server::new_async().await;
        let _mock = server.mock("GET", "/").with_status(200).create_async().await;

        let (sink, _rx) = ElasticBulkSink::new(&config(
            vec!["http://127.0.0.1:9".to_string(), server.url()],
            10,
        ))
        .unwrap();
        sink.check_connection().await.unwrap();
    }

    #[tokio::test]
    async fn test_check_connection_fails_when_nothing_answers() {
        let (sink, _rx) =
            ElasticBulkSink::new(&config(vec!["http://127.0.0.1:9".to_string()], 10)).unwrap();
        let err = sink.check_connection().await.unwrap_err();
        assert!(matches!(err, ContractError::SinkConnection { .. }));
    }
}

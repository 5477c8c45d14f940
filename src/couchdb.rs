use crate::config::CouchDbConfig;
use crate::error::SinkError;
use crate::record::{asctime, LogDocument, LogRecord, DOC_TYPE};
use crate::sink::{LogSink, Rejection, SubmitOutcome};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::net::{IpAddr, Ipv4Addr};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use urlencoding;

/// Write option appended to every single-document POST. `batch=ok` lets
/// the server defer the commit and acknowledge with 202.
const WRITE_OPTIONS: &str = "batch=ok";

/// Severity used by `emit_raw` callers that don't care to pick one.
pub const RAW_DEFAULT_LEVEL: &str = "ERROR";

/// CouchDB implementation of [`LogSink`] over the HTTP document API.
///
/// One document is written per record via `POST <base>/<db>?batch=ok`,
/// or buffered and written through `_bulk_docs` when bulk mode is on.
/// The UUID pool and the bulk buffer are owned by the sink and guarded
/// by async mutexes, so the sink can be shared across tasks.
#[derive(Debug)]
pub struct CouchDbSink {
    client: Client,
    config: CouchDbConfig,
    uuids: Mutex<Vec<String>>,
    bulk_buffer: Mutex<Vec<LogDocument>>,
}

#[derive(Deserialize)]
struct WriteAck {
    #[serde(default)]
    ok: bool,
    id: Option<String>,
    rev: Option<String>,
}

#[derive(Deserialize)]
struct UuidBatch {
    uuids: Vec<String>,
}

#[derive(Serialize)]
struct BulkWrite<'a> {
    docs: &'a [LogDocument],
}

impl CouchDbSink {
    /// Construct a sink bound to one database and verify the backend is
    /// reachable.
    ///
    /// The liveness probe issues `GET <base>/<db>` and requires a 2xx
    /// status with a JSON-object body; anything else fails construction
    /// with [`SinkError::ProbeFailed`]. There is no point handing out a
    /// sink that can only drop records.
    pub async fn connect(config: CouchDbConfig) -> Result<Self, SinkError> {
        if config.db_name.trim().is_empty() {
            return Err(SinkError::EmptyDatabaseName);
        }

        let mut builder = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout);
        if config.ipv4_only {
            builder = builder.local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        }
        let client = builder.build()?;

        let sink = Self {
            client,
            config,
            uuids: Mutex::new(Vec::new()),
            bulk_buffer: Mutex::new(Vec::new()),
        };
        sink.probe().await?;
        Ok(sink)
    }

    fn db_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.config.db_name)
        )
    }

    async fn probe(&self) -> Result<(), SinkError> {
        let url = self.db_url();
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SinkError::ProbeFailed {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SinkError::ProbeFailed {
                url,
                reason: format!("status {}", status),
            });
        }

        let body = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(serde_json::Value::Object(_)) => {
                debug!(%url, "liveness probe ok");
                Ok(())
            }
            _ => Err(SinkError::ProbeFailed {
                url,
                reason: "response body is not a JSON object".to_string(),
            }),
        }
    }

    fn document_for(&self, record: &LogRecord, id: Option<String>) -> LogDocument {
        LogDocument {
            id,
            doc_type: DOC_TYPE,
            level: record.level.clone(),
            sender_name: self.config.sender_name.clone(),
            date: asctime(record.timestamp.unwrap_or_else(Utc::now)),
            message: record.message.clone(),
            categories: self.config.categories.clone(),
        }
    }

    /// Submit one record.
    ///
    /// Acceptance and recoverable rejections (HTTP 400, untrusted or
    /// unacknowledged response bodies) come back as [`SubmitOutcome`];
    /// transport failures and unexpected statuses are errors.
    pub async fn submit(&self, record: &LogRecord) -> Result<SubmitOutcome, SinkError> {
        let id = if self.config.assign_ids {
            Some(self.next_id().await?)
        } else {
            None
        };
        let doc = self.document_for(record, id);

        if self.config.bulk {
            return self.buffer_for_bulk(doc).await;
        }

        let body = serde_json::to_string(&doc)?;
        let url = format!("{}?{}", self.db_url(), WRITE_OPTIONS);
        let resp = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.clone())
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
        match status.as_u16() {
            200 | 201 | 202 => Ok(read_ack(&text)),
            400 => {
                warn!(document = %body, "store rejected log document as malformed");
                Ok(SubmitOutcome::Rejected(Rejection::BadRequest { body: text }))
            }
            _ => Err(SinkError::UnexpectedStatus { status, body: text }),
        }
    }

    /// Build a synthetic record from a bare message and submit it with
    /// the current timestamp. Pass [`RAW_DEFAULT_LEVEL`] to match the
    /// classic ad-hoc error severity.
    pub async fn emit_raw(
        &self,
        message: impl Into<String>,
        level: impl Into<String>,
    ) -> Result<SubmitOutcome, SinkError> {
        let record = LogRecord::new(level, message).with_timestamp(Utc::now());
        self.submit(&record).await
    }

    /// Pop one server-issued identifier, refilling the pool with a batch
    /// of `uuid_batch` fresh ones when it runs dry.
    ///
    /// The pool lock is held across the refill, so a depleted pool costs
    /// exactly one `_uuids` round trip no matter how many callers race.
    pub async fn next_id(&self) -> Result<String, SinkError> {
        let mut pool = self.uuids.lock().await;
        if pool.is_empty() {
            let url = format!(
                "{}/_uuids?count={}",
                self.config.base_url.trim_end_matches('/'),
                self.config.uuid_batch
            );
            let resp = self.client.get(&url).send().await?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
                return Err(SinkError::UnexpectedStatus { status, body });
            }
            let text = resp.text().await?;
            let batch: UuidBatch = serde_json::from_str(&text)?;
            pool.extend(batch.uuids);
        }
        pool.pop().ok_or(SinkError::EmptyUuidBatch)
    }

    async fn buffer_for_bulk(&self, doc: LogDocument) -> Result<SubmitOutcome, SinkError> {
        let batch = {
            let mut buffer = self.bulk_buffer.lock().await;
            buffer.push(doc);
            if buffer.len() < self.config.bulk_threshold {
                return Ok(SubmitOutcome::Buffered);
            }
            std::mem::take(&mut *buffer)
        };
        self.write_bulk(&batch).await
    }

    async fn write_bulk(&self, docs: &[LogDocument]) -> Result<SubmitOutcome, SinkError> {
        let url = format!("{}/_bulk_docs", self.db_url());
        let body = serde_json::to_string(&BulkWrite { docs })?;
        let resp = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
        match status.as_u16() {
            200 | 201 | 202 => {
                debug!(count = docs.len(), "bulk write accepted");
                Ok(SubmitOutcome::Accepted { id: None, rev: None })
            }
            400 => {
                warn!(body = %text, "store rejected bulk write as malformed");
                Ok(SubmitOutcome::Rejected(Rejection::BadRequest { body: text }))
            }
            _ => Err(SinkError::UnexpectedStatus { status, body: text }),
        }
    }

    /// Write out whatever the bulk buffer still holds.
    pub async fn flush(&self) -> Result<(), SinkError> {
        let batch = std::mem::take(&mut *self.bulk_buffer.lock().await);
        if batch.is_empty() {
            return Ok(());
        }
        if let SubmitOutcome::Rejected(rejection) = self.write_bulk(&batch).await? {
            warn!(?rejection, "bulk flush was rejected by the store");
        }
        Ok(())
    }
}

/// Interpret a 2xx response body as a write acknowledgement.
///
/// The body is only parsed when it superficially looks like a JSON
/// object; everything else is reported untrusted, never evaluated.
fn read_ack(body: &str) -> SubmitOutcome {
    let trimmed = body.trim();
    if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
        return SubmitOutcome::Rejected(Rejection::UntrustedResponse {
            body: body.to_string(),
        });
    }

    match serde_json::from_str::<WriteAck>(trimmed) {
        Ok(ack) if ack.ok => SubmitOutcome::Accepted {
            id: ack.id,
            rev: ack.rev,
        },
        Ok(_) => SubmitOutcome::Rejected(Rejection::NotAcknowledged {
            body: body.to_string(),
        }),
        Err(_) => SubmitOutcome::Rejected(Rejection::UntrustedResponse {
            body: body.to_string(),
        }),
    }
}

#[async_trait]
impl LogSink for CouchDbSink {
    async fn submit(
        &self,
        record: &LogRecord,
    ) -> Result<SubmitOutcome, Box<dyn Error + Send + Sync>> {
        CouchDbSink::submit(self, record).await.map_err(Into::into)
    }

    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        CouchDbSink::flush(self).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_sink(config: CouchDbConfig) -> CouchDbSink {
        CouchDbSink {
            client: Client::new(),
            config,
            uuids: Mutex::new(Vec::new()),
            bulk_buffer: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn ack_with_ok_true_is_accepted() {
        let outcome = read_ack(r#"{"ok":true,"id":"abc","rev":"1-def"}"#);
        assert_eq!(
            outcome,
            SubmitOutcome::Accepted {
                id: Some("abc".to_string()),
                rev: Some("1-def".to_string()),
            }
        );
    }

    #[test]
    fn ack_without_ok_is_not_acknowledged() {
        let outcome = read_ack(r#"{"error":"conflict"}"#);
        assert!(matches!(
            outcome,
            SubmitOutcome::Rejected(Rejection::NotAcknowledged { .. })
        ));
    }

    #[test]
    fn non_object_body_is_untrusted() {
        let outcome = read_ack("everything is fine, trust me");
        assert!(matches!(
            outcome,
            SubmitOutcome::Rejected(Rejection::UntrustedResponse { .. })
        ));
    }

    #[test]
    fn braced_garbage_is_untrusted() {
        let outcome = read_ack("{not json at all}");
        assert!(matches!(
            outcome,
            SubmitOutcome::Rejected(Rejection::UntrustedResponse { .. })
        ));
    }

    #[test]
    fn document_carries_configured_metadata() {
        let sink = test_sink(CouchDbConfig::new("applogs"));
        let record = LogRecord::new("INFO", "hello");
        let doc = sink.document_for(&record, None);

        assert_eq!(doc.doc_type, "LogMessage");
        assert_eq!(doc.level, "INFO");
        assert_eq!(doc.message, "hello");
        assert_eq!(doc.sender_name, "Rust");
        assert_eq!(doc.categories, ["test", "logging", "couchdb"]);
        assert!(doc.id.is_none());
        // No timestamp on the record: the sink stamps the current time.
        assert!(!doc.date.is_empty());
    }

    #[test]
    fn db_name_is_percent_encoded_in_urls() {
        let sink = test_sink(CouchDbConfig::new("app logs"));
        assert_eq!(sink.db_url(), "http://localhost:5984/app%20logs");
    }
}

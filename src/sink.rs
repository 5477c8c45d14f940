use crate::record::LogRecord;
use async_trait::async_trait;
use std::error::Error;

/// Result of one submission that completed without a fatal error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The store acknowledged the write.
    Accepted {
        id: Option<String>,
        rev: Option<String>,
    },
    /// Bulk mode queued the document locally; nothing was sent yet.
    Buffered,
    /// The store answered, but the document was not persisted.
    Rejected(Rejection),
}

impl SubmitOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted { .. })
    }
}

/// Recoverable submission failures. Each carries the raw response body
/// for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// HTTP 400: the store considered the document malformed.
    BadRequest { body: String },
    /// The response body did not look like a JSON object and was never
    /// parsed.
    UntrustedResponse { body: String },
    /// The response parsed, but its `ok` field was false or missing.
    NotAcknowledged { body: String },
}

/// Asynchronous destination for [`LogRecord`]s.
///
/// Implementations transport records to a concrete backend. `submit`
/// distinguishes three cases: the record was accepted, the backend
/// rejected it in a recoverable way (returned inside `Ok`), or the call
/// itself failed (transport breakdown, unexpected status) and the error
/// propagates.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Send a single log record to the underlying backend.
    async fn submit(
        &self,
        record: &LogRecord,
    ) -> Result<SubmitOutcome, Box<dyn Error + Send + Sync>>;

    /// Flush any locally buffered records, if the backend buffers.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}

use crate::record::LogRecord;
use crate::sink::{LogSink, SubmitOutcome};
use async_trait::async_trait;
use std::error::Error;

/// A sink that accepts and drops every record.
///
/// Useful for measuring caller-side overhead without any network I/O,
/// and for tests that don't care about persistence.
#[derive(Clone, Default)]
pub struct NoopSink;

#[async_trait]
impl LogSink for NoopSink {
    async fn submit(
        &self,
        _record: &LogRecord,
    ) -> Result<SubmitOutcome, Box<dyn Error + Send + Sync>> {
        Ok(SubmitOutcome::Accepted { id: None, rev: None })
    }
}

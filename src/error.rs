use reqwest::StatusCode;

/// Failures that abort a sink call.
///
/// Recoverable conditions (HTTP 400, an untrusted or unacknowledged
/// response body) are not errors; they come back as
/// [`crate::sink::SubmitOutcome::Rejected`] so callers can keep logging.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },

    #[error("database name must not be empty")]
    EmptyDatabaseName,

    #[error("liveness probe of {url} failed: {reason}")]
    ProbeFailed { url: String, reason: String },

    #[error("invalid response body: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    #[error("uuid batch from the server was empty")]
    EmptyUuidBatch,
}

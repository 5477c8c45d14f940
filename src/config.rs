use std::time::Duration;

/// CouchDB base HTTP URL, e.g. `http://localhost:5984`.
pub const LOG_SINK_COUCHDB_URL_ENV: &str = "LOG_SINK_COUCHDB_URL";

/// Target database (collection) name.
pub const LOG_SINK_COUCHDB_DB_ENV: &str = "LOG_SINK_COUCHDB_DB";

/// Optional sender name recorded in each document.
pub const LOG_SINK_SENDER_NAME_ENV: &str = "LOG_SINK_SENDER_NAME";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Configuration for [`crate::couchdb::CouchDbSink`].
///
/// Defaults mirror a local single-node CouchDB: base URL
/// `http://localhost:5984`, UUID batches of 100, bulk mode off.
#[derive(Clone, Debug)]
pub struct CouchDbConfig {
    /// Base URL without a trailing path, e.g. "http://localhost:5984".
    pub base_url: String,
    /// Database the documents are written into. Must be non-empty.
    pub db_name: String,
    /// Value of the `senderName` document field.
    pub sender_name: String,
    /// Fixed tags attached to every document, in order.
    pub categories: Vec<String>,
    /// Number of identifiers fetched per `_uuids` request.
    pub uuid_batch: usize,
    /// Assign a client-side `_id` from the UUID pool on every submit.
    pub assign_ids: bool,
    /// Accumulate documents and write them through `_bulk_docs`.
    pub bulk: bool,
    /// Buffered documents that trigger a bulk write.
    pub bulk_threshold: usize,
    /// Upper bound on any single HTTP request.
    pub request_timeout: Duration,
    /// Bind the client to an IPv4 local address so hosts without working
    /// IPv6 never wait on an AAAA connect attempt.
    pub ipv4_only: bool,
}

impl CouchDbConfig {
    pub fn new(db_name: impl Into<String>) -> Self {
        Self {
            base_url: "http://localhost:5984".to_string(),
            db_name: db_name.into(),
            sender_name: "Rust".to_string(),
            categories: vec![
                "test".to_string(),
                "logging".to_string(),
                "couchdb".to_string(),
            ],
            uuid_batch: 100,
            assign_ids: false,
            bulk: false,
            bulk_threshold: 50,
            request_timeout: Duration::from_secs(5),
            ipv4_only: false,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build a config from `LOG_SINK_COUCHDB_*` environment variables,
    /// falling back to the defaults above.
    pub fn from_env() -> Self {
        let db_name = env_or(LOG_SINK_COUCHDB_DB_ENV, "logs");
        let mut config = Self::new(db_name);
        config.base_url = env_or(LOG_SINK_COUCHDB_URL_ENV, &config.base_url);
        config.sender_name = env_or(LOG_SINK_SENDER_NAME_ENV, &config.sender_name);
        config
    }

    /// Parse a DSN of the form `couchdb://host:port/db`.
    ///
    /// The scheme is rewritten to plain HTTP; everything after the first
    /// path segment is ignored.
    pub fn from_dsn(dsn: &str) -> Result<Self, DsnError> {
        let lower = dsn.to_ascii_lowercase();
        if !lower.starts_with("couchdb://") {
            return Err(DsnError::UnknownScheme);
        }

        let rest = &dsn["couchdb://".len()..];
        let (host, db_name) = match rest.split_once('/') {
            Some((host, db)) => (host, db.split('/').next().unwrap_or("")),
            None => (rest, ""),
        };

        if host.is_empty() {
            return Err(DsnError::MissingHost);
        }
        if db_name.is_empty() {
            return Err(DsnError::MissingDatabase);
        }

        Ok(Self::new(db_name).with_base_url(format!("http://{}", host)))
    }
}

/// Error type returned when parsing a DSN.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DsnError {
    #[error("unknown or unsupported DSN scheme")]
    UnknownScheme,

    #[error("DSN is missing a host")]
    MissingHost,

    #[error("DSN is missing a database name")]
    MissingDatabase,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsn_parses_host_and_database() {
        let config = CouchDbConfig::from_dsn("couchdb://db.internal:5984/applogs").unwrap();
        assert_eq!(config.base_url, "http://db.internal:5984");
        assert_eq!(config.db_name, "applogs");
    }

    #[test]
    fn dsn_ignores_trailing_path_segments() {
        let config = CouchDbConfig::from_dsn("couchdb://localhost:5984/applogs/extra").unwrap();
        assert_eq!(config.db_name, "applogs");
    }

    #[test]
    fn dsn_rejects_foreign_schemes() {
        assert_eq!(
            CouchDbConfig::from_dsn("postgres://localhost/db").unwrap_err(),
            DsnError::UnknownScheme
        );
    }

    #[test]
    fn dsn_requires_a_database() {
        assert_eq!(
            CouchDbConfig::from_dsn("couchdb://localhost:5984").unwrap_err(),
            DsnError::MissingDatabase
        );
        assert_eq!(
            CouchDbConfig::from_dsn("couchdb:///db").unwrap_err(),
            DsnError::MissingHost
        );
    }
}

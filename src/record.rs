use chrono::{DateTime, Utc};
use serde::Serialize;

/// `doc_type` value stamped into every stored document.
pub const DOC_TYPE: &str = "LogMessage";

/// A single log record handed to the sink by the host application.
///
/// The sink never mutates a record; it only reads it while building the
/// document for one submission.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: String,
    pub message: String,
    /// When absent, the sink stamps the document with the current
    /// wall-clock time instead.
    pub timestamp: Option<DateTime<Utc>>,
}

impl LogRecord {
    pub fn new(level: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            message: message.into(),
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Wire shape of a stored log entry.
///
/// `_id` is only present when the sink is configured to assign
/// client-side identifiers from its UUID pool; by default CouchDB
/// assigns the identifier on write.
#[derive(Debug, Clone, Serialize)]
pub struct LogDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub doc_type: &'static str,
    pub level: String,
    #[serde(rename = "senderName")]
    pub sender_name: String,
    pub date: String,
    pub message: String,
    pub categories: Vec<String>,
}

/// Format a timestamp the way `asctime` does, e.g.
/// `Sun Aug 30 13:05:12 2026`.
pub fn asctime(ts: DateTime<Utc>) -> String {
    ts.format("%a %b %e %H:%M:%S %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn asctime_matches_expected_layout() {
        let ts = Utc.with_ymd_and_hms(2026, 8, 30, 13, 5, 12).unwrap();
        assert_eq!(asctime(ts), "Sun Aug 30 13:05:12 2026");
    }

    #[test]
    fn document_serializes_with_wire_field_names() {
        let doc = LogDocument {
            id: None,
            doc_type: DOC_TYPE,
            level: "INFO".to_string(),
            sender_name: "Rust".to_string(),
            date: "Sun Aug 30 13:05:12 2026".to_string(),
            message: "hello".to_string(),
            categories: vec!["test".to_string()],
        };

        let value = serde_json::to_value(&doc).unwrap();
        let obj = value.as_object().unwrap();

        assert_eq!(
            obj.keys().map(|k| k.as_str()).collect::<Vec<_>>(),
            ["categories", "date", "doc_type", "level", "message", "senderName"]
        );
        assert_eq!(obj["doc_type"], "LogMessage");
        assert_eq!(obj["senderName"], "Rust");
    }

    #[test]
    fn document_id_appears_only_when_assigned() {
        let doc = LogDocument {
            id: Some("1ebb4fe4f0cc33922626e126220001f0".to_string()),
            doc_type: DOC_TYPE,
            level: "ERROR".to_string(),
            sender_name: "Rust".to_string(),
            date: "Sun Aug 30 13:05:12 2026".to_string(),
            message: "boom".to_string(),
            categories: vec![],
        };

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["_id"], "1ebb4fe4f0cc33922626e126220001f0");
    }
}

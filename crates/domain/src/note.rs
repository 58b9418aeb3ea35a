use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A timestamped, append-only remark on an order or shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub timestamp: DateTime<Utc>,
    pub author: Option<String>,
    pub text: String,
}

impl Note {
    pub fn new(text: impl Into<String>, author: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            author,
            text: text.into(),
        }
    }
}

impl std::fmt::Display for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%Y-%m-%d %H:%M:%S"), self.text)
    }
}

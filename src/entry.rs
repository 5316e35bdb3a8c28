//! Normalized entry model
//!
//! Every captured observation is an [`Entry`]: a storage-assigned id, a
//! creation timestamp and exactly one typed payload. Serialized form:
//!
//! ```text
//! {"id": "...", "type": "exception", "timestamp": "...", "exception": {...}}
//! ```

use crate::error::TelescopeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Entry type tag, the sole discriminator for filtering and live watches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Request,
    Exception,
    Query,
    Custom,
}

impl EntryType {
    pub const ALL: [EntryType; 4] = [
        EntryType::Request,
        EntryType::Exception,
        EntryType::Query,
        EntryType::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Exception => "exception",
            Self::Query => "query",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = TelescopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "request" => Ok(Self::Request),
            "exception" => Ok(Self::Exception),
            "query" => Ok(Self::Query),
            "custom" => Ok(Self::Custom),
            other => Err(TelescopeError::InvalidArgument(format!(
                "unknown entry type: {}",
                other
            ))),
        }
    }
}

/// Inbound request observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEntry {
    pub method: String,
    pub path: String,
    pub status: u16,
    /// Duration in milliseconds
    pub duration: u64,
    pub correlation_id: Option<String>,
}

/// Captured error or panic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionEntry {
    pub message: String,
    pub stack: String,
    pub error_class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Sanitized source lines around `line`, keyed by line number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

/// Instrumented data-store operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryEntry {
    pub operation: String,
    pub query: String,
    pub collection: String,
    /// Duration in milliseconds
    pub duration: u64,
    /// Truncated JSON preview of the operation result
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub correlation_id: Option<String>,
}

/// Application-defined record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomEntry {
    pub name: String,
    pub data: serde_json::Value,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

/// Typed payload; the serde tag doubles as the entry `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EntryPayload {
    Request { request: RequestEntry },
    Exception { exception: ExceptionEntry },
    Query { query: QueryEntry },
    Custom { custom: CustomEntry },
}

impl EntryPayload {
    pub fn entry_type(&self) -> EntryType {
        match self {
            Self::Request { .. } => EntryType::Request,
            Self::Exception { .. } => EntryType::Exception,
            Self::Query { .. } => EntryType::Query,
            Self::Custom { .. } => EntryType::Custom,
        }
    }

    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            Self::Request { request } => request.correlation_id.as_deref(),
            Self::Exception { exception } => exception.correlation_id.as_deref(),
            Self::Query { query } => query.correlation_id.as_deref(),
            Self::Custom { custom } => custom.correlation_id.as_deref(),
        }
    }
}

/// An entry that has not been stored yet (no id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EntryPayload,
}

impl NewEntry {
    pub fn new(payload: EntryPayload) -> Self {
        Self {
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn request(request: RequestEntry) -> Self {
        Self::new(EntryPayload::Request { request })
    }

    pub fn exception(exception: ExceptionEntry) -> Self {
        Self::new(EntryPayload::Exception { exception })
    }

    pub fn query(query: QueryEntry) -> Self {
        Self::new(EntryPayload::Query { query })
    }

    pub fn custom(custom: CustomEntry) -> Self {
        Self::new(EntryPayload::Custom { custom })
    }

    pub fn entry_type(&self) -> EntryType {
        self.payload.entry_type()
    }

    /// Attach a storage-assigned id
    pub fn into_entry(self, id: impl Into<String>) -> Entry {
        Entry {
            id: id.into(),
            timestamp: self.timestamp,
            payload: self.payload,
        }
    }
}

/// A stored entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EntryPayload,
}

impl Entry {
    pub fn entry_type(&self) -> EntryType {
        self.payload.entry_type()
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.payload.correlation_id()
    }
}

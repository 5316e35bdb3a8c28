//! Live channel messages
//!
//! Every frame is `{"name": ..., "payload": ...}`.

use crate::entry::Entry;
use crate::storage::{EntryPage, Pagination};
use serde::{Deserialize, Serialize};

/// Parameters of a `GET_INITIAL_ENTRIES` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchRequest {
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    crate::query::DEFAULT_PAGE
}

fn default_per_page() -> u32 {
    crate::query::DEFAULT_PER_PAGE
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryIdRequest {
    pub id: String,
}

/// Client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "payload")]
pub enum ClientMessage {
    #[serde(rename = "GET_INITIAL_ENTRIES")]
    GetInitialEntries(WatchRequest),
    #[serde(rename = "GET_ENTRY_DETAILS")]
    GetEntryDetails(EntryIdRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// Server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "payload")]
pub enum ServerMessage {
    #[serde(rename = "INITIAL_ENTRIES")]
    InitialEntries {
        entries: Vec<Entry>,
        pagination: Pagination,
    },
    #[serde(rename = "NEW_ENTRY")]
    NewEntry(Entry),
    #[serde(rename = "ENTRY_DETAILS")]
    EntryDetails(Entry),
    #[serde(rename = "error")]
    Error(ErrorPayload),
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            message: message.into(),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::InitialEntries { .. } => "INITIAL_ENTRIES",
            Self::NewEntry(_) => "NEW_ENTRY",
            Self::EntryDetails(_) => "ENTRY_DETAILS",
            Self::Error(_) => "error",
        }
    }
}

impl From<EntryPage> for ServerMessage {
    fn from(page: EntryPage) -> Self {
        Self::InitialEntries {
            entries: page.entries,
            pagination: page.pagination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_get_initial_entries() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"name":"GET_INITIAL_ENTRIES","payload":{"type":"request","page":2,"perPage":10}}"#,
        )
        .unwrap();

        assert_eq!(
            msg,
            ClientMessage::GetInitialEntries(WatchRequest {
                entry_type: "request".to_string(),
                page: 2,
                per_page: 10,
            })
        );
    }

    #[test]
    fn test_parse_entry_details_request() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"name":"GET_ENTRY_DETAILS","payload":{"id":"abc"}}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::GetEntryDetails(EntryIdRequest { id: "abc".to_string() })
        );
    }

    #[test]
    fn test_unknown_message_is_rejected() {
        let result = serde_json::from_str::<ClientMessage>(r#"{"name":"DELETE_ALL","payload":{}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_server_message_shapes() {
        let initial = serde_json::to_value(ServerMessage::InitialEntries {
            entries: vec![],
            pagination: Pagination {
                current_page: 1,
                per_page: 20,
                total: 0,
            },
        })
        .unwrap();
        assert_eq!(initial["name"], "INITIAL_ENTRIES");
        assert_eq!(initial["payload"]["pagination"]["currentPage"], 1);

        let error = serde_json::to_value(ServerMessage::error("Entry not found")).unwrap();
        assert_eq!(error["name"], "error");
        assert_eq!(error["payload"]["message"], "Entry not found");
    }
}

//! Realtime Message Types
//!
//! Defines all message types exchanged over the `/realtime` WebSocket
//! between `RealtimeClient` and the server handler.

use serde::{Deserialize, Serialize};

use super::ChangeEvent;
use crate::store::Table;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to changes of a table
    Subscribe {
        /// Client-chosen subscription id, echoed on every related message
        id: String,
        table: Table,
        /// Optional row filter, e.g. `user_id=eq.42`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<String>,
    },
    /// Cancel a subscription
    Unsubscribe { id: String },
    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection established
    Connected { connection_id: String },
    /// Subscription registered
    Subscribed { id: String },
    /// Subscription removed
    Unsubscribed { id: String },
    /// A row changed on a subscribed topic
    Change { id: String, event: ChangeEvent },
    /// Pong response to ping
    Pong,
    /// Error message; `id` is set when it concerns one subscription
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_message_deserialize_subscribe() {
        let text = r#"{"type": "subscribe", "id": "s1", "table": "dashboards", "filter": "user_id=eq.u1"}"#;
        let msg: ClientMessage = serde_json::from_str(text).unwrap();
        match msg {
            ClientMessage::Subscribe { id, table, filter } => {
                assert_eq!(id, "s1");
                assert_eq!(table, Table::Dashboards);
                assert_eq!(filter.as_deref(), Some("user_id=eq.u1"));
            }
            other => panic!("Expected Subscribe, got {:?}", other),
        }
    }

    #[test]
    fn test_client_message_deserialize_ping() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type": "ping"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
    }

    #[test]
    fn test_client_message_unknown_table() {
        let text = r#"{"type": "subscribe", "id": "s1", "table": "reports"}"#;
        assert!(serde_json::from_str::<ClientMessage>(text).is_err());
    }

    #[test]
    fn test_server_message_serialize_change() {
        let event = ChangeEvent::insert(Table::DashboardWidgets, json!({"id": "w1"}));
        let msg = ServerMessage::Change {
            id: "s1".to_string(),
            event,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], json!("change"));
        assert_eq!(value["id"], json!("s1"));
        assert_eq!(value["event"]["kind"], json!("insert"));
        assert_eq!(value["event"]["new"]["id"], json!("w1"));
    }

    #[test]
    fn test_server_message_serialize_error_without_id() {
        let msg = ServerMessage::Error {
            id: None,
            message: "bad".to_string(),
        };
        let text = serde_json::to_string(&msg).unwrap();
        assert_eq!(text, r#"{"type":"error","message":"bad"}"#);
    }
}

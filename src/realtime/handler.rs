//! Realtime WebSocket Handler
//!
//! Handles WebSocket upgrade requests on `/realtime` and bridges each
//! connection's subscriptions to the server's `ChangeHub`.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::hub::ChangeHub;
use super::messages::{ClientMessage, ServerMessage};
use super::{SubscriptionGuard, Topic};
use crate::api::AppState;
use crate::store::Filter;

/// WebSocket upgrade handler
pub async fn realtime_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let hub = Arc::clone(&state.hub);
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, hub: Arc<ChangeHub>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let connection_id = Uuid::new_v4().to_string();
    tracing::info!(connection_id = %connection_id, "Realtime client connected");

    let _ = tx.send(ServerMessage::Connected {
        connection_id: connection_id.clone(),
    });

    let conn_id_for_send = connection_id.clone();

    // Task to forward queued messages to the WebSocket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if sender.send(Message::Text(text)).await.is_err() {
                        tracing::debug!(
                            connection_id = %conn_id_for_send,
                            "WebSocket send failed, closing connection"
                        );
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize message");
                }
            }
        }
    });

    let conn_id_for_recv = connection_id.clone();

    // Task to receive client messages; owns this connection's subscriptions
    let mut recv_task = tokio::spawn(async move {
        let mut subscriptions: HashMap<String, SubscriptionGuard> = HashMap::new();

        while let Some(result) = receiver.next().await {
            match result {
                Ok(msg) => {
                    if !handle_ws_message(&hub, &tx, &mut subscriptions, &conn_id_for_recv, msg) {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %conn_id_for_recv,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
            }
        }

        tracing::debug!(
            connection_id = %conn_id_for_recv,
            subscriptions = subscriptions.len(),
            "Dropping connection subscriptions"
        );
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    tracing::info!(connection_id = %connection_id, "Realtime client disconnected");
}

/// Handle a received WebSocket message
///
/// Returns false if the connection should be closed.
fn handle_ws_message(
    hub: &Arc<ChangeHub>,
    tx: &mpsc::UnboundedSender<ServerMessage>,
    subscriptions: &mut HashMap<String, SubscriptionGuard>,
    connection_id: &str,
    message: Message,
) -> bool {
    match message {
        Message::Text(text) => {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_client_message(hub, tx, subscriptions, client_msg),
                Err(e) => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        error = %e,
                        "Invalid client message"
                    );
                    // Send error but keep connection open
                    let _ = tx.send(ServerMessage::Error {
                        id: None,
                        message: format!("Invalid message format: {}", e),
                    });
                }
            }
            true
        }
        Message::Binary(_) => {
            let _ = tx.send(ServerMessage::Error {
                id: None,
                message: "Binary messages not supported".to_string(),
            });
            true
        }
        // Axum answers pings itself
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            tracing::debug!(connection_id = %connection_id, "Client requested close");
            false
        }
    }
}

/// Handle a parsed client message
fn handle_client_message(
    hub: &Arc<ChangeHub>,
    tx: &mpsc::UnboundedSender<ServerMessage>,
    subscriptions: &mut HashMap<String, SubscriptionGuard>,
    message: ClientMessage,
) {
    match message {
        ClientMessage::Subscribe { id, table, filter } => {
            if subscriptions.contains_key(&id) {
                let _ = tx.send(ServerMessage::Error {
                    id: Some(id),
                    message: "Subscription id already in use".to_string(),
                });
                return;
            }

            let filter = match filter.as_deref().map(str::parse::<Filter>).transpose() {
                Ok(filter) => filter,
                Err(e) => {
                    let _ = tx.send(ServerMessage::Error {
                        id: Some(id),
                        message: e.to_string(),
                    });
                    return;
                }
            };

            let topic = Topic { table, filter };
            match hub.subscribe(topic) {
                Ok(subscription) => {
                    let (mut events, guard) = subscription.into_parts();
                    let forward_tx = tx.clone();
                    let forward_id = id.clone();

                    // Ends when the guard is dropped and the hub releases the sender
                    tokio::spawn(async move {
                        while let Some(event) = events.recv().await {
                            let msg = ServerMessage::Change {
                                id: forward_id.clone(),
                                event,
                            };
                            if forward_tx.send(msg).is_err() {
                                break;
                            }
                        }
                    });

                    subscriptions.insert(id.clone(), guard);
                    let _ = tx.send(ServerMessage::Subscribed { id });
                }
                Err(e) => {
                    tracing::warn!(subscription_id = %id, error = %e, "Subscribe error");
                    let _ = tx.send(ServerMessage::Error {
                        id: Some(id),
                        message: e.to_string(),
                    });
                }
            }
        }
        ClientMessage::Unsubscribe { id } => {
            if subscriptions.remove(&id).is_some() {
                let _ = tx.send(ServerMessage::Unsubscribed { id });
            } else {
                let _ = tx.send(ServerMessage::Error {
                    id: Some(id),
                    message: "Unknown subscription".to_string(),
                });
            }
        }
        ClientMessage::Ping => {
            let _ = tx.send(ServerMessage::Pong);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::ChangeEvent;
    use crate::store::Table;
    use serde_json::json;

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[tokio::test]
    async fn test_subscribe_forwards_changes() {
        let hub = Arc::new(ChangeHub::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut subs = HashMap::new();

        handle_client_message(
            &hub,
            &tx,
            &mut subs,
            ClientMessage::Subscribe {
                id: "s1".to_string(),
                table: Table::Dashboards,
                filter: Some("user_id=eq.u1".to_string()),
            },
        );
        assert_eq!(
            drain(&mut rx),
            vec![ServerMessage::Subscribed { id: "s1".to_string() }]
        );

        let event = ChangeEvent::insert(Table::Dashboards, json!({"id": "d1", "user_id": "u1"}));
        assert_eq!(hub.publish(&event), 1);

        let msg = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            msg,
            ServerMessage::Change {
                id: "s1".to_string(),
                event
            }
        );
    }

    #[tokio::test]
    async fn test_unsubscribe_releases_hub_registration() {
        let hub = Arc::new(ChangeHub::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut subs = HashMap::new();

        let subscribe = ClientMessage::Subscribe {
            id: "s1".to_string(),
            table: Table::DashboardWidgets,
            filter: None,
        };
        handle_client_message(&hub, &tx, &mut subs, subscribe.clone());
        handle_client_message(&hub, &tx, &mut subs, subscribe);
        assert_eq!(hub.subscription_count(), 1);

        handle_client_message(&hub, &tx, &mut subs, ClientMessage::Unsubscribe { id: "s1".to_string() });
        assert_eq!(hub.subscription_count(), 0);

        let msgs = drain(&mut rx);
        assert!(matches!(msgs[1], ServerMessage::Error { id: Some(_), .. }));
        assert_eq!(msgs[2], ServerMessage::Unsubscribed { id: "s1".to_string() });
    }

    #[tokio::test]
    async fn test_bad_filter_is_reported() {
        let hub = Arc::new(ChangeHub::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut subs = HashMap::new();

        handle_client_message(
            &hub,
            &tx,
            &mut subs,
            ClientMessage::Subscribe {
                id: "s1".to_string(),
                table: Table::Dashboards,
                filter: Some("user_id=like.u%".to_string()),
            },
        );

        assert!(matches!(
            drain(&mut rx).as_slice(),
            [ServerMessage::Error { id: Some(_), .. }]
        ));
        assert_eq!(hub.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let hub = Arc::new(ChangeHub::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut subs = HashMap::new();

        handle_client_message(&hub, &tx, &mut subs, ClientMessage::Ping);
        assert_eq!(drain(&mut rx), vec![ServerMessage::Pong]);
    }
}

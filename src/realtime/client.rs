//! Realtime WebSocket Client
//!
//! `ChangeFeed` over a remote `/realtime` endpoint. One WebSocket connection
//! is shared by all subscriptions and opened lazily; if it drops, every live
//! subscription ends (its `recv` returns `None`) and the next `subscribe`
//! reconnects.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use uuid::Uuid;

use super::messages::{ClientMessage, ServerMessage};
use super::{ChangeEvent, ChangeFeed, Subscription, Topic};
use crate::store::{StoreError, StoreResult};

/// Configuration for the realtime client
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// WebSocket URL, e.g. `ws://localhost:8083/realtime`
    pub url: String,
    /// How long to wait for the server to acknowledge a subscription
    pub subscribe_timeout_ms: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8083/realtime".to_string(),
            subscribe_timeout_ms: 5000,
        }
    }
}

impl RealtimeConfig {
    /// Derive the WebSocket URL from an HTTP base URL
    pub fn from_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };

        Self {
            url: format!("{}/realtime", ws_base),
            ..Default::default()
        }
    }
}

/// Per-subscription routing entry
struct Route {
    events: mpsc::UnboundedSender<ChangeEvent>,
    ack: Option<oneshot::Sender<Result<(), String>>>,
}

type Routes = Arc<StdMutex<HashMap<String, Route>>>;

/// A live connection: outbound queue plus the routing table its reader fills
struct Connection {
    outbound: mpsc::UnboundedSender<ClientMessage>,
    routes: Routes,
}

impl Connection {
    fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }
}

/// WebSocket change-feed client
pub struct RealtimeClient {
    config: RealtimeConfig,
    connection: Mutex<Option<Connection>>,
}

impl RealtimeClient {
    pub fn new(config: RealtimeConfig) -> Self {
        Self {
            config,
            connection: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Connection handles, connecting first if there is no open connection
    async fn ensure_connected(&self) -> StoreResult<(mpsc::UnboundedSender<ClientMessage>, Routes)> {
        let mut guard = self.connection.lock().await;

        if let Some(conn) = guard.as_ref().filter(|c| c.is_open()) {
            return Ok((conn.outbound.clone(), Arc::clone(&conn.routes)));
        }

        let (stream, _) = connect_async(self.config.url.as_str())
            .await
            .map_err(|e| StoreError::Realtime(format!("connect to {} failed: {}", self.config.url, e)))?;

        tracing::info!(url = %self.config.url, "Realtime connection opened");

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let routes: Routes = Arc::new(StdMutex::new(HashMap::new()));

        tokio::spawn(run_connection(stream, outbound_rx, Arc::clone(&routes)));

        let conn = Connection {
            outbound: outbound.clone(),
            routes: Arc::clone(&routes),
        };
        *guard = Some(conn);

        Ok((outbound, routes))
    }
}

#[async_trait]
impl ChangeFeed for RealtimeClient {
    async fn subscribe(&self, topic: Topic) -> StoreResult<Subscription> {
        let (outbound, routes) = self.ensure_connected().await?;

        let id = Uuid::new_v4().to_string();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (ack_tx, ack_rx) = oneshot::channel();

        lock_routes(&routes).insert(
            id.clone(),
            Route {
                events: events_tx,
                ack: Some(ack_tx),
            },
        );

        let request = ClientMessage::Subscribe {
            id: id.clone(),
            table: topic.table,
            filter: topic.filter.as_ref().map(|f| f.to_string()),
        };
        if outbound.send(request).is_err() {
            lock_routes(&routes).remove(&id);
            return Err(StoreError::Realtime("connection closed".to_string()));
        }

        let timeout = Duration::from_millis(self.config.subscribe_timeout_ms);
        let acked = match tokio::time::timeout(timeout, ack_rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(message))) => Err(StoreError::Realtime(message)),
            Ok(Err(_)) => Err(StoreError::Realtime("connection closed".to_string())),
            Err(_) => Err(StoreError::Realtime(format!(
                "subscription to {} not acknowledged",
                topic
            ))),
        };

        if let Err(e) = acked {
            lock_routes(&routes).remove(&id);
            return Err(e);
        }

        tracing::debug!(subscription_id = %id, topic = %topic, "Remote subscription active");

        let cancel_id = id.clone();
        let cancel_routes = Arc::downgrade(&routes);
        let cancel = Box::new(move || {
            if let Some(routes) = cancel_routes.upgrade() {
                lock_routes(&routes).remove(&cancel_id);
            }
            let _ = outbound.send(ClientMessage::Unsubscribe { id: cancel_id });
        });

        Ok(Subscription::new(id, topic, events_rx, cancel))
    }
}

fn lock_routes(routes: &Routes) -> std::sync::MutexGuard<'_, HashMap<String, Route>> {
    routes.lock().unwrap_or_else(|e| e.into_inner())
}

/// Drive one WebSocket connection until either side closes
async fn run_connection<S>(
    stream: S,
    mut outbound_rx: mpsc::UnboundedReceiver<ClientMessage>,
    routes: Routes,
) where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin,
{
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            outgoing = outbound_rx.recv() => {
                let Some(msg) = outgoing else { break };
                let text = match serde_json::to_string(&msg) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to serialize message");
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Text(text)).await {
                    tracing::warn!(error = %e, "Realtime send failed");
                    break;
                }
            }
            incoming = read.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => handle_server_text(&routes, &text),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Realtime receive failed");
                        break;
                    }
                }
            }
        }
    }

    // Ends every subscription and fails pending acknowledgements
    lock_routes(&routes).clear();
    outbound_rx.close();
    tracing::info!("Realtime connection closed");
}

fn handle_server_text(routes: &Routes, text: &str) {
    let msg = match serde_json::from_str::<ServerMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring malformed server message");
            return;
        }
    };

    match msg {
        ServerMessage::Connected { connection_id } => {
            tracing::debug!(connection_id = %connection_id, "Realtime session established");
        }
        ServerMessage::Subscribed { id } => {
            if let Some(ack) = lock_routes(routes).get_mut(&id).and_then(|r| r.ack.take()) {
                let _ = ack.send(Ok(()));
            }
        }
        ServerMessage::Unsubscribed { id } => {
            tracing::trace!(subscription_id = %id, "Remote subscription removed");
        }
        ServerMessage::Change { id, event } => {
            let mut routes = lock_routes(routes);
            let closed = routes
                .get(&id)
                .map(|route| route.events.send(event).is_err())
                .unwrap_or(false);
            if closed {
                routes.remove(&id);
            }
        }
        ServerMessage::Pong => {}
        ServerMessage::Error { id, message } => {
            let pending = id
                .as_ref()
                .and_then(|id| lock_routes(routes).get_mut(id).and_then(|r| r.ack.take()));
            match pending {
                Some(ack) => {
                    let _ = ack.send(Err(message));
                }
                None => tracing::warn!(subscription_id = ?id, error = %message, "Realtime server error"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_base_url() {
        assert_eq!(
            RealtimeConfig::from_base_url("http://localhost:8083/").url,
            "ws://localhost:8083/realtime"
        );
        assert_eq!(
            RealtimeConfig::from_base_url("https://bi.example.com").url,
            "wss://bi.example.com/realtime"
        );
    }

    #[tokio::test]
    async fn test_subscribe_unreachable_server_fails() {
        let client = RealtimeClient::new(RealtimeConfig {
            url: "ws://127.0.0.1:9/realtime".to_string(),
            subscribe_timeout_ms: 500,
        });

        let result = client
            .subscribe(Topic::table(crate::store::Table::Dashboards))
            .await;
        assert!(matches!(result, Err(StoreError::Realtime(_))));
    }

    mod against_server {
        use super::*;
        use crate::api::{build_router, ApiConfig, AppState};
        use crate::model::{WidgetDraft, WidgetType};
        use crate::notify::ToastQueue;
        use crate::realtime::ChangeKind;
        use crate::service::{Backend, DashboardService, ServiceConfig};
        use crate::session::User;
        use crate::store::{MemoryStore, RestConfig, RestStore, Table, TableStore};
        use serde_json::json;

        async fn spawn_server() -> (String, Arc<MemoryStore>) {
            let store = Arc::new(MemoryStore::new());
            let router = build_router(AppState::new(Arc::clone(&store), ApiConfig::default()));

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, router).await.unwrap();
            });

            (format!("http://{}", addr), store)
        }

        async fn wait_for<F: Fn() -> bool>(condition: F) {
            for _ in 0..200 {
                if condition() {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            panic!("condition not reached");
        }

        #[tokio::test]
        async fn test_filtered_changes_are_delivered() {
            let (base_url, store) = spawn_server().await;
            let client = RealtimeClient::new(RealtimeConfig::from_base_url(&base_url));

            let mut sub = client
                .subscribe(Topic::table(Table::Dashboards).filtered("user_id", "u1"))
                .await
                .unwrap();
            assert_eq!(store.hub().subscription_count(), 1);

            store
                .insert(Table::Dashboards, json!({"user_id": "u2", "name": "Theirs"}))
                .await
                .unwrap();
            store
                .insert(Table::Dashboards, json!({"id": "d1", "user_id": "u1", "name": "Mine"}))
                .await
                .unwrap();

            let event = tokio::time::timeout(Duration::from_secs(2), sub.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(event.kind, ChangeKind::Insert);
            assert_eq!(event.row_id(), Some("d1"));

            drop(sub);
            let hub = store.hub();
            wait_for(|| hub.subscription_count() == 0).await;
        }

        #[tokio::test]
        async fn test_service_follows_remote_writes() {
            let (base_url, _store) = spawn_server().await;

            let backend = Backend::new(
                Arc::new(RestStore::new(RestConfig::new(&base_url)).unwrap()),
                Arc::new(RealtimeClient::new(RealtimeConfig::from_base_url(&base_url))),
                Arc::new(ToastQueue::new()),
            );
            let service = DashboardService::start(
                User::new("u1", "ada@example.com"),
                backend,
                ServiceConfig::default(),
            )
            .await;
            service.fetch_dashboards().await;
            assert_eq!(service.subscription_count(), 2);

            // Another client writes through the REST API
            let other = RestStore::new(RestConfig::new(&base_url)).unwrap();
            other
                .insert(Table::Dashboards, json!({"id": "d1", "user_id": "u1", "name": "Ops"}))
                .await
                .unwrap();

            let watched = service.clone();
            wait_for(|| watched.snapshot().current.map(|d| d.id) == Some("d1".to_string())).await;

            service
                .add_widget(WidgetDraft::new("Latency", WidgetType::Chart))
                .await
                .unwrap();
            other
                .insert(
                    Table::DashboardWidgets,
                    json!({"dashboard_id": "d1", "title": "Errors", "widget_type": "table"}),
                )
                .await
                .unwrap();

            let watched = service.clone();
            wait_for(|| watched.snapshot().widgets.len() == 2).await;

            service.dispose();
        }
    }
}

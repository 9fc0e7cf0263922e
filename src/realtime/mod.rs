//! Real-Time Change Feed
//!
//! Pushes row-level change notifications (insert / update / delete) to
//! subscribers so their local copies can be reconciled.
//!
//! ## Architecture
//!
//! - **ChangeFeed**: `subscribe(topic) -> Subscription`, implemented by the
//!   in-process `MemoryStore` and by the WebSocket `RealtimeClient`
//! - **Subscription**: cancellable handle; dropping it unsubscribes
//! - **ChangeHub**: topic registry that fans events out to subscribers
//! - **Handler**: serves a `ChangeHub` over WebSocket at `/realtime`
//! - **Messages**: wire format between `RealtimeClient` and the handler
//!
//! ## Wire example
//!
//! ```text
//! -> {"type":"subscribe","id":"s1","table":"dashboards","filter":"user_id=eq.u1"}
//! <- {"type":"subscribed","id":"s1"}
//! <- {"type":"change","id":"s1","event":{"table":"dashboards","kind":"insert",...}}
//! -> {"type":"unsubscribe","id":"s1"}
//! ```

mod client;
mod handler;
mod hub;
mod messages;

pub use client::{RealtimeClient, RealtimeConfig};
pub use handler::realtime_handler;
pub use hub::{ChangeHub, HubConfig, HubError};
pub use messages::{ClientMessage, ServerMessage};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tokio::sync::mpsc;

use crate::store::{Filter, StoreResult, Table};

/// Kind of row change
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A single row change
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    /// Row after the change (insert, update)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<Value>,
    /// Row before the change (update, delete)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    pub commit_timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn insert(table: Table, row: Value) -> Self {
        Self {
            table,
            kind: ChangeKind::Insert,
            new: Some(row),
            old: None,
            commit_timestamp: Utc::now(),
        }
    }

    pub fn update(table: Table, old: Value, new: Value) -> Self {
        Self {
            table,
            kind: ChangeKind::Update,
            new: Some(new),
            old: Some(old),
            commit_timestamp: Utc::now(),
        }
    }

    pub fn delete(table: Table, old: Value) -> Self {
        Self {
            table,
            kind: ChangeKind::Delete,
            new: None,
            old: Some(old),
            commit_timestamp: Utc::now(),
        }
    }

    /// The row a topic filter is evaluated against
    pub fn record(&self) -> Option<&Value> {
        self.new.as_ref().or(self.old.as_ref())
    }

    /// Id of the changed row
    pub fn row_id(&self) -> Option<&str> {
        self.record().and_then(|r| r.get("id")).and_then(Value::as_str)
    }
}

/// What a subscription listens to: one table, optionally filtered
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    pub table: Table,
    pub filter: Option<Filter>,
}

impl Topic {
    /// Every change on a table
    pub fn table(table: Table) -> Self {
        Self {
            table,
            filter: None,
        }
    }

    /// Builder method: restrict to rows where `column = value`
    pub fn filtered(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter = Some(Filter::eq(column, value));
        self
    }

    /// Check whether an event belongs to this topic
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.table != self.table {
            return false;
        }

        match (&self.filter, event.record()) {
            (None, _) => true,
            (Some(filter), Some(row)) => filter.matches(row),
            (Some(_), None) => false,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.filter {
            Some(filter) => write!(f, "{}:{}", self.table, filter),
            None => write!(f, "{}", self.table),
        }
    }
}

/// Unsubscribe action run when a subscription is cancelled
pub type CancelFn = Box<dyn FnOnce() + Send + Sync>;

/// Cancellable handle delivering the events of one topic
///
/// Dropping the handle (or its guard, see [`Subscription::into_parts`])
/// unsubscribes synchronously.
pub struct Subscription {
    id: String,
    topic: Topic,
    receiver: mpsc::UnboundedReceiver<ChangeEvent>,
    guard: SubscriptionGuard,
}

impl Subscription {
    pub fn new(
        id: impl Into<String>,
        topic: Topic,
        receiver: mpsc::UnboundedReceiver<ChangeEvent>,
        cancel: CancelFn,
    ) -> Self {
        Self {
            id: id.into(),
            topic,
            receiver,
            guard: SubscriptionGuard {
                cancel: Some(cancel),
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Wait for the next event; `None` once the feed side has closed
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.receiver.recv().await
    }

    /// Next event if one is already queued
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.receiver.try_recv().ok()
    }

    /// Unsubscribe now
    pub fn cancel(mut self) {
        self.guard.cancel();
    }

    /// Split into the event receiver and the guard that owns the subscription
    pub fn into_parts(self) -> (mpsc::UnboundedReceiver<ChangeEvent>, SubscriptionGuard) {
        (self.receiver, self.guard)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish()
    }
}

/// Owns a subscription's registration; unsubscribes on drop
pub struct SubscriptionGuard {
    cancel: Option<CancelFn>,
}

impl SubscriptionGuard {
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Source of change notifications
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Start receiving the events of a topic
    async fn subscribe(&self, topic: Topic) -> StoreResult<Subscription>;
}

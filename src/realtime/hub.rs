//! Change Hub
//!
//! Registry of change-feed subscriptions and the fan-out of row changes to
//! them. Registration and removal are synchronous so a dropped
//! `Subscription` unsubscribes immediately.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{ChangeEvent, Subscription, Topic};
use crate::store::Table;

/// Unique identifier for a subscription
pub type SubscriptionId = String;

/// Configuration for the change hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum number of concurrent subscriptions
    pub max_subscriptions: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_subscriptions: 1000,
        }
    }
}

struct Subscriber {
    topic: Topic,
    sender: mpsc::UnboundedSender<ChangeEvent>,
}

/// Fans row changes out to matching subscriptions
pub struct ChangeHub {
    /// Active subscriptions: SubscriptionId -> Subscriber
    subscribers: RwLock<HashMap<SubscriptionId, Subscriber>>,
    config: HubConfig,
}

impl ChangeHub {
    /// Create a new change hub
    pub fn new(config: HubConfig) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Register a subscription for a topic
    ///
    /// Returns an error if the subscription limit has been reached.
    pub fn subscribe(self: &Arc<Self>, topic: Topic) -> Result<Subscription, HubError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = Uuid::new_v4().to_string();

        {
            let mut subscribers = self.write_subscribers();
            if subscribers.len() >= self.config.max_subscriptions {
                return Err(HubError::TooManySubscriptions(self.config.max_subscriptions));
            }
            subscribers.insert(
                id.clone(),
                Subscriber {
                    topic: topic.clone(),
                    sender,
                },
            );
        }

        tracing::debug!(subscription_id = %id, topic = %topic, "Subscribed");

        let hub: Weak<ChangeHub> = Arc::downgrade(self);
        let cancel_id = id.clone();
        let cancel = Box::new(move || {
            if let Some(hub) = hub.upgrade() {
                hub.unsubscribe(&cancel_id);
            }
        });

        Ok(Subscription::new(id, topic, receiver, cancel))
    }

    /// Remove a subscription; returns whether it existed
    pub fn unsubscribe(&self, id: &str) -> bool {
        let removed = self.write_subscribers().remove(id).is_some();
        if removed {
            tracing::debug!(subscription_id = %id, "Unsubscribed");
        }
        removed
    }

    /// Deliver an event to every subscription whose topic matches
    ///
    /// Subscriptions whose receiver is gone are pruned. Returns the number of
    /// subscriptions the event was delivered to.
    pub fn publish(&self, event: &ChangeEvent) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        {
            let subscribers = self.read_subscribers();
            for (id, subscriber) in subscribers.iter() {
                if !subscriber.topic.matches(event) {
                    continue;
                }
                if subscriber.sender.send(event.clone()).is_ok() {
                    delivered += 1;
                } else {
                    closed.push(id.clone());
                }
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.write_subscribers();
            for id in &closed {
                subscribers.remove(id);
            }
        }

        if delivered > 0 {
            tracing::trace!(
                table = %event.table,
                kind = ?event.kind,
                subscribers = delivered,
                "Published change"
            );
        }

        delivered
    }

    /// Get the current subscription count
    pub fn subscription_count(&self) -> usize {
        self.read_subscribers().len()
    }

    /// Ids of the live subscriptions, in no particular order
    pub fn subscription_ids(&self) -> Vec<SubscriptionId> {
        self.read_subscribers().keys().cloned().collect()
    }

    /// Get the subscription count for one table
    pub fn table_subscription_count(&self, table: Table) -> usize {
        self.read_subscribers()
            .values()
            .filter(|s| s.topic.table == table)
            .count()
    }

    fn read_subscribers(&self) -> std::sync::RwLockReadGuard<'_, HashMap<SubscriptionId, Subscriber>> {
        self.subscribers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_subscribers(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<SubscriptionId, Subscriber>> {
        self.subscribers.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

/// Errors that can occur in the change hub
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Too many subscriptions (limit: {0})")]
    TooManySubscriptions(usize),
}

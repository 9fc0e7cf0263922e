//! Change subscriptions of a dashboard service
//!
//! Every (re)subscription opens a new *generation*. Events are tagged with
//! the generation of the subscription that delivered them, so events queued
//! by a superseded subscription can be told apart and dropped. When the feed
//! ends a subscription on its own, the forwarder reports the generation as
//! lost so the service can subscribe again.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::realtime::{ChangeEvent, ChangeFeed, SubscriptionGuard, Topic};
use crate::store::Table;

/// Which widget changes a service listens to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetScope {
    /// Every widget change on the backend
    #[default]
    Unscoped,
    /// Only widgets of the selected dashboard
    CurrentDashboard,
}

/// What a change makes stale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation {
    Dashboards,
    Widgets,
}

impl Invalidation {
    pub fn for_event(event: &ChangeEvent) -> Self {
        match event.table {
            Table::Dashboards => Invalidation::Dashboards,
            Table::DashboardWidgets => Invalidation::Widgets,
        }
    }
}

/// What a forwarder delivers
#[derive(Debug)]
pub(crate) enum FeedMessage {
    Change(ChangeEvent),
    /// The feed closed the subscription
    Lost,
}

/// A feed message with the generation it was delivered under
#[derive(Debug)]
pub(crate) struct Tagged {
    pub generation: u64,
    pub message: FeedMessage,
}

impl Tagged {
    pub fn change(generation: u64, event: ChangeEvent) -> Self {
        Self {
            generation,
            message: FeedMessage::Change(event),
        }
    }

    pub fn lost(generation: u64) -> Self {
        Self {
            generation,
            message: FeedMessage::Lost,
        }
    }
}

/// Topics a service subscribes to
pub(crate) fn topics(user_id: &str, scope: WidgetScope, current: Option<&str>) -> Vec<Topic> {
    let mut topics = vec![Topic::table(Table::Dashboards).filtered("user_id", user_id)];

    match (scope, current) {
        (WidgetScope::Unscoped, _) => topics.push(Topic::table(Table::DashboardWidgets)),
        (WidgetScope::CurrentDashboard, Some(dashboard_id)) => topics.push(
            Topic::table(Table::DashboardWidgets).filtered("dashboard_id", dashboard_id),
        ),
        (WidgetScope::CurrentDashboard, None) => {}
    }

    topics
}

/// Subscribe to each topic and forward its events, tagged, into `sink`
///
/// A topic that fails to subscribe is logged and skipped; the service keeps
/// working without live updates for it. A forwarder whose channel closes
/// sends [`FeedMessage::Lost`] before it ends.
pub(crate) async fn open(
    feed: &dyn ChangeFeed,
    topics: Vec<Topic>,
    generation: u64,
    sink: &mpsc::UnboundedSender<Tagged>,
) -> Vec<SubscriptionGuard> {
    let mut guards = Vec::with_capacity(topics.len());

    for topic in topics {
        let subscription = match feed.subscribe(topic.clone()).await {
            Ok(subscription) => subscription,
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "Failed to subscribe to changes");
                continue;
            }
        };

        let (mut events, guard) = subscription.into_parts();
        let sink = sink.clone();

        // Dropping the guard closes the channel too; that Lost carries a
        // superseded generation
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if sink.send(Tagged::change(generation, event)).is_err() {
                    return;
                }
            }
            let _ = sink.send(Tagged::lost(generation));
        });

        guards.push(guard);
    }

    guards
}

/// The live generation and the guards that keep it subscribed
#[derive(Default)]
pub(crate) struct SubscriptionSet {
    generation: AtomicU64,
    guards: Mutex<Vec<SubscriptionGuard>>,
}

impl SubscriptionSet {
    pub fn current(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Start a new generation, cancelling the current subscriptions
    pub fn begin(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.lock().clear();
        generation
    }

    /// Install the guards of `generation`
    ///
    /// Returns false (and drops the guards) if a newer generation started in
    /// the meantime.
    pub fn commit(&self, generation: u64, guards: Vec<SubscriptionGuard>) -> bool {
        let mut installed = self.lock();
        if self.current() != generation {
            return false;
        }
        *installed = guards;
        true
    }

    /// Cancel everything; later commits of older generations are rejected
    pub fn close(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SubscriptionGuard>> {
        self.guards.lock().unwrap_or_else(|e| e.into_inner())
    }
}

//! Dashboard Data Access
//!
//! `DashboardService` owns the signed-in user's dashboards, the selected
//! dashboard and its widgets, mediates every read and write against the
//! table store, and keeps the local copies in step with remote changes.
//!
//! ## Architecture
//!
//! - **State**: collections behind a `tokio::sync::Mutex`; never held across
//!   a store call
//! - **Snapshots**: every state change publishes a `DashboardSnapshot` on a
//!   `watch` channel
//! - **Subscriptions**: one per topic, replaced whenever the selection
//!   changes (see `subscriptions`)
//! - **Reconciler**: a single task receiving all change events; it holds a
//!   `Weak` reference and re-runs the fetch an event invalidates
//! - **Recovery**: when the feed ends the live subscriptions, the reconciler
//!   resubscribes with exponential backoff and refetches both collections
//!
//! Operations never return errors. A failure is logged, shown as an error
//! toast and leaves the state as it was.
//!
//! # Example
//!
//! ```rust
//! use insightdeck::model::{WidgetDraft, WidgetType};
//! use insightdeck::notify::ToastQueue;
//! use insightdeck::service::{Backend, DashboardService, ServiceConfig};
//! use insightdeck::session::User;
//! use insightdeck::store::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(MemoryStore::new());
//!     let backend = Backend::new(store.clone(), store, Arc::new(ToastQueue::new()));
//!     let user = User::new("u1", "ada@example.com");
//!
//!     let service = DashboardService::start(user, backend, ServiceConfig::default()).await;
//!     service.fetch_dashboards().await;
//!
//!     let dashboard = service.create_dashboard("Q4 Report", None).await.unwrap();
//!     service.add_widget(WidgetDraft::new("Revenue", WidgetType::Kpi)).await.unwrap();
//!
//!     let snapshot = service.snapshot();
//!     assert_eq!(snapshot.current.unwrap().id, dashboard.id);
//!     assert_eq!(snapshot.widgets.len(), 1);
//!
//!     service.dispose();
//! }
//! ```

mod error;
mod subscriptions;

pub use error::{ServiceError, ServiceResult};
pub use subscriptions::{Invalidation, WidgetScope};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use crate::model::{Dashboard, ModelError, NewDashboard, Widget, WidgetDraft};
use crate::notify::Notifier;
use crate::realtime::{ChangeEvent, ChangeFeed};
use crate::session::User;
use crate::store::{delete_by_id, insert_record, select_records, Query, Table, TableStore};
use subscriptions::{FeedMessage, SubscriptionSet, Tagged};

const RESUBSCRIBE_BASE_DELAY: Duration = Duration::from_millis(250);
const RESUBSCRIBE_MAX_DELAY: Duration = Duration::from_secs(5);
const MAX_RESUBSCRIBE_ATTEMPTS: u32 = 8;

/// Injected collaborators of a service
#[derive(Clone)]
pub struct Backend {
    pub store: Arc<dyn TableStore>,
    pub feed: Arc<dyn ChangeFeed>,
    pub notifier: Arc<dyn Notifier>,
}

impl Backend {
    pub fn new(
        store: Arc<dyn TableStore>,
        feed: Arc<dyn ChangeFeed>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            feed,
            notifier,
        }
    }
}

/// Service configuration
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub widget_scope: WidgetScope,
}

/// Immutable copy of the service state
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    /// Newest first
    pub dashboards: Vec<Dashboard>,
    pub current: Option<Dashboard>,
    /// Oldest first
    pub widgets: Vec<Widget>,
    /// True until the first dashboard fetch finishes
    pub loading: bool,
}

impl Default for DashboardSnapshot {
    fn default() -> Self {
        Self {
            dashboards: Vec::new(),
            current: None,
            widgets: Vec::new(),
            loading: true,
        }
    }
}

#[derive(Debug)]
struct State {
    dashboards: Vec<Dashboard>,
    current: Option<String>,
    widgets: Vec<Widget>,
    loading: bool,
}

impl State {
    fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            dashboards: self.dashboards.clone(),
            current: self
                .current
                .as_ref()
                .and_then(|id| self.dashboards.iter().find(|d| &d.id == id))
                .cloned(),
            widgets: self.widgets.clone(),
            loading: self.loading,
        }
    }

    fn has_dashboard(&self, id: &str) -> bool {
        self.dashboards.iter().any(|d| d.id == id)
    }
}

struct Inner {
    user: User,
    backend: Backend,
    config: ServiceConfig,
    state: Mutex<State>,
    snapshot: watch::Sender<DashboardSnapshot>,
    subscriptions: SubscriptionSet,
    events: mpsc::UnboundedSender<Tagged>,
    reconciler: StdMutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

/// Data-access service for one signed-in user
///
/// Cloning is cheap; clones share state.
#[derive(Clone)]
pub struct DashboardService {
    inner: Arc<Inner>,
}

impl DashboardService {
    /// Create the service, start its reconciler and subscribe to changes
    ///
    /// Does not fetch; call [`DashboardService::fetch_dashboards`] next.
    pub async fn start(user: User, backend: Backend, config: ServiceConfig) -> Self {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (snapshot, _) = watch::channel(DashboardSnapshot::default());

        let inner = Arc::new(Inner {
            user,
            backend,
            config,
            state: Mutex::new(State {
                dashboards: Vec::new(),
                current: None,
                widgets: Vec::new(),
                loading: true,
            }),
            snapshot,
            subscriptions: SubscriptionSet::default(),
            events,
            reconciler: StdMutex::new(None),
            disposed: AtomicBool::new(false),
        });

        let handle = tokio::spawn(run_reconciler(Arc::downgrade(&inner), events_rx));
        *lock_reconciler(&inner) = Some(handle);

        let service = Self { inner };
        tracing::info!(user_id = %service.inner.user.id, "Dashboard service started");
        service.resubscribe().await;
        service
    }

    pub fn user(&self) -> &User {
        &self.inner.user
    }

    /// Current state
    pub fn snapshot(&self) -> DashboardSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    /// Follow state changes
    pub fn watch(&self) -> watch::Receiver<DashboardSnapshot> {
        self.inner.snapshot.subscribe()
    }

    /// Number of live change subscriptions
    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Load the user's dashboards, newest first
    ///
    /// Selects the newest dashboard when nothing (or a dashboard that no
    /// longer exists) is selected. Returns whether the fetch succeeded.
    pub async fn fetch_dashboards(&self) -> bool {
        let query = Query::new()
            .eq("user_id", &self.inner.user.id)
            .order("created_at", false);
        let result = select_records::<Dashboard>(self.store(), &query).await;

        let (ok, selection_changed) = {
            let mut state = self.inner.state.lock().await;
            state.loading = false;

            let outcome = match result {
                Ok(dashboards) => {
                    state.dashboards = dashboards;
                    let kept = state
                        .current
                        .as_deref()
                        .map_or(false, |id| state.has_dashboard(id));
                    let mut changed = false;
                    if !kept {
                        let next = state.dashboards.first().map(|d| d.id.clone());
                        changed = next != state.current;
                        state.current = next;
                        if changed {
                            state.widgets.clear();
                        }
                    }
                    (true, changed)
                }
                Err(e) => {
                    tracing::error!(user_id = %self.inner.user.id, error = %e, "Error fetching dashboards");
                    (false, false)
                }
            };

            self.publish(&state);
            outcome
        };

        if !ok {
            self.notifier().error("Failed to load dashboards");
        } else if selection_changed {
            self.on_selection_changed().await;
        }

        ok
    }

    /// Load the selected dashboard's widgets, oldest first
    ///
    /// No-op without a selection. A response for a dashboard that is no
    /// longer selected is discarded. Returns whether widgets were applied.
    pub async fn fetch_widgets(&self) -> bool {
        let Some(dashboard_id) = self.current_id().await else {
            return false;
        };

        let query = Query::new()
            .eq("dashboard_id", &dashboard_id)
            .order("created_at", true);

        match select_records::<Widget>(self.store(), &query).await {
            Ok(widgets) => {
                let mut state = self.inner.state.lock().await;
                if state.current.as_deref() != Some(dashboard_id.as_str()) {
                    tracing::debug!(dashboard_id = %dashboard_id, "Discarding widgets of deselected dashboard");
                    return false;
                }
                state.widgets = widgets;
                self.publish(&state);
                true
            }
            Err(e) => {
                tracing::error!(dashboard_id = %dashboard_id, error = %e, "Error fetching widgets");
                self.notifier().error("Failed to load widgets");
                false
            }
        }
    }

    /// Create a dashboard, put it first and select it
    pub async fn create_dashboard(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Option<Dashboard> {
        let new = NewDashboard::new(&self.inner.user.id, name)
            .description(description.map(str::to_string));

        let dashboard: Dashboard = match insert_record(self.store(), &new).await {
            Ok(dashboard) => dashboard,
            Err(e) => {
                tracing::error!(name = %name, error = %e, "Error creating dashboard");
                self.notifier().error("Failed to create dashboard");
                return None;
            }
        };

        {
            let mut state = self.inner.state.lock().await;
            // The change feed may have delivered it already
            state.dashboards.retain(|d| d.id != dashboard.id);
            state.dashboards.insert(0, dashboard.clone());
            state.current = Some(dashboard.id.clone());
            state.widgets.clear();
            self.publish(&state);
        }

        tracing::info!(dashboard_id = %dashboard.id, name = %dashboard.name, "Dashboard created");
        self.notifier().success("Dashboard created successfully");
        self.on_selection_changed().await;

        Some(dashboard)
    }

    /// Add a widget to the selected dashboard
    ///
    /// Returns `None` without a selection (silently) or on failure.
    pub async fn add_widget(&self, draft: WidgetDraft) -> Option<Widget> {
        let dashboard_id = self.current_id().await?;

        match self.try_add_widget(&dashboard_id, draft).await {
            Ok(widget) => {
                {
                    let mut state = self.inner.state.lock().await;
                    if state.current.as_deref() == Some(widget.dashboard_id.as_str())
                        && !state.widgets.iter().any(|w| w.id == widget.id)
                    {
                        state.widgets.push(widget.clone());
                        self.publish(&state);
                    }
                }
                tracing::info!(widget_id = %widget.id, dashboard_id = %widget.dashboard_id, "Widget added");
                self.notifier().success("Widget added successfully");
                Some(widget)
            }
            Err(e) => {
                tracing::error!(dashboard_id = %dashboard_id, error = %e, "Error adding widget");
                self.notifier().error("Failed to add widget");
                None
            }
        }
    }

    async fn try_add_widget(&self, dashboard_id: &str, draft: WidgetDraft) -> ServiceResult<Widget> {
        if let Some(config) = &draft.config {
            if config.widget_type() != draft.widget_type {
                return Err(ModelError::InvalidConfig {
                    widget_type: draft.widget_type,
                    error: format!("got a {} configuration", config.widget_type()),
                }
                .into());
            }
        }

        let new = draft.into_new_widget(dashboard_id);
        Ok(insert_record(self.store(), &new).await?)
    }

    /// Delete a widget and drop it from the local collection
    pub async fn delete_widget(&self, widget_id: &str) -> bool {
        match delete_by_id(self.store(), Table::DashboardWidgets, widget_id).await {
            Ok(removed) => {
                {
                    let mut state = self.inner.state.lock().await;
                    state.widgets.retain(|w| w.id != widget_id);
                    self.publish(&state);
                }
                tracing::info!(widget_id = %widget_id, removed, "Widget deleted");
                self.notifier().success("Widget deleted successfully");
                true
            }
            Err(e) => {
                tracing::error!(widget_id = %widget_id, error = %e, "Error deleting widget");
                self.notifier().error("Failed to delete widget");
                false
            }
        }
    }

    /// Select a dashboard from the collection and load its widgets
    ///
    /// Ids not in the collection are ignored. Returns whether the id is
    /// selected afterwards.
    pub async fn select_dashboard(&self, dashboard_id: &str) -> bool {
        {
            let mut state = self.inner.state.lock().await;
            if !state.has_dashboard(dashboard_id) {
                tracing::debug!(dashboard_id = %dashboard_id, "Ignoring selection of unknown dashboard");
                return false;
            }
            if state.current.as_deref() == Some(dashboard_id) {
                return true;
            }
            state.current = Some(dashboard_id.to_string());
            state.widgets.clear();
            self.publish(&state);
        }

        self.on_selection_changed().await;
        true
    }

    /// Re-run the fetch a change invalidates
    pub async fn reconcile(&self, event: &ChangeEvent) -> Invalidation {
        let invalidation = Invalidation::for_event(event);
        tracing::debug!(
            table = %event.table,
            kind = ?event.kind,
            row_id = ?event.row_id(),
            invalidation = ?invalidation,
            "Reconciling change"
        );

        match invalidation {
            Invalidation::Dashboards => {
                self.fetch_dashboards().await;
            }
            Invalidation::Widgets => {
                self.fetch_widgets().await;
            }
        }

        invalidation
    }

    /// Cancel subscriptions and stop the reconciler
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.inner.subscriptions.close();
        if let Some(handle) = lock_reconciler(&self.inner).take() {
            handle.abort();
        }

        tracing::info!(user_id = %self.inner.user.id, "Dashboard service disposed");
    }

    /// Handle one forwarded message; returns whether it was acted on
    ///
    /// Widget events of a superseded generation belong to a previous
    /// selection and are dropped. The dashboards topic does not depend on
    /// the selection, so its events always apply.
    async fn apply(&self, tagged: Tagged) -> bool {
        let current = tagged.generation == self.inner.subscriptions.current();

        match tagged.message {
            FeedMessage::Lost if current => {
                self.recover_feed().await;
                true
            }
            FeedMessage::Lost => false,
            FeedMessage::Change(event) => {
                if !current && event.table == Table::DashboardWidgets {
                    tracing::trace!(generation = tagged.generation, "Dropping event of superseded subscription");
                    return false;
                }
                self.reconcile(&event).await;
                true
            }
        }
    }

    /// Resubscribe after the feed ended the live subscriptions, then refetch
    /// whatever changed while nothing was listening
    async fn recover_feed(&self) {
        tracing::warn!(user_id = %self.inner.user.id, "Change feed lost, resubscribing");

        let mut delay = RESUBSCRIBE_BASE_DELAY;
        let mut attempts = 0;
        while !self.resubscribe().await {
            attempts += 1;
            if attempts >= MAX_RESUBSCRIBE_ATTEMPTS {
                tracing::error!(attempts, "Giving up on live updates");
                break;
            }

            let generation = self.inner.subscriptions.current();
            tracing::debug!(attempts, delay_ms = delay.as_millis() as u64, "Retrying subscription");
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(RESUBSCRIBE_MAX_DELAY);

            // A selection change resubscribed in the meantime
            if self.inner.subscriptions.current() != generation {
                break;
            }
        }

        if self.is_disposed() {
            return;
        }
        self.fetch_dashboards().await;
        self.fetch_widgets().await;
    }

    async fn on_selection_changed(&self) {
        self.resubscribe().await;
        self.fetch_widgets().await;
    }

    /// Replace the change subscriptions with ones for the current context
    ///
    /// Returns false when a topic could not be subscribed. A disposed service
    /// or a superseded generation counts as done.
    async fn resubscribe(&self) -> bool {
        if self.is_disposed() {
            return true;
        }

        let generation = self.inner.subscriptions.begin();
        let current = self.current_id().await;
        let topics = subscriptions::topics(
            &self.inner.user.id,
            self.inner.config.widget_scope,
            current.as_deref(),
        );
        let expected = topics.len();

        let guards = subscriptions::open(
            self.inner.backend.feed.as_ref(),
            topics,
            generation,
            &self.inner.events,
        )
        .await;

        let complete = guards.len() == expected;
        if !self.inner.subscriptions.commit(generation, guards) {
            tracing::trace!(generation, "Subscription generation superseded");
            return true;
        }
        complete
    }

    async fn current_id(&self) -> Option<String> {
        self.inner.state.lock().await.current.clone()
    }

    fn publish(&self, state: &State) {
        self.inner.snapshot.send_replace(state.snapshot());
    }

    fn store(&self) -> &dyn TableStore {
        self.inner.backend.store.as_ref()
    }

    fn notifier(&self) -> &dyn Notifier {
        self.inner.backend.notifier.as_ref()
    }
}

fn lock_reconciler(inner: &Inner) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
    inner.reconciler.lock().unwrap_or_else(|e| e.into_inner())
}

/// Apply change events until the service is gone
async fn run_reconciler(service: Weak<Inner>, mut events: mpsc::UnboundedReceiver<Tagged>) {
    while let Some(tagged) = events.recv().await {
        let Some(inner) = service.upgrade() else {
            break;
        };
        DashboardService { inner }.apply(tagged).await;
    }
    tracing::debug!("Reconciler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChartKind, WidgetConfig, WidgetType};
    use crate::notify::{Level, ToastQueue};
    use crate::store::{MemoryStore, StoreError, StoreResult};
    use crate::realtime::ChangeHub;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    /// Delegates to a `MemoryStore`, failing dashboard selects on demand and
    /// optionally holding widget selects behind a gate
    struct FlakyStore {
        inner: Arc<MemoryStore>,
        fail_dashboards: AtomicBool,
        widget_gate: Arc<Mutex<()>>,
    }

    impl FlakyStore {
        fn new(inner: Arc<MemoryStore>) -> Self {
            Self {
                inner,
                fail_dashboards: AtomicBool::new(false),
                widget_gate: Arc::new(Mutex::new(())),
            }
        }
    }

    #[async_trait]
    impl TableStore for FlakyStore {
        async fn select(&self, table: Table, query: &Query) -> StoreResult<Vec<Value>> {
            match table {
                Table::Dashboards if self.fail_dashboards.load(Ordering::SeqCst) => {
                    Err(StoreError::Status {
                        status: 503,
                        message: "unavailable".to_string(),
                    })
                }
                Table::DashboardWidgets => {
                    let _gate = self.widget_gate.lock().await;
                    self.inner.select(table, query).await
                }
                _ => self.inner.select(table, query).await,
            }
        }

        async fn insert(&self, table: Table, row: Value) -> StoreResult<Value> {
            self.inner.insert(table, row).await
        }

        async fn update(&self, table: Table, query: &Query, patch: Value) -> StoreResult<Vec<Value>> {
            self.inner.update(table, query, patch).await
        }

        async fn delete(&self, table: Table, query: &Query) -> StoreResult<u64> {
            self.inner.delete(table, query).await
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        toasts: ToastQueue,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: Arc::new(MemoryStore::new()),
                toasts: ToastQueue::new(),
            }
        }

        fn hub(&self) -> Arc<ChangeHub> {
            self.store.hub()
        }

        async fn start(&self, store: Arc<dyn TableStore>, scope: WidgetScope) -> DashboardService {
            let backend = Backend::new(
                store,
                self.store.clone(),
                Arc::new(self.toasts.clone()),
            );
            let config = ServiceConfig { widget_scope: scope };
            let service =
                DashboardService::start(User::new("u1", "ada@example.com"), backend, config).await;
            service.fetch_dashboards().await;
            service
        }

        async fn service(&self) -> DashboardService {
            self.start(self.store.clone(), WidgetScope::Unscoped).await
        }

        async fn seed_dashboard(&self, user: &str, name: &str) -> String {
            let row = self
                .store
                .insert(Table::Dashboards, json!({"user_id": user, "name": name}))
                .await
                .unwrap();
            row["id"].as_str().unwrap().to_string()
        }

        async fn seed_widget(&self, dashboard_id: &str, title: &str) -> String {
            let row = self
                .store
                .insert(
                    Table::DashboardWidgets,
                    json!({"dashboard_id": dashboard_id, "title": title, "widget_type": "table"}),
                )
                .await
                .unwrap();
            row["id"].as_str().unwrap().to_string()
        }
    }

    async fn wait_for(
        service: &DashboardService,
        condition: impl Fn(&DashboardSnapshot) -> bool,
    ) -> DashboardSnapshot {
        let mut rx = service.watch();
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let snapshot = rx.borrow_and_update().clone();
                if condition(&snapshot) {
                    return snapshot;
                }
                if rx.changed().await.is_err() {
                    panic!("service dropped");
                }
            }
        })
        .await
        .expect("condition not reached in time")
    }

    fn titles(snapshot: &DashboardSnapshot) -> Vec<&str> {
        snapshot.widgets.iter().map(|w| w.title.as_str()).collect()
    }

    #[tokio::test]
    async fn test_initial_fetch_selects_newest() {
        let fx = Fixture::new();
        fx.seed_dashboard("u1", "Older").await;
        let newest = fx.seed_dashboard("u1", "Newest").await;
        fx.seed_dashboard("u2", "Not mine").await;

        let service = fx.service().await;
        let snapshot = service.snapshot();

        assert!(!snapshot.loading);
        let names: Vec<_> = snapshot.dashboards.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Newest", "Older"]);
        assert_eq!(snapshot.current.unwrap().id, newest);
    }

    #[tokio::test]
    async fn test_create_first_dashboard() {
        let fx = Fixture::new();
        let service = fx.service().await;
        assert!(service.snapshot().dashboards.is_empty());
        assert!(service.snapshot().current.is_none());

        let created = service.create_dashboard("Q4 Report", None).await.unwrap();

        let snapshot = service.snapshot();
        assert_eq!(snapshot.dashboards.len(), 1);
        assert_eq!(snapshot.dashboards[0].name, "Q4 Report");
        assert_eq!(snapshot.current.unwrap().id, created.id);
        assert!(created.layout.is_empty());
        assert!(!created.is_public);
        assert_eq!(fx.toasts.drain(), vec![crate::notify::Notification::success(
            "Dashboard created successfully"
        )]);
    }

    #[tokio::test]
    async fn test_created_dashboard_goes_first_and_is_selected() {
        let fx = Fixture::new();
        fx.seed_dashboard("u1", "Existing").await;
        let service = fx.service().await;

        let created = service
            .create_dashboard("Fresh", Some("quarterly numbers"))
            .await
            .unwrap();
        assert_eq!(created.description.as_deref(), Some("quarterly numbers"));

        let snapshot = service.snapshot();
        assert_eq!(snapshot.dashboards[0].id, created.id);
        assert_eq!(snapshot.current.as_ref().unwrap().id, created.id);
        assert!(snapshot.widgets.is_empty());

        // A refetch triggered by the change feed keeps the order
        service.fetch_dashboards().await;
        assert_eq!(service.snapshot().dashboards[0].id, created.id);
    }

    #[tokio::test]
    async fn test_create_failure_reports_once() {
        let fx = Fixture::new();
        let service = fx.service().await;

        assert!(service.create_dashboard("  ", None).await.is_none());
        assert!(service.snapshot().dashboards.is_empty());
        assert_eq!(fx.toasts.count(Level::Error), 1);
        assert_eq!(fx.toasts.drain()[0].message, "Failed to create dashboard");
    }

    #[tokio::test]
    async fn test_add_widget_goes_to_selected_dashboard_only() {
        let fx = Fixture::new();
        let service = fx.service().await;
        let first = service.create_dashboard("First", None).await.unwrap();
        let second = service.create_dashboard("Second", None).await.unwrap();

        let widget = service
            .add_widget(WidgetDraft::new("Revenue", WidgetType::Kpi))
            .await
            .unwrap();
        assert_eq!(widget.dashboard_id, second.id);
        assert_eq!(titles(&service.snapshot()), vec!["Revenue"]);

        assert!(service.select_dashboard(&first.id).await);
        assert!(service.snapshot().widgets.is_empty());

        assert!(service.select_dashboard(&second.id).await);
        assert_eq!(titles(&service.snapshot()), vec!["Revenue"]);
    }

    #[tokio::test]
    async fn test_add_widget_without_selection_is_silent() {
        let fx = Fixture::new();
        let service = fx.service().await;

        assert!(service
            .add_widget(WidgetDraft::new("Orphan", WidgetType::Map))
            .await
            .is_none());
        assert!(fx.toasts.drain().is_empty());
        assert_eq!(fx.store.row_count(Table::DashboardWidgets).await, 0);
    }

    #[tokio::test]
    async fn test_chart_widget_gets_default_config() {
        let fx = Fixture::new();
        let service = fx.service().await;
        service.create_dashboard("Charts", None).await.unwrap();

        let widget = service
            .add_widget(WidgetDraft::new("Sales", WidgetType::Chart))
            .await
            .unwrap();

        assert_eq!(
            widget.config,
            json!({"chartType": "bar", "data": [], "colors": ["#3b82f6", "#10b981", "#f59e0b"]})
        );
        assert_eq!(widget.position, crate::model::WidgetPosition::new(0, 0, 6, 4));
        match widget.typed_config().unwrap() {
            WidgetConfig::Chart(chart) => assert_eq!(chart.chart_type, ChartKind::Bar),
            other => panic!("Expected chart config, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_add_widget_rejects_mismatched_config() {
        let fx = Fixture::new();
        let service = fx.service().await;
        service.create_dashboard("Mixed", None).await.unwrap();
        fx.toasts.clear();

        let draft = WidgetDraft::new("Broken", WidgetType::Map)
            .config(WidgetType::Kpi.default_config());
        assert!(service.add_widget(draft).await.is_none());
        assert_eq!(fx.toasts.drain()[0].message, "Failed to add widget");
        assert_eq!(fx.store.row_count(Table::DashboardWidgets).await, 0);
    }

    #[tokio::test]
    async fn test_widgets_ordered_and_delete_removes_exactly_one() {
        let fx = Fixture::new();
        let dashboard = fx.seed_dashboard("u1", "Ops").await;
        let a = fx.seed_widget(&dashboard, "A").await;
        fx.seed_widget(&dashboard, "B").await;

        let service = fx.service().await;
        assert_eq!(titles(&service.snapshot()), vec!["A", "B"]);

        assert!(service.delete_widget(&a).await);
        assert_eq!(titles(&service.snapshot()), vec!["B"]);
        assert_eq!(fx.toasts.drain()[0].message, "Widget deleted successfully");
    }

    #[tokio::test]
    async fn test_delete_absent_widget_is_delegated() {
        let fx = Fixture::new();
        let dashboard = fx.seed_dashboard("u1", "Ops").await;
        fx.seed_widget(&dashboard, "A").await;
        let service = fx.service().await;

        assert!(service.delete_widget("no-such-widget").await);
        assert_eq!(titles(&service.snapshot()), vec!["A"]);
    }

    #[tokio::test]
    async fn test_select_empty_dashboard_yields_no_widgets() {
        let fx = Fixture::new();
        let empty = fx.seed_dashboard("u1", "Empty").await;
        let busy = fx.seed_dashboard("u1", "Busy").await;
        fx.seed_widget(&busy, "Chart").await;

        let service = fx.service().await;
        assert_eq!(titles(&service.snapshot()), vec!["Chart"]);

        assert!(service.select_dashboard(&empty).await);
        let snapshot = service.snapshot();
        assert_eq!(snapshot.current.unwrap().id, empty);
        assert!(snapshot.widgets.is_empty());
    }

    #[tokio::test]
    async fn test_select_unknown_dashboard_is_ignored() {
        let fx = Fixture::new();
        let only = fx.seed_dashboard("u1", "Only").await;
        let theirs = fx.seed_dashboard("u2", "Theirs").await;
        let service = fx.service().await;

        assert!(!service.select_dashboard(&theirs).await);
        assert!(!service.select_dashboard("missing").await);
        assert_eq!(service.snapshot().current.unwrap().id, only);
    }

    #[tokio::test]
    async fn test_failed_list_keeps_state_and_toasts_once() {
        let fx = Fixture::new();
        fx.seed_dashboard("u1", "Kept").await;
        let flaky = Arc::new(FlakyStore::new(fx.store.clone()));
        let service = fx.start(flaky.clone(), WidgetScope::Unscoped).await;
        let before = service.snapshot();
        assert_eq!(before.dashboards.len(), 1);

        flaky.fail_dashboards.store(true, Ordering::SeqCst);
        assert!(!service.fetch_dashboards().await);

        assert_eq!(service.snapshot(), before);
        let toasts = fx.toasts.drain();
        assert_eq!(toasts, vec![crate::notify::Notification::error("Failed to load dashboards")]);
    }

    #[tokio::test]
    async fn test_failed_first_fetch_clears_loading() {
        let fx = Fixture::new();
        let flaky = Arc::new(FlakyStore::new(fx.store.clone()));
        flaky.fail_dashboards.store(true, Ordering::SeqCst);

        let service = fx.start(flaky, WidgetScope::Unscoped).await;
        assert!(!service.snapshot().loading);
        assert_eq!(fx.toasts.count(Level::Error), 1);
    }

    #[tokio::test]
    async fn test_stale_widget_response_is_discarded() {
        let fx = Fixture::new();
        let quiet = fx.seed_dashboard("u1", "Quiet").await;
        let busy = fx.seed_dashboard("u1", "Busy").await;
        fx.seed_widget(&busy, "Map").await;

        let flaky = Arc::new(FlakyStore::new(fx.store.clone()));
        let service = fx.start(flaky.clone(), WidgetScope::Unscoped).await;
        assert_eq!(service.snapshot().current.unwrap().id, busy);

        let gate = flaky.widget_gate.lock().await;
        let stale = tokio::spawn({
            let service = service.clone();
            async move { service.fetch_widgets().await }
        });
        tokio::task::yield_now().await;

        let switch = tokio::spawn({
            let service = service.clone();
            let quiet = quiet.clone();
            async move { service.select_dashboard(&quiet).await }
        });
        tokio::task::yield_now().await;
        drop(gate);

        assert!(!stale.await.unwrap());
        assert!(switch.await.unwrap());

        let snapshot = service.snapshot();
        assert_eq!(snapshot.current.unwrap().id, quiet);
        assert!(snapshot.widgets.is_empty());
    }

    #[tokio::test]
    async fn test_remote_changes_are_reconciled() {
        let fx = Fixture::new();
        let dashboard = fx.seed_dashboard("u1", "Live").await;
        let service = fx.service().await;

        fx.seed_widget(&dashboard, "Pushed").await;
        let snapshot = wait_for(&service, |s| s.widgets.len() == 1).await;
        assert_eq!(titles(&snapshot), vec!["Pushed"]);

        fx.seed_dashboard("u1", "Also live").await;
        let snapshot = wait_for(&service, |s| s.dashboards.len() == 2).await;
        assert_eq!(snapshot.dashboards[0].name, "Also live");
        // Selection is kept
        assert_eq!(snapshot.current.unwrap().id, dashboard);
    }

    #[tokio::test]
    async fn test_reconcile_maps_tables() {
        let fx = Fixture::new();
        let service = fx.service().await;

        let event = ChangeEvent::insert(Table::DashboardWidgets, json!({"id": "w1"}));
        assert_eq!(service.reconcile(&event).await, Invalidation::Widgets);
        let event = ChangeEvent::delete(Table::Dashboards, json!({"id": "d1"}));
        assert_eq!(service.reconcile(&event).await, Invalidation::Dashboards);
    }

    #[tokio::test]
    async fn test_superseded_generation_is_dropped() {
        let fx = Fixture::new();
        let dashboard = fx.seed_dashboard("u1", "Ops").await;
        let service = fx.service().await;
        let stale_generation = service.inner.subscriptions.current() - 1;

        fx.store
            .insert(
                Table::DashboardWidgets,
                json!({"id": "w-late", "dashboard_id": dashboard, "title": "Late", "widget_type": "kpi"}),
            )
            .await
            .unwrap();

        let event = ChangeEvent::insert(Table::DashboardWidgets, json!({"id": "w-late"}));
        assert!(!service.apply(Tagged::change(stale_generation, event.clone())).await);

        let current = service.inner.subscriptions.current();
        assert!(service.apply(Tagged::change(current, event)).await);
        assert_eq!(titles(&service.snapshot()), vec!["Late"]);
    }

    #[tokio::test]
    async fn test_dashboard_events_survive_selection_change() {
        let fx = Fixture::new();
        let first = fx.seed_dashboard("u1", "First").await;
        fx.seed_dashboard("u1", "Second").await;
        let service = fx.service().await;

        let before = service.inner.subscriptions.current();
        assert!(service.select_dashboard(&first).await);
        assert!(service.inner.subscriptions.current() > before);

        // Inserted by another client while the selection was changing
        let row = fx
            .store
            .insert(Table::Dashboards, json!({"user_id": "u1", "name": "Third"}))
            .await
            .unwrap();
        let event = ChangeEvent::insert(Table::Dashboards, row);

        assert!(service.apply(Tagged::change(before, event)).await);
        let snapshot = service.snapshot();
        assert_eq!(snapshot.dashboards.len(), 3);
        assert_eq!(snapshot.dashboards[0].name, "Third");
        assert_eq!(snapshot.current.unwrap().id, first);
    }

    #[tokio::test]
    async fn test_lost_feed_of_superseded_generation_is_ignored() {
        let fx = Fixture::new();
        let hub = fx.hub();
        let service = fx.service().await;
        let generation = service.inner.subscriptions.current();

        assert!(!service.apply(Tagged::lost(generation - 1)).await);
        assert_eq!(service.inner.subscriptions.current(), generation);
        assert_eq!(hub.subscription_count(), 2);
    }

    #[tokio::test]
    async fn test_service_resubscribes_after_feed_loss() {
        let fx = Fixture::new();
        let hub = fx.hub();
        let dashboard = fx.seed_dashboard("u1", "Live").await;
        let service = fx.service().await;
        assert_eq!(hub.subscription_count(), 2);
        let generation = service.inner.subscriptions.current();

        // The feed drops every subscription while the service keeps its guards
        for id in hub.subscription_ids() {
            assert!(hub.unsubscribe(&id));
        }
        assert_eq!(hub.subscription_count(), 0);

        fx.seed_widget(&dashboard, "Missed").await;
        let snapshot = wait_for(&service, |s| s.widgets.len() == 1).await;
        assert_eq!(titles(&snapshot), vec!["Missed"]);

        // Live updates flow again
        fx.seed_widget(&dashboard, "Pushed").await;
        let snapshot = wait_for(&service, |s| s.widgets.len() == 2).await;
        assert_eq!(titles(&snapshot), vec!["Missed", "Pushed"]);

        assert!(service.inner.subscriptions.current() > generation);
        assert_eq!(service.subscription_count(), 2);
        assert_eq!(hub.subscription_count(), 2);
        assert!(fx.toasts.drain().iter().all(|t| t.level != Level::Error));
    }

    /// Fails every subscribe until `failures` reaches zero
    struct FlakyFeed {
        inner: Arc<MemoryStore>,
        failures: std::sync::atomic::AtomicU32,
    }

    #[async_trait]
    impl ChangeFeed for FlakyFeed {
        async fn subscribe(&self, topic: crate::realtime::Topic) -> StoreResult<crate::realtime::Subscription> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(StoreError::Realtime("connection refused".to_string()));
            }
            self.inner.subscribe(topic).await
        }
    }

    #[tokio::test]
    async fn test_feed_recovery_retries_with_backoff() {
        let fx = Fixture::new();
        let hub = fx.hub();
        let dashboard = fx.seed_dashboard("u1", "Live").await;
        let feed = Arc::new(FlakyFeed {
            inner: fx.store.clone(),
            failures: std::sync::atomic::AtomicU32::new(0),
        });
        let backend = Backend::new(fx.store.clone(), feed.clone(), Arc::new(fx.toasts.clone()));
        let service =
            DashboardService::start(User::new("u1", "ada@example.com"), backend, ServiceConfig::default())
                .await;
        service.fetch_dashboards().await;
        assert_eq!(hub.subscription_count(), 2);

        // Three subscribe calls fail: the first attempt installs nothing,
        // the second one topic and the third both
        feed.failures.store(3, Ordering::SeqCst);
        for id in hub.subscription_ids() {
            hub.unsubscribe(&id);
        }

        fx.seed_widget(&dashboard, "Late").await;
        wait_for(&service, |s| s.widgets.len() == 1).await;
        assert_eq!(feed.failures.load(Ordering::SeqCst), 0);
        assert_eq!(service.subscription_count(), 2);
        assert_eq!(hub.subscription_count(), 2);
    }

    #[tokio::test]
    async fn test_subscriptions_follow_selection_and_dispose() {
        let fx = Fixture::new();
        let hub = fx.hub();
        let first = fx.seed_dashboard("u1", "First").await;
        fx.seed_dashboard("u1", "Second").await;

        let service = fx.service().await;
        assert_eq!(service.subscription_count(), 2);
        assert_eq!(hub.subscription_count(), 2);

        let generation = service.inner.subscriptions.current();
        service.select_dashboard(&first).await;
        assert!(service.inner.subscriptions.current() > generation);
        assert_eq!(hub.subscription_count(), 2);

        service.dispose();
        assert!(service.is_disposed());
        assert_eq!(hub.subscription_count(), 0);
        assert_eq!(service.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_current_dashboard_scope_filters_widget_feed() {
        let fx = Fixture::new();
        let hub = fx.hub();
        let service = fx.start(fx.store.clone(), WidgetScope::CurrentDashboard).await;
        assert_eq!(hub.table_subscription_count(Table::DashboardWidgets), 0);

        let mine = service.create_dashboard("Mine", None).await.unwrap();
        assert_eq!(hub.table_subscription_count(Table::DashboardWidgets), 1);

        // Widgets of another user's dashboard never reach this service
        let other = fx.seed_dashboard("u2", "Other").await;
        let event = ChangeEvent::insert(
            Table::DashboardWidgets,
            json!({"id": "w9", "dashboard_id": other}),
        );
        assert_eq!(hub.publish(&event), 0);

        let event = ChangeEvent::insert(
            Table::DashboardWidgets,
            json!({"id": "w1", "dashboard_id": mine.id}),
        );
        assert_eq!(hub.publish(&event), 1);
    }

    #[tokio::test]
    async fn test_dropping_service_releases_subscriptions() {
        let fx = Fixture::new();
        let hub = fx.hub();
        let service = fx.service().await;
        assert_eq!(hub.subscription_count(), 2);

        drop(service);
        assert_eq!(hub.subscription_count(), 0);
    }
}

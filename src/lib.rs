//! # InsightDeck
//!
//! Business-intelligence dashboards: users own named dashboards, each
//! holding typed widgets (chart, table, KPI card, map), kept in sync with a
//! table-store backend through live change feeds.
//!
//! ## Modules
//!
//! - [`model`]: dashboards, widgets and typed widget configuration
//! - [`store`]: table-store trait, in-memory store and REST client
//! - [`realtime`]: change events, subscriptions, hub and WebSocket feed
//! - [`service`]: per-user `DashboardService` (fetch, create, select, reconcile)
//! - [`session`]: the signed-in user
//! - [`notify`]: success/error toasts
//! - [`ui`]: view models and their plain-text rendering
//! - [`app`]: sign-in / sign-out lifecycle
//! - [`api`]: backend HTTP server with Axum
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
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
//!     let toasts = ToastQueue::new();
//!     let backend = Backend::new(store.clone(), store, Arc::new(toasts.clone()));
//!
//!     let user = User::new("u1", "ada@example.com");
//!     let service = DashboardService::start(user, backend, ServiceConfig::default()).await;
//!     service.fetch_dashboards().await;
//!
//!     service.create_dashboard("Q4 Report", None).await;
//!     service
//!         .add_widget(WidgetDraft::new("Revenue", WidgetType::Kpi))
//!         .await;
//!
//!     println!("{} widgets", service.snapshot().widgets.len());
//!     service.dispose();
//! }
//! ```

pub mod api;
pub mod app;
pub mod config;
pub mod model;
pub mod notify;
pub mod realtime;
pub mod service;
pub mod session;
pub mod store;
pub mod ui;

// Re-export top-level types for convenience
pub use model::{
    Dashboard, ModelError, NewDashboard, NewWidget, Widget, WidgetConfig, WidgetDraft,
    WidgetPosition, WidgetType,
};

pub use store::{MemoryStore, Query, RestConfig, RestStore, StoreError, StoreResult, Table, TableStore};

pub use realtime::{ChangeEvent, ChangeFeed, ChangeHub, RealtimeClient, Subscription, Topic};

pub use service::{Backend, DashboardService, DashboardSnapshot, ServiceConfig, WidgetScope};

pub use session::{LocalSession, SessionProvider, User};

pub use notify::{Notification, Notifier, ToastQueue};

pub use app::{App, AppView};

pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use config::{Config, ConfigError, LoggingConfig};

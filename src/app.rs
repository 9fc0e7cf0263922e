//! Application Shell
//!
//! Owns the session and the per-user `DashboardService`: signing in builds
//! a service and loads the user's dashboards, signing out disposes it. The
//! view is the sign-in screen without a user and the dashboard layout with
//! one.

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::service::{Backend, DashboardService, ServiceConfig};
use crate::session::{SessionProvider, User};
use crate::ui::{DashboardLayout, Tab};

/// What the application shows
#[derive(Debug, Clone, PartialEq)]
pub enum AppView {
    SignIn,
    Dashboard(Box<DashboardLayout>),
}

pub struct App {
    session: Arc<dyn SessionProvider>,
    backend: Backend,
    config: ServiceConfig,
    service: Mutex<Option<DashboardService>>,
}

impl App {
    pub fn new(session: Arc<dyn SessionProvider>, backend: Backend, config: ServiceConfig) -> Self {
        Self {
            session,
            backend,
            config,
            service: Mutex::new(None),
        }
    }

    /// Sign a user in and load their dashboards
    ///
    /// Signing in the user who is already signed in returns the running
    /// service; another user's service is disposed first.
    pub async fn sign_in(&self, user: User) -> DashboardService {
        let mut slot = self.service.lock().await;

        if let Some(existing) = slot.as_ref() {
            if existing.user() == &user {
                return existing.clone();
            }
        }
        if let Some(previous) = slot.take() {
            previous.dispose();
        }

        self.session.sign_in(user.clone()).await;

        let service =
            DashboardService::start(user, self.backend.clone(), self.config.clone()).await;
        service.fetch_dashboards().await;

        *slot = Some(service.clone());
        service
    }

    /// Start a service for a user the session already knows
    pub async fn restore(&self) -> Option<DashboardService> {
        let user = self.session.current_user()?;
        Some(self.sign_in(user).await)
    }

    /// Dispose the service and clear the session
    pub async fn sign_out(&self) {
        if let Some(service) = self.service.lock().await.take() {
            service.dispose();
        }
        self.session.sign_out().await;
    }

    /// The running service, if someone is signed in
    pub async fn service(&self) -> Option<DashboardService> {
        self.service.lock().await.clone()
    }

    pub async fn view(&self, tab: Tab) -> AppView {
        let service = self.service().await;
        match (self.session.current_user(), service) {
            (Some(user), Some(service)) => AppView::Dashboard(Box::new(DashboardLayout::build(
                tab,
                &user,
                &service.snapshot(),
            ))),
            _ => AppView::SignIn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ToastQueue;
    use crate::session::LocalSession;
    use crate::store::{MemoryStore, Table, TableStore};
    use crate::ui::layout::Content;
    use serde_json::json;

    fn app(store: &Arc<MemoryStore>, session: Arc<LocalSession>) -> App {
        let backend = Backend::new(store.clone(), store.clone(), Arc::new(ToastQueue::new()));
        App::new(session, backend, ServiceConfig::default())
    }

    #[tokio::test]
    async fn test_signed_out_shows_sign_in() {
        let store = Arc::new(MemoryStore::new());
        let app = app(&store, Arc::new(LocalSession::new()));

        assert_eq!(app.view(Tab::Dashboard).await, AppView::SignIn);
        assert!(app.restore().await.is_none());
    }

    #[tokio::test]
    async fn test_sign_in_loads_dashboards() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert(Table::Dashboards, json!({"user_id": "u1", "name": "Sales"}))
            .await
            .unwrap();
        let session = Arc::new(LocalSession::new());
        let app = app(&store, session.clone());

        let service = app.sign_in(User::new("u1", "ada@example.com")).await;
        assert!(!service.snapshot().loading);
        assert_eq!(session.current_user().unwrap().id, "u1");

        match app.view(Tab::Dashboard).await {
            AppView::Dashboard(layout) => match layout.content {
                Content::Dashboard(panel) => {
                    assert_eq!(panel.current.as_deref(), Some("Sales"));
                    assert_eq!(panel.dashboards.entries().len(), 1);
                }
                other => panic!("Expected dashboard content, got {:?}", other),
            },
            AppView::SignIn => panic!("Expected dashboard view"),
        }
    }

    #[tokio::test]
    async fn test_sign_out_disposes_service() {
        let store = Arc::new(MemoryStore::new());
        let hub = store.hub();
        let app = app(&store, Arc::new(LocalSession::new()));

        let service = app.sign_in(User::new("u1", "ada@example.com")).await;
        assert_eq!(hub.subscription_count(), 2);

        // Same user again keeps the running service
        app.sign_in(User::new("u1", "ada@example.com")).await;
        assert_eq!(hub.subscription_count(), 2);

        app.sign_out().await;
        assert!(service.is_disposed());
        assert_eq!(hub.subscription_count(), 0);
        assert!(app.service().await.is_none());
        assert_eq!(app.view(Tab::Settings).await, AppView::SignIn);
    }

    #[tokio::test]
    async fn test_switching_user_replaces_service() {
        let store = Arc::new(MemoryStore::new());
        let app = app(&store, Arc::new(LocalSession::new()));

        let first = app.sign_in(User::new("u1", "ada@example.com")).await;
        let second = app.sign_in(User::new("u2", "grace@example.com")).await;

        assert!(first.is_disposed());
        assert!(!second.is_disposed());
        assert_eq!(app.service().await.unwrap().user().id, "u2");
    }

    #[tokio::test]
    async fn test_restore_from_session() {
        let store = Arc::new(MemoryStore::new());
        let session = Arc::new(LocalSession::signed_in(User::new("u7", "lin@example.com")));
        let app = app(&store, session);

        let service = app.restore().await.unwrap();
        assert_eq!(service.user().id, "u7");
    }
}

//! Session
//!
//! The signed-in user. Authentication itself happens elsewhere; this module
//! only tracks who is signed in and lets observers follow changes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
}

impl User {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }

    /// Upper-cased first letter of the email, shown in the avatar
    pub fn initial(&self) -> char {
        self.email
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('?')
    }
}

/// Source of the current user
#[async_trait]
pub trait SessionProvider: Send + Sync {
    fn current_user(&self) -> Option<User>;

    /// Follow user changes
    fn watch(&self) -> watch::Receiver<Option<User>>;

    /// Record a user the identity provider has authenticated
    async fn sign_in(&self, user: User);

    async fn sign_out(&self);
}

/// In-process session
pub struct LocalSession {
    user: watch::Sender<Option<User>>,
}

impl LocalSession {
    pub fn new() -> Self {
        let (user, _) = watch::channel(None);
        Self { user }
    }

    /// Session with a user already signed in
    pub fn signed_in(user: User) -> Self {
        let session = Self::new();
        session.set_user(user);
        session
    }

    pub fn set_user(&self, user: User) {
        tracing::info!(user_id = %user.id, "Signed in");
        self.user.send_replace(Some(user));
    }
}

impl Default for LocalSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionProvider for LocalSession {
    fn current_user(&self) -> Option<User> {
        self.user.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<User>> {
        self.user.subscribe()
    }

    async fn sign_in(&self, user: User) {
        self.set_user(user);
    }

    async fn sign_out(&self) {
        if let Some(user) = self.user.send_replace(None) {
            tracing::info!(user_id = %user.id, "Signed out");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_initial() {
        assert_eq!(User::new("u1", "ada@example.com").initial(), 'A');
        assert_eq!(User::new("u1", "").initial(), '?');
    }

    #[tokio::test]
    async fn test_sign_in_and_out() {
        let session = LocalSession::new();
        let mut rx = session.watch();
        assert!(session.current_user().is_none());

        session.set_user(User::new("u1", "ada@example.com"));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref().map(|u| u.id.as_str()), Some("u1"));

        session.sign_out().await;
        assert!(session.current_user().is_none());
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
    }
}

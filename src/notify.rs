//! Notifications
//!
//! Transient user-facing messages ("toasts"). Success messages expire after
//! 3 seconds, errors after 5.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// How long a success toast stays visible
pub const SUCCESS_TTL: Duration = Duration::from_millis(3000);
/// How long an error toast stays visible
pub const ERROR_TTL: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Error,
    Info,
}

impl Level {
    pub fn ttl(&self) -> Duration {
        match self {
            Level::Success | Level::Info => SUCCESS_TTL,
            Level::Error => ERROR_TTL,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Level::Success => "✓",
            Level::Error => "✕",
            Level::Info => "ℹ",
        }
    }
}

/// A single toast
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub level: Level,
    pub message: String,
    pub ttl: Duration,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Level::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Level::Error, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Level::Info, message)
    }

    fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            ttl: level.ttl(),
        }
    }
}

/// Sink for user-facing notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);

    fn success(&self, message: &str) {
        self.notify(Notification::success(message));
    }

    fn error(&self, message: &str) {
        self.notify(Notification::error(message));
    }
}

/// Writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            Level::Error => tracing::warn!(toast = %notification.message, "Error notification"),
            Level::Success | Level::Info => {
                tracing::info!(toast = %notification.message, "Notification")
            }
        }
    }
}

#[derive(Debug)]
struct Entry {
    notification: Notification,
    shown_at: Instant,
}

/// Keeps toasts until they expire
///
/// Cloning shares the same queue, so the notifier handed to a service and
/// the one a view reads from can be the same.
#[derive(Debug, Default, Clone)]
pub struct ToastQueue {
    entries: Arc<Mutex<Vec<Entry>>>,
}

impl ToastQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toasts still visible now, oldest first
    pub fn visible(&self) -> Vec<Notification> {
        self.visible_at(Instant::now())
    }

    /// Toasts still visible at `now`; expired ones are dropped
    pub fn visible_at(&self, now: Instant) -> Vec<Notification> {
        let mut entries = self.lock();
        entries.retain(|e| now.saturating_duration_since(e.shown_at) < e.notification.ttl);
        entries.iter().map(|e| e.notification.clone()).collect()
    }

    /// Every toast recorded and not yet drained, expired or not
    pub fn drain(&self) -> Vec<Notification> {
        self.lock().drain(..).map(|e| e.notification).collect()
    }

    /// Number of recorded toasts of a level
    pub fn count(&self, level: Level) -> usize {
        self.lock()
            .iter()
            .filter(|e| e.notification.level == level)
            .count()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Notifier for ToastQueue {
    fn notify(&self, notification: Notification) {
        tracing::debug!(level = ?notification.level, toast = %notification.message, "Toast");
        self.lock().push(Entry {
            notification,
            shown_at: Instant::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttls() {
        assert_eq!(Notification::success("ok").ttl, Duration::from_secs(3));
        assert_eq!(Notification::error("bad").ttl, Duration::from_secs(5));
    }

    #[test]
    fn test_queue_expiry() {
        let queue = ToastQueue::new();
        queue.success("Saved");
        queue.error("Failed");

        let start = Instant::now();
        assert_eq!(queue.visible_at(start).len(), 2);

        let later = start + Duration::from_millis(4000);
        let visible = queue.visible_at(later);
        assert_eq!(visible, vec![Notification::error("Failed")]);

        assert!(queue.visible_at(start + Duration::from_secs(6)).is_empty());
    }

    #[test]
    fn test_clones_share_queue() {
        let queue = ToastQueue::new();
        let notifier: Arc<dyn Notifier> = Arc::new(queue.clone());
        notifier.error("Failed to load dashboards");

        assert_eq!(queue.count(Level::Error), 1);
        assert_eq!(queue.count(Level::Success), 0);
        assert_eq!(queue.drain().len(), 1);
        assert_eq!(queue.count(Level::Error), 0);
    }
}

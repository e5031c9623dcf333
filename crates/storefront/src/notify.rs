//! User-facing notifications with de-duplication.
//!
//! Every cart action resolves into exactly one notification. When the same
//! message of the same kind is raised again while a previous one is still
//! tracked, the new one is dropped entirely (not queued, not delayed).
//!
//! The tracker is an explicit object, created once per application instance
//! and shared via `Arc`, so tests can build isolated notifiers.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default de-duplication window.
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(10);

const CHANNEL_CAPACITY: usize = 64;

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Success,
    Error,
    Info,
    Warning,
}

impl NotificationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Info => "info",
            Self::Warning => "warning",
        }
    }
}

/// A notification delivered to subscribers.
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// De-duplicating notification dispatcher.
#[derive(Debug)]
pub struct Notifier {
    window: Duration,
    recent: Mutex<HashMap<String, Instant>>,
    sender: broadcast::Sender<Notification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_WINDOW)
    }
}

impl Notifier {
    /// Create a notifier suppressing repeats within `window`.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            window,
            recent: Mutex::new(HashMap::new()),
            sender,
        }
    }

    /// Subscribe to delivered notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Raise a notification.
    ///
    /// Returns `false` if it was suppressed as a duplicate.
    pub fn notify(&self, kind: NotificationKind, message: impl Into<String>) -> bool {
        let message = message.into();
        let key = format!("{}:{message}", kind.as_str());
        let now = Instant::now();

        {
            let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
            recent.retain(|_, created| now.duration_since(*created) < self.window);
            if recent.contains_key(&key) {
                debug!(%key, "Suppressing duplicate notification");
                return false;
            }
            recent.insert(key, now);
        }

        match kind {
            NotificationKind::Error => warn!(message = %message, "Notification"),
            _ => info!(kind = kind.as_str(), message = %message, "Notification"),
        }

        // No subscribers is fine: the notification is still tracked and logged
        let _ = self.sender.send(Notification {
            id: Uuid::new_v4(),
            kind,
            message,
            created_at: Utc::now(),
        });
        true
    }

    pub fn success(&self, message: impl Into<String>) -> bool {
        self.notify(NotificationKind::Success, message)
    }

    pub fn error(&self, message: impl Into<String>) -> bool {
        self.notify(NotificationKind::Error, message)
    }

    /// Number of keys currently tracked for de-duplication.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_within_window_is_suppressed() {
        let notifier = Notifier::default();
        let mut rx = notifier.subscribe();

        assert!(notifier.success("Товар добавлен в корзину"));
        assert!(!notifier.success("Товар добавлен в корзину"));

        let first = rx.try_recv().unwrap();
        assert_eq!(first.kind, NotificationKind::Success);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_message_different_kind_is_not_duplicate() {
        let notifier = Notifier::default();
        assert!(notifier.success("Корзина"));
        assert!(notifier.error("Корзина"));
        assert_eq!(notifier.tracked(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_window() {
        let notifier = Notifier::default();
        assert!(notifier.error("Ошибка сети"));

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(!notifier.error("Ошибка сети"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(notifier.error("Ошибка сети"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entries_are_purged_before_check() {
        let notifier = Notifier::new(Duration::from_secs(1));
        notifier.success("a");
        notifier.success("b");
        assert_eq!(notifier.tracked(), 2);

        tokio::time::advance(Duration::from_secs(2)).await;
        notifier.success("c");
        assert_eq!(notifier.tracked(), 1);
    }
}

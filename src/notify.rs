//! Notification surface for user-visible outcomes

use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub description: String,
}

/// Fire-and-forget notifications
pub trait Notifier: Send + Sync {
    fn success(&self, title: &str, description: &str);
    fn error(&self, title: &str, description: &str);
}

/// Notifier that keeps every notification for later display
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, kind: NotificationKind, title: &str, description: &str) {
        let mut list = match self.notifications.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        list.push(Notification {
            kind,
            title: title.to_string(),
            description: description.to_string(),
        });
    }

    /// Remove and return everything collected so far
    pub fn drain(&self) -> Vec<Notification> {
        let mut list = match self.notifications.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::take(&mut *list)
    }
}

impl Notifier for CollectingNotifier {
    fn success(&self, title: &str, description: &str) {
        self.push(NotificationKind::Success, title, description);
    }

    fn error(&self, title: &str, description: &str) {
        self.push(NotificationKind::Error, title, description);
    }
}

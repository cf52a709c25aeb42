// # Notification Target Trait
//
// Destinations for notification actions (log, webhooks, IFTTT, ...).

use async_trait::async_trait;
use serde::Serialize;

/// A rendered notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Short subject line (the action name by default)
    pub subject: String,
    /// Rendered message body
    pub message: String,
}

impl Notification {
    pub fn new(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            message: message.into(),
        }
    }
}

/// Trait for notification target implementations
///
/// Targets are invoked from spawned tasks; a slow target never stalls the
/// snapshot commit that caused the notification.
#[async_trait]
pub trait NotificationTarget: Send + Sync {
    /// Deliver one notification
    async fn notify(&self, notification: &Notification) -> Result<(), crate::Error>;
}

//! Visitor notifications
//!
//! Delivery contract: at most once, best effort, never awaited by the caller.
//! A failed send is logged and dropped; nothing is retried.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::error::AppResult;

/// Who a notification goes to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipient {
    pub user_id: i32,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTemplate {
    TicketIssued,
    TicketCancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub recipient: Recipient,
    pub template: NotificationTemplate,
    pub data: serde_json::Value,
}

/// Delivery channel for notifications
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> AppResult<()>;
}

/// Hands notifications to a detached task
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Spawn the send and return immediately. The handle is only useful to
    /// tests; callers drop it.
    pub fn dispatch(&self, notification: Notification) -> JoinHandle<()> {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            match notifier.send(&notification).await {
                Ok(()) => tracing::debug!(
                    user_id = notification.recipient.user_id,
                    template = ?notification.template,
                    "Notification sent"
                ),
                Err(e) => tracing::warn!(
                    user_id = notification.recipient.user_id,
                    template = ?notification.template,
                    "Notification failed: {}",
                    e
                ),
            }
        })
    }
}

/// Notifier that only writes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> AppResult<()> {
        tracing::info!(
            user_id = notification.recipient.user_id,
            template = ?notification.template,
            data = %notification.data,
            "Notification"
        );
        Ok(())
    }
}

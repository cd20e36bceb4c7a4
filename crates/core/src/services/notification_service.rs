use crate::models::notification::{Notification, NotificationKind};

/// Receives notifications after they are persisted. Delivery is fire and
/// forget; a sink cannot fail the check that raised the notification.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Writes every notification to the tracing log.
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, notification: &Notification) {
        match notification.kind {
            NotificationKind::TransactionDone => {
                tracing::info!(id = %notification.id, "{}", notification.message)
            }
            NotificationKind::PendingTransaction => {
                tracing::warn!(id = %notification.id, "{}", notification.message)
            }
            NotificationKind::RecurringDisabled => {
                tracing::error!(id = %notification.id, "{}", notification.message)
            }
        }
    }
}

/// Drops every notification.
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _notification: &Notification) {}
}

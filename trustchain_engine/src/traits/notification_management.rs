use crate::{
    db_types::{NewNotification, Notification},
    traits::LedgerError,
};

#[allow(async_fn_in_trait)]
pub trait NotificationManagement {
    /// Inserts one row per notification, atomically.
    async fn insert_notifications(&self, notifications: Vec<NewNotification>) -> Result<Vec<Notification>, LedgerError>;

    /// The user's notifications, newest first.
    async fn fetch_notifications(&self, user_id: &str, unread_only: bool) -> Result<Vec<Notification>, LedgerError>;

    /// Marks the notification as read. Only the recipient may do this. Marking an already-read notification is a no-op.
    async fn mark_notification_read(&self, notification_id: i64, user_id: &str) -> Result<Notification, LedgerError>;
}

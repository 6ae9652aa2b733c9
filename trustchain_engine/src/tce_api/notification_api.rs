use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewNotification, Notification},
    events::{EventProducers, NotificationCreatedEvent, SmsRequestedEvent},
    helpers::normalize_msisdn,
    traits::{LedgerError, NotificationManagement, ProfileManagement},
};

/// `NotificationDispatcher` fans workflow events out to the people involved.
///
/// Each notification is stored for the recipient to read later, and announced on the event bus. Text messages are
/// not sent from here; they are published as [`SmsRequestedEvent`]s for whichever transport is subscribed.
pub struct NotificationDispatcher<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for NotificationDispatcher<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NotificationDispatcher")
    }
}

impl<B: Clone> Clone for NotificationDispatcher<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), producers: self.producers.clone() }
    }
}

impl<B> NotificationDispatcher<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> NotificationDispatcher<B>
where B: NotificationManagement + ProfileManagement
{
    /// Stores one notification per recipient, in a single batch.
    pub async fn dispatch(&self, notifications: Vec<NewNotification>) -> Result<Vec<Notification>, LedgerError> {
        if notifications.is_empty() {
            return Ok(vec![]);
        }
        let stored = self.db.insert_notifications(notifications).await?;
        for notification in &stored {
            self.producers.publish_notification(NotificationCreatedEvent::new(notification.clone()));
        }
        debug!("📨️ {} notifications dispatched", stored.len());
        Ok(stored)
    }

    /// As [`Self::dispatch`], but failures are logged and swallowed. Used after a workflow transition has committed.
    pub async fn dispatch_best_effort(&self, notifications: Vec<NewNotification>) -> usize {
        match self.dispatch(notifications).await {
            Ok(stored) => stored.len(),
            Err(e) => {
                warn!("📨️ Could not store notifications: {e}");
                0
            },
        }
    }

    /// Queues a text message to the phone number on the user's profile. Returns false if the user has no usable
    /// number, or if the profile could not be read.
    pub async fn send_sms(&self, user_id: &str, order_id: Option<i64>, message: String) -> bool {
        let profile = match self.db.fetch_profile(user_id).await {
            Ok(p) => p,
            Err(e) => {
                warn!("📨️ Could not look up the phone number for {user_id}: {e}");
                return false;
            },
        };
        let Some(phone) = profile.and_then(|p| p.phone) else {
            debug!("📨️ {user_id} has no phone number on file. No SMS sent");
            return false;
        };
        let recipient = match normalize_msisdn(&phone) {
            Ok(r) => r,
            Err(e) => {
                warn!("📨️ Not sending SMS to {user_id}. {e}");
                return false;
            },
        };
        let correlation_id = match order_id {
            Some(id) => format!("order-{id}"),
            None => format!("user-{user_id}"),
        };
        let event = SmsRequestedEvent { user_id: user_id.to_string(), order_id, recipient, message, correlation_id };
        self.producers.publish_sms(event);
        true
    }

    /// The user's notifications, newest first.
    pub async fn notifications_for(&self, user_id: &str, unread_only: bool) -> Result<Vec<Notification>, LedgerError> {
        self.db.fetch_notifications(user_id, unread_only).await
    }

    pub async fn mark_read(&self, notification_id: i64, user_id: &str) -> Result<Notification, LedgerError> {
        let notification = self.db.mark_notification_read(notification_id, user_id).await?;
        trace!("📨️ Notification #{notification_id} read by {user_id}");
        Ok(notification)
    }
}

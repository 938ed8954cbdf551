use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::engine::EngineError;
use crate::model::Notification;

const CHANNEL_CAPACITY: usize = 256;

/// Outbound seam to whatever delivers messages to staff.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), EngineError>;
}

/// In-process delivery: one broadcast channel per recipient.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Notification>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to notifications for a user. Creates the channel if needed.
    pub fn subscribe(&self, recipient: Ulid) -> broadcast::Receiver<Notification> {
        let sender = self
            .channels
            .entry(recipient)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Drop a recipient's channel (e.g. on logout).
    pub fn remove(&self, recipient: &Ulid) {
        self.channels.remove(recipient);
    }
}

#[async_trait]
impl Notifier for NotifyHub {
    /// No-op if nobody is listening; the message is still logged.
    async fn notify(&self, notification: Notification) -> Result<(), EngineError> {
        tracing::info!(
            recipient = %notification.recipient,
            link = notification.link.as_deref().unwrap_or(""),
            "notify: {}",
            notification.message
        );
        if let Some(sender) = self.channels.get(&notification.recipient) {
            let _ = sender.send(notification);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(recipient: Ulid) -> Notification {
        Notification {
            recipient,
            message: "Room Salle A frees up at 14:30".into(),
            link: Some("/bookings/x".into()),
        }
    }

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = NotifyHub::new();
        let uid = Ulid::new();
        let mut rx = hub.subscribe(uid);

        hub.notify(note(uid)).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), note(uid));
    }

    #[tokio::test]
    async fn only_the_recipient_hears_it() {
        let hub = NotifyHub::new();
        let alice = Ulid::new();
        let bob = Ulid::new();
        let mut bob_rx = hub.subscribe(bob);

        hub.notify(note(alice)).await.unwrap();

        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        let uid = Ulid::new();
        hub.subscribe(uid);
        hub.remove(&uid);
        hub.notify(note(uid)).await.unwrap();
    }
}

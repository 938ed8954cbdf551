//! Expiration monitor: once a minute, classify bookings by how close they are
//! to their end time and hand off rooms that are about to free up.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::engine::{now_ms, Engine};
use crate::limits::*;
use crate::model::*;
use crate::notify::Notifier;

/// Presentation-only sets, recomputed from scratch every tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Highlights {
    /// Ended within the last 15 minutes.
    pub expiring: HashSet<Ulid>,
    /// Ends within the next 5 minutes.
    pub pre_expiring: HashSet<Ulid>,
}

fn is_active(b: &Booking) -> bool {
    b.status != BookingStatus::Completed
}

/// `now < end <= now + 15min`.
pub fn is_ending_soon(b: &Booking, now: Ms) -> bool {
    is_active(b) && b.span.end > now && b.span.end - now <= ENDING_SOON_LEAD_MS
}

pub fn classify<'a>(bookings: impl IntoIterator<Item = &'a Booking>, now: Ms) -> Highlights {
    let mut out = Highlights::default();
    for b in bookings.into_iter().filter(|b| is_active(b)) {
        let end = b.span.end;
        if end <= now && now - end <= RECENTLY_EXPIRED_WINDOW_MS {
            out.expiring.insert(b.id);
        } else if end > now && end - now <= PRE_EXPIRING_WINDOW_MS {
            out.pre_expiring.insert(b.id);
        }
    }
    out
}

pub struct ExpirationMonitor {
    engine: Arc<Engine>,
    notifier: Arc<dyn Notifier>,
    tz: Tz,
    highlights: watch::Sender<Highlights>,
}

impl ExpirationMonitor {
    pub fn new(engine: Arc<Engine>, notifier: Arc<dyn Notifier>, tz: Tz) -> Self {
        Self {
            engine,
            notifier,
            tz,
            highlights: watch::Sender::new(Highlights::default()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Highlights> {
        self.highlights.subscribe()
    }

    pub fn highlights(&self) -> Highlights {
        self.highlights.borrow().clone()
    }

    /// One evaluation at `now`. Returns the bookings whose ending-soon notice
    /// went out and was recorded on this tick.
    pub async fn tick(&self, now: Ms) -> Vec<Ulid> {
        let bookings = self.engine.list_bookings().await;

        let highlights = classify(&bookings, now);
        metrics::gauge!(crate::observability::EXPIRING_BOOKINGS).set(highlights.expiring.len() as f64);
        metrics::gauge!(crate::observability::PRE_EXPIRING_BOOKINGS)
            .set(highlights.pre_expiring.len() as f64);
        self.highlights.send_replace(highlights);

        let mut handed_off = Vec::new();
        for b in bookings.iter().filter(|b| is_ending_soon(b, now)) {
            if self.engine.is_ending_soon_notified(&b.id).await {
                continue;
            }
            self.announce(b).await;
            match self.engine.mark_ending_soon_notified(b.id).await {
                Ok(true) => handed_off.push(b.id),
                Ok(false) => {}
                // Only this booking is affected; it may be announced again next tick.
                Err(e) => warn!("could not record ending-soon notice for {}: {e}", b.id),
            }
        }
        handed_off
    }

    /// Tell every supervisor and cleaner. Delivery failures are logged, not retried.
    async fn announce(&self, booking: &Booking) {
        let room = match self.engine.get_room(&booking.room_id).await {
            Some(room) => room.name,
            None => booking.room_id.to_string(),
        };
        let ends = Utc
            .timestamp_millis_opt(booking.span.end)
            .single()
            .map(|t| t.with_timezone(&self.tz).format("%H:%M").to_string())
            .unwrap_or_default();
        let message = format!("Room {room} frees up at {ends}");
        let link = format!("/bookings/{}", booking.id);

        let mut recipients = self.engine.users_with_role(Role::Supervisor).await;
        recipients.extend(self.engine.users_with_role(Role::Cleaning).await);
        info!("booking {} ends at {ends}, notifying {} staff", booking.id, recipients.len());

        for user in recipients {
            let notification = Notification {
                recipient: user.id,
                message: message.clone(),
                link: Some(link.clone()),
            };
            match self.notifier.notify(notification).await {
                Ok(()) => {
                    metrics::counter!(crate::observability::NOTIFICATIONS_SENT_TOTAL).increment(1);
                }
                Err(e) => warn!("notify {} about {} failed: {e}", user.id, booking.id),
            }
        }
    }
}

/// Cooperative timer driving the monitor every minute.
pub async fn run_monitor(monitor: Arc<ExpirationMonitor>) {
    let mut interval = tokio::time::interval(Duration::from_secs(MONITOR_TICK_SECS));
    loop {
        interval.tick().await;
        let ids = monitor.tick(now_ms()).await;
        if !ids.is_empty() {
            debug!("ending-soon notices for {ids:?}");
        }
    }
}

//! Role-gated booking state machine.
//!
//! ```text
//! reserved ──start(pin)──▶ in_progress ──end──▶ completed
//!    │
//!    └──cancel──▶ (deleted)      cancel is allowed from any state
//! ```

use tracing::{info, warn};
use ulid::Ulid;

use crate::limits::MAX_TITLE_LEN;
use crate::model::*;

use super::conflict::{find_conflict, now_ms, validate_span};
use super::store::InMemoryStore;
use super::{Engine, EngineError};

/// Ad hoc booking requested at the front desk.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub room_id: Ulid,
    pub doctor_id: Option<Ulid>,
    pub title: String,
    pub start: Ms,
    pub end: Ms,
}

/// Partial edit; `None` keeps the current value. `doctor_id: Some(None)`
/// unassigns the doctor.
#[derive(Debug, Clone, Default)]
pub struct BookingEdit {
    pub room_id: Option<Ulid>,
    pub doctor_id: Option<Option<Ulid>>,
    pub title: Option<String>,
    pub start: Option<Ms>,
    pub end: Option<Ms>,
}

fn record<T>(op: &'static str, result: &Result<T, EngineError>) {
    let status = match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    metrics::counter!(
        crate::observability::BOOKING_MUTATIONS_TOTAL,
        "op" => op,
        "status" => status
    )
    .increment(1);
}

fn require_front_desk<'a>(store: &'a InMemoryStore, actor: Ulid) -> Result<&'a User, EngineError> {
    match store.user(&actor) {
        Some(user) if user.role == Role::FrontDesk => Ok(user),
        Some(_) => Err(EngineError::PermissionDenied("front desk only")),
        None => Err(EngineError::PermissionDenied("unknown user")),
    }
}

fn require_assigned_doctor<'a>(
    store: &'a InMemoryStore,
    actor: Ulid,
    booking: &Booking,
) -> Result<&'a User, EngineError> {
    let user = store
        .user(&actor)
        .ok_or(EngineError::PermissionDenied("unknown user"))?;
    match (user.doctor_id, booking.doctor_id) {
        (Some(mine), Some(assigned)) if mine == assigned => Ok(user),
        _ => Err(EngineError::PermissionDenied("only the assigned doctor")),
    }
}

/// Title, room and doctor checks shared by create and edit.
fn check_target(
    store: &InMemoryStore,
    room_id: Ulid,
    doctor_id: Option<Ulid>,
    title: &str,
) -> Result<(), EngineError> {
    if title.trim().is_empty() {
        return Err(EngineError::Validation("title must not be empty"));
    }
    if title.len() > MAX_TITLE_LEN {
        return Err(EngineError::LimitExceeded("title too long"));
    }
    if store.room(&room_id).is_none() {
        return Err(EngineError::NotFound(room_id));
    }
    if let Some(did) = doctor_id
        && store.doctor(&did).is_none()
    {
        return Err(EngineError::NotFound(did));
    }
    Ok(())
}

impl Engine {
    /// Front desk books a room. The new booking is `reserved` and owned by `actor`.
    pub async fn book_room(&self, actor: Ulid, req: NewBooking) -> Result<Booking, EngineError> {
        let result = self.book_room_inner(actor, req).await;
        record("create", &result);
        result
    }

    async fn book_room_inner(&self, actor: Ulid, req: NewBooking) -> Result<Booking, EngineError> {
        let span = validate_span(req.start, req.end)?;
        let mut store = self.store.write().await;
        require_front_desk(&store, actor)?;
        check_target(&store, req.room_id, req.doctor_id, &req.title)?;
        if let Some(other) = find_conflict(store.bookings(), req.room_id, span.start, span.end, None) {
            warn!("booking rejected: room {} overlaps {}", req.room_id, other.id);
            return Err(EngineError::Conflict(other.id));
        }

        let booking = Booking {
            id: Ulid::new(),
            room_id: req.room_id,
            doctor_id: req.doctor_id,
            title: req.title,
            booked_by: actor,
            span,
            status: BookingStatus::Reserved,
            source: BookingSource::Manual,
            created_at: now_ms(),
        };
        self.persist_and_apply(&mut store, Event::BookingCreated(booking.clone()))
            .await?;
        info!("booking {} created in room {} by {actor}", booking.id, booking.room_id);
        Ok(booking)
    }

    /// Front desk changes room, time, title or doctor. Status, owner and
    /// source are kept.
    pub async fn edit_booking(
        &self,
        actor: Ulid,
        id: Ulid,
        edit: BookingEdit,
    ) -> Result<Booking, EngineError> {
        let result = self.edit_booking_inner(actor, id, edit).await;
        record("edit", &result);
        result
    }

    async fn edit_booking_inner(
        &self,
        actor: Ulid,
        id: Ulid,
        edit: BookingEdit,
    ) -> Result<Booking, EngineError> {
        let mut store = self.store.write().await;
        require_front_desk(&store, actor)?;
        let current = store.booking(&id).ok_or(EngineError::NotFound(id))?;

        let span = validate_span(
            edit.start.unwrap_or(current.span.start),
            edit.end.unwrap_or(current.span.end),
        )?;
        let updated = Booking {
            room_id: edit.room_id.unwrap_or(current.room_id),
            doctor_id: edit.doctor_id.unwrap_or(current.doctor_id),
            title: edit.title.unwrap_or_else(|| current.title.clone()),
            span,
            ..current.clone()
        };
        check_target(&store, updated.room_id, updated.doctor_id, &updated.title)?;
        if let Some(other) =
            find_conflict(store.bookings(), updated.room_id, span.start, span.end, Some(id))
        {
            warn!("edit of {id} rejected: overlaps {}", other.id);
            return Err(EngineError::Conflict(other.id));
        }

        self.persist_and_apply(&mut store, Event::BookingUpdated(updated.clone()))
            .await?;
        info!("booking {id} edited by {actor}");
        Ok(updated)
    }

    /// Assigned doctor starts the consultation, confirming presence with their PIN.
    pub async fn start_booking(&self, actor: Ulid, id: Ulid, pin: &str) -> Result<(), EngineError> {
        let result = self.start_booking_inner(actor, id, pin).await;
        record("start", &result);
        result
    }

    async fn start_booking_inner(&self, actor: Ulid, id: Ulid, pin: &str) -> Result<(), EngineError> {
        let mut store = self.store.write().await;
        let booking = store.booking(&id).ok_or(EngineError::NotFound(id))?;
        let user = require_assigned_doctor(&store, actor, booking)?;
        if booking.status != BookingStatus::Reserved {
            return Err(EngineError::InvalidTransition {
                from: booking.status,
                to: BookingStatus::InProgress,
            });
        }
        if user.pin.as_deref() != Some(pin) {
            warn!("start of {id} rejected: incorrect code from {actor}");
            return Err(EngineError::IncorrectPin);
        }

        let event = Event::BookingStatusChanged {
            id,
            status: BookingStatus::InProgress,
        };
        self.persist_and_apply(&mut store, event).await?;
        info!("booking {id} started by {actor}");
        Ok(())
    }

    /// Assigned doctor closes the consultation.
    pub async fn end_booking(&self, actor: Ulid, id: Ulid) -> Result<(), EngineError> {
        let result = self.end_booking_inner(actor, id).await;
        record("end", &result);
        result
    }

    async fn end_booking_inner(&self, actor: Ulid, id: Ulid) -> Result<(), EngineError> {
        let mut store = self.store.write().await;
        let booking = store.booking(&id).ok_or(EngineError::NotFound(id))?;
        require_assigned_doctor(&store, actor, booking)?;
        if booking.status != BookingStatus::InProgress {
            return Err(EngineError::InvalidTransition {
                from: booking.status,
                to: BookingStatus::Completed,
            });
        }

        let event = Event::BookingStatusChanged {
            id,
            status: BookingStatus::Completed,
        };
        self.persist_and_apply(&mut store, event).await?;
        info!("booking {id} completed by {actor}");
        Ok(())
    }

    /// Front desk removes a booking, whatever its status.
    pub async fn cancel_booking(&self, actor: Ulid, id: Ulid) -> Result<(), EngineError> {
        let result = self.cancel_booking_inner(actor, id).await;
        record("cancel", &result);
        result
    }

    async fn cancel_booking_inner(&self, actor: Ulid, id: Ulid) -> Result<(), EngineError> {
        let mut store = self.store.write().await;
        require_front_desk(&store, actor)?;
        if store.booking(&id).is_none() {
            return Err(EngineError::NotFound(id));
        }
        self.persist_and_apply(&mut store, Event::BookingDeleted { id })
            .await?;
        info!("booking {id} cancelled by {actor}");
        Ok(())
    }
}

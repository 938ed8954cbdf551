use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::validate_span;
use super::{Engine, EngineError};

fn check_name(name: &str) -> Result<(), EngineError> {
    if name.trim().is_empty() {
        return Err(EngineError::Validation("name must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("name too long"));
    }
    Ok(())
}

fn check_pin(pin: &str) -> Result<(), EngineError> {
    if !(MIN_PIN_LEN..=MAX_PIN_LEN).contains(&pin.len()) || !pin.bytes().all(|b| b.is_ascii_digit()) {
        return Err(EngineError::Validation("pin must be 4 to 8 digits"));
    }
    Ok(())
}

impl Engine {
    pub async fn create_room(
        &self,
        name: &str,
        location: &str,
        doctor_in_charge: Option<Ulid>,
    ) -> Result<Room, EngineError> {
        check_name(name)?;
        let mut store = self.store.write().await;
        if let Some(existing) = store.room_by_name(name) {
            return Err(EngineError::AlreadyExists(existing.id));
        }
        if let Some(did) = doctor_in_charge
            && store.doctor(&did).is_none()
        {
            return Err(EngineError::NotFound(did));
        }
        let room = Room {
            id: Ulid::new(),
            name: name.to_string(),
            location: location.to_string(),
            doctor_in_charge,
        };
        self.persist_and_apply(&mut store, Event::RoomCreated(room.clone()))
            .await?;
        Ok(room)
    }

    pub async fn create_doctor(&self, name: &str, specialty: &str) -> Result<Doctor, EngineError> {
        check_name(name)?;
        let mut store = self.store.write().await;
        if let Some(existing) = store.doctor_by_name(name) {
            return Err(EngineError::AlreadyExists(existing.id));
        }
        let doctor = Doctor {
            id: Ulid::new(),
            name: name.to_string(),
            specialty: specialty.to_string(),
            status: DEFAULT_DOCTOR_STATUS.to_string(),
        };
        self.persist_and_apply(&mut store, Event::DoctorCreated(doctor.clone()))
            .await?;
        Ok(doctor)
    }

    /// Register (or replace) a user known to the external auth system.
    pub async fn register_user(&self, user: User) -> Result<(), EngineError> {
        check_name(&user.name)?;
        if let Some(pin) = &user.pin {
            check_pin(pin)?;
        }
        let mut store = self.store.write().await;
        if let Some(did) = user.doctor_id
            && store.doctor(&did).is_none()
        {
            return Err(EngineError::NotFound(did));
        }
        self.persist_and_apply(&mut store, Event::UserRegistered(user))
            .await
    }

    /// Insert a booking as-is. Enforces the `(room_id, start)` uniqueness
    /// constraint but not overlap; lifecycle operations layer that on top.
    pub async fn create_booking(&self, booking: Booking) -> Result<Booking, EngineError> {
        validate_span(booking.span.start, booking.span.end)?;
        if booking.title.len() > MAX_TITLE_LEN {
            return Err(EngineError::LimitExceeded("title too long"));
        }
        let mut store = self.store.write().await;
        if let Some(existing) = store.booking_at(booking.room_id, booking.span.start) {
            return Err(EngineError::AlreadyExists(existing.id));
        }
        if store.booking(&booking.id).is_some() {
            return Err(EngineError::AlreadyExists(booking.id));
        }
        if store.room(&booking.room_id).is_none() {
            return Err(EngineError::NotFound(booking.room_id));
        }
        if let Some(did) = booking.doctor_id
            && store.doctor(&did).is_none()
        {
            return Err(EngineError::NotFound(did));
        }
        self.persist_and_apply(&mut store, Event::BookingCreated(booking.clone()))
            .await?;
        Ok(booking)
    }

    /// Raw status write; no state-machine or role checks.
    pub async fn update_booking_status(
        &self,
        id: Ulid,
        status: BookingStatus,
    ) -> Result<(), EngineError> {
        let mut store = self.store.write().await;
        if store.booking(&id).is_none() {
            return Err(EngineError::NotFound(id));
        }
        self.persist_and_apply(&mut store, Event::BookingStatusChanged { id, status })
            .await
    }

    /// Physical delete.
    pub async fn delete_booking(&self, id: Ulid) -> Result<(), EngineError> {
        let mut store = self.store.write().await;
        if store.booking(&id).is_none() {
            return Err(EngineError::NotFound(id));
        }
        self.persist_and_apply(&mut store, Event::BookingDeleted { id })
            .await
    }

    /// Record that the ending-soon notice went out. Returns false if it
    /// already had, or if the booking no longer exists.
    pub async fn mark_ending_soon_notified(&self, booking_id: Ulid) -> Result<bool, EngineError> {
        let mut store = self.store.write().await;
        if store.is_notified(&booking_id) || store.booking(&booking_id).is_none() {
            return Ok(false);
        }
        self.persist_and_apply(&mut store, Event::EndingSoonNotified { booking_id })
            .await?;
        Ok(true)
    }

    pub async fn record_schedule_synced(&self, at: Ms) -> Result<(), EngineError> {
        let mut store = self.store.write().await;
        self.persist_and_apply(&mut store, Event::ScheduleSynced { at })
            .await
    }
}

use std::collections::{BTreeMap, HashMap, HashSet};

use ulid::Ulid;

use crate::model::*;

/// Materialized view of the WAL. Only `apply` mutates it.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    rooms: BTreeMap<Ulid, Room>,
    room_by_name: HashMap<String, Ulid>,
    doctors: BTreeMap<Ulid, Doctor>,
    doctor_by_name: HashMap<String, Ulid>,
    users: BTreeMap<Ulid, User>,
    bookings: BTreeMap<Ulid, Booking>,
    /// Unique index over `(room_id, start)`.
    booking_slots: HashMap<(Ulid, Ms), Ulid>,
    notified: HashSet<Ulid>,
    last_synced_at: Option<Ms>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::RoomCreated(room) => {
                self.room_by_name.insert(room.name.clone(), room.id);
                self.rooms.insert(room.id, room.clone());
            }
            Event::DoctorCreated(doctor) => {
                self.doctor_by_name.insert(doctor.name.clone(), doctor.id);
                self.doctors.insert(doctor.id, doctor.clone());
            }
            Event::UserRegistered(user) => {
                self.users.insert(user.id, user.clone());
            }
            Event::BookingCreated(booking) | Event::BookingUpdated(booking) => {
                if let Some(old) = self.bookings.remove(&booking.id) {
                    self.booking_slots.remove(&(old.room_id, old.span.start));
                }
                self.booking_slots
                    .insert((booking.room_id, booking.span.start), booking.id);
                self.bookings.insert(booking.id, booking.clone());
            }
            Event::BookingStatusChanged { id, status } => {
                if let Some(b) = self.bookings.get_mut(id) {
                    b.status = *status;
                }
            }
            Event::BookingDeleted { id } => {
                if let Some(old) = self.bookings.remove(id) {
                    self.booking_slots.remove(&(old.room_id, old.span.start));
                }
                self.notified.remove(id);
            }
            Event::EndingSoonNotified { booking_id } => {
                if self.bookings.contains_key(booking_id) {
                    self.notified.insert(*booking_id);
                }
            }
            Event::ScheduleSynced { at } => {
                self.last_synced_at = Some(self.last_synced_at.map_or(*at, |prev| prev.max(*at)));
            }
        }
    }

    // ── Rooms & doctors ──────────────────────────────────────

    pub fn room(&self, id: &Ulid) -> Option<&Room> {
        self.rooms.get(id)
    }

    pub fn room_by_name(&self, name: &str) -> Option<&Room> {
        self.room_by_name.get(name).and_then(|id| self.rooms.get(id))
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn doctor(&self, id: &Ulid) -> Option<&Doctor> {
        self.doctors.get(id)
    }

    pub fn doctor_by_name(&self, name: &str) -> Option<&Doctor> {
        self.doctor_by_name.get(name).and_then(|id| self.doctors.get(id))
    }

    pub fn doctors(&self) -> impl Iterator<Item = &Doctor> {
        self.doctors.values()
    }

    // ── Users ────────────────────────────────────────────────

    pub fn user(&self, id: &Ulid) -> Option<&User> {
        self.users.get(id)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    // ── Bookings ─────────────────────────────────────────────

    pub fn booking(&self, id: &Ulid) -> Option<&Booking> {
        self.bookings.get(id)
    }

    pub fn booking_at(&self, room_id: Ulid, start: Ms) -> Option<&Booking> {
        self.booking_slots
            .get(&(room_id, start))
            .and_then(|id| self.bookings.get(id))
    }

    pub fn bookings(&self) -> impl Iterator<Item = &Booking> {
        self.bookings.values()
    }

    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }

    // ── Monitor & sync markers ───────────────────────────────

    pub fn is_notified(&self, booking_id: &Ulid) -> bool {
        self.notified.contains(booking_id)
    }

    pub fn last_synced_at(&self) -> Option<Ms> {
        self.last_synced_at
    }

    /// Minimal event list that rebuilds this store from scratch.
    pub fn snapshot(&self) -> Vec<Event> {
        let mut events = Vec::with_capacity(
            self.rooms.len() + self.doctors.len() + self.users.len() + self.bookings.len() * 2 + 1,
        );
        events.extend(self.doctors.values().cloned().map(Event::DoctorCreated));
        events.extend(self.rooms.values().cloned().map(Event::RoomCreated));
        events.extend(self.users.values().cloned().map(Event::UserRegistered));
        events.extend(self.bookings.values().cloned().map(Event::BookingCreated));
        let mut notified: Vec<Ulid> = self.notified.iter().copied().collect();
        notified.sort();
        events.extend(
            notified
                .into_iter()
                .map(|booking_id| Event::EndingSoonNotified { booking_id }),
        );
        if let Some(at) = self.last_synced_at {
            events.push(Event::ScheduleSynced { at });
        }
        events
    }
}

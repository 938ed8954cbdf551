use ulid::Ulid;

use crate::model::*;

use super::conflict::has_conflict;
use super::Engine;

impl Engine {
    pub async fn find_room_by_name(&self, name: &str) -> Option<Room> {
        self.store.read().await.room_by_name(name).cloned()
    }

    pub async fn find_doctor_by_name(&self, name: &str) -> Option<Doctor> {
        self.store.read().await.doctor_by_name(name).cloned()
    }

    pub async fn get_room(&self, id: &Ulid) -> Option<Room> {
        self.store.read().await.room(id).cloned()
    }

    pub async fn get_doctor(&self, id: &Ulid) -> Option<Doctor> {
        self.store.read().await.doctor(id).cloned()
    }

    pub async fn get_user(&self, id: &Ulid) -> Option<User> {
        self.store.read().await.user(id).cloned()
    }

    pub async fn get_booking(&self, id: &Ulid) -> Option<Booking> {
        self.store.read().await.booking(id).cloned()
    }

    /// Booking in `room_id` starting exactly at `start`.
    pub async fn find_booking(&self, room_id: Ulid, start: Ms) -> Option<Booking> {
        self.store.read().await.booking_at(room_id, start).cloned()
    }

    /// All bookings, ordered by start time.
    pub async fn list_bookings(&self) -> Vec<Booking> {
        let store = self.store.read().await;
        let mut out: Vec<Booking> = store.bookings().cloned().collect();
        out.sort_by_key(|b| (b.span.start, b.id));
        out
    }

    pub async fn list_rooms(&self) -> Vec<Room> {
        let store = self.store.read().await;
        let mut out: Vec<Room> = store.rooms().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub async fn list_doctors(&self) -> Vec<Doctor> {
        let store = self.store.read().await;
        let mut out: Vec<Doctor> = store.doctors().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// First user (lowest id) holding `role`.
    pub async fn find_user_by_role(&self, role: Role) -> Option<User> {
        self.store
            .read()
            .await
            .users()
            .find(|u| u.role == role)
            .cloned()
    }

    pub async fn users_with_role(&self, role: Role) -> Vec<User> {
        self.store
            .read()
            .await
            .users()
            .filter(|u| u.role == role)
            .cloned()
            .collect()
    }

    /// Pre-submit overlap check for UIs.
    pub async fn has_conflict(&self, room_id: Ulid, start: Ms, end: Ms, exclude: Option<Ulid>) -> bool {
        let store = self.store.read().await;
        has_conflict(store.bookings(), room_id, start, end, exclude)
    }

    pub async fn is_ending_soon_notified(&self, booking_id: &Ulid) -> bool {
        self.store.read().await.is_notified(booking_id)
    }

    pub async fn last_synced_at(&self) -> Option<Ms> {
        self.store.read().await.last_synced_at()
    }
}

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds. The only time type.
pub type Ms = i64;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: Ulid,
    pub name: String,
    pub location: String,
    pub doctor_in_charge: Option<Ulid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Ulid,
    pub name: String,
    pub specialty: String,
    /// Placeholder ("resident") until curated outside the engine.
    pub status: String,
}

/// Roles the engine distinguishes. Everything else is `Staff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    FrontDesk,
    Supervisor,
    Cleaning,
    Doctor,
    Staff,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Ulid,
    pub name: String,
    pub role: Role,
    /// Short numeric code typed at the terminal to start a consultation.
    #[serde(default)]
    pub pin: Option<String>,
    /// Doctor record this user acts as, if any.
    #[serde(default)]
    pub doctor_id: Option<Ulid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Reserved,
    InProgress,
    Completed,
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingStatus::Reserved => write!(f, "reserved"),
            BookingStatus::InProgress => write!(f, "in_progress"),
            BookingStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Where a booking came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingSource {
    /// Materialized from the reference timetable.
    Template,
    /// Created by a front-desk user.
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub room_id: Ulid,
    pub doctor_id: Option<Ulid>,
    pub title: String,
    pub booked_by: Ulid,
    pub span: Span,
    pub status: BookingStatus,
    pub source: BookingSource,
    pub created_at: Ms,
}

/// Outbound message for the notification collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: Ulid,
    pub message: String,
    pub link: Option<String>,
}

/// WAL record format. Flat, no nesting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated(Room),
    DoctorCreated(Doctor),
    UserRegistered(User),
    BookingCreated(Booking),
    /// Full replacement after an edit (room, span, title, doctor).
    BookingUpdated(Booking),
    BookingStatusChanged {
        id: Ulid,
        status: BookingStatus,
    },
    BookingDeleted {
        id: Ulid,
    },
    EndingSoonNotified {
        booking_id: Ulid,
    },
    ScheduleSynced {
        at: Ms,
    },
}

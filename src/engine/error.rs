use ulid::Ulid;

use crate::model::BookingStatus;

#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// Candidate interval overlaps this booking.
    Conflict(Ulid),
    InvalidSpan,
    Validation(&'static str),
    PermissionDenied(&'static str),
    IncorrectPin,
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    LimitExceeded(&'static str),
    Timetable(String),
    Config(String),
    WalError(String),
    NotifyError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::Conflict(id) => write!(f, "conflict with booking: {id}"),
            EngineError::InvalidSpan => write!(f, "start time must be before end time"),
            EngineError::Validation(msg) => write!(f, "invalid input: {msg}"),
            EngineError::PermissionDenied(msg) => write!(f, "permission denied: {msg}"),
            EngineError::IncorrectPin => write!(f, "incorrect code"),
            EngineError::InvalidTransition { from, to } => {
                write!(f, "cannot move booking from {from} to {to}")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Timetable(e) => write!(f, "timetable error: {e}"),
            EngineError::Config(e) => write!(f, "configuration error: {e}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
            EngineError::NotifyError(e) => write!(f, "notification error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl EngineError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "not_found",
            EngineError::AlreadyExists(_) => "already_exists",
            EngineError::Conflict(_) => "conflict",
            EngineError::InvalidSpan
            | EngineError::Validation(_)
            | EngineError::LimitExceeded(_)
            | EngineError::Timetable(_) => "invalid",
            EngineError::PermissionDenied(_) | EngineError::IncorrectPin => "forbidden",
            EngineError::InvalidTransition { .. } => "invalid_transition",
            EngineError::Config(_) | EngineError::WalError(_) | EngineError::NotifyError(_) => {
                "infrastructure"
            }
        }
    }
}

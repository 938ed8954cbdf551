use ulid::Ulid;

use crate::model::*;

use super::EngineError;

pub fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as Ms)
}

/// Reject empty/inverted spans and timestamps outside the sane range.
pub fn validate_span(start: Ms, end: Ms) -> Result<Span, EngineError> {
    use crate::limits::*;
    if start >= end {
        return Err(EngineError::InvalidSpan);
    }
    if start < MIN_VALID_TIMESTAMP_MS || end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if end - start > MAX_SPAN_DURATION_MS {
        return Err(EngineError::LimitExceeded("span too wide"));
    }
    Ok(Span::new(start, end))
}

/// First booking in `room_id` whose span overlaps `[start, end)`, skipping
/// `exclude` (the booking being edited). Callers guarantee `start < end`.
pub(super) fn find_conflict<'a>(
    bookings: impl IntoIterator<Item = &'a Booking>,
    room_id: Ulid,
    start: Ms,
    end: Ms,
    exclude: Option<Ulid>,
) -> Option<&'a Booking> {
    bookings.into_iter().find(|b| {
        b.room_id == room_id
            && Some(b.id) != exclude
            && start < b.span.end
            && end > b.span.start
    })
}

/// Does `[start, end)` overlap any booking in `room_id`?
///
/// Pure: no validation, no side effects. Edit flows pass the edited booking's
/// id as `exclude` so it does not collide with itself.
pub fn has_conflict<'a>(
    bookings: impl IntoIterator<Item = &'a Booking>,
    room_id: Ulid,
    start: Ms,
    end: Ms,
    exclude: Option<Ulid>,
) -> bool {
    find_conflict(bookings, room_id, start, end, exclude).is_some()
}

//! Reference timetable: the curated weekly template of recurring consultations.
//!
//! On disk it is JSON, an ordered list of day blocks:
//!
//! ```json
//! [{ "day": "Mardi",
//!    "slots": [{ "start": "14:00", "end": "14:30", "room": "Salle A",
//!                "shortRoom": "A", "specialty": "Cardiologie",
//!                "doctor": "Dr. Obiang", "location": "Bloc B" }] }]
//! ```
//!
//! Day names match English or French weekday names, ignoring case and accents.
//! An empty `doctor` means the slot has no named doctor.

use std::path::PathBuf;

use chrono::{Datelike, Days, NaiveDate, NaiveTime, TimeZone, Weekday};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::engine::EngineError;
use crate::model::Span;

#[derive(Debug, Deserialize)]
struct RawDay {
    day: String,
    #[serde(default)]
    slots: Vec<RawSlot>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSlot {
    start: String,
    end: String,
    room: String,
    #[serde(default)]
    short_room: String,
    specialty: String,
    #[serde(default)]
    doctor: Option<String>,
    #[serde(default)]
    location: Option<String>,
}

/// One validated template row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSlot {
    pub weekday: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub room: String,
    pub short_room: String,
    pub specialty: String,
    pub doctor: Option<String>,
    pub location: Option<String>,
}

impl ReferenceSlot {
    /// Title given to bookings generated from this slot.
    pub fn title(&self) -> String {
        match &self.doctor {
            Some(doctor) => format!("{} - {}", self.specialty, doctor),
            None => self.specialty.clone(),
        }
    }

    /// Location recorded on a room created for this slot.
    pub fn room_location(&self) -> &str {
        self.location.as_deref().unwrap_or(&self.short_room)
    }

    /// Absolute span of this slot on `date` in `tz`. `None` when a bound
    /// falls in a DST gap.
    pub fn span_on(&self, date: NaiveDate, tz: &Tz) -> Option<Span> {
        let start = tz.from_local_datetime(&date.and_time(self.start)).earliest()?;
        let end = tz.from_local_datetime(&date.and_time(self.end)).earliest()?;
        let (start, end) = (start.timestamp_millis(), end.timestamp_millis());
        (start < end).then(|| Span::new(start, end))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayBlock {
    pub weekday: Weekday,
    pub slots: Vec<ReferenceSlot>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timetable {
    pub days: Vec<DayBlock>,
}

impl Timetable {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let raw: Vec<RawDay> =
            serde_json::from_str(json).map_err(|e| EngineError::Timetable(e.to_string()))?;
        let mut days = Vec::with_capacity(raw.len());
        for block in raw {
            let weekday = parse_weekday(&block.day)
                .ok_or_else(|| EngineError::Timetable(format!("unknown day {:?}", block.day)))?;
            let mut slots = Vec::with_capacity(block.slots.len());
            for s in block.slots {
                let start = parse_time_of_day(&s.start)?;
                let end = parse_time_of_day(&s.end)?;
                if start >= end {
                    return Err(EngineError::Timetable(format!(
                        "{} {}: slot {}-{} ends before it starts",
                        block.day, s.room, s.start, s.end
                    )));
                }
                if s.room.trim().is_empty() {
                    return Err(EngineError::Timetable(format!("{}: slot without room", block.day)));
                }
                slots.push(ReferenceSlot {
                    weekday,
                    start,
                    end,
                    room: s.room,
                    short_room: s.short_room,
                    specialty: s.specialty,
                    doctor: s.doctor.filter(|d| !d.trim().is_empty()),
                    location: s.location.filter(|l| !l.trim().is_empty()),
                });
            }
            days.push(DayBlock { weekday, slots });
        }
        Ok(Self { days })
    }

    pub fn slots(&self) -> impl Iterator<Item = &ReferenceSlot> {
        self.days.iter().flat_map(|d| d.slots.iter())
    }
}

/// Where the timetable comes from. File sources are re-read on every load,
/// so edits take effect on the next synchronization pass.
#[derive(Debug, Clone)]
pub enum TimetableSource {
    Static(Timetable),
    File(PathBuf),
}

impl TimetableSource {
    pub fn load(&self) -> Result<Timetable, EngineError> {
        match self {
            TimetableSource::Static(t) => Ok(t.clone()),
            TimetableSource::File(path) => {
                let json = std::fs::read_to_string(path).map_err(|e| {
                    EngineError::Timetable(format!("{}: {e}", path.display()))
                })?;
                Timetable::from_json(&json)
            }
        }
    }
}

fn fold_char(c: char) -> char {
    match c {
        'à' | 'â' | 'ä' | 'á' | 'ã' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'î' | 'ï' | 'í' | 'ì' => 'i',
        'ô' | 'ö' | 'ó' | 'ò' => 'o',
        'ù' | 'û' | 'ü' | 'ú' => 'u',
        'ç' => 'c',
        other => other,
    }
}

/// Weekday for an English or French day name, case- and accent-insensitive.
pub fn parse_weekday(name: &str) -> Option<Weekday> {
    let folded: String = name.trim().chars().flat_map(char::to_lowercase).map(fold_char).collect();
    let weekday = match folded.as_str() {
        "sunday" | "dimanche" => Weekday::Sun,
        "monday" | "lundi" => Weekday::Mon,
        "tuesday" | "mardi" => Weekday::Tue,
        "wednesday" | "mercredi" => Weekday::Wed,
        "thursday" | "jeudi" => Weekday::Thu,
        "friday" | "vendredi" => Weekday::Fri,
        "saturday" | "samedi" => Weekday::Sat,
        _ => return None,
    };
    Some(weekday)
}

/// Strict `HH:MM`.
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime, EngineError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|_| EngineError::Timetable(format!("bad time of day {s:?}, expected HH:MM")))
}

/// Next `weekday` on or after `today`, pushed `week_offset` weeks further.
/// Days are indexed Sunday=0 … Saturday=6.
pub fn occurrence_date(today: NaiveDate, weekday: Weekday, week_offset: i64) -> NaiveDate {
    let target = weekday.num_days_from_sunday() as i64;
    let current = today.weekday().num_days_from_sunday() as i64;
    let ahead = (target - current).rem_euclid(7) + 7 * week_offset;
    today + Days::new(ahead as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {"day": "Lundi", "slots": [
            {"start": "09:00", "end": "10:00", "room": "R1", "shortRoom": "R1",
             "specialty": "Pédiatrie", "doctor": ""}
        ]},
        {"day": "MARDI", "slots": [
            {"start": "14:00", "end": "14:30", "room": "Salle A", "shortRoom": "A",
             "specialty": "Cardiologie", "doctor": "Dr. Obiang", "location": "Bloc B"}
        ]}
    ]"#;

    #[test]
    fn parses_sample() {
        let t = Timetable::from_json(SAMPLE).unwrap();
        assert_eq!(t.days.len(), 2);
        assert_eq!(t.days[0].weekday, Weekday::Mon);
        assert_eq!(t.days[1].weekday, Weekday::Tue);

        let monday = &t.days[0].slots[0];
        assert_eq!(monday.doctor, None);
        assert_eq!(monday.title(), "Pédiatrie");
        assert_eq!(monday.room_location(), "R1");

        let tuesday = &t.days[1].slots[0];
        assert_eq!(tuesday.title(), "Cardiologie - Dr. Obiang");
        assert_eq!(tuesday.room_location(), "Bloc B");
        assert_eq!(tuesday.start, NaiveTime::from_hms_opt(14, 0, 0).unwrap());
    }

    #[test]
    fn weekday_names_fold_case_and_accents() {
        assert_eq!(parse_weekday("dimanche"), Some(Weekday::Sun));
        assert_eq!(parse_weekday(" Mercredi "), Some(Weekday::Wed));
        assert_eq!(parse_weekday("MÉRCREDI"), Some(Weekday::Wed));
        assert_eq!(parse_weekday("Friday"), Some(Weekday::Fri));
        assert_eq!(parse_weekday("someday"), None);
    }

    #[test]
    fn rejects_unknown_day_and_bad_times() {
        let unknown = r#"[{"day": "Funday", "slots": []}]"#;
        assert!(matches!(Timetable::from_json(unknown), Err(EngineError::Timetable(_))));

        let inverted = r#"[{"day": "Lundi", "slots": [
            {"start": "10:00", "end": "09:00", "room": "R1", "specialty": "X"}]}]"#;
        assert!(matches!(Timetable::from_json(inverted), Err(EngineError::Timetable(_))));

        let malformed = r#"[{"day": "Lundi", "slots": [
            {"start": "9h", "end": "10:00", "room": "R1", "specialty": "X"}]}]"#;
        assert!(matches!(Timetable::from_json(malformed), Err(EngineError::Timetable(_))));
    }

    #[test]
    fn occurrence_same_day_counts_as_this_week() {
        // 2026-10-20 is a Tuesday.
        let tuesday = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();
        assert_eq!(occurrence_date(tuesday, Weekday::Tue, 0), tuesday);
        assert_eq!(
            occurrence_date(tuesday, Weekday::Tue, 3),
            NaiveDate::from_ymd_opt(2026, 11, 10).unwrap()
        );
    }

    #[test]
    fn occurrence_wraps_to_next_week() {
        let tuesday = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();
        assert_eq!(
            occurrence_date(tuesday, Weekday::Mon, 0),
            NaiveDate::from_ymd_opt(2026, 10, 26).unwrap()
        );
        assert_eq!(
            occurrence_date(tuesday, Weekday::Sun, 1),
            NaiveDate::from_ymd_opt(2026, 11, 1).unwrap()
        );
    }

    #[test]
    fn span_on_uses_zone_offset() {
        let slot = Timetable::from_json(SAMPLE).unwrap().days[1].slots[0].clone();
        let date = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();
        let utc = slot.span_on(date, &chrono_tz::UTC).unwrap();
        let libreville = slot.span_on(date, &chrono_tz::Africa::Libreville).unwrap();
        // Libreville is UTC+1 all year.
        assert_eq!(utc.start - libreville.start, 3_600_000);
        assert_eq!(libreville.duration_ms(), 30 * 60_000);
    }

    #[test]
    fn span_on_skips_dst_gap() {
        let slot = ReferenceSlot {
            weekday: Weekday::Sun,
            start: NaiveTime::from_hms_opt(2, 15, 0).unwrap(),
            end: NaiveTime::from_hms_opt(2, 45, 0).unwrap(),
            room: "R".into(),
            short_room: "R".into(),
            specialty: "X".into(),
            doctor: None,
            location: None,
        };
        // Clocks jump 02:00 → 03:00 in Paris on 2026-03-29.
        let date = NaiveDate::from_ymd_opt(2026, 3, 29).unwrap();
        assert_eq!(slot.span_on(date, &chrono_tz::Europe::Paris), None);
    }
}

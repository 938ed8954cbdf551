//! Schedule synchronizer: materializes the reference timetable into rooms,
//! doctors and bookings for a rolling four-week horizon.
//!
//! Passes are idempotent: a booking is only inserted when no booking exists for
//! the same room and start instant. Nothing is updated or deleted. A pass that
//! fails midway keeps what it already wrote and re-arms the gate so the next
//! trigger retries from scratch.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{Days, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use ulid::Ulid;

use crate::engine::{now_ms, Engine, EngineError};
use crate::limits::*;
use crate::model::*;
use crate::timetable::{occurrence_date, ReferenceSlot, TimetableSource};

/// What one real pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub rooms_created: usize,
    pub doctors_created: usize,
    pub bookings_created: usize,
    pub bookings_existing: usize,
    /// Slot occurrences that could not be placed (DST gap).
    pub slots_skipped: usize,
    /// Future template bookings inside the horizon that no current slot produces.
    pub stale_template_bookings: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Gate closed: a pass ran recently or is running right now.
    Skipped,
    Completed(SyncReport),
}

pub struct Synchronizer {
    engine: Arc<Engine>,
    source: TimetableSource,
    tz: Tz,
    /// Start time of the last pass that did not fail; 0 re-arms the gate.
    gate: Mutex<Ms>,
}

impl Synchronizer {
    /// Seeds the gate from the persisted "last synchronized" marker.
    pub async fn new(engine: Arc<Engine>, source: TimetableSource, tz: Tz) -> Self {
        let last = engine.last_synced_at().await.unwrap_or(0);
        Self {
            engine,
            source,
            tz,
            gate: Mutex::new(last),
        }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Run a pass if the gate allows it. `force` ignores the 5-minute window
    /// (startup); without it, a pass already in flight also means `Skipped`.
    pub async fn sync(&self, now: Ms, force: bool) -> Result<SyncOutcome, EngineError> {
        let mut last = if force {
            self.gate.lock().await
        } else {
            match self.gate.try_lock() {
                Ok(guard) => guard,
                Err(_) => return Ok(self.skipped()),
            }
        };
        // A clock that stepped back behind the marker counts as elapsed.
        if !force && *last > 0 && (0..SYNC_MIN_INTERVAL_MS).contains(&(now - *last)) {
            return Ok(self.skipped());
        }

        *last = now;
        let started = Instant::now();
        let result = match self.run_pass(now).await {
            Ok(report) => self.engine.record_schedule_synced(now).await.map(|()| report),
            Err(e) => Err(e),
        };
        metrics::histogram!(crate::observability::SYNC_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(report) => {
                metrics::counter!(crate::observability::SYNC_PASSES_TOTAL, "status" => "ok").increment(1);
                metrics::counter!(crate::observability::SYNC_BOOKINGS_CREATED_TOTAL)
                    .increment(report.bookings_created as u64);
                info!(
                    "schedule synced: {} bookings created, {} already present, {} rooms, {} doctors created",
                    report.bookings_created,
                    report.bookings_existing,
                    report.rooms_created,
                    report.doctors_created
                );
                Ok(SyncOutcome::Completed(report))
            }
            Err(e) => {
                *last = 0;
                metrics::counter!(crate::observability::SYNC_PASSES_TOTAL, "status" => "error").increment(1);
                error!("schedule sync failed, will retry on next trigger: {e}");
                Err(e)
            }
        }
    }

    fn skipped(&self) -> SyncOutcome {
        metrics::counter!(crate::observability::SYNC_PASSES_TOTAL, "status" => "skipped").increment(1);
        SyncOutcome::Skipped
    }

    /// Read-path trigger: sync if due, never fail the caller.
    pub async fn ensure_synced(&self, now: Ms) -> Option<SyncReport> {
        match self.sync(now, false).await {
            Ok(SyncOutcome::Completed(report)) => Some(report),
            // Already logged by `sync`.
            Ok(SyncOutcome::Skipped) | Err(_) => None,
        }
    }

    pub async fn list_rooms(&self) -> Vec<Room> {
        self.ensure_synced(now_ms()).await;
        self.engine.list_rooms().await
    }

    pub async fn list_bookings(&self) -> Vec<Booking> {
        self.ensure_synced(now_ms()).await;
        self.engine.list_bookings().await
    }

    pub async fn list_doctors(&self) -> Vec<Doctor> {
        self.ensure_synced(now_ms()).await;
        self.engine.list_doctors().await
    }

    /// One ungated pass over every slot and week offset.
    pub async fn run_pass(&self, now: Ms) -> Result<SyncReport, EngineError> {
        let timetable = self.source.load()?;
        let today = Utc
            .timestamp_millis_opt(now)
            .single()
            .ok_or(EngineError::LimitExceeded("clock out of range"))?
            .with_timezone(&self.tz)
            .date_naive();
        let owner = self
            .engine
            .find_user_by_role(Role::FrontDesk)
            .await
            .ok_or(EngineError::Validation("no front-desk user to own generated bookings"))?;

        let mut report = SyncReport::default();
        let mut rooms: HashMap<String, Ulid> = HashMap::new();
        let mut doctors: HashMap<String, Ulid> = HashMap::new();
        let mut expected: HashSet<(Ulid, Ms)> = HashSet::new();

        for slot in timetable.slots() {
            let room_id = self.resolve_room(slot, &mut rooms, &mut report).await?;
            let doctor_id = match &slot.doctor {
                Some(name) => Some(self.resolve_doctor(name, slot, &mut doctors, &mut report).await?),
                None => None,
            };

            for week in 0..SYNC_HORIZON_WEEKS {
                let date = occurrence_date(today, slot.weekday, week);
                let Some(span) = slot.span_on(date, &self.tz) else {
                    warn!("slot {} {} on {date} falls in a DST gap, skipped", slot.room, slot.start);
                    report.slots_skipped += 1;
                    continue;
                };
                expected.insert((room_id, span.start));

                if self.engine.find_booking(room_id, span.start).await.is_some() {
                    report.bookings_existing += 1;
                    continue;
                }
                let booking = Booking {
                    id: Ulid::new(),
                    room_id,
                    doctor_id,
                    title: slot.title(),
                    booked_by: owner.id,
                    span,
                    status: BookingStatus::Reserved,
                    source: BookingSource::Template,
                    created_at: now,
                };
                match self.engine.create_booking(booking).await {
                    Ok(b) => {
                        debug!("materialized {} in {} at {}", b.title, slot.room, b.span.start);
                        report.bookings_created += 1;
                    }
                    // Lost a race with another writer; the slot is materialized.
                    Err(EngineError::AlreadyExists(_)) => report.bookings_existing += 1,
                    Err(e) => return Err(e),
                }
            }
        }

        report.stale_template_bookings = self.count_stale(now, today, &expected).await;
        if report.stale_template_bookings > 0 {
            warn!(
                "{} upcoming template bookings no longer match the timetable; kept until cancelled",
                report.stale_template_bookings
            );
        }
        Ok(report)
    }

    async fn resolve_room(
        &self,
        slot: &ReferenceSlot,
        cache: &mut HashMap<String, Ulid>,
        report: &mut SyncReport,
    ) -> Result<Ulid, EngineError> {
        if let Some(id) = cache.get(&slot.room) {
            return Ok(*id);
        }
        let id = match self.engine.find_room_by_name(&slot.room).await {
            Some(room) => room.id,
            None => match self.engine.create_room(&slot.room, slot.room_location(), None).await {
                Ok(room) => {
                    info!("created room {}", room.name);
                    report.rooms_created += 1;
                    room.id
                }
                Err(EngineError::AlreadyExists(id)) => id,
                Err(e) => return Err(e),
            },
        };
        cache.insert(slot.room.clone(), id);
        Ok(id)
    }

    async fn resolve_doctor(
        &self,
        name: &str,
        slot: &ReferenceSlot,
        cache: &mut HashMap<String, Ulid>,
        report: &mut SyncReport,
    ) -> Result<Ulid, EngineError> {
        if let Some(id) = cache.get(name) {
            return Ok(*id);
        }
        let id = match self.engine.find_doctor_by_name(name).await {
            Some(doctor) => doctor.id,
            None => match self.engine.create_doctor(name, &slot.specialty).await {
                Ok(doctor) => {
                    info!("created doctor {}", doctor.name);
                    report.doctors_created += 1;
                    doctor.id
                }
                Err(EngineError::AlreadyExists(id)) => id,
                Err(e) => return Err(e),
            },
        };
        cache.insert(name.to_string(), id);
        Ok(id)
    }

    async fn count_stale(
        &self,
        now: Ms,
        today: NaiveDate,
        expected: &HashSet<(Ulid, Ms)>,
    ) -> usize {
        let horizon_end = (today + Days::new(7 * SYNC_HORIZON_WEEKS as u64))
            .and_hms_opt(0, 0, 0)
            .and_then(|dt| self.tz.from_local_datetime(&dt).earliest())
            .map_or(Ms::MAX, |dt| dt.timestamp_millis());
        self.engine
            .list_bookings()
            .await
            .iter()
            .filter(|b| {
                b.source == BookingSource::Template
                    && b.span.start >= now
                    && b.span.start < horizon_end
                    && !expected.contains(&(b.room_id, b.span.start))
            })
            .count()
    }
}

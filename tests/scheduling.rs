//! End-to-end: timetable sync, front-desk booking, doctor check-in and
//! the ending-soon notice, in the Libreville zone (UTC+1, no DST).

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, TimeZone};
use chrono_tz::Africa::Libreville;
use tokio_test::{assert_err, assert_ok};
use ulid::Ulid;

use roomsched::engine::{Engine, EngineError, NewBooking};
use roomsched::model::*;
use roomsched::monitor::ExpirationMonitor;
use roomsched::notify::NotifyHub;
use roomsched::sync::{SyncOutcome, Synchronizer};
use roomsched::timetable::TimetableSource;

const TUESDAY_SALLE_A: &str = r#"[
    {"day": "Mardi", "slots": [
        {"start": "14:00", "end": "14:30", "room": "Salle A", "shortRoom": "A",
         "specialty": "Cardiologie", "doctor": "Dr. Obiang", "location": "Bloc B"}
    ]}
]"#;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir()
        .join("roomsched_test_scheduling")
        .join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Local wall-clock time in Libreville on 2026-10-20 (a Tuesday).
fn tuesday(hour: u32, min: u32) -> Ms {
    let local = NaiveDate::from_ymd_opt(2026, 10, 20)
        .unwrap()
        .and_hms_opt(hour, min, 0)
        .unwrap();
    Libreville
        .from_local_datetime(&local)
        .single()
        .unwrap()
        .timestamp_millis()
}

async fn register(engine: &Engine, name: &str, role: Role, pin: Option<&str>, doctor_id: Option<Ulid>) -> Ulid {
    let id = Ulid::new();
    assert_ok!(
        engine
            .register_user(User {
                id,
                name: name.into(),
                role,
                pin: pin.map(String::from),
                doctor_id,
            })
            .await
    );
    id
}

#[tokio::test]
async fn tuesday_consultation_end_to_end() {
    let dir = scratch_dir("end_to_end");
    let timetable = dir.join("timetable.json");
    std::fs::write(&timetable, TUESDAY_SALLE_A).unwrap();

    let engine = Arc::new(Engine::new(dir.join("roomsched.wal")).unwrap());
    let desk = register(&engine, "Accueil", Role::FrontDesk, None, None).await;
    let supervisor = register(&engine, "Surveillante", Role::Supervisor, None, None).await;
    let cleaner = register(&engine, "Entretien", Role::Cleaning, None, None).await;

    let sync = Synchronizer::new(engine.clone(), TimetableSource::File(timetable), Libreville).await;

    // Morning sync materializes today's slot and the next three Tuesdays.
    let report = match assert_ok!(sync.sync(tuesday(8, 0), false).await) {
        SyncOutcome::Completed(report) => report,
        SyncOutcome::Skipped => panic!("first sync must run"),
    };
    assert_eq!(report.bookings_created, 4);
    assert_eq!(report.rooms_created, 1);
    assert_eq!(report.doctors_created, 1);

    let room = sync.list_rooms().await.into_iter().next().unwrap();
    assert_eq!(room.name, "Salle A");
    assert_eq!(room.location, "Bloc B");
    let obiang = engine.find_doctor_by_name("Dr. Obiang").await.unwrap();
    assert_eq!(obiang.specialty, "Cardiologie");

    let today = engine.find_booking(room.id, tuesday(14, 0)).await.unwrap();
    assert_eq!(today.span.end, tuesday(14, 30));
    assert_eq!(today.title, "Cardiologie - Dr. Obiang");
    assert_eq!(today.status, BookingStatus::Reserved);
    assert_eq!(today.source, BookingSource::Template);
    assert_eq!(today.doctor_id, Some(obiang.id));
    assert_eq!(today.booked_by, desk);

    // A walk-in overlapping the consultation is turned away.
    let walk_in = NewBooking {
        room_id: room.id,
        doctor_id: None,
        title: "Échographie".into(),
        start: tuesday(14, 15),
        end: tuesday(14, 45),
    };
    let err = assert_err!(engine.book_room(desk, walk_in).await);
    assert!(matches!(err, EngineError::Conflict(id) if id == today.id));

    // Reads within five minutes of a pass do not resync.
    assert!(sync.ensure_synced(tuesday(8, 3)).await.is_none());

    // The doctor checks in.
    let dr = register(&engine, "Dr. Obiang", Role::Doctor, Some("2468"), Some(obiang.id)).await;
    let err = assert_err!(engine.start_booking(dr, today.id, "1357").await);
    assert!(matches!(err, EngineError::IncorrectPin));
    assert_ok!(engine.start_booking(dr, today.id, "2468").await);

    // Fifteen minutes before the end, supervisors and cleaners hear about it.
    let hub = Arc::new(NotifyHub::new());
    let mut sup_rx = hub.subscribe(supervisor);
    let mut clean_rx = hub.subscribe(cleaner);
    let mut desk_rx = hub.subscribe(desk);
    let monitor = ExpirationMonitor::new(engine.clone(), hub.clone(), Libreville);

    assert!(monitor.tick(tuesday(14, 10)).await.is_empty());
    assert_eq!(monitor.tick(tuesday(14, 20)).await, vec![today.id]);

    for rx in [&mut sup_rx, &mut clean_rx] {
        let n = rx.try_recv().unwrap();
        assert_eq!(n.message, "Room Salle A frees up at 14:30");
        assert_eq!(n.link.as_deref(), Some(format!("/bookings/{}", today.id).as_str()));
    }
    assert!(desk_rx.try_recv().is_err());

    // The next tick is silent, but the booking is highlighted as pre-expiring.
    assert!(monitor.tick(tuesday(14, 26)).await.is_empty());
    assert!(sup_rx.try_recv().is_err());
    assert!(monitor.highlights().pre_expiring.contains(&today.id));

    // Running over: highlighted as expiring until the doctor closes it.
    monitor.tick(tuesday(14, 35)).await;
    assert!(monitor.highlights().expiring.contains(&today.id));

    assert_ok!(engine.end_booking(dr, today.id).await);
    monitor.tick(tuesday(14, 36)).await;
    assert!(monitor.highlights().expiring.is_empty());
    assert_eq!(
        engine.get_booking(&today.id).await.unwrap().status,
        BookingStatus::Completed
    );

    // The walk-in now fits after the consultation.
    let later = NewBooking {
        room_id: room.id,
        doctor_id: None,
        title: "Échographie".into(),
        start: tuesday(14, 30),
        end: tuesday(15, 0),
    };
    assert_ok!(engine.book_room(desk, later).await);
}

#[tokio::test]
async fn edited_timetable_is_picked_up_on_the_next_pass() {
    let dir = scratch_dir("reload");
    let timetable = dir.join("timetable.json");
    std::fs::write(&timetable, TUESDAY_SALLE_A).unwrap();

    let engine = Arc::new(Engine::new(dir.join("roomsched.wal")).unwrap());
    register(&engine, "Accueil", Role::FrontDesk, None, None).await;
    let sync = Synchronizer::new(engine.clone(), TimetableSource::File(timetable.clone()), Libreville).await;
    assert_ok!(sync.sync(tuesday(8, 0), true).await);

    std::fs::write(
        &timetable,
        r#"[{"day": "Mardi", "slots": [
            {"start": "14:00", "end": "14:30", "room": "Salle A", "shortRoom": "A",
             "specialty": "Cardiologie", "doctor": "Dr. Obiang", "location": "Bloc B"},
            {"start": "16:00", "end": "17:00", "room": "Salle B", "shortRoom": "B",
             "specialty": "Dermatologie"}
        ]}]"#,
    )
    .unwrap();

    // Inside the rate-limit window the edit is not seen yet.
    assert!(matches!(
        assert_ok!(sync.sync(tuesday(8, 2), false).await),
        SyncOutcome::Skipped
    ));
    assert!(engine.find_room_by_name("Salle B").await.is_none());

    let report = match assert_ok!(sync.sync(tuesday(8, 6), false).await) {
        SyncOutcome::Completed(report) => report,
        SyncOutcome::Skipped => panic!("window has elapsed"),
    };
    assert_eq!(report.bookings_created, 4);
    assert_eq!(report.bookings_existing, 4);

    let salle_b = engine.find_room_by_name("Salle B").await.unwrap();
    let b = engine.find_booking(salle_b.id, tuesday(16, 0)).await.unwrap();
    assert_eq!(b.title, "Dermatologie");
    assert_eq!(b.doctor_id, None);
    assert_eq!(engine.list_bookings().await.len(), 8);
}

#[tokio::test]
async fn restart_keeps_bookings_and_sync_marker() {
    let dir = scratch_dir("restart");
    let timetable = dir.join("timetable.json");
    std::fs::write(&timetable, TUESDAY_SALLE_A).unwrap();
    let wal = dir.join("roomsched.wal");

    {
        let engine = Arc::new(Engine::new(wal.clone()).unwrap());
        register(&engine, "Accueil", Role::FrontDesk, None, None).await;
        let sync = Synchronizer::new(engine.clone(), TimetableSource::File(timetable.clone()), Libreville).await;
        assert_ok!(sync.sync(tuesday(8, 0), true).await);
        assert_ok!(engine.compact_wal().await);
    }

    let engine = Arc::new(Engine::new(wal).unwrap());
    assert_eq!(engine.list_bookings().await.len(), 4);
    assert_eq!(engine.last_synced_at().await, Some(tuesday(8, 0)));

    let sync = Synchronizer::new(engine.clone(), TimetableSource::File(timetable), Libreville).await;
    assert!(matches!(
        assert_ok!(sync.sync(tuesday(8, 1), false).await),
        SyncOutcome::Skipped
    ));
}

use super::*;
use std::path::PathBuf;

use crate::clock::FixedClock;
use crate::model::*;
use crate::store::StoreError;

/// 2021-04-01T09:00:00Z
const APRIL_1_9AM: Ms = 1_617_267_600_000;
const M: Ms = 60_000;

use crate::limits::MAX_VALID_TIMESTAMP_MS;

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("slotbook_test_engine");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

struct Harness {
    engine: SchedulingEngine,
    store: Arc<WalStore>,
    clock: Arc<FixedClock>,
    doctor: Ulid,
}

async fn harness(name: &str) -> Harness {
    let store = Arc::new(WalStore::open(&test_wal_path(name)).unwrap());
    let clock = Arc::new(FixedClock::new(APRIL_1_9AM));
    let engine = SchedulingEngine::with_store(store.clone(), clock.clone(), SchedulePolicy::default());
    let doctor = engine
        .create_resource("Dr. Jekyll", Some("psychiatry"))
        .await
        .unwrap();
    Harness {
        engine,
        store,
        clock,
        doctor,
    }
}

async fn reservation_count(h: &Harness) -> usize {
    h.store
        .find_overlapping(h.doctor, Span::new(0, MAX_VALID_TIMESTAMP_MS))
        .await
        .unwrap()
        .len()
}

// ── book_appointment ─────────────────────────────────────

#[tokio::test]
async fn appointment_is_persisted_aligned() {
    let h = harness("appt_aligned.wal").await;
    let patient = Ulid::new();
    let id = h
        .engine
        .book_appointment(h.doctor, patient, APRIL_1_9AM + HOUR + 25 * M)
        .await
        .unwrap();

    let stored = h
        .store
        .find_overlapping(h.doctor, Span::new(APRIL_1_9AM, APRIL_1_9AM + DAY))
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    let r = &stored[0];
    assert_eq!(r.id, id);
    assert_eq!(r.subject_id, Some(patient));
    assert_eq!(r.reason, None);
    // 10:25 → [10:00, 11:00)
    assert_eq!(r.span, Span::new(APRIL_1_9AM + HOUR, APRIL_1_9AM + 2 * HOUR));
}

#[tokio::test]
async fn booked_interval_then_conflicts() {
    let h = harness("self_consistency.wal").await;
    let start = APRIL_1_9AM + 3 * HOUR;
    assert!(!h.engine.has_conflict(h.doctor, start, start + HOUR).await.unwrap());
    h.engine.book_appointment(h.doctor, Ulid::new(), start).await.unwrap();
    assert!(h.engine.has_conflict(h.doctor, start, start + HOUR).await.unwrap());
}

#[tokio::test]
async fn appointment_inside_existing_leave_conflicts() {
    let h = harness("appt_in_leave.wal").await;
    // leave 08:00–10:00, seeded straight into the store
    h.store
        .save(NewReservation {
            resource_id: h.doctor,
            subject_id: None,
            span: Span::new(APRIL_1_9AM - HOUR, APRIL_1_9AM + HOUR),
            reason: Some("conference".into()),
        })
        .await
        .unwrap();

    let err = h
        .engine
        .book_appointment(h.doctor, Ulid::new(), APRIL_1_9AM)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SchedulingConflict(_)));
    assert_eq!(err.to_string(), "The selected date is already booked");
    assert_eq!(reservation_count(&h).await, 1);
}

#[tokio::test]
async fn back_to_back_appointments_are_allowed() {
    let h = harness("back_to_back.wal").await;
    for i in 0..3 {
        h.engine
            .book_appointment(h.doctor, Ulid::new(), APRIL_1_9AM + i * HOUR)
            .await
            .unwrap();
    }
    assert_eq!(reservation_count(&h).await, 3);
}

#[tokio::test]
async fn second_booking_in_same_hour_conflicts() {
    let h = harness("same_hour.wal").await;
    h.engine
        .book_appointment(h.doctor, Ulid::new(), APRIL_1_9AM + 2 * HOUR)
        .await
        .unwrap();
    // 11:45 aligns into the booked 11:00 slot
    let result = h
        .engine
        .book_appointment(h.doctor, Ulid::new(), APRIL_1_9AM + 2 * HOUR + 45 * M)
        .await;
    assert!(matches!(result, Err(EngineError::SchedulingConflict(_))));
}

#[tokio::test]
async fn appointment_in_the_past_rejected() {
    let h = harness("appt_past.wal").await;
    h.clock.set(APRIL_1_9AM + 3 * HOUR);
    let err = h
        .engine
        .book_appointment(h.doctor, Ulid::new(), APRIL_1_9AM + 2 * HOUR)
        .await
        .unwrap_err();
    match err {
        EngineError::InvalidSlot { reasons } => {
            assert_eq!(reasons.len(), 1);
            assert!(reasons[0].contains("cannot be in the past"));
        }
        other => panic!("expected InvalidSlot, got {other:?}"),
    }
    assert_eq!(reservation_count(&h).await, 0);
}

#[tokio::test]
async fn appointment_outside_hours_and_past_reports_both() {
    let h = harness("appt_both.wal").await;
    // 08:00, one hour before now
    let err = h
        .engine
        .book_appointment(h.doctor, Ulid::new(), APRIL_1_9AM - HOUR)
        .await
        .unwrap_err();
    match err {
        EngineError::InvalidSlot { reasons } => {
            assert_eq!(
                reasons,
                vec![
                    "Picked date cannot be in the past".to_string(),
                    "Picked hour must be between 9 and 19".to_string(),
                ]
            );
        }
        other => panic!("expected InvalidSlot, got {other:?}"),
    }
}

#[tokio::test]
async fn last_bookable_hour_is_nineteen() {
    let h = harness("appt_19.wal").await;
    h.engine
        .book_appointment(h.doctor, Ulid::new(), APRIL_1_9AM + 10 * HOUR)
        .await
        .unwrap();
    let result = h
        .engine
        .book_appointment(h.doctor, Ulid::new(), APRIL_1_9AM + 11 * HOUR)
        .await;
    assert!(matches!(result, Err(EngineError::InvalidSlot { .. })));
}

#[tokio::test]
async fn appointment_for_unknown_doctor() {
    let h = harness("appt_unknown.wal").await;
    let ghost = Ulid::new();
    let result = h
        .engine
        .book_appointment(ghost, Ulid::new(), APRIL_1_9AM + HOUR)
        .await;
    assert!(matches!(result, Err(EngineError::ResourceNotFound(id)) if id == ghost));
}

#[tokio::test]
async fn appointments_for_different_doctors_are_independent() {
    let h = harness("two_doctors.wal").await;
    let other = h.engine.create_resource("Dr. Hyde", None).await.unwrap();
    h.engine
        .book_appointment(h.doctor, Ulid::new(), APRIL_1_9AM + HOUR)
        .await
        .unwrap();
    h.engine
        .book_appointment(other, Ulid::new(), APRIL_1_9AM + HOUR)
        .await
        .unwrap();
}

#[tokio::test]
async fn out_of_range_timestamp_rejected() {
    let h = harness("bad_timestamp.wal").await;
    let result = h.engine.book_appointment(h.doctor, Ulid::new(), Ms::MAX).await;
    assert!(matches!(result, Err(EngineError::LimitExceeded(_))));
}

// ── book_leave ───────────────────────────────────────────

#[tokio::test]
async fn leave_defaults_to_one_hour() {
    let h = harness("leave_default.wal").await;
    let id = h
        .engine
        .book_leave(h.doctor, "sick leave", APRIL_1_9AM + 4 * HOUR, None)
        .await
        .unwrap();
    let stored = h
        .store
        .find_overlapping(h.doctor, Span::new(APRIL_1_9AM, APRIL_1_9AM + DAY))
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, id);
    assert_eq!(stored[0].subject_id, None);
    assert_eq!(stored[0].reason.as_deref(), Some("sick leave"));
    assert_eq!(
        stored[0].span,
        Span::new(APRIL_1_9AM + 4 * HOUR, APRIL_1_9AM + 5 * HOUR)
    );
}

#[tokio::test]
async fn leave_end_before_start_rejected_without_write() {
    let h = harness("leave_inverted.wal").await;
    let err = h
        .engine
        .book_leave(
            h.doctor,
            "vacation",
            APRIL_1_9AM + 5 * HOUR,
            Some(APRIL_1_9AM + 4 * HOUR),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRange(_)));
    assert_eq!(err.to_string(), "End date must be after start date");
    assert_eq!(reservation_count(&h).await, 0);
}

#[tokio::test]
async fn leave_collapsing_to_empty_span_rejected() {
    let h = harness("leave_empty.wal").await;
    let result = h
        .engine
        .book_leave(
            h.doctor,
            "errand",
            APRIL_1_9AM + HOUR + 10 * M,
            Some(APRIL_1_9AM + HOUR + 50 * M),
        )
        .await;
    assert!(matches!(result, Err(EngineError::InvalidRange(_))));
    assert_eq!(reservation_count(&h).await, 0);
}

#[tokio::test]
async fn leave_with_end_equal_to_start_rejected() {
    let h = harness("leave_zero.wal").await;
    let at = APRIL_1_9AM + 2 * HOUR;
    let err = h
        .engine
        .book_leave(h.doctor, "errand", at, Some(at))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRange(END_BEFORE_START)));
    assert_eq!(reservation_count(&h).await, 0);
}

#[tokio::test]
async fn multi_hour_leave_blocks_whole_span() {
    let h = harness("leave_span.wal").await;
    h.engine
        .book_appointment(h.doctor, Ulid::new(), APRIL_1_9AM + 5 * HOUR)
        .await
        .unwrap();

    // 10:00–15:00 would swallow the 14:00 appointment
    let result = h
        .engine
        .book_leave(
            h.doctor,
            "vacation",
            APRIL_1_9AM + HOUR,
            Some(APRIL_1_9AM + 6 * HOUR),
        )
        .await;
    assert!(matches!(result, Err(EngineError::SchedulingConflict(_))));

    // 10:00–14:00 ends exactly where the appointment starts
    h.engine
        .book_leave(
            h.doctor,
            "vacation",
            APRIL_1_9AM + HOUR,
            Some(APRIL_1_9AM + 5 * HOUR),
        )
        .await
        .unwrap();
    assert!(h
        .engine
        .has_conflict(h.doctor, APRIL_1_9AM + 3 * HOUR, APRIL_1_9AM + 4 * HOUR)
        .await
        .unwrap());
}

#[tokio::test]
async fn leave_end_may_fall_after_hours() {
    let h = harness("leave_overnight.wal").await;
    // 18:00 until 10:00 next day; only the start is hour-checked
    h.engine
        .book_leave(
            h.doctor,
            "on call",
            APRIL_1_9AM + 9 * HOUR,
            Some(APRIL_1_9AM + DAY + HOUR),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn leave_start_validated_like_appointments() {
    let h = harness("leave_start_hours.wal").await;
    let result = h
        .engine
        .book_leave(h.doctor, "vacation", APRIL_1_9AM + 12 * HOUR, None)
        .await;
    assert!(matches!(result, Err(EngineError::InvalidSlot { .. })));
}

#[tokio::test]
async fn blank_or_oversized_leave_type_rejected() {
    let h = harness("leave_type.wal").await;
    let blank = h
        .engine
        .book_leave(h.doctor, "   ", APRIL_1_9AM + HOUR, None)
        .await;
    assert!(matches!(blank, Err(EngineError::InvalidArgument(_))));

    let huge = "x".repeat(crate::limits::MAX_LEAVE_TYPE_LEN + 1);
    let result = h
        .engine
        .book_leave(h.doctor, &huge, APRIL_1_9AM + HOUR, None)
        .await;
    assert!(matches!(result, Err(EngineError::LimitExceeded(_))));
}

#[tokio::test]
async fn leave_longer_than_limit_rejected() {
    let h = harness("leave_too_long.wal").await;
    let result = h
        .engine
        .book_leave(
            h.doctor,
            "sabbatical",
            APRIL_1_9AM,
            Some(APRIL_1_9AM + 60 * DAY),
        )
        .await;
    assert!(matches!(result, Err(EngineError::LimitExceeded(_))));
}

#[tokio::test]
async fn leave_for_unknown_doctor() {
    let h = harness("leave_unknown.wal").await;
    let result = h
        .engine
        .book_leave(Ulid::new(), "vacation", APRIL_1_9AM + HOUR, None)
        .await;
    assert!(matches!(result, Err(EngineError::ResourceNotFound(_))));
}

// ── compute_availability ─────────────────────────────────

#[tokio::test]
async fn availability_empty_calendar() {
    let h = harness("avail_empty.wal").await;
    let slots = h.engine.compute_availability(h.doctor, APRIL_1_9AM).await.unwrap();
    assert_eq!(slots.len(), 77);
    assert_eq!(slots[0].start, APRIL_1_9AM);
    assert_eq!(slots[0].end, APRIL_1_9AM + HOUR);
    assert!(slots.iter().all(|s| s.start < APRIL_1_9AM + 7 * DAY));
}

#[tokio::test]
async fn availability_excludes_booked_slot() {
    let h = harness("avail_booked.wal").await;
    h.engine
        .book_appointment(h.doctor, Ulid::new(), APRIL_1_9AM)
        .await
        .unwrap();
    let slots = h.engine.availability(h.doctor).await.unwrap();
    assert_eq!(slots.len(), 76);
    assert!(slots.iter().all(|s| s.start != APRIL_1_9AM));
}

#[tokio::test]
async fn availability_excludes_leave_and_is_recomputed() {
    let h = harness("avail_leave.wal").await;
    let before = h.engine.availability(h.doctor).await.unwrap();
    h.engine
        .book_leave(
            h.doctor,
            "conference",
            APRIL_1_9AM + DAY,
            Some(APRIL_1_9AM + 2 * DAY),
        )
        .await
        .unwrap();
    let after = h.engine.availability(h.doctor).await.unwrap();
    assert_eq!(before.len(), 77);
    assert_eq!(after.len(), 66);
    assert!(after
        .iter()
        .all(|s| s.start < APRIL_1_9AM + DAY || s.start >= APRIL_1_9AM + 2 * DAY));
}

#[tokio::test]
async fn availability_follows_the_clock() {
    let h = harness("avail_clock.wal").await;
    h.clock.advance(DAY + 30 * M);
    let slots = h.engine.availability(h.doctor).await.unwrap();
    assert_eq!(slots[0].start, APRIL_1_9AM + DAY);
    assert_eq!(slots.len(), 77);
}

#[tokio::test]
async fn availability_matches_per_slot_probing() {
    let h = harness("avail_probe.wal").await;
    h.engine
        .book_appointment(h.doctor, Ulid::new(), APRIL_1_9AM + 2 * HOUR)
        .await
        .unwrap();
    h.engine
        .book_leave(
            h.doctor,
            "training",
            APRIL_1_9AM + 2 * DAY + 3 * HOUR,
            Some(APRIL_1_9AM + 3 * DAY),
        )
        .await
        .unwrap();

    let fast = h.engine.compute_availability(h.doctor, APRIL_1_9AM).await.unwrap();

    let policy = *h.engine.policy();
    let window = horizon(&policy, APRIL_1_9AM);
    let mut probed = Vec::new();
    let mut t = window.start;
    while t < window.end {
        if policy.within_business_hours(t)
            && !h.engine.has_conflict(h.doctor, t, t + HOUR).await.unwrap()
        {
            probed.push(TimeSlot::from(Span::new(t, t + HOUR)));
        }
        t += HOUR;
    }
    assert_eq!(fast, probed);
}

#[tokio::test]
async fn availability_for_unknown_doctor_is_the_open_grid() {
    let h = harness("avail_unknown.wal").await;
    let slots = h
        .engine
        .compute_availability(Ulid::new(), APRIL_1_9AM)
        .await
        .unwrap();
    assert_eq!(slots.len(), 77);
}

#[tokio::test]
async fn availability_rejects_out_of_range_now() {
    let h = harness("avail_bad_now.wal").await;
    for now in [Ms::MAX - 1_000, MAX_VALID_TIMESTAMP_MS + 1, -1] {
        let result = h.engine.compute_availability(h.doctor, now).await;
        assert!(matches!(result, Err(EngineError::LimitExceeded(_))), "now = {now}");
    }
}

// ── listings ─────────────────────────────────────────────

#[tokio::test]
async fn list_appointments_paged_and_without_leave() {
    let h = harness("list_appts.wal").await;
    for i in (0..7).rev() {
        h.engine
            .book_appointment(h.doctor, Ulid::new(), APRIL_1_9AM + i * HOUR)
            .await
            .unwrap();
    }
    h.engine
        .book_leave(h.doctor, "lunch", APRIL_1_9AM + 8 * HOUR, None)
        .await
        .unwrap();

    let first = h.engine.list_appointments(h.doctor, 1, 5).await.unwrap();
    assert_eq!(first.total, 7);
    assert_eq!(first.items.len(), 5);
    assert_eq!(first.total_pages(), 2);
    assert!(first.has_next());
    assert!(!first.has_previous());
    assert_eq!(first.items[0].span.start, APRIL_1_9AM);
    assert!(first.items.windows(2).all(|w| w[0].span.start < w[1].span.start));

    let second = h.engine.list_appointments(h.doctor, 2, 5).await.unwrap();
    assert_eq!(second.items.len(), 2);
    assert!(!second.has_next());
    assert!(second.items.iter().all(|r| r.is_appointment()));
}

#[tokio::test]
async fn list_appointments_empty_and_bad_page() {
    let h = harness("list_empty.wal").await;
    let page = h.engine.list_appointments(h.doctor, 1, 10).await.unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total_pages(), 1);

    let result = h.engine.list_appointments(h.doctor, 0, 10).await;
    assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
}

#[tokio::test]
async fn list_resources_pages_doctors() {
    let h = harness("list_doctors.wal").await;
    h.engine.create_resource("Dr. Watson", Some("general practice")).await.unwrap();
    let page = h.engine.list_resources(1, 10).await.unwrap();
    assert_eq!(page.total, 2);
    assert!(page.items.iter().any(|r| r.name == "Dr. Jekyll"
        && r.specialty.as_deref() == Some("psychiatry")));
}

#[tokio::test]
async fn duplicate_doctor_id_rejected() {
    let h = harness("dup_doctor.wal").await;
    let result = h
        .engine
        .create_resource_with_id(h.doctor, "Dr. Jekyll", None)
        .await;
    assert!(matches!(result, Err(EngineError::AlreadyExists(_))));
    let blank = h.engine.create_resource("  ", None).await;
    assert!(matches!(blank, Err(EngineError::InvalidArgument(_))));
}

// ── concurrency ──────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_bookings_admit_exactly_one() {
    let h = harness("race.wal").await;
    let engine = Arc::new(h.engine);
    let slot = APRIL_1_9AM + 4 * HOUR;

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let engine = engine.clone();
            let doctor = h.doctor;
            tokio::spawn(async move { engine.book_appointment(doctor, Ulid::new(), slot).await })
        })
        .collect();

    let mut ok = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => ok += 1,
            Err(EngineError::SchedulingConflict(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(ok, 1);
    let stored = h
        .store
        .find_overlapping(h.doctor, Span::new(slot, slot + HOUR))
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn storage_failure_leaves_calendar_untouched() {
    let doctor = Ulid::new();
    let store = Arc::new(WalStore::with_failing_wal(vec![Resource {
        id: doctor,
        name: "Dr. Moreau".into(),
        specialty: None,
    }]));
    let engine = SchedulingEngine::with_store(
        store.clone(),
        Arc::new(FixedClock::new(APRIL_1_9AM)),
        SchedulePolicy::default(),
    );

    let err = engine
        .book_appointment(doctor, Ulid::new(), APRIL_1_9AM + HOUR)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Storage(_)));
    let err = engine
        .book_leave(doctor, "vacation", APRIL_1_9AM + 2 * HOUR, Some(APRIL_1_9AM + 4 * HOUR))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Storage(_)));

    assert!(!engine.has_conflict(doctor, APRIL_1_9AM, APRIL_1_9AM + DAY).await.unwrap());
    assert_eq!(engine.availability(doctor).await.unwrap().len(), 77);
    assert_eq!(engine.list_appointments(doctor, 1, 10).await.unwrap().total, 0);
    assert!(matches!(
        engine.create_resource("Dr. Frankenstein", None).await,
        Err(EngineError::Storage(_))
    ));
    assert_eq!(engine.list_resources(1, 10).await.unwrap().total, 1);
}

#[test]
fn store_overlap_maps_to_conflict() {
    let err = EngineError::from(StoreError::Overlap(Ulid::new()));
    assert!(matches!(err, EngineError::SchedulingConflict(ALREADY_BOOKED)));
    let err = EngineError::from(StoreError::UnknownResource(Ulid::new()));
    assert!(matches!(err, EngineError::ResourceNotFound(_)));
}

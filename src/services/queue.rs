//! Per-station charging queue.
//!
//! Positions of live (waiting or active) entries form the sequence `1..=n`
//! after every mutation. Every mutation runs in an IMMEDIATE transaction so
//! position assignment is serialized per database, and the partial unique
//! index on `(station_id, position)` rejects anything that slips through.

use chrono::Utc;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use uuid::Uuid;

use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::models::{
    BookingStatus, QueueEntry, QueueSnapshot, QueueStatus, ReallocationResult,
};

pub fn wait_time_for(position: i64, slot_minutes: i64) -> i64 {
    (position - 1).max(0) * slot_minutes
}

/// Appends a confirmed booking to the end of its station's queue.
pub fn join(
    conn: &mut Connection,
    station_id: &str,
    booking_id: &str,
    user_id: &str,
    slot_minutes: i64,
) -> AppResult<QueueEntry> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if queries::get_station(&tx, station_id)?.is_none() {
        return Err(AppError::NotFound(format!("station {station_id}")));
    }

    let booking = queries::get_booking_by_id(&tx, booking_id)?
        .filter(|b| b.user_id == user_id)
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    if booking.station_id != station_id {
        return Err(AppError::InvalidInput(format!(
            "booking {booking_id} belongs to station {}",
            booking.station_id
        )));
    }
    if booking.status != BookingStatus::Confirmed {
        return Err(AppError::InvalidState(format!(
            "booking {booking_id} is {} and cannot join a queue",
            booking.status.as_str()
        )));
    }

    let position = queries::count_live_entries(&tx, station_id)? + 1;
    let now = Utc::now().naive_utc();
    let entry = QueueEntry {
        id: Uuid::new_v4().to_string(),
        station_id: station_id.to_string(),
        booking_id: booking_id.to_string(),
        user_id: user_id.to_string(),
        position,
        estimated_wait_time_minutes: wait_time_for(position, slot_minutes),
        status: QueueStatus::Waiting,
        arrived_at: None,
        no_show_at: None,
        created_at: now,
        updated_at: now,
    };
    queries::insert_queue_entry(&tx, &entry)?;

    if !queries::transition_booking(
        &tx,
        booking_id,
        &[BookingStatus::Confirmed],
        BookingStatus::Queued,
    )? {
        return Err(AppError::Conflict(format!(
            "booking {booking_id} changed while joining the queue"
        )));
    }
    queries::update_booking_queue_position(&tx, booking_id, position)?;

    tx.commit()?;

    tracing::info!(
        station_id = %station_id,
        booking_id = %booking_id,
        position,
        "booking joined queue"
    );
    Ok(entry)
}

/// Read-only view of a station's live queue.
pub fn status(conn: &Connection, station_id: &str, slot_minutes: i64) -> AppResult<QueueSnapshot> {
    if queries::get_station(conn, station_id)?.is_none() {
        return Err(AppError::NotFound(format!("station {station_id}")));
    }

    let entries = queries::live_queue_entries(conn, station_id)?;
    let total_waiting = entries
        .iter()
        .filter(|e| e.status == QueueStatus::Waiting)
        .count() as i64;

    Ok(QueueSnapshot {
        station_id: station_id.to_string(),
        total_in_queue: entries.len() as i64,
        total_waiting,
        average_wait_time: total_waiting * slot_minutes,
        entries,
    })
}

/// Marks the booking's entry as reallocated, moves everyone behind it up one
/// position, and activates the entry that lands in the vacated position.
pub fn report_no_show(
    conn: &mut Connection,
    booking_id: &str,
    slot_minutes: i64,
) -> AppResult<ReallocationResult> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut entry = queries::get_queue_entry_by_booking(&tx, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("queue entry for booking {booking_id}")))?;

    if !entry.status.is_live() {
        return Err(AppError::InvalidState(format!(
            "queue entry for booking {booking_id} is already {}",
            entry.status.as_str()
        )));
    }

    let vacated = entry.position;
    entry.status = QueueStatus::Reallocated;
    entry.no_show_at = Some(Utc::now().naive_utc());
    queries::update_queue_entry(&tx, &entry)?;

    if !queries::transition_booking(
        &tx,
        booking_id,
        &[BookingStatus::Queued, BookingStatus::Active],
        BookingStatus::NoShow,
    )? {
        return Err(AppError::InvalidState(format!(
            "booking {booking_id} is not queued or active"
        )));
    }

    let promoted = close_gap(&tx, &entry.station_id, vacated, slot_minutes, true)?;

    tx.commit()?;

    match &promoted {
        Some(next) => tracing::info!(
            booking_id = %booking_id,
            position = vacated,
            reallocated_to = %next.user_id,
            "no-show recorded, slot reallocated"
        ),
        None => tracing::info!(
            booking_id = %booking_id,
            position = vacated,
            "no-show recorded, nobody to reallocate"
        ),
    }

    Ok(ReallocationResult {
        booking_id: booking_id.to_string(),
        vacated_position: vacated,
        reallocated_to: promoted.as_ref().map(|e| e.user_id.clone()),
        promoted_booking_id: promoted.map(|e| e.booking_id),
    })
}

/// Head-of-queue check-in: the waiting entry at position 1 starts charging.
pub fn arrive(conn: &mut Connection, booking_id: &str, user_id: &str) -> AppResult<QueueEntry> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut entry = queries::get_queue_entry_by_booking(&tx, booking_id)?
        .filter(|e| e.user_id == user_id)
        .ok_or_else(|| AppError::NotFound(format!("queue entry for booking {booking_id}")))?;

    if entry.status != QueueStatus::Waiting || entry.position != 1 {
        return Err(AppError::InvalidState(format!(
            "booking {booking_id} is {} at position {} and cannot start charging",
            entry.status.as_str(),
            entry.position
        )));
    }

    entry.status = QueueStatus::Active;
    entry.arrived_at = Some(Utc::now().naive_utc());
    queries::update_queue_entry(&tx, &entry)?;

    if !queries::transition_booking(
        &tx,
        booking_id,
        &[BookingStatus::Queued],
        BookingStatus::Active,
    )? {
        return Err(AppError::InvalidState(format!(
            "booking {booking_id} is not queued"
        )));
    }

    tx.commit()?;

    tracing::info!(booking_id = %booking_id, station_id = %entry.station_id, "arrived at head of queue");
    Ok(entry)
}

/// Closes out the active entry of a finished booking. Runs inside the
/// caller's transaction.
pub(crate) fn complete_entry(
    tx: &Transaction<'_>,
    booking_id: &str,
    slot_minutes: i64,
) -> AppResult<Option<QueueEntry>> {
    let Some(mut entry) = queries::get_queue_entry_by_booking(tx, booking_id)? else {
        return Ok(None);
    };
    if entry.status != QueueStatus::Active {
        return Err(AppError::InvalidState(format!(
            "queue entry for booking {booking_id} is {}",
            entry.status.as_str()
        )));
    }

    let vacated = entry.position;
    entry.status = QueueStatus::Completed;
    queries::update_queue_entry(tx, &entry)?;
    close_gap(tx, &entry.station_id, vacated, slot_minutes, false)?;

    Ok(Some(entry))
}

/// Shifts every live entry behind `vacated` up by one, in ascending order so
/// each move lands on a free position. With `promote`, the entry that takes
/// the vacated position becomes active. Returns that entry.
fn close_gap(
    tx: &Transaction<'_>,
    station_id: &str,
    vacated: i64,
    slot_minutes: i64,
    promote: bool,
) -> AppResult<Option<QueueEntry>> {
    let behind: Vec<QueueEntry> = queries::live_queue_entries(tx, station_id)?
        .into_iter()
        .filter(|e| e.position > vacated)
        .collect();

    let mut promoted = None;
    for mut next in behind {
        let takes_vacated = next.position == vacated + 1;
        next.position -= 1;
        next.estimated_wait_time_minutes = wait_time_for(next.position, slot_minutes);

        let activate = promote && takes_vacated && next.status == QueueStatus::Waiting;
        if activate {
            next.status = QueueStatus::Active;
        }

        queries::update_queue_entry(tx, &next)?;
        queries::update_booking_queue_position(tx, &next.booking_id, next.position)?;

        if activate {
            queries::transition_booking(
                tx,
                &next.booking_id,
                &[BookingStatus::Queued],
                BookingStatus::Active,
            )?;
        }
        if promote && takes_vacated {
            promoted = Some(next);
        }
    }

    Ok(promoted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::services::testing::{confirmed_booking, seed_station};

    const SLOT: i64 = 30;

    fn setup() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        seed_station(&conn, "st-1", 4);
        conn
    }

    fn join_n(conn: &mut Connection, n: usize) -> Vec<QueueEntry> {
        (0..n)
            .map(|i| {
                let booking = confirmed_booking(conn, "st-1", &format!("user-{i}"));
                join(conn, "st-1", &booking.id, &booking.user_id, SLOT).unwrap()
            })
            .collect()
    }

    fn positions(conn: &Connection) -> Vec<(i64, QueueStatus)> {
        queries::live_queue_entries(conn, "st-1")
            .unwrap()
            .into_iter()
            .map(|e| (e.position, e.status))
            .collect()
    }

    #[test]
    fn test_sequential_joins_are_contiguous() {
        let mut conn = setup();
        let entries = join_n(&mut conn, 5);

        let got: Vec<i64> = entries.iter().map(|e| e.position).collect();
        assert_eq!(got, vec![1, 2, 3, 4, 5]);
        let waits: Vec<i64> = entries.iter().map(|e| e.estimated_wait_time_minutes).collect();
        assert_eq!(waits, vec![0, 30, 60, 90, 120]);
    }

    #[test]
    fn test_join_marks_booking_queued() {
        let mut conn = setup();
        let entry = join_n(&mut conn, 2).pop().unwrap();

        let booking = queries::get_booking_by_id(&conn, &entry.booking_id)
            .unwrap()
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Queued);
        assert_eq!(booking.queue_position, 2);
    }

    #[test]
    fn test_join_requires_confirmed_booking() {
        let mut conn = setup();
        let entry = join_n(&mut conn, 1).pop().unwrap();

        // Already queued
        let err = join(&mut conn, "st-1", &entry.booking_id, &entry.user_id, SLOT).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[test]
    fn test_join_unknown_station_or_booking() {
        let mut conn = setup();
        let err = join(&mut conn, "missing", "b", "u", SLOT).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = join(&mut conn, "st-1", "missing", "u", SLOT).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_join_rejects_other_users_booking() {
        let mut conn = setup();
        let booking = confirmed_booking(&conn, "st-1", "owner");
        let err = join(&mut conn, "st-1", &booking.id, "intruder", SLOT).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_join_after_head_is_active_takes_next_free_position() {
        let mut conn = setup();
        let first = join_n(&mut conn, 2).remove(0);
        arrive(&mut conn, &first.booking_id, &first.user_id).unwrap();

        let booking = confirmed_booking(&conn, "st-1", "late");
        let entry = join(&mut conn, "st-1", &booking.id, "late", SLOT).unwrap();
        assert_eq!(entry.position, 3);
    }

    #[test]
    fn test_status_reports_live_entries() {
        let mut conn = setup();
        let first = join_n(&mut conn, 3).remove(0);
        arrive(&mut conn, &first.booking_id, &first.user_id).unwrap();

        let snapshot = status(&conn, "st-1", SLOT).unwrap();
        assert_eq!(snapshot.total_in_queue, 3);
        assert_eq!(snapshot.total_waiting, 2);
        assert_eq!(snapshot.average_wait_time, 60);
        assert_eq!(snapshot.entries[0].status, QueueStatus::Active);
        let got: Vec<i64> = snapshot.entries.iter().map(|e| e.position).collect();
        assert_eq!(got, vec![1, 2, 3]);
    }

    #[test]
    fn test_status_is_idempotent() {
        let mut conn = setup();
        join_n(&mut conn, 3);

        let first = status(&conn, "st-1", SLOT).unwrap();
        let second = status(&conn, "st-1", SLOT).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_status_unknown_station() {
        let conn = setup();
        assert!(matches!(
            status(&conn, "nope", SLOT).unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[test]
    fn test_no_show_promotes_next_entry() {
        let mut conn = setup();
        let entries = join_n(&mut conn, 3);

        let result = report_no_show(&mut conn, &entries[0].booking_id, SLOT).unwrap();
        assert_eq!(result.vacated_position, 1);
        assert_eq!(result.reallocated_to.as_deref(), Some("user-1"));
        assert_eq!(result.promoted_booking_id.as_deref(), Some(entries[1].booking_id.as_str()));

        let reported = queries::get_queue_entry_by_booking(&conn, &entries[0].booking_id)
            .unwrap()
            .unwrap();
        assert_eq!(reported.status, QueueStatus::Reallocated);
        assert!(reported.no_show_at.is_some());

        let no_show = queries::get_booking_by_id(&conn, &entries[0].booking_id)
            .unwrap()
            .unwrap();
        assert_eq!(no_show.status, BookingStatus::NoShow);

        let promoted = queries::get_booking_by_id(&conn, &entries[1].booking_id)
            .unwrap()
            .unwrap();
        assert_eq!(promoted.status, BookingStatus::Active);
        assert_eq!(promoted.queue_position, 1);

        // Everyone behind moves up as well
        assert_eq!(
            positions(&conn),
            vec![(1, QueueStatus::Active), (2, QueueStatus::Waiting)]
        );
        let last = queries::get_queue_entry_by_booking(&conn, &entries[2].booking_id)
            .unwrap()
            .unwrap();
        assert_eq!(last.estimated_wait_time_minutes, 30);
    }

    #[test]
    fn test_no_show_in_middle_keeps_positions_contiguous() {
        let mut conn = setup();
        let entries = join_n(&mut conn, 5);

        report_no_show(&mut conn, &entries[1].booking_id, SLOT).unwrap();
        report_no_show(&mut conn, &entries[3].booking_id, SLOT).unwrap();

        let got: Vec<i64> = positions(&conn).into_iter().map(|(p, _)| p).collect();
        assert_eq!(got, vec![1, 2, 3]);
    }

    #[test]
    fn test_no_show_at_tail_only_shrinks_queue() {
        let mut conn = setup();
        let entries = join_n(&mut conn, 3);

        let result = report_no_show(&mut conn, &entries[2].booking_id, SLOT).unwrap();
        assert!(result.reallocated_to.is_none());
        assert_eq!(
            positions(&conn),
            vec![(1, QueueStatus::Waiting), (2, QueueStatus::Waiting)]
        );
        assert_eq!(status(&conn, "st-1", SLOT).unwrap().total_in_queue, 2);
    }

    #[test]
    fn test_no_show_twice_is_rejected() {
        let mut conn = setup();
        let entries = join_n(&mut conn, 2);

        report_no_show(&mut conn, &entries[0].booking_id, SLOT).unwrap();
        let err = report_no_show(&mut conn, &entries[0].booking_id, SLOT).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[test]
    fn test_no_show_without_entry() {
        let mut conn = setup();
        let booking = confirmed_booking(&conn, "st-1", "u");
        let err = report_no_show(&mut conn, &booking.id, SLOT).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_only_head_can_arrive() {
        let mut conn = setup();
        let entries = join_n(&mut conn, 2);

        let err = arrive(&mut conn, &entries[1].booking_id, &entries[1].user_id).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let active = arrive(&mut conn, &entries[0].booking_id, &entries[0].user_id).unwrap();
        assert_eq!(active.status, QueueStatus::Active);
        assert!(active.arrived_at.is_some());

        let booking = queries::get_booking_by_id(&conn, &entries[0].booking_id)
            .unwrap()
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Active);
    }

    #[test]
    fn test_complete_entry_closes_gap_without_promoting() {
        let mut conn = setup();
        let entries = join_n(&mut conn, 3);
        arrive(&mut conn, &entries[0].booking_id, &entries[0].user_id).unwrap();

        let tx = conn.transaction().unwrap();
        let done = complete_entry(&tx, &entries[0].booking_id, SLOT).unwrap().unwrap();
        tx.commit().unwrap();

        assert_eq!(done.status, QueueStatus::Completed);
        assert_eq!(
            positions(&conn),
            vec![(1, QueueStatus::Waiting), (2, QueueStatus::Waiting)]
        );
    }

    #[test]
    fn test_concurrent_joins_on_separate_connections() {
        use std::time::Duration;

        const N: usize = 16;
        let path = std::env::temp_dir().join(format!("chargebuddy-{}.db", Uuid::new_v4()));
        let path_str = path.to_string_lossy().to_string();

        let setup_conn = db::init_db(&path_str).unwrap();
        seed_station(&setup_conn, "st-1", 4);
        let bookings: Vec<_> = (0..N)
            .map(|i| confirmed_booking(&setup_conn, "st-1", &format!("user-{i}")))
            .collect();

        let connections: Vec<Connection> = (0..N)
            .map(|_| {
                let conn = Connection::open(&path).unwrap();
                conn.busy_timeout(Duration::from_secs(10)).unwrap();
                conn
            })
            .collect();

        let handles: Vec<_> = connections
            .into_iter()
            .zip(bookings)
            .map(|(mut conn, booking)| {
                std::thread::spawn(move || {
                    join(&mut conn, "st-1", &booking.id, &booking.user_id, SLOT)
                        .unwrap()
                        .position
                })
            })
            .collect();

        let mut got: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        got.sort_unstable();
        assert_eq!(got, (1..=N as i64).collect::<Vec<_>>());

        drop(setup_conn);
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{path_str}{suffix}"));
        }
    }
}

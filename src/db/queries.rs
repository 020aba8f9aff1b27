use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::errors::{AppError, AppResult};
use crate::models::{
    Booking, BookingStatus, ChargingEstimate, ChargingInput, Payment, PaymentMethod,
    AlternativeReason, PaymentRecordStatus, PaymentStatus, PaymentType, QueueEntry, QueueStatus,
    Review, SavedRecommendation, Station,
};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn now_ts() -> String {
    Utc::now().naive_utc().format(TS_FORMAT).to_string()
}

fn fmt_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TS_FORMAT).unwrap_or_else(|_| Utc::now().naive_utc())
}

// ── Stations ──

const STATION_COLUMNS: &str = "id, name, address, latitude, longitude, total_ports, available_ports, \
     charging_types, rating, reviews, amenities, operating_hours, created_at, updated_at";

pub fn insert_station(conn: &Connection, station: &Station) -> AppResult<()> {
    let charging_types = serde_json::to_string(&station.charging_types)
        .map_err(|e| AppError::Internal(e.into()))?;
    let amenities =
        serde_json::to_string(&station.amenities).map_err(|e| AppError::Internal(e.into()))?;

    conn.execute(
        "INSERT INTO stations (id, name, address, latitude, longitude, total_ports, available_ports,
                               charging_types, rating, reviews, amenities, operating_hours, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            station.id,
            station.name,
            station.address,
            station.latitude,
            station.longitude,
            station.total_ports,
            station.available_ports,
            charging_types,
            station.rating,
            station.reviews,
            amenities,
            station.operating_hours,
            fmt_ts(&station.created_at),
            fmt_ts(&station.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_station(conn: &Connection, id: &str) -> AppResult<Option<Station>> {
    let station = conn
        .query_row(
            &format!("SELECT {STATION_COLUMNS} FROM stations WHERE id = ?1"),
            params![id],
            parse_station_row,
        )
        .optional()?;
    Ok(station)
}

pub fn list_stations(conn: &Connection) -> AppResult<Vec<Station>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {STATION_COLUMNS} FROM stations ORDER BY rating DESC, name ASC"
    ))?;
    let stations = stmt
        .query_map([], parse_station_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(stations)
}

/// Takes one port in a single statement. Returns false when none is free.
pub fn decrement_available_ports(conn: &Connection, station_id: &str) -> AppResult<bool> {
    let count = conn.execute(
        "UPDATE stations SET available_ports = available_ports - 1, updated_at = ?1
         WHERE id = ?2 AND available_ports > 0",
        params![now_ts(), station_id],
    )?;
    Ok(count > 0)
}

/// Returns one port, never exceeding `total_ports`.
pub fn increment_available_ports(conn: &Connection, station_id: &str) -> AppResult<bool> {
    let count = conn.execute(
        "UPDATE stations SET available_ports = available_ports + 1, updated_at = ?1
         WHERE id = ?2 AND available_ports < total_ports",
        params![now_ts(), station_id],
    )?;
    Ok(count > 0)
}

pub fn refresh_station_rating(conn: &Connection, station_id: &str) -> AppResult<()> {
    conn.execute(
        "UPDATE stations SET
           rating = COALESCE((SELECT AVG(rating) FROM reviews WHERE station_id = ?1), 0),
           reviews = (SELECT COUNT(*) FROM reviews WHERE station_id = ?1),
           updated_at = ?2
         WHERE id = ?1",
        params![station_id, now_ts()],
    )?;
    Ok(())
}

fn parse_station_row(row: &Row) -> rusqlite::Result<Station> {
    let charging_types: String = row.get(7)?;
    let amenities: String = row.get(10)?;
    let created_at: String = row.get(12)?;
    let updated_at: String = row.get(13)?;

    Ok(Station {
        id: row.get(0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        latitude: row.get(3)?,
        longitude: row.get(4)?,
        total_ports: row.get(5)?,
        available_ports: row.get(6)?,
        charging_types: serde_json::from_str(&charging_types).unwrap_or_default(),
        rating: row.get(8)?,
        reviews: row.get(9)?,
        amenities: serde_json::from_str(&amenities).unwrap_or_default(),
        operating_hours: row.get(11)?,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, user_id, station_id, station_name, booking_reference, booking_date, \
     start_time, end_time, slot_duration_minutes, charging_type, car_brand, car_model, car_kwh, \
     current_battery_pct, target_battery_pct, charger_power_kw, price_per_unit, \
     estimated_charging_time_minutes, estimated_energy_kwh, estimated_cost, advance_payment, \
     remaining_payment, queue_position, status, payment_status, created_at, updated_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> AppResult<()> {
    let booking_date = booking
        .booking_date
        .map(|d| d.format(DATE_FORMAT).to_string());

    conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                     ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27)"
        ),
        params![
            booking.id,
            booking.user_id,
            booking.station_id,
            booking.station_name,
            booking.booking_reference,
            booking_date,
            booking.start_time,
            booking.end_time,
            booking.slot_duration_minutes,
            booking.charging_type,
            booking.car_brand,
            booking.car_model,
            booking.car_kwh,
            booking.current_battery_pct,
            booking.target_battery_pct,
            booking.charger_power_kw,
            booking.price_per_unit,
            booking.estimated_charging_time_minutes,
            booking.estimated_energy_kwh,
            booking.estimated_cost,
            booking.advance_payment,
            booking.remaining_payment,
            booking.queue_position,
            booking.status.as_str(),
            booking.payment_status.as_str(),
            fmt_ts(&booking.created_at),
            fmt_ts(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> AppResult<Option<Booking>> {
    let booking = conn
        .query_row(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
            params![id],
            parse_booking_row,
        )
        .optional()?;
    Ok(booking)
}

pub fn list_bookings_for_user(conn: &Connection, user_id: &str) -> AppResult<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC"
    ))?;
    let bookings = stmt
        .query_map(params![user_id], parse_booking_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(bookings)
}

/// Moves a booking to `to` only if it is currently in one of `from` and no
/// payment is in flight. Returns false otherwise.
pub fn transition_booking(
    conn: &Connection,
    id: &str,
    from: &[BookingStatus],
    to: BookingStatus,
) -> AppResult<bool> {
    let placeholders = (0..from.len())
        .map(|i| format!("?{}", i + 4))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE bookings SET status = ?1, updated_at = ?2
         WHERE id = ?3 AND payment_claim IS NULL AND status IN ({placeholders})"
    );

    let mut values = vec![to.as_str().to_string(), now_ts(), id.to_string()];
    values.extend(from.iter().map(|s| s.as_str().to_string()));

    let count = conn.execute(&sql, params_from_iter(values.iter()))?;
    Ok(count > 0)
}

/// Marks a payment as in flight for a booking in one of `from`. Returns false
/// when the booking is in another state or already has a payment in flight.
pub fn claim_payment(
    conn: &Connection,
    id: &str,
    claim: &str,
    from: &[BookingStatus],
) -> AppResult<bool> {
    let placeholders = (0..from.len())
        .map(|i| format!("?{}", i + 4))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE bookings SET payment_claim = ?1, updated_at = ?2
         WHERE id = ?3 AND payment_claim IS NULL AND status IN ({placeholders})"
    );

    let mut values = vec![claim.to_string(), now_ts(), id.to_string()];
    values.extend(from.iter().map(|s| s.as_str().to_string()));

    let count = conn.execute(&sql, params_from_iter(values.iter()))?;
    Ok(count > 0)
}

/// Clears the in-flight marker if it is still `claim`.
pub fn release_payment_claim(conn: &Connection, id: &str, claim: &str) -> AppResult<bool> {
    let count = conn.execute(
        "UPDATE bookings SET payment_claim = NULL WHERE id = ?1 AND payment_claim = ?2",
        params![id, claim],
    )?;
    Ok(count > 0)
}

pub fn update_payment_status(conn: &Connection, id: &str, status: PaymentStatus) -> AppResult<()> {
    conn.execute(
        "UPDATE bookings SET payment_status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now_ts(), id],
    )?;
    Ok(())
}

pub fn update_booking_queue_position(conn: &Connection, id: &str, position: i64) -> AppResult<()> {
    conn.execute(
        "UPDATE bookings SET queue_position = ?1, updated_at = ?2 WHERE id = ?3",
        params![position, now_ts(), id],
    )?;
    Ok(())
}

fn parse_booking_row(row: &Row) -> rusqlite::Result<Booking> {
    let booking_date: Option<String> = row.get(5)?;
    let status: String = row.get(23)?;
    let payment_status: String = row.get(24)?;
    let created_at: String = row.get(25)?;
    let updated_at: String = row.get(26)?;

    Ok(Booking {
        id: row.get(0)?,
        user_id: row.get(1)?,
        station_id: row.get(2)?,
        station_name: row.get(3)?,
        booking_reference: row.get(4)?,
        booking_date: booking_date
            .and_then(|d| NaiveDate::parse_from_str(&d, DATE_FORMAT).ok()),
        start_time: row.get(6)?,
        end_time: row.get(7)?,
        slot_duration_minutes: row.get(8)?,
        charging_type: row.get(9)?,
        car_brand: row.get(10)?,
        car_model: row.get(11)?,
        car_kwh: row.get(12)?,
        current_battery_pct: row.get(13)?,
        target_battery_pct: row.get(14)?,
        charger_power_kw: row.get(15)?,
        price_per_unit: row.get(16)?,
        estimated_charging_time_minutes: row.get(17)?,
        estimated_energy_kwh: row.get(18)?,
        estimated_cost: row.get(19)?,
        advance_payment: row.get(20)?,
        remaining_payment: row.get(21)?,
        queue_position: row.get(22)?,
        status: BookingStatus::parse(&status),
        payment_status: PaymentStatus::parse(&payment_status),
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

// ── Queue ──

const QUEUE_COLUMNS: &str = "id, station_id, booking_id, user_id, position, estimated_wait_time_minutes, \
     status, arrived_at, no_show_at, created_at, updated_at";

pub fn insert_queue_entry(conn: &Connection, entry: &QueueEntry) -> AppResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO queue_entries ({QUEUE_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        params![
            entry.id,
            entry.station_id,
            entry.booking_id,
            entry.user_id,
            entry.position,
            entry.estimated_wait_time_minutes,
            entry.status.as_str(),
            entry.arrived_at.as_ref().map(fmt_ts),
            entry.no_show_at.as_ref().map(fmt_ts),
            fmt_ts(&entry.created_at),
            fmt_ts(&entry.updated_at),
        ],
    )
    .map_err(|e| AppError::from_write(e, "queue position"))?;
    Ok(())
}

pub fn get_queue_entry_by_booking(
    conn: &Connection,
    booking_id: &str,
) -> AppResult<Option<QueueEntry>> {
    let entry = conn
        .query_row(
            &format!("SELECT {QUEUE_COLUMNS} FROM queue_entries WHERE booking_id = ?1"),
            params![booking_id],
            parse_queue_row,
        )
        .optional()?;
    Ok(entry)
}

/// Waiting and active entries of a station, by ascending position.
pub fn live_queue_entries(conn: &Connection, station_id: &str) -> AppResult<Vec<QueueEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {QUEUE_COLUMNS} FROM queue_entries
         WHERE station_id = ?1 AND status IN ('waiting', 'active')
         ORDER BY position ASC"
    ))?;
    let entries = stmt
        .query_map(params![station_id], parse_queue_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

pub fn count_live_entries(conn: &Connection, station_id: &str) -> AppResult<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM queue_entries WHERE station_id = ?1 AND status IN ('waiting', 'active')",
        params![station_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn update_queue_entry(conn: &Connection, entry: &QueueEntry) -> AppResult<()> {
    conn.execute(
        "UPDATE queue_entries SET position = ?1, estimated_wait_time_minutes = ?2, status = ?3,
           arrived_at = ?4, no_show_at = ?5, updated_at = ?6
         WHERE id = ?7",
        params![
            entry.position,
            entry.estimated_wait_time_minutes,
            entry.status.as_str(),
            entry.arrived_at.as_ref().map(fmt_ts),
            entry.no_show_at.as_ref().map(fmt_ts),
            now_ts(),
            entry.id,
        ],
    )
    .map_err(|e| AppError::from_write(e, "queue position"))?;
    Ok(())
}

fn parse_queue_row(row: &Row) -> rusqlite::Result<QueueEntry> {
    let status: String = row.get(6)?;
    let arrived_at: Option<String> = row.get(7)?;
    let no_show_at: Option<String> = row.get(8)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    Ok(QueueEntry {
        id: row.get(0)?,
        station_id: row.get(1)?,
        booking_id: row.get(2)?,
        user_id: row.get(3)?,
        position: row.get(4)?,
        estimated_wait_time_minutes: row.get(5)?,
        status: QueueStatus::parse(&status),
        arrived_at: arrived_at.as_deref().map(parse_ts),
        no_show_at: no_show_at.as_deref().map(parse_ts),
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

// ── Payments ──

pub fn insert_payment(conn: &Connection, payment: &Payment) -> AppResult<()> {
    conn.execute(
        "INSERT INTO payments (id, booking_id, user_id, amount, payment_type, payment_method,
                               transaction_id, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            payment.id,
            payment.booking_id,
            payment.user_id,
            payment.amount,
            payment.payment_type.as_str(),
            payment.payment_method.as_str(),
            payment.transaction_id,
            payment.status.as_str(),
            fmt_ts(&payment.created_at),
        ],
    )?;
    Ok(())
}

pub fn list_payments_for_booking(conn: &Connection, booking_id: &str) -> AppResult<Vec<Payment>> {
    let mut stmt = conn.prepare(
        "SELECT id, booking_id, user_id, amount, payment_type, payment_method, transaction_id, status, created_at
         FROM payments WHERE booking_id = ?1 ORDER BY created_at ASC, rowid ASC",
    )?;
    let payments = stmt
        .query_map(params![booking_id], |row| {
            let payment_type: String = row.get(4)?;
            let payment_method: String = row.get(5)?;
            let status: String = row.get(7)?;
            let created_at: String = row.get(8)?;
            Ok(Payment {
                id: row.get(0)?,
                booking_id: row.get(1)?,
                user_id: row.get(2)?,
                amount: row.get(3)?,
                payment_type: PaymentType::parse(&payment_type),
                payment_method: PaymentMethod::parse(&payment_method),
                transaction_id: row.get(6)?,
                status: PaymentRecordStatus::parse(&status),
                created_at: parse_ts(&created_at),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(payments)
}

// ── Reviews ──

pub fn insert_review(conn: &Connection, review: &Review) -> AppResult<()> {
    conn.execute(
        "INSERT INTO reviews (id, user_id, station_id, rating, comment, cleanliness, speed, safety, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            review.id,
            review.user_id,
            review.station_id,
            review.rating,
            review.comment,
            review.cleanliness,
            review.speed,
            review.safety,
            fmt_ts(&review.created_at),
        ],
    )?;
    Ok(())
}

pub fn list_reviews_for_station(
    conn: &Connection,
    station_id: &str,
    limit: i64,
) -> AppResult<Vec<Review>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, station_id, rating, comment, cleanliness, speed, safety, created_at
         FROM reviews WHERE station_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
    )?;
    let reviews = stmt
        .query_map(params![station_id, limit], |row| {
            let created_at: String = row.get(8)?;
            Ok(Review {
                id: row.get(0)?,
                user_id: row.get(1)?,
                station_id: row.get(2)?,
                rating: row.get(3)?,
                comment: row.get(4)?,
                cleanliness: row.get(5)?,
                speed: row.get(6)?,
                safety: row.get(7)?,
                created_at: parse_ts(&created_at),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(reviews)
}

// ── Recommendations ──

pub fn insert_recommendation(conn: &Connection, rec: &SavedRecommendation) -> AppResult<()> {
    conn.execute(
        "INSERT INTO recommendations (id, user_id, original_station_id, alternative_station_id, reason, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            rec.id,
            rec.user_id,
            rec.original_station_id,
            rec.alternative_station_id,
            rec.reason.as_str(),
            fmt_ts(&rec.created_at),
        ],
    )?;
    Ok(())
}

pub fn list_recommendations_for_user(
    conn: &Connection,
    user_id: &str,
) -> AppResult<Vec<SavedRecommendation>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, original_station_id, alternative_station_id, reason, created_at
         FROM recommendations WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
    )?;
    let recs = stmt
        .query_map(params![user_id], |row| {
            let reason: String = row.get(4)?;
            let created_at: String = row.get(5)?;
            Ok(SavedRecommendation {
                id: row.get(0)?,
                user_id: row.get(1)?,
                original_station_id: row.get(2)?,
                alternative_station_id: row.get(3)?,
                reason: AlternativeReason::parse(&reason),
                created_at: parse_ts(&created_at),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(recs)
}

// ── Estimates ──

pub fn insert_estimate(
    conn: &Connection,
    input: &ChargingInput,
    estimate: &ChargingEstimate,
    efficiency: f64,
) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO charging_estimates (car_kwh, charger_power_kw, current_battery_pct, target_battery_pct,
                                         estimated_time_minutes, estimated_cost, energy_required_kwh, efficiency)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            input.battery_capacity_kwh,
            input.charger_power_kw,
            input.current_battery_pct,
            input.target_battery_pct,
            estimate.estimated_time_minutes,
            estimate.estimated_cost,
            estimate.energy_required_kwh,
            efficiency,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn count_estimates(conn: &Connection) -> AppResult<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM charging_estimates", [], |row| row.get(0))?;
    Ok(count)
}

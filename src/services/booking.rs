use chrono::{NaiveDate, NaiveTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::models::{
    Booking, BookingStatus, ChargingInput, Payment, PaymentMethod, PaymentRecordStatus,
    PaymentStatus, PaymentType, QueueEntry,
};
use crate::services::estimation::{estimate_charging, round2};
use crate::services::payment::PaymentRequest;
use crate::services::{queue, short_code};
use crate::state::AppState;

/// Share of the estimated cost charged when the booking is made.
pub const ADVANCE_RATE: f64 = 0.20;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub station_id: String,
    pub car_kwh: f64,
    pub current_battery_pct: i64,
    pub target_battery_pct: i64,
    pub charger_power_kw: f64,
    pub price_per_unit: f64,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub booking_date: Option<NaiveDate>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub charging_type: Option<String>,
    pub car_brand: Option<String>,
    pub car_model: Option<String>,
}

impl NewBooking {
    fn charging_input(&self) -> ChargingInput {
        ChargingInput {
            battery_capacity_kwh: self.car_kwh,
            current_battery_pct: self.current_battery_pct,
            target_battery_pct: self.target_battery_pct,
            charger_power_kw: self.charger_power_kw,
            price_per_unit: self.price_per_unit,
        }
    }
}

/// Result of the one-call create, pay and queue flow.
#[derive(Debug, Clone)]
pub struct SmartBooking {
    pub booking: Booking,
    pub payment: Payment,
    pub entry: QueueEntry,
}

/// Returns `(advance, remaining)`, both rounded to 2 decimals.
pub fn split_payment(cost: f64) -> (f64, f64) {
    let advance = round2(cost * ADVANCE_RATE);
    (advance, round2(cost - advance))
}

fn parse_time(s: &str) -> AppResult<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|_| AppError::InvalidInput(format!("invalid time '{s}', expected HH:MM")))
}

/// Minutes between start and end, if a window was requested.
fn slot_duration(start: Option<&str>, end: Option<&str>) -> AppResult<Option<i64>> {
    match (start, end) {
        (None, None) => Ok(None),
        (Some(start), Some(end)) => {
            let start = parse_time(start)?;
            let end = parse_time(end)?;
            if end <= start {
                return Err(AppError::InvalidInput(format!(
                    "end time {end} must be after start time {start}"
                )));
            }
            Ok(Some((end - start).num_minutes()))
        }
        _ => Err(AppError::InvalidInput(
            "startTime and endTime must be given together".to_string(),
        )),
    }
}

/// Books a port at the station in `pending` state, snapshotting the estimate
/// and the advance/remaining split.
pub fn create_booking(conn: &mut Connection, user_id: &str, req: &NewBooking) -> AppResult<Booking> {
    let estimate = estimate_charging(&req.charging_input())?;
    let slot_duration_minutes = slot_duration(req.start_time.as_deref(), req.end_time.as_deref())?;
    let (advance_payment, remaining_payment) = split_payment(estimate.estimated_cost);

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let station = queries::get_station(&tx, &req.station_id)?
        .ok_or_else(|| AppError::NotFound(format!("station {}", req.station_id)))?;

    if !queries::decrement_available_ports(&tx, &station.id)? {
        return Err(AppError::Conflict(format!(
            "no available ports at station {}",
            station.id
        )));
    }

    let now = Utc::now().naive_utc();
    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        station_id: station.id.clone(),
        station_name: station.name.clone(),
        booking_reference: short_code("CBK"),
        booking_date: req.booking_date,
        start_time: req.start_time.clone(),
        end_time: req.end_time.clone(),
        slot_duration_minutes,
        charging_type: req.charging_type.clone(),
        car_brand: req.car_brand.clone(),
        car_model: req.car_model.clone(),
        car_kwh: req.car_kwh,
        current_battery_pct: req.current_battery_pct,
        target_battery_pct: req.target_battery_pct,
        charger_power_kw: req.charger_power_kw,
        price_per_unit: req.price_per_unit,
        estimated_charging_time_minutes: estimate.estimated_time_minutes,
        estimated_energy_kwh: estimate.energy_required_kwh,
        estimated_cost: estimate.estimated_cost,
        advance_payment,
        remaining_payment,
        queue_position: 0,
        status: BookingStatus::Pending,
        payment_status: PaymentStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    queries::insert_booking(&tx, &booking)?;

    tx.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        reference = %booking.booking_reference,
        station_id = %booking.station_id,
        cost = booking.estimated_cost,
        "booking created, port taken"
    );
    Ok(booking)
}

/// The caller's booking. Other users' bookings read as not found.
pub fn get_booking(conn: &Connection, user_id: &str, booking_id: &str) -> AppResult<Booking> {
    queries::get_booking_by_id(conn, booking_id)?
        .filter(|b| b.user_id == user_id)
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))
}

pub fn list_bookings(conn: &Connection, user_id: &str) -> AppResult<Vec<Booking>> {
    queries::list_bookings_for_user(conn, user_id)
}

/// Cancels a pending booking and gives its port back.
pub fn cancel_booking(conn: &mut Connection, user_id: &str, booking_id: &str) -> AppResult<Booking> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let booking = get_booking(&tx, user_id, booking_id)?;
    if !queries::transition_booking(
        &tx,
        booking_id,
        &[BookingStatus::Pending],
        BookingStatus::Cancelled,
    )? {
        if booking.status == BookingStatus::Pending {
            return Err(AppError::Conflict(format!(
                "a payment for booking {booking_id} is in progress"
            )));
        }
        return Err(AppError::InvalidState(format!(
            "booking {booking_id} is {} and can only be cancelled while pending",
            booking.status.as_str()
        )));
    }
    if !queries::increment_available_ports(&tx, &booking.station_id)? {
        tracing::warn!(station_id = %booking.station_id, "station already at full capacity on cancel");
    }

    let cancelled = get_booking(&tx, user_id, booking_id)?;
    tx.commit()?;

    tracing::info!(booking_id = %booking_id, station_id = %cancelled.station_id, "booking cancelled, port restored");
    Ok(cancelled)
}

/// Marks a booking as having a charge in flight. While held, no other claim
/// or status transition succeeds on the booking. Dropping an unsettled claim
/// releases it, so an abandoned request leaves the booking retryable.
struct PaymentClaim<'a> {
    state: &'a AppState,
    booking_id: String,
    token: String,
    settled: bool,
}

impl<'a> PaymentClaim<'a> {
    fn acquire(
        state: &'a AppState,
        conn: &Connection,
        booking_id: &str,
        from: BookingStatus,
    ) -> AppResult<Self> {
        let token = Uuid::new_v4().to_string();
        if !queries::claim_payment(conn, booking_id, &token, &[from])? {
            return Err(AppError::Conflict(format!(
                "a payment for booking {booking_id} is already in progress"
            )));
        }
        Ok(Self {
            state,
            booking_id: booking_id.to_string(),
            token,
            settled: false,
        })
    }

    /// Clears the marker as part of the caller's settling transaction.
    fn release(&self, conn: &Connection) -> AppResult<()> {
        queries::release_payment_claim(conn, &self.booking_id, &self.token)?;
        Ok(())
    }

    /// Call once the settling transaction has committed.
    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for PaymentClaim<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let conn = self.state.db();
        match queries::release_payment_claim(&conn, &self.booking_id, &self.token) {
            Ok(_) => tracing::warn!(booking_id = %self.booking_id, "payment abandoned, claim released"),
            Err(e) => tracing::error!(booking_id = %self.booking_id, error = %e, "failed to release payment claim"),
        }
    }
}

/// Settles the advance on a pending booking: `confirmed` with `partial`
/// payment. A gateway failure marks the payment `failed` and leaves the
/// booking pending. A second call while a charge is in flight is a conflict.
pub async fn pay_advance(
    state: &AppState,
    user_id: &str,
    booking_id: &str,
    method: PaymentMethod,
) -> AppResult<(Booking, Payment)> {
    let (booking, claim) = {
        let conn = state.db();
        let booking = get_booking(&conn, user_id, booking_id)?;
        if booking.status != BookingStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "booking {booking_id} is {} and has no advance due",
                booking.status.as_str()
            )));
        }
        let claim = PaymentClaim::acquire(state, &conn, booking_id, BookingStatus::Pending)?;
        (booking, claim)
    };

    let request = PaymentRequest {
        booking_id: booking.id.clone(),
        user_id: user_id.to_string(),
        amount: booking.advance_payment,
        payment_type: PaymentType::Advance,
        payment_method: method,
    };
    let outcome = state.payments.charge(&request).await;

    let mut conn = state.db();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let payment = record_payment(&tx, &request, outcome.as_ref().ok().map(|r| r.transaction_id.clone()))?;
    claim.release(&tx)?;

    if let Err(e) = outcome {
        queries::update_payment_status(&tx, booking_id, PaymentStatus::Failed)?;
        tx.commit()?;
        claim.settle();
        tracing::warn!(booking_id = %booking_id, error = %e, "advance payment failed");
        return Err(AppError::Payment(e.to_string()));
    }

    if !queries::transition_booking(
        &tx,
        booking_id,
        &[BookingStatus::Pending],
        BookingStatus::Confirmed,
    )? {
        tracing::warn!(booking_id = %booking_id, "advance settled after booking left pending");
        return Err(AppError::InvalidState(format!(
            "booking {booking_id} changed while the advance was settling"
        )));
    }
    queries::update_payment_status(&tx, booking_id, PaymentStatus::Partial)?;
    let confirmed = get_booking(&tx, user_id, booking_id)?;
    tx.commit()?;
    claim.settle();

    tracing::info!(booking_id = %booking_id, amount = payment.amount, "booking confirmed");
    Ok((confirmed, payment))
}

/// Create, settle the advance and join the station queue in one call.
pub async fn smart_booking(state: &AppState, user_id: &str, req: &NewBooking) -> AppResult<SmartBooking> {
    let created = {
        let mut conn = state.db();
        create_booking(&mut conn, user_id, req)?
    };

    let (_, payment) = pay_advance(state, user_id, &created.id, req.payment_method).await?;

    let mut conn = state.db();
    let entry = queue::join(
        &mut conn,
        &created.station_id,
        &created.id,
        user_id,
        state.config.queue_slot_minutes,
    )?;
    let booking = get_booking(&conn, user_id, &created.id)?;

    Ok(SmartBooking {
        booking,
        payment,
        entry,
    })
}

/// Finishes an active session: charges the remaining amount, closes the
/// booking and its queue entry.
pub async fn complete_booking(
    state: &AppState,
    user_id: &str,
    booking_id: &str,
    method: PaymentMethod,
) -> AppResult<(Booking, Payment)> {
    let (booking, claim) = {
        let conn = state.db();
        let booking = get_booking(&conn, user_id, booking_id)?;
        if booking.status != BookingStatus::Active {
            return Err(AppError::InvalidState(format!(
                "booking {booking_id} is {} and cannot be completed",
                booking.status.as_str()
            )));
        }
        let claim = PaymentClaim::acquire(state, &conn, booking_id, BookingStatus::Active)?;
        (booking, claim)
    };

    let request = PaymentRequest {
        booking_id: booking.id.clone(),
        user_id: user_id.to_string(),
        amount: booking.remaining_payment,
        payment_type: PaymentType::Remaining,
        payment_method: method,
    };
    let outcome = state.payments.charge(&request).await;

    let mut conn = state.db();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let payment = record_payment(&tx, &request, outcome.as_ref().ok().map(|r| r.transaction_id.clone()))?;
    claim.release(&tx)?;

    if let Err(e) = outcome {
        queries::update_payment_status(&tx, booking_id, PaymentStatus::Failed)?;
        tx.commit()?;
        claim.settle();
        tracing::warn!(booking_id = %booking_id, error = %e, "remaining payment failed");
        return Err(AppError::Payment(e.to_string()));
    }

    if !queries::transition_booking(
        &tx,
        booking_id,
        &[BookingStatus::Active],
        BookingStatus::Completed,
    )? {
        tracing::warn!(booking_id = %booking_id, "remaining settled after booking left active");
        return Err(AppError::InvalidState(format!(
            "booking {booking_id} changed while the remaining payment was settling"
        )));
    }
    queries::update_payment_status(&tx, booking_id, PaymentStatus::Completed)?;
    queue::complete_entry(&tx, booking_id, state.config.queue_slot_minutes)?;
    let completed = get_booking(&tx, user_id, booking_id)?;
    tx.commit()?;
    claim.settle();

    tracing::info!(booking_id = %booking_id, amount = payment.amount, "booking completed");
    Ok((completed, payment))
}

fn record_payment(
    conn: &Connection,
    request: &PaymentRequest,
    transaction_id: Option<String>,
) -> AppResult<Payment> {
    let status = if transaction_id.is_some() {
        PaymentRecordStatus::Completed
    } else {
        PaymentRecordStatus::Failed
    };
    let payment = Payment {
        id: Uuid::new_v4().to_string(),
        booking_id: request.booking_id.clone(),
        user_id: request.user_id.clone(),
        amount: request.amount,
        payment_type: request.payment_type,
        payment_method: request.payment_method,
        transaction_id,
        status,
        created_at: Utc::now().naive_utc(),
    };
    queries::insert_payment(conn, &payment)?;
    Ok(payment)
}

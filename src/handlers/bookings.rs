use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::auth::user_id;
use crate::errors::AppResult;
use crate::models::{Booking, BookingStatus, Payment, PaymentMethod};
use crate::services::booking::{self, NewBooking};
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingReceipt {
    booking_id: String,
    booking_reference: String,
    estimated_charging_time_minutes: i64,
    estimated_cost: f64,
    advance_payment: f64,
    remaining_payment: f64,
    queue_position: i64,
    status: BookingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    estimated_wait_time_minutes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transaction_id: Option<String>,
}

impl From<&Booking> for BookingReceipt {
    fn from(b: &Booking) -> Self {
        Self {
            booking_id: b.id.clone(),
            booking_reference: b.booking_reference.clone(),
            estimated_charging_time_minutes: b.estimated_charging_time_minutes,
            estimated_cost: b.estimated_cost,
            advance_payment: b.advance_payment,
            remaining_payment: b.remaining_payment,
            queue_position: b.queue_position,
            status: b.status,
            estimated_wait_time_minutes: None,
            transaction_id: None,
        }
    }
}

#[derive(Serialize)]
pub struct SettledBooking {
    pub booking: Booking,
    pub payment: Payment,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<NewBooking>,
) -> AppResult<(StatusCode, Json<BookingReceipt>)> {
    let user = user_id(&headers)?;
    let mut db = state.db();
    let booking = booking::create_booking(&mut db, &user, &req)?;
    Ok((StatusCode::CREATED, Json(BookingReceipt::from(&booking))))
}

// POST /api/bookings/smart
pub async fn smart_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<NewBooking>,
) -> AppResult<(StatusCode, Json<BookingReceipt>)> {
    let user = user_id(&headers)?;
    let smart = booking::smart_booking(&state, &user, &req).await?;

    let mut receipt = BookingReceipt::from(&smart.booking);
    receipt.estimated_wait_time_minutes = Some(smart.entry.estimated_wait_time_minutes);
    receipt.transaction_id = smart.payment.transaction_id;
    Ok((StatusCode::CREATED, Json(receipt)))
}

// GET /api/bookings
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<Booking>>> {
    let user = user_id(&headers)?;
    let db = state.db();
    Ok(Json(booking::list_bookings(&db, &user)?))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(booking_id): Path<String>,
) -> AppResult<Json<Booking>> {
    let user = user_id(&headers)?;
    let db = state.db();
    Ok(Json(booking::get_booking(&db, &user, &booking_id)?))
}

// PUT /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(booking_id): Path<String>,
) -> AppResult<Json<Booking>> {
    let user = user_id(&headers)?;
    let mut db = state.db();
    Ok(Json(booking::cancel_booking(&mut db, &user, &booking_id)?))
}

// POST /api/bookings/:id/complete
pub async fn complete_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(booking_id): Path<String>,
    body: Option<Json<CompleteRequest>>,
) -> AppResult<Json<SettledBooking>> {
    let user = user_id(&headers)?;
    let method = body.map(|Json(b)| b.payment_method).unwrap_or_default();
    let (booking, payment) = booking::complete_booking(&state, &user, &booking_id, method).await?;
    Ok(Json(SettledBooking { booking, payment }))
}

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use super::auth::user_id;
use super::bookings::SettledBooking;
use crate::errors::AppResult;
use crate::models::PaymentMethod;
use crate::services::booking;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancePaymentRequest {
    pub booking_id: String,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

// POST /api/payments
pub async fn pay_advance(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<AdvancePaymentRequest>,
) -> AppResult<Json<SettledBooking>> {
    let user = user_id(&headers)?;
    let (booking, payment) =
        booking::pay_advance(&state, &user, &req.booking_id, req.payment_method).await?;
    Ok(Json(SettledBooking { booking, payment }))
}

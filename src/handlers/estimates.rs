use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppResult;
use crate::models::ChargingInput;
use crate::services::estimation::{estimate_charging, CHARGING_EFFICIENCY};
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateResponse {
    estimated_time_minutes: i64,
    estimated_cost: f64,
    energy_required_kwh: f64,
    charge_percentage: i64,
    charger_power_kw: f64,
}

// POST /api/estimates/charging
pub async fn estimate(
    State(state): State<Arc<AppState>>,
    Json(input): Json<ChargingInput>,
) -> AppResult<Json<EstimateResponse>> {
    let estimate = estimate_charging(&input)?;

    {
        let db = state.db();
        queries::insert_estimate(&db, &input, &estimate, CHARGING_EFFICIENCY)?;
    }

    Ok(Json(EstimateResponse {
        estimated_time_minutes: estimate.estimated_time_minutes,
        estimated_cost: estimate.estimated_cost,
        energy_required_kwh: estimate.energy_required_kwh,
        charge_percentage: input.target_battery_pct - input.current_battery_pct,
        charger_power_kw: input.charger_power_kw,
    }))
}

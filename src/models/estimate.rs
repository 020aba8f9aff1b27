use serde::{Deserialize, Serialize};

/// Battery and charger parameters for one charging estimate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChargingInput {
    #[serde(alias = "carKwh")]
    pub battery_capacity_kwh: f64,
    pub current_battery_pct: i64,
    pub target_battery_pct: i64,
    pub charger_power_kw: f64,
    pub price_per_unit: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChargingEstimate {
    /// Energy delivered into the battery, rounded to 2 decimals.
    pub energy_required_kwh: f64,
    pub estimated_time_minutes: i64,
    /// Cost of the energy drawn from the grid, rounded to 2 decimals.
    pub estimated_cost: f64,
}

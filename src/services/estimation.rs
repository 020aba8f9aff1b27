use crate::errors::{AppError, AppResult};
use crate::models::{ChargingEstimate, ChargingInput};

pub const CHARGING_EFFICIENCY: f64 = 0.95;

/// Rounds a currency or energy amount to 2 decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Time uses effective power (rated power scaled down by efficiency); cost
/// uses energy drawn (delivered energy scaled up by efficiency).
pub fn estimate_charging(input: &ChargingInput) -> AppResult<ChargingEstimate> {
    validate(input)?;

    let energy_required_kwh = input.battery_capacity_kwh
        * (input.target_battery_pct - input.current_battery_pct) as f64
        / 100.0;
    let effective_power_kw = input.charger_power_kw * CHARGING_EFFICIENCY;
    let time_minutes = ((energy_required_kwh / effective_power_kw) * 60.0).ceil();
    let energy_drawn_kwh = energy_required_kwh / CHARGING_EFFICIENCY;
    let cost = energy_drawn_kwh * input.price_per_unit;

    Ok(ChargingEstimate {
        energy_required_kwh: round2(energy_required_kwh),
        estimated_time_minutes: time_minutes as i64,
        estimated_cost: round2(cost),
    })
}

fn validate(input: &ChargingInput) -> AppResult<()> {
    if !input.battery_capacity_kwh.is_finite() || input.battery_capacity_kwh <= 0.0 {
        return Err(AppError::InvalidInput(
            "battery capacity must be greater than 0 kWh".to_string(),
        ));
    }
    if !input.charger_power_kw.is_finite() || input.charger_power_kw <= 0.0 {
        return Err(AppError::InvalidInput(
            "charger power must be greater than 0 kW".to_string(),
        ));
    }
    if !input.price_per_unit.is_finite() || input.price_per_unit < 0.0 {
        return Err(AppError::InvalidInput(
            "price per unit must not be negative".to_string(),
        ));
    }
    for (name, pct) in [
        ("current battery", input.current_battery_pct),
        ("target battery", input.target_battery_pct),
    ] {
        if !(0..=100).contains(&pct) {
            return Err(AppError::InvalidInput(format!(
                "{name} percentage must be between 0 and 100, got {pct}"
            )));
        }
    }
    if input.target_battery_pct < input.current_battery_pct {
        return Err(AppError::InvalidInput(format!(
            "target battery {}% is below current battery {}%",
            input.target_battery_pct, input.current_battery_pct
        )));
    }
    Ok(())
}

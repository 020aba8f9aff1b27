use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlternativeReason {
    FasterCharger,
    AvailableSlot,
}

impl AlternativeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlternativeReason::FasterCharger => "faster_charger",
            AlternativeReason::AvailableSlot => "available_slot",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "faster_charger" => AlternativeReason::FasterCharger,
            _ => AlternativeReason::AvailableSlot,
        }
    }
}

/// An alternative station a user chose over the one they first picked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRecommendation {
    pub id: String,
    pub user_id: String,
    pub original_station_id: String,
    pub alternative_station_id: String,
    pub reason: AlternativeReason,
    pub created_at: NaiveDateTime,
}

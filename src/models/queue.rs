use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub id: String,
    pub station_id: String,
    pub booking_id: String,
    pub user_id: String,
    /// 1-based, unique per station among waiting/active entries.
    pub position: i64,
    pub estimated_wait_time_minutes: i64,
    pub status: QueueStatus,
    pub arrived_at: Option<NaiveDateTime>,
    pub no_show_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Waiting,
    Active,
    Completed,
    Reallocated,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Waiting => "waiting",
            QueueStatus::Active => "active",
            QueueStatus::Completed => "completed",
            QueueStatus::Reallocated => "reallocated",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "active" => QueueStatus::Active,
            "completed" => QueueStatus::Completed,
            "reallocated" => QueueStatus::Reallocated,
            _ => QueueStatus::Waiting,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, QueueStatus::Waiting | QueueStatus::Active)
    }
}

/// Live view of one station's queue, ordered by ascending position.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub station_id: String,
    pub entries: Vec<QueueEntry>,
    pub total_in_queue: i64,
    pub total_waiting: i64,
    pub average_wait_time: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReallocationResult {
    pub booking_id: String,
    pub vacated_position: i64,
    /// User now holding the vacated position, if anyone was behind.
    pub reallocated_to: Option<String>,
    pub promoted_booking_id: Option<String>,
}

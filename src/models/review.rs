use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub user_id: String,
    pub station_id: String,
    pub rating: i64,
    pub comment: Option<String>,
    pub cleanliness: Option<i64>,
    pub speed: Option<i64>,
    pub safety: Option<i64>,
    pub created_at: NaiveDateTime,
}

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChargerSpec {
    /// AC, DC, ...
    #[serde(rename = "type")]
    pub charger_type: String,
    pub power_kw: f64,
    /// Type 2, CCS, CHAdeMO
    pub connector: String,
    pub price_per_unit: f64,
    #[serde(default)]
    pub available: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub id: String,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub total_ports: i64,
    pub available_ports: i64,
    pub charging_types: Vec<ChargerSpec>,
    pub rating: f64,
    pub reviews: i64,
    pub amenities: Vec<String>,
    pub operating_hours: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Station {
    pub fn fastest_charger(&self) -> Option<&ChargerSpec> {
        self.charging_types
            .iter()
            .max_by(|a, b| a.power_kw.total_cmp(&b.power_kw))
    }
}

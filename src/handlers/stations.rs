use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use super::auth::check_admin;
use crate::errors::{AppError, AppResult};
use crate::models::Station;
use crate::services::directory::{self, GeoFilter, NearbyStation, NewStation, StationDetails};
use crate::state::AppState;

// GET /api/stations
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationsQuery {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(alias = "distance")]
    pub radius_km: Option<f64>,
}

pub async fn list_stations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StationsQuery>,
) -> AppResult<Json<Vec<NearbyStation>>> {
    let filter = match (query.latitude, query.longitude, query.radius_km) {
        (Some(latitude), Some(longitude), Some(radius_km)) => Some(GeoFilter {
            latitude,
            longitude,
            radius_km,
        }),
        (None, None, None) => None,
        _ => {
            return Err(AppError::InvalidInput(
                "latitude, longitude and radiusKm must be given together".to_string(),
            ))
        }
    };

    let db = state.db();
    Ok(Json(directory::list_stations(&db, filter)?))
}

// GET /api/stations/:id
pub async fn get_station(
    State(state): State<Arc<AppState>>,
    Path(station_id): Path<String>,
) -> AppResult<Json<StationDetails>> {
    let db = state.db();
    Ok(Json(directory::station_details(&db, &station_id)?))
}

// POST /api/stations
pub async fn create_station(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<NewStation>,
) -> AppResult<(StatusCode, Json<Station>)> {
    check_admin(&headers, &state.config.admin_token)?;

    let db = state.db();
    let station = directory::create_station(&db, &req)?;
    Ok((StatusCode::CREATED, Json(station)))
}

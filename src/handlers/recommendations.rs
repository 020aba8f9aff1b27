use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use super::auth::user_id;
use crate::errors::AppResult;
use crate::models::SavedRecommendation;
use crate::services::directory::{self, Alternatives, AlternativesRequest, NewRecommendation};
use crate::state::AppState;

// POST /api/recommendations/alternatives
pub async fn alternatives(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<AlternativesRequest>,
) -> AppResult<Json<Alternatives>> {
    user_id(&headers)?;
    let db = state.db();
    let result = directory::alternatives(&db, &req, state.config.alternatives_radius_km)?;
    Ok(Json(result))
}

// POST /api/recommendations/save
pub async fn save(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<NewRecommendation>,
) -> AppResult<(StatusCode, Json<SavedRecommendation>)> {
    let user = user_id(&headers)?;
    let db = state.db();
    let rec = directory::save_recommendation(&db, &user, &req)?;
    Ok((StatusCode::CREATED, Json(rec)))
}

// GET /api/recommendations
pub async fn list_saved(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<SavedRecommendation>>> {
    let user = user_id(&headers)?;
    let db = state.db();
    Ok(Json(directory::saved_recommendations(&db, &user)?))
}

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use super::auth::user_id;
use crate::errors::AppResult;
use crate::models::Review;
use crate::services::directory::{self, NewReview};
use crate::state::AppState;

// POST /api/reviews
pub async fn add_review(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<NewReview>,
) -> AppResult<(StatusCode, Json<Review>)> {
    let user = user_id(&headers)?;
    let mut db = state.db();
    let review = directory::add_review(&mut db, &user, &req)?;
    Ok((StatusCode::CREATED, Json(review)))
}

// GET /api/reviews/station/:id
pub async fn station_reviews(
    State(state): State<Arc<AppState>>,
    Path(station_id): Path<String>,
) -> AppResult<Json<Vec<Review>>> {
    let db = state.db();
    Ok(Json(directory::station_reviews(&db, &station_id)?))
}

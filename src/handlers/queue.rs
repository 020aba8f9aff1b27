use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::auth::user_id;
use crate::errors::AppResult;
use crate::models::{QueueEntry, QueueStatus, ReallocationResult};
use crate::services::queue;
use crate::state::AppState;

const STATUS_PREVIEW_LEN: usize = 10;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub station_id: String,
    pub booking_id: String,
}

// POST /api/queue/join
pub async fn join_queue(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<JoinRequest>,
) -> AppResult<(StatusCode, Json<QueueEntry>)> {
    let user = user_id(&headers)?;
    let mut db = state.db();
    let entry = queue::join(
        &mut db,
        &req.station_id,
        &req.booking_id,
        &user,
        state.config.queue_slot_minutes,
    )?;
    Ok((StatusCode::CREATED, Json(entry)))
}

// GET /api/queue/status/:station_id
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSlot {
    position: i64,
    user_ref: String,
    status: QueueStatus,
    estimated_wait_time_minutes: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatusResponse {
    station_id: String,
    total_in_queue: i64,
    total_waiting: i64,
    average_wait_time: i64,
    queue: Vec<QueueSlot>,
}

pub async fn queue_status(
    State(state): State<Arc<AppState>>,
    Path(station_id): Path<String>,
) -> AppResult<Json<QueueStatusResponse>> {
    let snapshot = {
        let db = state.db();
        queue::status(&db, &station_id, state.config.queue_slot_minutes)?
    };

    Ok(Json(QueueStatusResponse {
        station_id: snapshot.station_id,
        total_in_queue: snapshot.total_in_queue,
        total_waiting: snapshot.total_waiting,
        average_wait_time: snapshot.average_wait_time,
        queue: snapshot
            .entries
            .into_iter()
            .take(STATUS_PREVIEW_LEN)
            .map(|e| QueueSlot {
                position: e.position,
                user_ref: e.user_id,
                status: e.status,
                estimated_wait_time_minutes: e.estimated_wait_time_minutes,
            })
            .collect(),
    }))
}

// POST /api/queue/arrive/:booking_id
pub async fn arrive(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(booking_id): Path<String>,
) -> AppResult<Json<QueueEntry>> {
    let user = user_id(&headers)?;
    let mut db = state.db();
    Ok(Json(queue::arrive(&mut db, &booking_id, &user)?))
}

// POST /api/queue/no-show/:booking_id
pub async fn report_no_show(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(booking_id): Path<String>,
) -> AppResult<Json<ReallocationResult>> {
    user_id(&headers)?;
    let mut db = state.db();
    let result = queue::report_no_show(&mut db, &booking_id, state.config.queue_slot_minutes)?;
    Ok(Json(result))
}

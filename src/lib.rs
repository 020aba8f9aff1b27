pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health::health))
        .route(
            "/api/stations",
            get(handlers::stations::list_stations).post(handlers::stations::create_station),
        )
        .route("/api/stations/:id", get(handlers::stations::get_station))
        .route("/api/reviews", post(handlers::reviews::add_review))
        .route(
            "/api/reviews/station/:id",
            get(handlers::reviews::station_reviews),
        )
        .route(
            "/api/estimates/charging",
            post(handlers::estimates::estimate),
        )
        .route(
            "/api/bookings",
            get(handlers::bookings::list_bookings).post(handlers::bookings::create_booking),
        )
        .route("/api/bookings/smart", post(handlers::bookings::smart_booking))
        .route("/api/bookings/:id", get(handlers::bookings::get_booking))
        .route(
            "/api/bookings/:id/cancel",
            put(handlers::bookings::cancel_booking),
        )
        .route(
            "/api/bookings/:id/complete",
            post(handlers::bookings::complete_booking),
        )
        .route("/api/payments", post(handlers::payments::pay_advance))
        .route("/api/queue/join", post(handlers::queue::join_queue))
        .route(
            "/api/queue/status/:station_id",
            get(handlers::queue::queue_status),
        )
        .route(
            "/api/queue/arrive/:booking_id",
            post(handlers::queue::arrive),
        )
        .route(
            "/api/queue/no-show/:booking_id",
            post(handlers::queue::report_no_show),
        )
        .route(
            "/api/recommendations/alternatives",
            post(handlers::recommendations::alternatives),
        )
        .route(
            "/api/recommendations",
            get(handlers::recommendations::list_saved),
        )
        .route(
            "/api/recommendations/save",
            post(handlers::recommendations::save),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

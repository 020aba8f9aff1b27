//! Station directory: listing with a radius filter, station details with
//! reviews, admin station creation, and nearby alternatives a user can save.

use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::models::{
    AlternativeReason, ChargerSpec, ChargingInput, Review, SavedRecommendation, Station,
};
use crate::services::estimation::{estimate_charging, round2};

const EARTH_RADIUS_KM: f64 = 6371.0;
const DETAIL_REVIEW_LIMIT: i64 = 10;
const REVIEW_LIST_LIMIT: i64 = 100;
const MAX_ALTERNATIVES: usize = 5;
/// Assumed power of the original station when it lists no chargers.
const FALLBACK_POWER_KW: f64 = 7.0;

/// Great-circle distance in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn validate_coordinates(latitude: f64, longitude: f64) -> AppResult<()> {
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(AppError::InvalidInput(format!(
            "invalid coordinates ({latitude}, {longitude})"
        )));
    }
    Ok(())
}

// ── Stations ──

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoFilter {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyStation {
    #[serde(flatten)]
    pub station: Station,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

/// All stations by rating, or only those within the radius when a filter is given.
pub fn list_stations(conn: &Connection, filter: Option<GeoFilter>) -> AppResult<Vec<NearbyStation>> {
    let stations = queries::list_stations(conn)?;

    let Some(geo) = filter else {
        return Ok(stations
            .into_iter()
            .map(|station| NearbyStation {
                station,
                distance_km: None,
            })
            .collect());
    };

    validate_coordinates(geo.latitude, geo.longitude)?;
    if !geo.radius_km.is_finite() || geo.radius_km < 0.0 {
        return Err(AppError::InvalidInput(format!(
            "radius must be a non-negative distance, got {}",
            geo.radius_km
        )));
    }

    Ok(stations
        .into_iter()
        .filter_map(|station| {
            let distance =
                haversine_km(geo.latitude, geo.longitude, station.latitude, station.longitude);
            (distance <= geo.radius_km).then(|| NearbyStation {
                station,
                distance_km: Some(round1(distance)),
            })
        })
        .collect())
}

#[derive(Debug, Clone, Serialize)]
pub struct StationDetails {
    pub station: Station,
    pub reviews: Vec<Review>,
}

pub fn station_details(conn: &Connection, station_id: &str) -> AppResult<StationDetails> {
    let station = queries::get_station(conn, station_id)?
        .ok_or_else(|| AppError::NotFound(format!("station {station_id}")))?;
    let reviews = queries::list_reviews_for_station(conn, station_id, DETAIL_REVIEW_LIMIT)?;
    Ok(StationDetails { station, reviews })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStation {
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub total_ports: i64,
    #[serde(default)]
    pub charging_types: Vec<ChargerSpec>,
    #[serde(default)]
    pub amenities: Vec<String>,
    pub operating_hours: Option<String>,
}

/// Adds a station with every port free.
pub fn create_station(conn: &Connection, req: &NewStation) -> AppResult<Station> {
    if req.name.trim().is_empty() {
        return Err(AppError::InvalidInput("station name is required".to_string()));
    }
    validate_coordinates(req.latitude, req.longitude)?;
    if req.total_ports < 0 {
        return Err(AppError::InvalidInput(format!(
            "total ports must not be negative, got {}",
            req.total_ports
        )));
    }
    for charger in &req.charging_types {
        if !charger.power_kw.is_finite() || charger.power_kw <= 0.0 {
            return Err(AppError::InvalidInput(format!(
                "charger {} must have positive power",
                charger.charger_type
            )));
        }
        if !charger.price_per_unit.is_finite() || charger.price_per_unit < 0.0 {
            return Err(AppError::InvalidInput(format!(
                "charger {} must not have a negative price",
                charger.charger_type
            )));
        }
    }

    let now = Utc::now().naive_utc();
    let station = Station {
        id: Uuid::new_v4().to_string(),
        name: req.name.trim().to_string(),
        address: req.address.clone(),
        latitude: req.latitude,
        longitude: req.longitude,
        total_ports: req.total_ports,
        available_ports: req.total_ports,
        charging_types: req.charging_types.clone(),
        rating: 0.0,
        reviews: 0,
        amenities: req.amenities.clone(),
        operating_hours: req.operating_hours.clone(),
        created_at: now,
        updated_at: now,
    };
    queries::insert_station(conn, &station)?;

    tracing::info!(station_id = %station.id, name = %station.name, ports = station.total_ports, "station added");
    Ok(station)
}

// ── Reviews ──

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub station_id: String,
    pub rating: i64,
    pub comment: Option<String>,
    pub cleanliness: Option<i64>,
    pub speed: Option<i64>,
    pub safety: Option<i64>,
}

fn check_score(name: &str, score: i64) -> AppResult<()> {
    if !(1..=5).contains(&score) {
        return Err(AppError::InvalidInput(format!(
            "{name} must be between 1 and 5, got {score}"
        )));
    }
    Ok(())
}

/// Stores a review and refreshes the station's mean rating and review count.
pub fn add_review(conn: &mut Connection, user_id: &str, req: &NewReview) -> AppResult<Review> {
    check_score("rating", req.rating)?;
    for (name, score) in [
        ("cleanliness", req.cleanliness),
        ("speed", req.speed),
        ("safety", req.safety),
    ] {
        if let Some(score) = score {
            check_score(name, score)?;
        }
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    if queries::get_station(&tx, &req.station_id)?.is_none() {
        return Err(AppError::NotFound(format!("station {}", req.station_id)));
    }

    let review = Review {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        station_id: req.station_id.clone(),
        rating: req.rating,
        comment: req.comment.clone(),
        cleanliness: req.cleanliness,
        speed: req.speed,
        safety: req.safety,
        created_at: Utc::now().naive_utc(),
    };
    queries::insert_review(&tx, &review)?;
    queries::refresh_station_rating(&tx, &req.station_id)?;
    tx.commit()?;

    tracing::info!(station_id = %review.station_id, rating = review.rating, "review added");
    Ok(review)
}

pub fn station_reviews(conn: &Connection, station_id: &str) -> AppResult<Vec<Review>> {
    if queries::get_station(conn, station_id)?.is_none() {
        return Err(AppError::NotFound(format!("station {station_id}")));
    }
    queries::list_reviews_for_station(conn, station_id, REVIEW_LIST_LIMIT)
}

// ── Alternatives ──

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlternativesRequest {
    pub station_id: String,
    #[serde(alias = "currentLat")]
    pub latitude: f64,
    #[serde(alias = "currentLon")]
    pub longitude: f64,
    #[serde(alias = "targetBattery")]
    pub target_battery_pct: i64,
    pub car_kwh: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alternative {
    pub station_id: String,
    pub name: String,
    pub address: String,
    pub distance_km: f64,
    pub available_ports: i64,
    pub charge_time_minutes: i64,
    pub cost: f64,
    /// Positive when the alternative is cheaper than the original station.
    pub cost_difference: f64,
    pub charger_type: String,
    pub reason: AlternativeReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct StationRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alternatives {
    pub original_station: StationRef,
    pub recommendations: Vec<Alternative>,
}

/// Nearby stations with a free port, fastest full charge first.
pub fn alternatives(
    conn: &Connection,
    req: &AlternativesRequest,
    radius_km: f64,
) -> AppResult<Alternatives> {
    validate_coordinates(req.latitude, req.longitude)?;
    let original = queries::get_station(conn, &req.station_id)?
        .ok_or_else(|| AppError::NotFound(format!("station {}", req.station_id)))?;

    let (original_power, original_price) = original
        .charging_types
        .first()
        .map(|c| (c.power_kw, c.price_per_unit))
        .unwrap_or((FALLBACK_POWER_KW, 0.0));
    let full_charge = |power_kw: f64, price_per_unit: f64| {
        estimate_charging(&ChargingInput {
            battery_capacity_kwh: req.car_kwh,
            current_battery_pct: 0,
            target_battery_pct: req.target_battery_pct,
            charger_power_kw: power_kw,
            price_per_unit,
        })
    };
    let original_cost = full_charge(original_power, original_price)?.estimated_cost;

    let mut recommendations = Vec::new();
    for station in queries::list_stations(conn)? {
        if station.id == original.id || station.available_ports <= 0 {
            continue;
        }
        let distance = haversine_km(req.latitude, req.longitude, station.latitude, station.longitude);
        if distance > radius_km {
            continue;
        }
        let Some(fastest) = station.fastest_charger() else {
            continue;
        };

        let estimate = full_charge(fastest.power_kw, fastest.price_per_unit)?;
        let reason = if fastest.power_kw > original_power {
            AlternativeReason::FasterCharger
        } else {
            AlternativeReason::AvailableSlot
        };
        recommendations.push(Alternative {
            station_id: station.id.clone(),
            name: station.name.clone(),
            address: station.address.clone(),
            distance_km: round1(distance),
            available_ports: station.available_ports,
            charge_time_minutes: estimate.estimated_time_minutes,
            cost: estimate.estimated_cost,
            cost_difference: round2(original_cost - estimate.estimated_cost),
            charger_type: fastest.charger_type.clone(),
            reason,
        });
    }

    recommendations.sort_by(|a, b| {
        a.charge_time_minutes
            .cmp(&b.charge_time_minutes)
            .then(a.distance_km.total_cmp(&b.distance_km))
    });
    recommendations.truncate(MAX_ALTERNATIVES);

    Ok(Alternatives {
        original_station: StationRef {
            id: original.id,
            name: original.name,
        },
        recommendations,
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecommendation {
    pub original_station_id: String,
    pub alternative_station_id: String,
    pub reason: AlternativeReason,
}

/// Records the alternative a user picked instead of their first station.
pub fn save_recommendation(
    conn: &Connection,
    user_id: &str,
    req: &NewRecommendation,
) -> AppResult<SavedRecommendation> {
    if req.original_station_id == req.alternative_station_id {
        return Err(AppError::InvalidInput(
            "alternative station must differ from the original station".to_string(),
        ));
    }
    for station_id in [&req.original_station_id, &req.alternative_station_id] {
        if queries::get_station(conn, station_id)?.is_none() {
            return Err(AppError::NotFound(format!("station {station_id}")));
        }
    }

    let rec = SavedRecommendation {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        original_station_id: req.original_station_id.clone(),
        alternative_station_id: req.alternative_station_id.clone(),
        reason: req.reason,
        created_at: Utc::now().naive_utc(),
    };
    queries::insert_recommendation(conn, &rec)?;

    tracing::info!(
        user_id = %user_id,
        from = %rec.original_station_id,
        to = %rec.alternative_station_id,
        reason = rec.reason.as_str(),
        "alternative saved"
    );
    Ok(rec)
}

pub fn saved_recommendations(conn: &Connection, user_id: &str) -> AppResult<Vec<SavedRecommendation>> {
    queries::list_recommendations_for_user(conn, user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::services::testing::{charger, station_at};

    fn setup() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn insert(conn: &Connection, station: Station) -> Station {
        queries::insert_station(conn, &station).unwrap();
        station
    }

    fn alternatives_request(station_id: &str) -> AlternativesRequest {
        AlternativesRequest {
            station_id: station_id.to_string(),
            latitude: 12.9716,
            longitude: 77.5946,
            target_battery_pct: 80,
            car_kwh: 60.0,
        }
    }

    #[test]
    fn test_haversine_known_distance() {
        // Bengaluru MG Road to Indiranagar, roughly 3.7 km
        let d = haversine_km(12.9756, 77.6066, 12.9784, 77.6408);
        assert!((d - 3.7).abs() < 0.2, "got {d}");
        assert_eq!(haversine_km(10.0, 10.0, 10.0, 10.0), 0.0);
    }

    #[test]
    fn test_list_filters_by_radius() {
        let conn = setup();
        insert(&conn, station_at("near", 2, 12.9716, 77.5946, vec![]));
        insert(&conn, station_at("far", 2, 13.5, 77.5946, vec![]));

        let all = list_stations(&conn, None).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|s| s.distance_km.is_none()));

        let nearby = list_stations(
            &conn,
            Some(GeoFilter {
                latitude: 12.972,
                longitude: 77.595,
                radius_km: 5.0,
            }),
        )
        .unwrap();
        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].station.id, "near");
        assert!(nearby[0].distance_km.unwrap() < 1.0);
    }

    #[test]
    fn test_list_rejects_bad_coordinates() {
        let conn = setup();
        let err = list_stations(
            &conn,
            Some(GeoFilter {
                latitude: 123.0,
                longitude: 0.0,
                radius_km: 5.0,
            }),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_create_station_starts_fully_available() {
        let conn = setup();
        let station = create_station(
            &conn,
            &NewStation {
                name: "Green Plug".to_string(),
                address: "5 Main St".to_string(),
                latitude: 12.0,
                longitude: 77.0,
                total_ports: 6,
                charging_types: vec![charger("DC", 50.0, 18.0)],
                amenities: vec!["cafe".to_string()],
                operating_hours: Some("24/7".to_string()),
            },
        )
        .unwrap();

        assert_eq!(station.available_ports, 6);
        let stored = queries::get_station(&conn, &station.id).unwrap().unwrap();
        assert_eq!(stored.charging_types, station.charging_types);
        assert_eq!(stored.amenities, vec!["cafe".to_string()]);
    }

    #[test]
    fn test_create_station_rejects_zero_power_charger() {
        let conn = setup();
        let err = create_station(
            &conn,
            &NewStation {
                name: "Broken".to_string(),
                address: String::new(),
                latitude: 0.0,
                longitude: 0.0,
                total_ports: 1,
                charging_types: vec![charger("AC", 0.0, 1.0)],
                amenities: vec![],
                operating_hours: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_reviews_update_station_rating() {
        let mut conn = setup();
        insert(&conn, station_at("st-1", 2, 12.0, 77.0, vec![]));

        for rating in [5, 4, 3] {
            add_review(
                &mut conn,
                "u-1",
                &NewReview {
                    station_id: "st-1".to_string(),
                    rating,
                    comment: None,
                    cleanliness: Some(4),
                    speed: None,
                    safety: None,
                },
            )
            .unwrap();
        }

        let details = station_details(&conn, "st-1").unwrap();
        assert_eq!(details.station.rating, 4.0);
        assert_eq!(details.station.reviews, 3);
        assert_eq!(details.reviews.len(), 3);
        assert_eq!(station_reviews(&conn, "st-1").unwrap().len(), 3);
    }

    #[test]
    fn test_review_score_bounds() {
        let mut conn = setup();
        insert(&conn, station_at("st-1", 2, 12.0, 77.0, vec![]));

        let mut req = NewReview {
            station_id: "st-1".to_string(),
            rating: 6,
            comment: None,
            cleanliness: None,
            speed: None,
            safety: None,
        };
        assert!(add_review(&mut conn, "u-1", &req).is_err());
        req.rating = 4;
        req.safety = Some(0);
        assert!(add_review(&mut conn, "u-1", &req).is_err());

        req.station_id = "missing".to_string();
        req.safety = None;
        assert!(matches!(
            add_review(&mut conn, "u-1", &req).unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[test]
    fn test_alternatives_fastest_first() {
        let conn = setup();
        insert(&conn, station_at("origin", 2, 12.9716, 77.5946, vec![charger("AC", 7.0, 8.0)]));
        insert(&conn, station_at("dc", 2, 12.975, 77.60, vec![charger("AC", 7.0, 8.0), charger("DC", 50.0, 18.0)]));
        insert(&conn, station_at("ac", 2, 12.98, 77.59, vec![charger("AC", 22.0, 10.0)]));
        let mut full = station_at("full", 2, 12.972, 77.595, vec![charger("DC", 60.0, 20.0)]);
        full.available_ports = 0;
        insert(&conn, full);
        insert(&conn, station_at("bare", 2, 12.972, 77.595, vec![]));
        insert(&conn, station_at("distant", 2, 14.0, 77.5946, vec![charger("DC", 120.0, 20.0)]));

        let result = alternatives(&conn, &alternatives_request("origin"), 5.0).unwrap();
        assert_eq!(result.original_station.id, "origin");

        let ids: Vec<&str> = result.recommendations.iter().map(|r| r.station_id.as_str()).collect();
        assert_eq!(ids, vec!["dc", "ac"]);

        let dc = &result.recommendations[0];
        assert_eq!(dc.charger_type, "DC");
        assert_eq!(dc.reason, AlternativeReason::FasterCharger);
        // 48 kWh at 50 kW * 0.95
        assert_eq!(dc.charge_time_minutes, 61);
        assert_eq!(dc.cost, 909.47);
        // Original: 48 kWh / 0.95 * 8 = 404.21
        assert_eq!(dc.cost_difference, round2(404.21 - 909.47));
    }

    #[test]
    fn test_alternatives_reason_for_slower_charger() {
        let conn = setup();
        insert(&conn, station_at("origin", 0, 12.9716, 77.5946, vec![charger("DC", 50.0, 18.0)]));
        insert(&conn, station_at("slow", 2, 12.972, 77.595, vec![charger("AC", 7.0, 8.0)]));

        let result = alternatives(&conn, &alternatives_request("origin"), 5.0).unwrap();
        assert_eq!(result.recommendations.len(), 1);
        assert_eq!(result.recommendations[0].reason, AlternativeReason::AvailableSlot);
        assert!(result.recommendations[0].cost_difference > 0.0);
    }

    #[test]
    fn test_alternatives_caps_results() {
        let conn = setup();
        insert(&conn, station_at("origin", 0, 12.9716, 77.5946, vec![]));
        for i in 0..8 {
            insert(
                &conn,
                station_at(&format!("alt-{i}"), 1, 12.9716, 77.5946, vec![charger("AC", 7.0 + i as f64, 8.0)]),
            );
        }

        let result = alternatives(&conn, &alternatives_request("origin"), 5.0).unwrap();
        assert_eq!(result.recommendations.len(), MAX_ALTERNATIVES);
        assert_eq!(result.recommendations[0].station_id, "alt-7");
    }

    #[test]
    fn test_alternatives_unknown_station() {
        let conn = setup();
        let err = alternatives(&conn, &alternatives_request("nope"), 5.0).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_save_recommendation() {
        let conn = setup();
        insert(&conn, station_at("origin", 2, 12.9716, 77.5946, vec![]));
        insert(&conn, station_at("alt", 2, 12.975, 77.60, vec![charger("DC", 50.0, 18.0)]));

        let saved = save_recommendation(
            &conn,
            "u-1",
            &NewRecommendation {
                original_station_id: "origin".to_string(),
                alternative_station_id: "alt".to_string(),
                reason: AlternativeReason::FasterCharger,
            },
        )
        .unwrap();

        let listed = saved_recommendations(&conn, "u-1").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, saved.id);
        assert_eq!(listed[0].reason, AlternativeReason::FasterCharger);
        assert!(saved_recommendations(&conn, "u-2").unwrap().is_empty());
    }

    #[test]
    fn test_save_recommendation_rejects_unknown_or_same_station() {
        let conn = setup();
        insert(&conn, station_at("origin", 2, 12.9716, 77.5946, vec![]));

        let mut req = NewRecommendation {
            original_station_id: "origin".to_string(),
            alternative_station_id: "missing".to_string(),
            reason: AlternativeReason::AvailableSlot,
        };
        assert!(matches!(
            save_recommendation(&conn, "u-1", &req).unwrap_err(),
            AppError::NotFound(_)
        ));

        req.alternative_station_id = "origin".to_string();
        assert!(matches!(
            save_recommendation(&conn, "u-1", &req).unwrap_err(),
            AppError::InvalidInput(_)
        ));
    }
}

pub mod booking;
pub mod directory;
pub mod estimation;
pub mod payment;
pub mod queue;

use uuid::Uuid;

/// `prefix` followed by 9 random uppercase alphanumerics, e.g. `CBK4F0A19C2E`.
pub fn short_code(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{prefix}{}", id[..9].to_uppercase())
}

#[cfg(test)]
pub(crate) mod testing {
    use chrono::Utc;
    use rusqlite::Connection;
    use uuid::Uuid;

    use crate::db::queries;
    use crate::models::{Booking, BookingStatus, ChargerSpec, PaymentStatus, Station};

    pub fn charger(kind: &str, power_kw: f64, price: f64) -> ChargerSpec {
        ChargerSpec {
            charger_type: kind.to_string(),
            power_kw,
            connector: "CCS".to_string(),
            price_per_unit: price,
            available: 1,
        }
    }

    pub fn station_at(
        id: &str,
        ports: i64,
        latitude: f64,
        longitude: f64,
        chargers: Vec<ChargerSpec>,
    ) -> Station {
        let now = Utc::now().naive_utc();
        Station {
            id: id.to_string(),
            name: format!("Station {id}"),
            address: "1 Test Road".to_string(),
            latitude,
            longitude,
            total_ports: ports,
            available_ports: ports,
            charging_types: chargers,
            rating: 0.0,
            reviews: 0,
            amenities: vec![],
            operating_hours: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn seed_station(conn: &Connection, id: &str, ports: i64) -> Station {
        let station = station_at(id, ports, 12.97, 77.59, vec![charger("AC", 7.0, 8.0)]);
        queries::insert_station(conn, &station).unwrap();
        station
    }

    /// A booking that has already settled its advance payment.
    pub fn confirmed_booking(conn: &Connection, station_id: &str, user_id: &str) -> Booking {
        let now = Utc::now().naive_utc();
        let booking = Booking {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            station_id: station_id.to_string(),
            station_name: format!("Station {station_id}"),
            booking_reference: super::short_code("CBK"),
            booking_date: None,
            start_time: None,
            end_time: None,
            slot_duration_minutes: None,
            charging_type: None,
            car_brand: None,
            car_model: None,
            car_kwh: 60.0,
            current_battery_pct: 20,
            target_battery_pct: 80,
            charger_power_kw: 7.0,
            price_per_unit: 8.0,
            estimated_charging_time_minutes: 325,
            estimated_energy_kwh: 36.0,
            estimated_cost: 303.16,
            advance_payment: 60.63,
            remaining_payment: 242.53,
            queue_position: 0,
            status: BookingStatus::Confirmed,
            payment_status: PaymentStatus::Partial,
            created_at: now,
            updated_at: now,
        };
        queries::insert_booking(conn, &booking).unwrap();
        booking
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_code_shape() {
        let code = short_code("CBK");
        assert_eq!(code.len(), 12);
        assert!(code.starts_with("CBK"));
        assert!(code[3..]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        assert_ne!(code, short_code("CBK"));
    }
}

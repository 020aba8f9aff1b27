pub mod auth;
pub mod bookings;
pub mod estimates;
pub mod health;
pub mod payments;
pub mod queue;
pub mod recommendations;
pub mod reviews;
pub mod stations;

pub mod auth;
pub mod bookings;
pub mod dashboard;
pub mod health;
pub mod sales;
pub mod units;

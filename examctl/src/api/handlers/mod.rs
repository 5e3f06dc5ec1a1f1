pub mod admin_reservations;
pub mod auth;
pub mod reservations;
pub mod schedules;

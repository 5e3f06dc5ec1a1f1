pub mod auth;
pub mod pagination;
pub mod reservations;
pub mod schedules;
pub mod users;

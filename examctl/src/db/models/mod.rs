pub mod reservations;
pub mod schedules;
pub mod users;

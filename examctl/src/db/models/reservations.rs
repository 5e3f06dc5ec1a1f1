//! Database models for reservations.

use crate::api::models::reservations::ReservationStatus;
use crate::types::{ReservationId, ScheduleId, UserId};
use chrono::{DateTime, Utc};

/// Database request for creating a reservation
#[derive(Debug, Clone)]
pub struct ReservationCreateDBRequest {
    pub user_id: UserId,
    pub exam_schedule_id: ScheduleId,
    pub reserved_count: i32,
}

/// Database request for updating a reservation's own fields.
///
/// Status is deliberately absent: status changes go through the guarded
/// transition in [`crate::db::handlers::reservations::Reservations::update_status`].
#[derive(Debug, Clone, Default)]
pub struct ReservationUpdateDBRequest {
    pub exam_schedule_id: Option<ScheduleId>,
    pub reserved_count: Option<i32>,
}

/// Database response for a reservation
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReservationDBResponse {
    pub id: ReservationId,
    pub user_id: UserId,
    pub exam_schedule_id: ScheduleId,
    pub reserved_count: i32,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Reservation joined with its owner's identity, for admin listings
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReservationWithUserDBResponse {
    pub id: ReservationId,
    pub user_id: UserId,
    pub user_username: String,
    pub user_email: String,
    pub exam_schedule_id: ScheduleId,
    pub reserved_count: i32,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

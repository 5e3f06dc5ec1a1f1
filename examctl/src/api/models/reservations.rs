//! API request/response models for reservations.

use crate::api::models::pagination::Pagination;
use crate::db::models::reservations::{ReservationDBResponse, ReservationWithUserDBResponse};
use crate::types::{ReservationId, ScheduleId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Reservation lifecycle status.
///
/// Reservations start PENDING and are moved to RESERVED or CANCLED by an
/// admin. The CANCLED spelling is preserved on the wire for compatibility
/// with existing clients.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "reservation_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ReservationStatus {
    Pending,
    Reserved,
    Cancled,
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReservationStatus::Pending => write!(f, "PENDING"),
            ReservationStatus::Reserved => write!(f, "RESERVED"),
            ReservationStatus::Cancled => write!(f, "CANCLED"),
        }
    }
}

/// Request body for creating a reservation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReservationCreate {
    #[schema(value_type = String, format = "uuid")]
    pub exam_schedule_id: ScheduleId,
    pub reserved_count: i32,
}

/// Request body for updating a reservation's own fields.
///
/// Only PENDING reservations may be edited; status changes are admin-only
/// and go through the dedicated status endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ReservationUpdate {
    #[schema(value_type = Option<String>, format = "uuid")]
    pub exam_schedule_id: Option<ScheduleId>,
    pub reserved_count: Option<i32>,
}

/// Request body for the admin status transition endpoint
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReservationStatusUpdate {
    pub status: ReservationStatus,
}

/// Reservation as returned to its owner.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReservationResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ReservationId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub exam_schedule_id: ScheduleId,
    pub reserved_count: i32,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Reservation joined with its owner's identity, for admin listings.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminReservationResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ReservationId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub user_username: String,
    pub user_email: String,
    #[schema(value_type = String, format = "uuid")]
    pub exam_schedule_id: ScheduleId,
    pub reserved_count: i32,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Query parameters for listing reservations
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListReservationsQuery {
    /// Pagination parameters
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Filter by status
    pub status: Option<ReservationStatus>,

    /// Filter by exam schedule
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub exam_schedule_id: Option<ScheduleId>,
}

impl From<ReservationDBResponse> for ReservationResponse {
    fn from(db: ReservationDBResponse) -> Self {
        Self {
            id: db.id,
            user_id: db.user_id,
            exam_schedule_id: db.exam_schedule_id,
            reserved_count: db.reserved_count,
            status: db.status,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl From<ReservationWithUserDBResponse> for AdminReservationResponse {
    fn from(db: ReservationWithUserDBResponse) -> Self {
        Self {
            id: db.id,
            user_id: db.user_id,
            user_username: db.user_username,
            user_email: db.user_email,
            exam_schedule_id: db.exam_schedule_id,
            reserved_count: db.reserved_count,
            status: db.status,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_spelling() {
        let json = serde_json::to_string(&ReservationStatus::Cancled).unwrap();
        assert_eq!(json, "\"CANCLED\"");

        let parsed: ReservationStatus = serde_json::from_str("\"RESERVED\"").unwrap();
        assert_eq!(parsed, ReservationStatus::Reserved);
    }
}

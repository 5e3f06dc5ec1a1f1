//! API request/response models for exam schedules.

use crate::api::models::pagination::Pagination;
use crate::db::models::schedules::{ScheduleCreateDBRequest, ScheduleDBResponse, ScheduleUpdateDBRequest};
use crate::types::ScheduleId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Request body for creating an exam schedule (admin only)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScheduleCreate {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub max_capacity: i32,
}

/// Request body for updating an exam schedule (admin only)
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ScheduleUpdate {
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub max_capacity: Option<i32>,
}

/// Exam schedule as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScheduleResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ScheduleId,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub max_capacity: i32,
    pub confirmed_reserved_count: i32,
    /// Seats still available for confirmation
    pub remaining_capacity: i32,
    /// Whether any seats remain
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Query parameters for listing schedules
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListSchedulesQuery {
    /// Pagination parameters
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Only return schedules starting after this instant
    pub starting_after: Option<DateTime<Utc>>,
}

impl From<ScheduleCreate> for ScheduleCreateDBRequest {
    fn from(api: ScheduleCreate) -> Self {
        Self {
            start_at: api.start_at,
            end_at: api.end_at,
            max_capacity: api.max_capacity,
        }
    }
}

impl From<ScheduleUpdate> for ScheduleUpdateDBRequest {
    fn from(api: ScheduleUpdate) -> Self {
        Self {
            start_at: api.start_at,
            end_at: api.end_at,
            max_capacity: api.max_capacity,
        }
    }
}

impl From<ScheduleDBResponse> for ScheduleResponse {
    fn from(db: ScheduleDBResponse) -> Self {
        let remaining_capacity = db.remaining_capacity();
        Self {
            id: db.id,
            start_at: db.start_at,
            end_at: db.end_at,
            max_capacity: db.max_capacity,
            confirmed_reserved_count: db.confirmed_reserved_count,
            remaining_capacity,
            is_available: remaining_capacity > 0,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

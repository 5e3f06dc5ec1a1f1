//! Database models for exam schedules.

use crate::types::ScheduleId;
use chrono::{DateTime, Utc};

/// Database request for creating an exam schedule
#[derive(Debug, Clone)]
pub struct ScheduleCreateDBRequest {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub max_capacity: i32,
}

/// Database request for updating an exam schedule
#[derive(Debug, Clone, Default)]
pub struct ScheduleUpdateDBRequest {
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub max_capacity: Option<i32>,
}

/// Database response for an exam schedule
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScheduleDBResponse {
    pub id: ScheduleId,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub max_capacity: i32,
    pub confirmed_reserved_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduleDBResponse {
    /// Seats still available for confirmation
    pub fn remaining_capacity(&self) -> i32 {
        self.max_capacity - self.confirmed_reserved_count
    }
}

//! Database repository for exam schedules.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::schedules::{ScheduleCreateDBRequest, ScheduleDBResponse, ScheduleUpdateDBRequest},
};
use crate::types::{ScheduleId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use std::collections::HashMap;
use tracing::instrument;

/// Filter for listing exam schedules
#[derive(Debug, Clone)]
pub struct ScheduleFilter {
    pub skip: i64,
    pub limit: i64,
    /// Only return schedules starting after this instant
    pub starting_after: Option<DateTime<Utc>>,
}

impl ScheduleFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            starting_after: None,
        }
    }

    pub fn starting_after(mut self, after: DateTime<Utc>) -> Self {
        self.starting_after = Some(after);
        self
    }
}

pub struct Schedules<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Schedules<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Total number of schedules matching the filter, for pagination metadata
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &ScheduleFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM exam_schedules WHERE ($1::timestamptz IS NULL OR start_at > $1)",
        )
        .bind(filter.starting_after)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(count)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Schedules<'c> {
    type CreateRequest = ScheduleCreateDBRequest;
    type UpdateRequest = ScheduleUpdateDBRequest;
    type Response = ScheduleDBResponse;
    type Id = ScheduleId;
    type Filter = ScheduleFilter;

    #[instrument(skip(self, request), fields(start_at = %request.start_at, max_capacity = request.max_capacity), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let schedule = sqlx::query_as::<_, ScheduleDBResponse>(
            r#"
            INSERT INTO exam_schedules (start_at, end_at, max_capacity)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(request.start_at)
        .bind(request.end_at)
        .bind(request.max_capacity)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(schedule)
    }

    #[instrument(skip(self), fields(schedule_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let schedule = sqlx::query_as::<_, ScheduleDBResponse>("SELECT * FROM exam_schedules WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(schedule)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<ScheduleId>) -> Result<HashMap<Self::Id, ScheduleDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let schedules = sqlx::query_as::<_, ScheduleDBResponse>("SELECT * FROM exam_schedules WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(schedules.into_iter().map(|s| (s.id, s)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let schedules = sqlx::query_as::<_, ScheduleDBResponse>(
            r#"
            SELECT * FROM exam_schedules
            WHERE ($1::timestamptz IS NULL OR start_at > $1)
            ORDER BY start_at ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(filter.starting_after)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(schedules)
    }

    #[instrument(skip(self), fields(schedule_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM exam_schedules WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(schedule_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let schedule = sqlx::query_as::<_, ScheduleDBResponse>(
            r#"
            UPDATE exam_schedules
            SET start_at = COALESCE($2, start_at),
                end_at = COALESCE($3, end_at),
                max_capacity = COALESCE($4, max_capacity),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.start_at)
        .bind(request.end_at)
        .bind(request.max_capacity)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sqlx::PgPool;

    fn create_request(days_ahead: i64, max_capacity: i32) -> ScheduleCreateDBRequest {
        let start_at = Utc::now() + Duration::days(days_ahead);
        ScheduleCreateDBRequest {
            start_at,
            end_at: start_at + Duration::hours(2),
            max_capacity,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_starts_with_zero_confirmed(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Schedules::new(&mut conn);

        let schedule = repo.create(&create_request(10, 50)).await.unwrap();
        assert_eq!(schedule.confirmed_reserved_count, 0);
        assert_eq!(schedule.remaining_capacity(), 50);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_invalid_window_rejected(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Schedules::new(&mut conn);

        let start_at = Utc::now() + Duration::days(10);
        let request = ScheduleCreateDBRequest {
            start_at,
            end_at: start_at - Duration::hours(1),
            max_capacity: 50,
        };
        let err = repo.create(&request).await.unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_filters_by_start(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Schedules::new(&mut conn);

        repo.create(&create_request(5, 10)).await.unwrap();
        repo.create(&create_request(20, 10)).await.unwrap();

        let filter = ScheduleFilter::new(0, 10).starting_after(Utc::now() + Duration::days(10));
        let schedules = repo.list(&filter).await.unwrap();
        assert_eq!(schedules.len(), 1);
        assert_eq!(repo.count(&filter).await.unwrap(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Schedules::new(&mut conn);

        let schedule = repo.create(&create_request(10, 50)).await.unwrap();
        assert!(repo.delete(schedule.id).await.unwrap());
        assert!(!repo.delete(schedule.id).await.unwrap());
    }
}

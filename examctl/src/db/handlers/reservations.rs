//! Database repository for reservations, including the guarded status transition.
//!
//! Status changes and the confirmed-seat counter must move together, so the
//! transition runs in a single transaction with both rows locked. Everything
//! else is plain CRUD.

use crate::api::models::reservations::ReservationStatus;
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::{
        reservations::{
            ReservationCreateDBRequest, ReservationDBResponse, ReservationUpdateDBRequest, ReservationWithUserDBResponse,
        },
        schedules::ScheduleDBResponse,
    },
};
use crate::types::{ReservationId, ScheduleId, UserId, abbrev_uuid};
use sqlx::{Connection, PgConnection};
use std::collections::HashMap;
use thiserror::Error;
use tracing::instrument;

/// Filter for listing reservations
#[derive(Debug, Clone, Default)]
pub struct ReservationFilter {
    pub skip: i64,
    pub limit: i64,
    /// Restrict to a single owner (always set for non-admin requests)
    pub user_id: Option<UserId>,
    pub status: Option<ReservationStatus>,
    pub exam_schedule_id: Option<ScheduleId>,
}

impl ReservationFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }

    pub fn for_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_status(mut self, status: ReservationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn for_schedule(mut self, schedule_id: ScheduleId) -> Self {
        self.exam_schedule_id = Some(schedule_id);
        self
    }
}

/// Why a status transition was refused.
///
/// The API layer maps these onto the fixed user-facing messages; the database
/// layer only states which rule fired.
#[derive(Debug, Error)]
pub enum StatusChangeError {
    #[error("reservation not found")]
    NotFound,

    #[error("new status equals current status")]
    SameStatus,

    #[error("reservation is already confirmed")]
    AlreadyReserved,

    #[error("requested seats exceed remaining capacity")]
    ExceedsCapacity,

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<sqlx::Error> for StatusChangeError {
    fn from(err: sqlx::Error) -> Self {
        StatusChangeError::Db(err.into())
    }
}

pub struct Reservations<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Reservations<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Total number of reservations matching the filter, for pagination metadata
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &ReservationFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM reservations
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::reservation_status IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR exam_schedule_id = $3)
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.status)
        .bind(filter.exam_schedule_id)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(count)
    }

    /// List reservations joined with their owners' identities, for admin views
    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list_with_users(&mut self, filter: &ReservationFilter) -> Result<Vec<ReservationWithUserDBResponse>> {
        let reservations = sqlx::query_as::<_, ReservationWithUserDBResponse>(
            r#"
            SELECT r.id, r.user_id, u.username AS user_username, u.email AS user_email,
                   r.exam_schedule_id, r.reserved_count, r.status, r.created_at, r.updated_at
            FROM reservations r
            JOIN users u ON u.id = r.user_id
            WHERE ($1::uuid IS NULL OR r.user_id = $1)
              AND ($2::reservation_status IS NULL OR r.status = $2)
              AND ($3::uuid IS NULL OR r.exam_schedule_id = $3)
            ORDER BY r.created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.status)
        .bind(filter.exam_schedule_id)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(reservations)
    }

    /// Move a reservation to a new status, adjusting the schedule's confirmed
    /// seat counter when the reservation is being confirmed.
    ///
    /// Rules, checked in order with both rows locked:
    /// - the new status must differ from the current one
    /// - a RESERVED reservation can no longer be changed
    /// - the reservation must still fit in the schedule's remaining capacity
    #[instrument(skip(self), fields(reservation_id = %abbrev_uuid(&id), new_status = %new_status), err)]
    pub async fn update_status(
        &mut self,
        id: ReservationId,
        new_status: ReservationStatus,
    ) -> std::result::Result<ReservationDBResponse, StatusChangeError> {
        let mut tx = self.db.begin().await?;

        let reservation = sqlx::query_as::<_, ReservationDBResponse>("SELECT * FROM reservations WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StatusChangeError::NotFound)?;

        if reservation.status == new_status {
            return Err(StatusChangeError::SameStatus);
        }
        if reservation.status == ReservationStatus::Reserved {
            return Err(StatusChangeError::AlreadyReserved);
        }

        let schedule = sqlx::query_as::<_, ScheduleDBResponse>("SELECT * FROM exam_schedules WHERE id = $1 FOR UPDATE")
            .bind(reservation.exam_schedule_id)
            .fetch_one(&mut *tx)
            .await?;

        if reservation.reserved_count > schedule.remaining_capacity() {
            return Err(StatusChangeError::ExceedsCapacity);
        }

        if new_status == ReservationStatus::Reserved {
            sqlx::query(
                r#"
                UPDATE exam_schedules
                SET confirmed_reserved_count = confirmed_reserved_count + $2,
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(schedule.id)
            .bind(reservation.reserved_count)
            .execute(&mut *tx)
            .await?;
        }

        let updated = sqlx::query_as::<_, ReservationDBResponse>(
            "UPDATE reservations SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(new_status)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await.map_err(DbError::from)?;
        Ok(updated)
    }

    /// Soft-cancel a reservation on behalf of its owner.
    ///
    /// Confirmed reservations cannot be cancelled by their owner; cancelling an
    /// already-cancelled reservation is a no-op.
    #[instrument(skip(self), fields(reservation_id = %abbrev_uuid(&id)), err)]
    pub async fn cancel(&mut self, id: ReservationId) -> std::result::Result<ReservationDBResponse, StatusChangeError> {
        let mut tx = self.db.begin().await?;

        let reservation = sqlx::query_as::<_, ReservationDBResponse>("SELECT * FROM reservations WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StatusChangeError::NotFound)?;

        if reservation.status == ReservationStatus::Reserved {
            return Err(StatusChangeError::AlreadyReserved);
        }

        let cancelled = sqlx::query_as::<_, ReservationDBResponse>(
            "UPDATE reservations SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(ReservationStatus::Cancled)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await.map_err(DbError::from)?;
        Ok(cancelled)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Reservations<'c> {
    type CreateRequest = ReservationCreateDBRequest;
    type UpdateRequest = ReservationUpdateDBRequest;
    type Response = ReservationDBResponse;
    type Id = ReservationId;
    type Filter = ReservationFilter;

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), reserved_count = request.reserved_count), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let reservation = sqlx::query_as::<_, ReservationDBResponse>(
            r#"
            INSERT INTO reservations (user_id, exam_schedule_id, reserved_count)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(request.user_id)
        .bind(request.exam_schedule_id)
        .bind(request.reserved_count)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(reservation)
    }

    #[instrument(skip(self), fields(reservation_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let reservation = sqlx::query_as::<_, ReservationDBResponse>("SELECT * FROM reservations WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(reservation)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<ReservationId>) -> Result<HashMap<Self::Id, ReservationDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let reservations = sqlx::query_as::<_, ReservationDBResponse>("SELECT * FROM reservations WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(reservations.into_iter().map(|r| (r.id, r)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let reservations = sqlx::query_as::<_, ReservationDBResponse>(
            r#"
            SELECT * FROM reservations
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::reservation_status IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR exam_schedule_id = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.status)
        .bind(filter.exam_schedule_id)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(reservations)
    }

    #[instrument(skip(self), fields(reservation_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM reservations WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(reservation_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let reservation = sqlx::query_as::<_, ReservationDBResponse>(
            r#"
            UPDATE reservations
            SET exam_schedule_id = COALESCE($2, exam_schedule_id),
                reserved_count = COALESCE($3, reserved_count),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.exam_schedule_id)
        .bind(request.reserved_count)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(reservation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{schedules::Schedules, users::Users};
    use crate::db::models::{schedules::ScheduleCreateDBRequest, users::UserCreateDBRequest};
    use chrono::{Duration, Utc};
    use sqlx::PgPool;
    use uuid::Uuid;

    async fn setup(pool: &PgPool, max_capacity: i32) -> (UserId, ScheduleId) {
        let mut conn = pool.acquire().await.unwrap();

        let tag = Uuid::new_v4();
        let user = Users::new(&mut conn)
            .create(&UserCreateDBRequest {
                username: format!("user-{tag}"),
                email: format!("{tag}@example.com"),
                is_admin: false,
                password_hash: None,
            })
            .await
            .unwrap();

        let start_at = Utc::now() + Duration::days(10);
        let schedule = Schedules::new(&mut conn)
            .create(&ScheduleCreateDBRequest {
                start_at,
                end_at: start_at + Duration::hours(2),
                max_capacity,
            })
            .await
            .unwrap();

        (user.id, schedule.id)
    }

    async fn make_reservation(pool: &PgPool, user_id: UserId, schedule_id: ScheduleId, count: i32) -> ReservationDBResponse {
        let mut conn = pool.acquire().await.unwrap();
        Reservations::new(&mut conn)
            .create(&ReservationCreateDBRequest {
                user_id,
                exam_schedule_id: schedule_id,
                reserved_count: count,
            })
            .await
            .unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_defaults_to_pending(pool: PgPool) {
        let (user_id, schedule_id) = setup(&pool, 50).await;
        let reservation = make_reservation(&pool, user_id, schedule_id, 10).await;
        assert_eq!(reservation.status, ReservationStatus::Pending);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_confirm_increments_counter(pool: PgPool) {
        let (user_id, schedule_id) = setup(&pool, 50).await;
        let reservation = make_reservation(&pool, user_id, schedule_id, 30).await;

        let mut conn = pool.acquire().await.unwrap();
        let updated = Reservations::new(&mut conn)
            .update_status(reservation.id, ReservationStatus::Reserved)
            .await
            .unwrap();
        assert_eq!(updated.status, ReservationStatus::Reserved);

        let schedule = Schedules::new(&mut conn).get_by_id(schedule_id).await.unwrap().unwrap();
        assert_eq!(schedule.confirmed_reserved_count, 30);
        assert_eq!(schedule.remaining_capacity(), 20);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_confirm_exact_remaining_capacity(pool: PgPool) {
        let (user_id, schedule_id) = setup(&pool, 50).await;
        let first = make_reservation(&pool, user_id, schedule_id, 20).await;
        let second = make_reservation(&pool, user_id, schedule_id, 30).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Reservations::new(&mut conn);
        repo.update_status(first.id, ReservationStatus::Reserved).await.unwrap();
        // Second fills the schedule exactly
        repo.update_status(second.id, ReservationStatus::Reserved).await.unwrap();

        let schedule = Schedules::new(&mut conn).get_by_id(schedule_id).await.unwrap().unwrap();
        assert_eq!(schedule.remaining_capacity(), 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_confirm_over_capacity_rejected(pool: PgPool) {
        let (user_id, schedule_id) = setup(&pool, 50).await;
        let first = make_reservation(&pool, user_id, schedule_id, 30).await;
        let second = make_reservation(&pool, user_id, schedule_id, 21).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Reservations::new(&mut conn);
        repo.update_status(first.id, ReservationStatus::Reserved).await.unwrap();

        let err = repo.update_status(second.id, ReservationStatus::Reserved).await.unwrap_err();
        assert!(matches!(err, StatusChangeError::ExceedsCapacity));

        // The counter must be untouched after the failed transition
        let schedule = Schedules::new(&mut conn).get_by_id(schedule_id).await.unwrap().unwrap();
        assert_eq!(schedule.confirmed_reserved_count, 30);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_same_status_rejected(pool: PgPool) {
        let (user_id, schedule_id) = setup(&pool, 50).await;
        let reservation = make_reservation(&pool, user_id, schedule_id, 10).await;

        let mut conn = pool.acquire().await.unwrap();
        let err = Reservations::new(&mut conn)
            .update_status(reservation.id, ReservationStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, StatusChangeError::SameStatus));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_reserved_is_immutable(pool: PgPool) {
        let (user_id, schedule_id) = setup(&pool, 50).await;
        let reservation = make_reservation(&pool, user_id, schedule_id, 10).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Reservations::new(&mut conn);
        repo.update_status(reservation.id, ReservationStatus::Reserved).await.unwrap();

        let err = repo.update_status(reservation.id, ReservationStatus::Cancled).await.unwrap_err();
        assert!(matches!(err, StatusChangeError::AlreadyReserved));

        let err = repo.cancel(reservation.id).await.unwrap_err();
        assert!(matches!(err, StatusChangeError::AlreadyReserved));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cancel_is_idempotent(pool: PgPool) {
        let (user_id, schedule_id) = setup(&pool, 50).await;
        let reservation = make_reservation(&pool, user_id, schedule_id, 10).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Reservations::new(&mut conn);

        let cancelled = repo.cancel(reservation.id).await.unwrap();
        assert_eq!(cancelled.status, ReservationStatus::Cancled);

        // Cancelling again is a no-op, not an error
        let cancelled = repo.cancel(reservation.id).await.unwrap();
        assert_eq!(cancelled.status, ReservationStatus::Cancled);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cancel_missing_reservation(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let err = Reservations::new(&mut conn).cancel(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StatusChangeError::NotFound));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_with_users_includes_identity(pool: PgPool) {
        let (user_id, schedule_id) = setup(&pool, 50).await;
        make_reservation(&pool, user_id, schedule_id, 10).await;

        let mut conn = pool.acquire().await.unwrap();
        let rows = Reservations::new(&mut conn)
            .list_with_users(&ReservationFilter::new(0, 10))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].user_email.ends_with("@example.com"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_filter_by_status(pool: PgPool) {
        let (user_id, schedule_id) = setup(&pool, 50).await;
        let first = make_reservation(&pool, user_id, schedule_id, 10).await;
        make_reservation(&pool, user_id, schedule_id, 5).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Reservations::new(&mut conn);
        repo.update_status(first.id, ReservationStatus::Reserved).await.unwrap();

        let filter = ReservationFilter::new(0, 10).with_status(ReservationStatus::Pending);
        let pending = repo.list(&filter).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(repo.count(&filter).await.unwrap(), 1);
    }
}

//! Reservation endpoints for regular users. All operations are scoped to the
//! authenticated owner; admin views live in
//! [`crate::api::handlers::admin_reservations`].

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use sqlx::PgConnection;

use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        reservations::{ListReservationsQuery, ReservationCreate, ReservationResponse, ReservationStatus, ReservationUpdate},
        users::CurrentUser,
    },
    db::handlers::{
        repository::Repository,
        reservations::{ReservationFilter, Reservations, StatusChangeError},
        schedules::Schedules,
    },
    errors::{Error, messages},
    types::{ReservationId, ScheduleId},
};

pub(crate) fn reservation_not_found(id: ReservationId) -> Error {
    Error::NotFound {
        resource: "Reservation".to_string(),
        id: id.to_string(),
    }
}

/// Map a refused status transition onto the fixed user-facing messages.
pub(crate) fn map_status_error(id: ReservationId, err: StatusChangeError) -> Error {
    match err {
        StatusChangeError::NotFound => reservation_not_found(id),
        StatusChangeError::SameStatus => Error::BadRequest {
            message: messages::SAME_STATUS.to_string(),
        },
        StatusChangeError::AlreadyReserved => Error::BadRequest {
            message: messages::CANNOT_MODIFY_RESERVED.to_string(),
        },
        StatusChangeError::ExceedsCapacity => Error::BadRequest {
            message: messages::EXCEEDS_REMAINING_CAPACITY.to_string(),
        },
        StatusChangeError::Db(db) => Error::Database(db),
    }
}

/// Validate a reservation request against its target schedule: the schedule
/// must exist, the size must be within limits, the exam must be far enough in
/// the future, and the request must fit in the remaining capacity.
pub(crate) async fn validate_against_schedule(
    state: &AppState,
    conn: &mut PgConnection,
    schedule_id: ScheduleId,
    reserved_count: i32,
) -> Result<(), Error> {
    crate::validation::check_reserved_count(reserved_count, state.config.reservations.max_reserved_count)?;

    let schedule = Schedules::new(conn)
        .get_by_id(schedule_id)
        .await?
        .ok_or_else(|| Error::BadRequest {
            message: messages::EXAM_SCHEDULE_NOT_FOUND.to_string(),
        })?;

    crate::validation::check_lead_time(schedule.start_at, Utc::now(), state.config.reservations.lead_time_days)?;
    crate::validation::check_capacity(schedule.max_capacity, schedule.confirmed_reserved_count, reserved_count)?;

    Ok(())
}

/// List the authenticated user's reservations
#[utoipa::path(
    get,
    path = "/reservations",
    tag = "reservations",
    params(ListReservationsQuery),
    responses(
        (status = 200, description = "List of reservations", body = PaginatedResponse<ReservationResponse>),
        (status = 401, description = "Not authenticated"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_reservations(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListReservationsQuery>,
) -> Result<Json<PaginatedResponse<ReservationResponse>>, Error> {
    let (skip, limit) = query.pagination.params();
    let mut filter = ReservationFilter::new(skip, limit).for_user(user.id);
    if let Some(status) = query.status {
        filter = filter.with_status(status);
    }
    if let Some(schedule_id) = query.exam_schedule_id {
        filter = filter.for_schedule(schedule_id);
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Reservations::new(&mut conn);
    let total_count = repo.count(&filter).await?;
    let reservations = repo.list(&filter).await?;

    let data = reservations.into_iter().map(ReservationResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

/// Create a reservation
#[utoipa::path(
    post,
    path = "/reservations",
    request_body = ReservationCreate,
    tag = "reservations",
    responses(
        (status = 201, description = "Reservation created", body = ReservationResponse),
        (status = 400, description = "Invalid input or business rule violation"),
        (status = 401, description = "Not authenticated"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_reservation(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<ReservationCreate>,
) -> Result<(StatusCode, Json<ReservationResponse>), Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    validate_against_schedule(&state, &mut conn, request.exam_schedule_id, request.reserved_count).await?;

    let reservation = Reservations::new(&mut conn)
        .create(&crate::db::models::reservations::ReservationCreateDBRequest {
            user_id: user.id,
            exam_schedule_id: request.exam_schedule_id,
            reserved_count: request.reserved_count,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ReservationResponse::from(reservation))))
}

/// Get one of the authenticated user's reservations
#[utoipa::path(
    get,
    path = "/reservations/{id}",
    tag = "reservations",
    params(("id" = String, Path, format = "uuid", description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation", body = ReservationResponse),
        (status = 404, description = "Reservation not found"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_reservation(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<ReservationId>,
) -> Result<Json<ReservationResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let reservation = Reservations::new(&mut conn)
        .get_by_id(id)
        .await?
        .filter(|r| r.user_id == user.id)
        .ok_or_else(|| reservation_not_found(id))?;

    Ok(Json(ReservationResponse::from(reservation)))
}

/// Update one of the authenticated user's reservations.
///
/// Only PENDING reservations can be edited, and the edited reservation must
/// still pass the same checks as a new one.
#[utoipa::path(
    patch,
    path = "/reservations/{id}",
    request_body = ReservationUpdate,
    tag = "reservations",
    params(("id" = String, Path, format = "uuid", description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation updated", body = ReservationResponse),
        (status = 400, description = "Invalid input or business rule violation"),
        (status = 404, description = "Reservation not found"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_reservation(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<ReservationId>,
    Json(request): Json<ReservationUpdate>,
) -> Result<Json<ReservationResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let existing = Reservations::new(&mut conn)
        .get_by_id(id)
        .await?
        .filter(|r| r.user_id == user.id)
        .ok_or_else(|| reservation_not_found(id))?;

    if existing.status != ReservationStatus::Pending {
        return Err(Error::BadRequest {
            message: messages::CANNOT_MODIFY_RESERVED.to_string(),
        });
    }

    let target_schedule = request.exam_schedule_id.unwrap_or(existing.exam_schedule_id);
    let target_count = request.reserved_count.unwrap_or(existing.reserved_count);
    validate_against_schedule(&state, &mut conn, target_schedule, target_count).await?;

    let updated = Reservations::new(&mut conn)
        .update(
            id,
            &crate::db::models::reservations::ReservationUpdateDBRequest {
                exam_schedule_id: request.exam_schedule_id,
                reserved_count: request.reserved_count,
            },
        )
        .await?;

    Ok(Json(ReservationResponse::from(updated)))
}

/// Cancel one of the authenticated user's reservations.
///
/// Cancellation keeps the row and marks it CANCLED; confirmed reservations
/// cannot be cancelled by their owner.
#[utoipa::path(
    delete,
    path = "/reservations/{id}",
    tag = "reservations",
    params(("id" = String, Path, format = "uuid", description = "Reservation ID")),
    responses(
        (status = 204, description = "Reservation cancelled"),
        (status = 400, description = "Reservation is confirmed and cannot be cancelled"),
        (status = 404, description = "Reservation not found"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_reservation(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<ReservationId>,
) -> Result<StatusCode, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    // Ownership check before touching the row
    Reservations::new(&mut conn)
        .get_by_id(id)
        .await?
        .filter(|r| r.user_id == user.id)
        .ok_or_else(|| reservation_not_found(id))?;

    Reservations::new(&mut conn)
        .cancel(id)
        .await
        .map_err(|e| map_status_error(id, e))?;

    Ok(StatusCode::NO_CONTENT)
}

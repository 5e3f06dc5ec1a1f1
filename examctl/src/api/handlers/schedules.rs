//! Exam schedule endpoints. Reads are open to any authenticated user;
//! writes are admin-only.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        schedules::{ListSchedulesQuery, ScheduleCreate, ScheduleResponse, ScheduleUpdate},
    },
    auth::AdminUser,
    api::models::users::CurrentUser,
    db::handlers::{
        repository::Repository,
        schedules::{ScheduleFilter, Schedules},
    },
    errors::Error,
    types::ScheduleId,
};

fn schedule_not_found(id: ScheduleId) -> Error {
    Error::NotFound {
        resource: "Exam schedule".to_string(),
        id: id.to_string(),
    }
}

/// List exam schedules
#[utoipa::path(
    get,
    path = "/schedules",
    tag = "schedules",
    params(ListSchedulesQuery),
    responses(
        (status = 200, description = "List of exam schedules", body = PaginatedResponse<ScheduleResponse>),
        (status = 401, description = "Not authenticated"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_schedules(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<ListSchedulesQuery>,
) -> Result<Json<PaginatedResponse<ScheduleResponse>>, Error> {
    let (skip, limit) = query.pagination.params();
    let mut filter = ScheduleFilter::new(skip, limit);
    if let Some(after) = query.starting_after {
        filter = filter.starting_after(after);
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Schedules::new(&mut conn);
    let total_count = repo.count(&filter).await?;
    let schedules = repo.list(&filter).await?;

    let data = schedules.into_iter().map(ScheduleResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

/// Create an exam schedule
#[utoipa::path(
    post,
    path = "/schedules",
    request_body = ScheduleCreate,
    tag = "schedules",
    responses(
        (status = 201, description = "Exam schedule created", body = ScheduleResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Admin access required"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_schedule(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(request): Json<ScheduleCreate>,
) -> Result<(StatusCode, Json<ScheduleResponse>), Error> {
    if request.max_capacity < 1 {
        return Err(Error::BadRequest {
            message: "max_capacity must be at least 1".to_string(),
        });
    }
    if request.end_at <= request.start_at {
        return Err(Error::BadRequest {
            message: "end_at must be after start_at".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let schedule = Schedules::new(&mut conn).create(&request.into()).await?;

    Ok((StatusCode::CREATED, Json(ScheduleResponse::from(schedule))))
}

/// Get an exam schedule by ID
#[utoipa::path(
    get,
    path = "/schedules/{id}",
    tag = "schedules",
    params(("id" = String, Path, format = "uuid", description = "Exam schedule ID")),
    responses(
        (status = 200, description = "Exam schedule", body = ScheduleResponse),
        (status = 404, description = "Exam schedule not found"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_schedule(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<ScheduleId>,
) -> Result<Json<ScheduleResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let schedule = Schedules::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| schedule_not_found(id))?;

    Ok(Json(ScheduleResponse::from(schedule)))
}

/// Update an exam schedule
#[utoipa::path(
    patch,
    path = "/schedules/{id}",
    request_body = ScheduleUpdate,
    tag = "schedules",
    params(("id" = String, Path, format = "uuid", description = "Exam schedule ID")),
    responses(
        (status = 200, description = "Exam schedule updated", body = ScheduleResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Exam schedule not found"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_schedule(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<ScheduleId>,
    Json(request): Json<ScheduleUpdate>,
) -> Result<Json<ScheduleResponse>, Error> {
    if let Some(max_capacity) = request.max_capacity
        && max_capacity < 1
    {
        return Err(Error::BadRequest {
            message: "max_capacity must be at least 1".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let schedule = Schedules::new(&mut conn)
        .update(id, &request.into())
        .await
        .map_err(|e| match e {
            crate::db::errors::DbError::NotFound => schedule_not_found(id),
            other => Error::Database(other),
        })?;

    Ok(Json(ScheduleResponse::from(schedule)))
}

/// Delete an exam schedule
#[utoipa::path(
    delete,
    path = "/schedules/{id}",
    tag = "schedules",
    params(("id" = String, Path, format = "uuid", description = "Exam schedule ID")),
    responses(
        (status = 204, description = "Exam schedule deleted"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Exam schedule not found"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_schedule(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<ScheduleId>,
) -> Result<StatusCode, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let deleted = Schedules::new(&mut conn).delete(id).await?;
    if !deleted {
        return Err(schedule_not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}

//! Admin-only reservation endpoints: listing with owner identity, editing,
//! the guarded status transition, and cancellation.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::handlers::reservations::{map_status_error, reservation_not_found, validate_against_schedule},
    api::models::{
        pagination::PaginatedResponse,
        reservations::{
            AdminReservationResponse, ListReservationsQuery, ReservationResponse, ReservationStatus, ReservationStatusUpdate,
            ReservationUpdate,
        },
    },
    auth::AdminUser,
    db::handlers::{
        repository::Repository,
        reservations::{ReservationFilter, Reservations},
    },
    errors::{Error, messages},
    types::ReservationId,
};

/// List all reservations with their owners' identities
#[utoipa::path(
    get,
    path = "/admin/reservations",
    tag = "admin",
    params(ListReservationsQuery),
    responses(
        (status = 200, description = "List of reservations", body = PaginatedResponse<AdminReservationResponse>),
        (status = 403, description = "Admin access required"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_all_reservations(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ListReservationsQuery>,
) -> Result<Json<PaginatedResponse<AdminReservationResponse>>, Error> {
    let (skip, limit) = query.pagination.params();
    let mut filter = ReservationFilter::new(skip, limit);
    if let Some(status) = query.status {
        filter = filter.with_status(status);
    }
    if let Some(schedule_id) = query.exam_schedule_id {
        filter = filter.for_schedule(schedule_id);
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Reservations::new(&mut conn);
    let total_count = repo.count(&filter).await?;
    let reservations = repo.list_with_users(&filter).await?;

    let data = reservations.into_iter().map(AdminReservationResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

/// Update any reservation's fields.
///
/// Confirmed reservations are immutable here too; use the status endpoint to
/// move a reservation through its lifecycle.
#[utoipa::path(
    patch,
    path = "/admin/reservations/{id}",
    request_body = ReservationUpdate,
    tag = "admin",
    params(("id" = String, Path, format = "uuid", description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation updated", body = ReservationResponse),
        (status = 400, description = "Invalid input or business rule violation"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Reservation not found"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_any_reservation(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<ReservationId>,
    Json(request): Json<ReservationUpdate>,
) -> Result<Json<ReservationResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let existing = Reservations::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| reservation_not_found(id))?;

    if existing.status == ReservationStatus::Reserved {
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

/// Move a reservation to a new status.
///
/// Confirming a reservation atomically adds its seats to the schedule's
/// confirmed count; the transition is refused if it no longer fits.
#[utoipa::path(
    patch,
    path = "/admin/reservations/{id}/status",
    request_body = ReservationStatusUpdate,
    tag = "admin",
    params(("id" = String, Path, format = "uuid", description = "Reservation ID")),
    responses(
        (status = 200, description = "Status updated", body = ReservationResponse),
        (status = 400, description = "Transition refused"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Reservation not found"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_reservation_status(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<ReservationId>,
    Json(request): Json<ReservationStatusUpdate>,
) -> Result<Json<ReservationResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let updated = Reservations::new(&mut conn)
        .update_status(id, request.status)
        .await
        .map_err(|e| map_status_error(id, e))?;

    Ok(Json(ReservationResponse::from(updated)))
}

/// Cancel any reservation.
///
/// Same soft-cancel semantics as the owner endpoint: the row is kept and
/// marked CANCLED, and confirmed reservations are refused.
#[utoipa::path(
    delete,
    path = "/admin/reservations/{id}",
    tag = "admin",
    params(("id" = String, Path, format = "uuid", description = "Reservation ID")),
    responses(
        (status = 204, description = "Reservation cancelled"),
        (status = 400, description = "Reservation is confirmed and cannot be cancelled"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Reservation not found"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_any_reservation(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<ReservationId>,
) -> Result<StatusCode, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Reservations::new(&mut conn).cancel(id).await.map_err(|e| map_status_error(id, e))?;
    Ok(StatusCode::NO_CONTENT)
}

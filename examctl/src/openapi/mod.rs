//! OpenAPI documentation for the reservation API.
//!
//! The generated spec is served as JSON at `/api-docs/openapi.json` and rendered
//! interactively at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api;
use crate::api::models::{
    auth::{LoginRequest, RegisterRequest, TokenResponse},
    pagination::{PaginatedResponse, Pagination},
    reservations::{
        AdminReservationResponse, ReservationCreate, ReservationResponse, ReservationStatus, ReservationStatusUpdate, ReservationUpdate,
    },
    schedules::{ScheduleCreate, ScheduleResponse, ScheduleUpdate},
    users::UserResponse,
};

/// Registers the bearer JWT security scheme referenced by the path annotations.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "bearer_auth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "JWT authentication. Obtain a token from `/authentication/login` and include it \
                            in the `Authorization` header:\n\n```\nAuthorization: Bearer YOUR_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "examctl API",
        description = "Exam schedule reservation service: user accounts, exam schedules, \
        and a reservation workflow with admin-confirmed capacity accounting."
    ),
    modifiers(&SecurityAddon),
    paths(
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::auth::me,
        api::handlers::schedules::list_schedules,
        api::handlers::schedules::create_schedule,
        api::handlers::schedules::get_schedule,
        api::handlers::schedules::update_schedule,
        api::handlers::schedules::delete_schedule,
        api::handlers::reservations::list_reservations,
        api::handlers::reservations::create_reservation,
        api::handlers::reservations::get_reservation,
        api::handlers::reservations::update_reservation,
        api::handlers::reservations::delete_reservation,
        api::handlers::admin_reservations::list_all_reservations,
        api::handlers::admin_reservations::update_any_reservation,
        api::handlers::admin_reservations::update_reservation_status,
        api::handlers::admin_reservations::delete_any_reservation,
    ),
    components(schemas(
        RegisterRequest,
        LoginRequest,
        TokenResponse,
        UserResponse,
        Pagination,
        PaginatedResponse<ScheduleResponse>,
        PaginatedResponse<ReservationResponse>,
        PaginatedResponse<AdminReservationResponse>,
        ScheduleCreate,
        ScheduleUpdate,
        ScheduleResponse,
        ReservationStatus,
        ReservationCreate,
        ReservationUpdate,
        ReservationStatusUpdate,
        ReservationResponse,
        AdminReservationResponse,
    )),
    tags(
        (name = "authentication", description = "Registration, login, and the current user"),
        (name = "schedules", description = "Exam schedule management"),
        (name = "reservations", description = "The authenticated user's reservations"),
        (name = "admin", description = "Admin-only reservation management"),
    )
)]
pub struct ApiDoc;

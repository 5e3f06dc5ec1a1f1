//! # examctl: Exam Schedule Reservation Backend
//!
//! `examctl` is a booking backend for exam sittings. Users register, browse
//! published exam schedules, and reserve seats; administrators manage the
//! schedules and move reservations through their lifecycle.
//!
//! ## Overview
//!
//! Every reservation starts out `PENDING` and holds no capacity. An
//! administrator confirms it through the status endpoint, which atomically
//! adds the reserved seats to the schedule's confirmed count inside a single
//! database transaction with row locks, so two concurrent confirmations can
//! never oversell a schedule. Owners may edit or cancel a reservation only
//! while it is still pending; once confirmed it is immutable to them.
//!
//! Creation and edits are validated against the target schedule: the exam
//! must be far enough in the future (configurable lead time) and the request
//! must fit within the schedule's remaining capacity.
//!
//! ## Architecture
//!
//! The HTTP layer is [Axum](https://github.com/tokio-rs/axum) with bearer JWT
//! authentication; all persistence is PostgreSQL through SQLx with the
//! repository pattern in the [`db`] module. See [`config`] for configuration
//! options.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use examctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = examctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     examctl::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod telemetry;
pub mod types;
pub mod validation;

#[cfg(test)]
pub mod test_utils;

use crate::{
    auth::password,
    config::CorsOrigin,
    db::handlers::{repository::Repository, users::Users},
    db::models::users::UserCreateDBRequest,
    openapi::ApiDoc,
};
use axum::http::HeaderValue;
use axum::{
    Router, http,
    routing::{delete, get, patch, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{ReservationId, ScheduleId, UserId};

/// Application state shared across all request handlers.
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
}

/// Get the examctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial admin user if it doesn't exist.
///
/// Idempotent: creates the admin on first startup, and on later startups
/// updates the password if one is configured. Returns the admin's user ID.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(config: &Config, db: &PgPool) -> anyhow::Result<UserId> {
    let params = password::Argon2Params::from(&config.auth.password);
    let password_hash = match config.admin_password.as_deref() {
        Some(pwd) => Some(
            password::hash_string_with_params(pwd, Some(params))
                .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {e}"))?,
        ),
        None => None,
    };

    let mut tx = db.begin().await?;
    let mut user_repo = Users::new(&mut tx);

    if let Some(existing_user) = user_repo.get_by_email(&config.admin_email).await? {
        if let Some(password_hash) = password_hash {
            sqlx::query("UPDATE users SET password_hash = $1, is_admin = TRUE WHERE email = $2")
                .bind(&password_hash)
                .bind(&config.admin_email)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        return Ok(existing_user.id);
    }

    let created_user = user_repo
        .create(&UserCreateDBRequest {
            username: config.admin_username.clone(),
            email: config.admin_email.clone(),
            is_admin: true,
            password_hash,
        })
        .await?;

    tx.commit().await?;
    info!("Created initial admin user {}", config.admin_email);
    Ok(created_user.id)
}

/// Connect to the database, run migrations, and bootstrap the admin user.
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let pool_settings = &config.database.pool;
    let idle_timeout = (pool_settings.idle_timeout_secs > 0).then(|| std::time::Duration::from_secs(pool_settings.idle_timeout_secs));
    let max_lifetime = (pool_settings.max_lifetime_secs > 0).then(|| std::time::Duration::from_secs(pool_settings.max_lifetime_secs));

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(pool_settings.max_connections)
        .min_connections(pool_settings.min_connections)
        .acquire_timeout(std::time::Duration::from_secs(pool_settings.acquire_timeout_secs))
        .idle_timeout(idle_timeout)
        .max_lifetime(max_lifetime)
        .connect(&config.database.url)
        .await?;

    migrator().run(&pool).await?;
    create_initial_admin_user(config, &pool).await?;

    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.auth.security.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(config.auth.security.cors.allow_credentials)
        .allow_headers(vec![http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .expose_headers(vec![http::header::LOCATION]);

    if let Some(max_age) = config.auth.security.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let auth_routes = Router::new()
        .route("/authentication/register", post(api::handlers::auth::register))
        .route("/authentication/login", post(api::handlers::auth::login))
        .route("/authentication/me", get(api::handlers::auth::me));

    let schedule_routes = Router::new()
        .route(
            "/schedules",
            get(api::handlers::schedules::list_schedules).post(api::handlers::schedules::create_schedule),
        )
        .route("/schedules/{id}", get(api::handlers::schedules::get_schedule))
        .route("/schedules/{id}", patch(api::handlers::schedules::update_schedule))
        .route("/schedules/{id}", delete(api::handlers::schedules::delete_schedule));

    let reservation_routes = Router::new()
        .route(
            "/reservations",
            get(api::handlers::reservations::list_reservations).post(api::handlers::reservations::create_reservation),
        )
        .route("/reservations/{id}", get(api::handlers::reservations::get_reservation))
        .route("/reservations/{id}", patch(api::handlers::reservations::update_reservation))
        .route("/reservations/{id}", delete(api::handlers::reservations::delete_reservation));

    let admin_routes = Router::new()
        .route("/admin/reservations", get(api::handlers::admin_reservations::list_all_reservations))
        .route(
            "/admin/reservations/{id}",
            patch(api::handlers::admin_reservations::update_any_reservation),
        )
        .route(
            "/admin/reservations/{id}/status",
            patch(api::handlers::admin_reservations::update_reservation_status),
        )
        .route(
            "/admin/reservations/{id}",
            delete(api::handlers::admin_reservations::delete_any_reservation),
        );

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .merge(auth_routes)
        .merge(schedule_routes)
        .merge(reservation_routes)
        .merge(admin_routes)
        .with_state(state.clone())
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .route("/api-docs/openapi.json", get(|| async { axum::Json(ApiDoc::openapi()) }));

    let cors_layer = create_cors_layer(&state.config)?;
    let mut router = router.layer(cors_layer);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Main application struct that owns all resources and lifecycle.
///
/// 1. **Create**: [`Application::new`] connects to the database, runs
///    migrations, and bootstraps the admin user
/// 2. **Serve**: [`Application::serve`] binds a TCP port and handles requests
///    until the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let pool = setup_database(&config).await?;
        Self::with_pool(config, pool)
    }

    /// Create an application on an existing pool (migrations already applied).
    #[cfg(test)]
    pub async fn new_with_pool(config: Config, pool: PgPool) -> anyhow::Result<Self> {
        create_initial_admin_user(&config, &pool).await?;
        Self::with_pool(config, pool)
    }

    fn with_pool(config: Config, pool: PgPool) -> anyhow::Result<Self> {
        let app_state = AppState::builder().db(pool.clone()).config(config.clone()).build();
        let router = build_router(&app_state)?;
        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "examctl listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

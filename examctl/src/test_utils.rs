//! Shared helpers for tests: canned configuration, application state, and
//! fixture rows.

use axum_test::TestServer;
use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    AppState,
    api::models::users::{CurrentUser, UserResponse},
    auth::session,
    config::{Config, PoolSettings},
    db::{
        handlers::{repository::Repository, schedules::Schedules, users::Users},
        models::{schedules::ScheduleCreateDBRequest, users::UserCreateDBRequest},
    },
};

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: None,
        database: crate::config::DatabaseConfig {
            // Overridden by the pool handed in by #[sqlx::test]
            url: "postgres://unused".to_string(),
            pool: PoolSettings {
                max_connections: 1,
                min_connections: 1,
                ..Default::default()
            },
        },
        admin_email: "admin@test.com".to_string(),
        admin_username: "admin".to_string(),
        admin_password: None,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        auth: crate::config::AuthConfig::default(),
        reservations: crate::config::ReservationsConfig::default(),
        enable_metrics: false,
        enable_otel_export: false,
    }
}

pub fn test_state(pool: PgPool) -> AppState {
    AppState::builder().db(pool).config(create_test_config()).build()
}

/// Build a test server around a fully wired application.
pub async fn create_test_app(pool: PgPool) -> TestServer {
    let config = create_test_config();
    let app = crate::Application::new_with_pool(config, pool)
        .await
        .expect("Failed to create application");
    app.into_test_server()
}

pub async fn create_test_user(pool: &PgPool) -> UserResponse {
    create_user_with_admin(pool, false).await
}

pub async fn create_test_admin_user(pool: &PgPool) -> UserResponse {
    create_user_with_admin(pool, true).await
}

async fn create_user_with_admin(pool: &PgPool, is_admin: bool) -> UserResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut users_repo = Users::new(&mut conn);
    let username = format!("testuser_{}", Uuid::new_v4().simple());
    let email = format!("{username}@example.com");

    let user = users_repo
        .create(&UserCreateDBRequest {
            username,
            email,
            is_admin,
            password_hash: None,
        })
        .await
        .expect("Failed to create test user");
    UserResponse::from(user)
}

/// Mint a bearer token for a user, as the login endpoint would.
pub fn bearer_token_for(user: &UserResponse, config: &Config) -> String {
    let current_user = CurrentUser {
        id: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
        is_admin: user.is_admin,
    };
    let token = session::create_session_token(&current_user, config).expect("Failed to create session token");
    format!("Bearer {token}")
}

/// Create an exam schedule starting `days_ahead` days from now, lasting two hours.
pub async fn create_test_schedule(pool: &PgPool, days_ahead: i64, max_capacity: i32) -> crate::db::models::schedules::ScheduleDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let start_at = Utc::now() + Duration::days(days_ahead);
    Schedules::new(&mut conn)
        .create(&ScheduleCreateDBRequest {
            start_at,
            end_at: start_at + Duration::hours(2),
            max_capacity,
        })
        .await
        .expect("Failed to create test schedule")
}

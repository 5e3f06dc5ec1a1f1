//! Request extractors for the authenticated user.

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session,
    errors::{Error, Result},
    types::{Operation, Permission, Resource},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{instrument, trace};

/// Extract user from a bearer JWT in the Authorization header.
/// Returns:
/// - None: No Authorization header or not a Bearer token
/// - Some(Ok(user)): Valid JWT found and verified
/// - Some(Err(error)): Bearer token present but invalid/expired
#[instrument(skip(parts, config))]
fn try_bearer_auth(parts: &Parts, config: &crate::config::Config) -> Option<Result<CurrentUser>> {
    let auth_header = parts.headers.get(axum::http::header::AUTHORIZATION)?;

    let auth_str = match auth_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid authorization header: {e}"),
            }));
        }
    };

    let token = auth_str.strip_prefix("Bearer ")?;

    Some(session::verify_session_token(token, config))
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        match try_bearer_auth(parts, &state.config) {
            Some(Ok(user)) => Ok(user),
            Some(Err(e)) => {
                trace!("Bearer authentication failed: {:?}", e);
                Err(Error::Unauthenticated { message: None })
            }
            None => {
                trace!("No authentication credentials found in request");
                Err(Error::Unauthenticated { message: None })
            }
        }
    }
}

/// An authenticated user that has also passed the admin check.
///
/// Use as a handler argument for admin-only endpoints; non-admin callers get
/// a 403 before the handler body runs.
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(Error::InsufficientPermissions {
                required: Permission::Allow(Resource::Reservations, Operation::UpdateAll),
                action: Operation::UpdateAll,
                resource: "admin endpoints".to_string(),
            });
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::create_session_token;
    use crate::test_utils::{create_test_config, test_state};
    use axum::extract::FromRequestParts as _;
    use sqlx::PgPool;
    use uuid::Uuid;

    fn parts_with_auth(value: &str) -> Parts {
        let request = axum::http::Request::builder()
            .uri("http://localhost/test")
            .header(axum::http::header::AUTHORIZATION, value)
            .body(())
            .unwrap();
        let (parts, _body) = request.into_parts();
        parts
    }

    fn test_user(is_admin: bool) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            username: "testuser".to_string(),
            email: "test@example.com".to_string(),
            is_admin,
        }
    }

    #[sqlx::test]
    async fn test_valid_bearer_token(pool: PgPool) {
        let state = test_state(pool);
        let user = test_user(false);
        let token = create_session_token(&user, &state.config).unwrap();

        let mut parts = parts_with_auth(&format!("Bearer {token}"));
        let extracted = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(extracted.id, user.id);
        assert_eq!(extracted.email, user.email);
    }

    #[sqlx::test]
    async fn test_missing_header_returns_unauthorized(pool: PgPool) {
        let state = test_state(pool);

        let request = axum::http::Request::builder().uri("http://localhost/test").body(()).unwrap();
        let (mut parts, _body) = request.into_parts();

        let error = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(error.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    async fn test_garbage_token_returns_unauthorized(pool: PgPool) {
        let state = test_state(pool);

        let mut parts = parts_with_auth("Bearer not-a-jwt");
        let error = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(error.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    async fn test_admin_extractor_rejects_regular_user(pool: PgPool) {
        let state = test_state(pool);
        let user = test_user(false);
        let token = create_session_token(&user, &state.config).unwrap();

        let mut parts = parts_with_auth(&format!("Bearer {token}"));
        let error = AdminUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(error.status_code(), axum::http::StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    async fn test_admin_extractor_accepts_admin(pool: PgPool) {
        let state = test_state(pool);
        let user = test_user(true);
        let token = create_session_token(&user, &state.config).unwrap();

        let mut parts = parts_with_auth(&format!("Bearer {token}"));
        let AdminUser(extracted) = AdminUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert!(extracted.is_admin);
    }

    #[test]
    fn test_config_has_secret() {
        assert!(create_test_config().secret_key.is_some());
    }
}

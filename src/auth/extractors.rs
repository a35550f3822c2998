use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use super::claims::TokenKind;
use crate::{
    error::AppError,
    state::AppState,
    users::repo_types::{User, UserRole},
};

/// Authenticated, verified user resolved from the bearer access token.
pub struct CurrentUser(pub User);

/// As [`CurrentUser`], restricted to the `admin` role.
pub struct AdminUser(pub User);

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let auth = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::unauthenticated("Not authenticated"))?;

    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::unauthenticated("Invalid authentication scheme"))
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        let claims = state.jwt.decode_kind(token, TokenKind::Access).map_err(|e| {
            warn!(error = %e, "access token rejected");
            AppError::from(e)
        })?;

        let user = state
            .users
            .get_by_email(&claims.sub)
            .await?
            .ok_or_else(|| {
                warn!("token subject does not match a user");
                AppError::unauthenticated("Could not validate credentials")
            })?;

        if !user.is_verified {
            warn!(user_id = %user.id, "unverified user rejected");
            return Err(AppError::unauthenticated("Email not verified"));
        }

        Ok(CurrentUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if user.role != UserRole::Admin {
            warn!(user_id = %user.id, "admin route denied");
            return Err(AppError::forbidden("Not enough permissions"));
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestApp;
    use axum::http::{Request, StatusCode};

    fn parts_with(auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/users/me");
        if let Some(value) = auth {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn missing_header_is_unauthenticated() {
        let app = TestApp::new();
        let mut parts = parts_with(None);
        let err = CurrentUser::from_request_parts(&mut parts, &app.state)
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_unauthenticated() {
        let app = TestApp::new();
        let mut parts = parts_with(Some("Basic dXNlcjpwYXNz"));
        let err = CurrentUser::from_request_parts(&mut parts, &app.state)
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn refresh_token_cannot_authenticate_requests() {
        let app = TestApp::new();
        let user = app.seed_user("ann@example.com", "password1", UserRole::User, true);
        let refresh = app.state.jwt.create_refresh_token(&user.email).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {}", refresh)));
        let err = CurrentUser::from_request_parts(&mut parts, &app.state)
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn valid_token_resolves_user() {
        let app = TestApp::new();
        let user = app.seed_user("ann@example.com", "password1", UserRole::User, true);
        let token = app.state.jwt.create_access_token(&user.email).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {}", token)));
        let CurrentUser(found) = CurrentUser::from_request_parts(&mut parts, &app.state)
            .await
            .ok()
            .unwrap();
        assert_eq!(found.id, user.id);
    }

    #[tokio::test]
    async fn unknown_subject_is_unauthenticated() {
        let app = TestApp::new();
        let token = app.state.jwt.create_access_token("ghost@example.com").unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {}", token)));
        let err = CurrentUser::from_request_parts(&mut parts, &app.state)
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unverified_user_is_unauthenticated() {
        let app = TestApp::new();
        let user = app.seed_user("ann@example.com", "password1", UserRole::User, false);
        let token = app.state.jwt.create_access_token(&user.email).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {}", token)));
        let err = CurrentUser::from_request_parts(&mut parts, &app.state)
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_extractor_forbids_regular_users() {
        let app = TestApp::new();
        let user = app.seed_user("ann@example.com", "password1", UserRole::User, true);
        let token = app.state.jwt.create_access_token(&user.email).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {}", token)));
        let err = AdminUser::from_request_parts(&mut parts, &app.state)
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let admin = app.seed_user("root@example.com", "password1", UserRole::Admin, true);
        let token = app.state.jwt.create_access_token(&admin.email).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {}", token)));
        assert!(AdminUser::from_request_parts(&mut parts, &app.state)
            .await
            .is_ok());
    }
}

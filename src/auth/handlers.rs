use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tracing::instrument;

use super::{
    dto::{
        LoginRequest, MessageResponse, RefreshRequest, RequestEmail, ResetPasswordRequest,
        SignupRequest, TokenResponse,
    },
    extractors::CurrentUser,
    services::AuthService,
};
use crate::{
    error::AppResult,
    extract::{Json, Path},
    state::AppState,
    users::dto::UserResponse,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/confirmed_email/:token", get(confirmed_email))
        .route("/auth/request_email", post(request_email))
        .route("/auth/reset_password", post(reset_password))
}

#[instrument(skip(service, payload))]
pub async fn signup(
    State(service): State<AuthService>,
    Json(payload): Json<SignupRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let user = service.signup(payload).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

#[instrument(skip(service, payload))]
pub async fn login(
    State(service): State<AuthService>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    Ok(Json(service.login(payload).await?))
}

#[instrument(skip(service, payload))]
pub async fn refresh(
    State(service): State<AuthService>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<TokenResponse>> {
    Ok(Json(service.refresh(&payload.refresh_token).await?))
}

#[instrument(skip(service, user))]
pub async fn logout(
    State(service): State<AuthService>,
    CurrentUser(user): CurrentUser,
) -> AppResult<StatusCode> {
    service.logout(&user).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(service, token))]
pub async fn confirmed_email(
    State(service): State<AuthService>,
    Path(token): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    Ok(Json(service.confirm_email(&token).await?))
}

#[instrument(skip(service, payload))]
pub async fn request_email(
    State(service): State<AuthService>,
    Json(payload): Json<RequestEmail>,
) -> AppResult<Json<MessageResponse>> {
    Ok(Json(service.request_email(&payload.email).await?))
}

#[instrument(skip(service, payload))]
pub async fn reset_password(
    State(service): State<AuthService>,
    Json(payload): Json<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    Ok(Json(service.reset_password(payload).await?))
}

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, patch},
    Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{AvatarResponse, UpdateUserRequest, UserResponse},
    services::UserService,
};
use crate::{
    auth::extractors::{AdminUser, CurrentUser},
    avatars::{read_avatar, MAX_AVATAR_BYTES},
    contacts::dto::Pagination,
    error::AppResult,
    extract::{Json, Path, Query},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(me))
        .route(
            "/users/avatar",
            patch(update_avatar).layer(DefaultBodyLimit::max(MAX_AVATAR_BYTES + 64 * 1024)),
        )
        .route("/users", get(list_users))
        .route(
            "/users/:id",
            get(get_user).patch(update_user).delete(delete_user),
        )
}

#[instrument(skip(service, user))]
pub async fn me(
    State(service): State<UserService>,
    CurrentUser(user): CurrentUser,
) -> Json<UserResponse> {
    Json(service.me(&user).await)
}

#[instrument(skip(service, user, mp))]
pub async fn update_avatar(
    State(service): State<UserService>,
    AdminUser(user): AdminUser,
    mp: Multipart,
) -> AppResult<Json<AvatarResponse>> {
    let upload = read_avatar(mp).await?;
    Ok(Json(service.update_avatar(&user, upload).await?))
}

#[instrument(skip(service, _admin))]
pub async fn list_users(
    State(service): State<UserService>,
    AdminUser(_admin): AdminUser,
    Query(p): Query<Pagination>,
) -> AppResult<Json<Vec<UserResponse>>> {
    let (limit, skip) = p.bounds()?;
    Ok(Json(service.list(limit, skip).await?))
}

#[instrument(skip(service, _admin))]
pub async fn get_user(
    State(service): State<UserService>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserResponse>> {
    Ok(Json(service.get(id).await?))
}

#[instrument(skip(service, _admin, payload))]
pub async fn update_user(
    State(service): State<UserService>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<UserResponse>> {
    let patch = payload.into_patch()?;
    Ok(Json(service.update(id, patch).await?))
}

#[instrument(skip(service, _admin))]
pub async fn delete_user(
    State(service): State<UserService>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

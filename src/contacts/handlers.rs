use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, patch},
    Router,
};
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{
        BirthdayQuery, ContactRequest, ContactResponse, ContactUpdateRequest, Pagination,
        SearchQuery,
    },
    services::ContactService,
};
use crate::{
    auth::extractors::CurrentUser,
    avatars::{read_avatar, MAX_AVATAR_BYTES},
    error::AppResult,
    extract::{Json, Path, Query},
    state::AppState,
};

pub fn contact_routes() -> Router<AppState> {
    Router::new()
        .route("/contacts", get(list_contacts).post(create_contact))
        .route("/contacts/search", get(search_contacts))
        .route("/contacts/upcoming-birthdays", get(upcoming_birthdays))
        .route(
            "/contacts/:id",
            get(get_contact).patch(update_contact).delete(delete_contact),
        )
        .route(
            "/contacts/:id/avatar",
            patch(update_contact_avatar).layer(DefaultBodyLimit::max(MAX_AVATAR_BYTES + 64 * 1024)),
        )
}

#[instrument(skip(service, user), fields(user_id = %user.id))]
pub async fn list_contacts(
    State(service): State<ContactService>,
    CurrentUser(user): CurrentUser,
    Query(p): Query<Pagination>,
) -> AppResult<Json<Vec<ContactResponse>>> {
    let (limit, skip) = p.bounds()?;
    Ok(Json(service.list(user.id, limit, skip).await?))
}

#[instrument(skip(service, user, payload), fields(user_id = %user.id))]
pub async fn create_contact(
    State(service): State<ContactService>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<ContactRequest>,
) -> AppResult<(StatusCode, Json<ContactResponse>)> {
    let new = payload.into_new()?;
    let contact = service.create(user.id, new).await?;
    Ok((StatusCode::CREATED, Json(contact)))
}

#[instrument(skip(service, user), fields(user_id = %user.id))]
pub async fn get_contact(
    State(service): State<ContactService>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ContactResponse>> {
    Ok(Json(service.get(user.id, id).await?))
}

#[instrument(skip(service, user, payload), fields(user_id = %user.id))]
pub async fn update_contact(
    State(service): State<ContactService>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ContactUpdateRequest>,
) -> AppResult<Json<ContactResponse>> {
    let patch = payload.into_patch()?;
    Ok(Json(service.update(user.id, id, patch).await?))
}

#[instrument(skip(service, user), fields(user_id = %user.id))]
pub async fn delete_contact(
    State(service): State<ContactService>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    service.delete(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(service, user, mp), fields(user_id = %user.id))]
pub async fn update_contact_avatar(
    State(service): State<ContactService>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    mp: Multipart,
) -> AppResult<Json<ContactResponse>> {
    let upload = read_avatar(mp).await?;
    Ok(Json(service.update_avatar(user.id, id, upload).await?))
}

#[instrument(skip(service, user, q), fields(user_id = %user.id))]
pub async fn search_contacts(
    State(service): State<ContactService>,
    CurrentUser(user): CurrentUser,
    Query(q): Query<SearchQuery>,
) -> AppResult<Json<Vec<ContactResponse>>> {
    Ok(Json(service.search(user.id, q.into()).await?))
}

#[instrument(skip(service, user), fields(user_id = %user.id))]
pub async fn upcoming_birthdays(
    State(service): State<ContactService>,
    CurrentUser(user): CurrentUser,
    Query(q): Query<BirthdayQuery>,
) -> AppResult<Json<Vec<ContactResponse>>> {
    let today = OffsetDateTime::now_utc().date();
    Ok(Json(service.upcoming_birthdays(user.id, q.days, today).await?))
}

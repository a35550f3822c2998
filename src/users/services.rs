use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{AvatarResponse, UserResponse},
    repo::UserRepository,
    repo_types::{User, UserPatch},
};
use crate::{
    avatars::{store_avatar, AvatarUpload},
    cache::{cache_delete, cache_get, cache_set, user_key, Cache},
    error::{AppError, AppResult},
    state::AppState,
    storage::{user_avatar_key, StorageClient},
};

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
    cache: Arc<dyn Cache>,
    storage: Arc<dyn StorageClient>,
    cache_ttl: u64,
}

impl FromRef<AppState> for UserService {
    fn from_ref(state: &AppState) -> Self {
        Self {
            users: state.users.clone(),
            cache: state.cache.clone(),
            storage: state.storage.clone(),
            cache_ttl: state.config.redis.cache_ttl_seconds,
        }
    }
}

impl UserService {
    /// Read-through: serves `user:{id}` from cache, filling it on a miss.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn me(&self, user: &User) -> UserResponse {
        let key = user_key(user.id);
        if let Some(cached) = cache_get::<UserResponse>(self.cache.as_ref(), &key).await {
            return cached;
        }
        let profile = UserResponse::from(user);
        cache_set(self.cache.as_ref(), &key, &profile, self.cache_ttl).await;
        profile
    }

    async fn invalidate(&self, user_id: Uuid) {
        cache_delete(self.cache.as_ref(), &user_key(user_id)).await;
    }

    #[instrument(skip(self, user, upload), fields(user_id = %user.id))]
    pub async fn update_avatar(&self, user: &User, upload: AvatarUpload) -> AppResult<AvatarResponse> {
        let url = store_avatar(self.storage.as_ref(), &user_avatar_key(user.id), upload).await?;
        let updated = self
            .users
            .update_avatar_url(&user.email, &url)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;
        self.invalidate(user.id).await;
        info!("avatar updated");
        Ok(AvatarResponse {
            avatar: updated.avatar,
        })
    }

    pub async fn list(&self, limit: i64, skip: i64) -> AppResult<Vec<UserResponse>> {
        let users = self.users.get_all(limit, skip).await?;
        Ok(users.iter().map(UserResponse::from).collect())
    }

    pub async fn get(&self, id: Uuid) -> AppResult<UserResponse> {
        self.users
            .get_by_id(id)
            .await?
            .map(UserResponse::from)
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: Uuid, patch: UserPatch) -> AppResult<UserResponse> {
        if patch.is_empty() {
            return self.get(id).await;
        }
        let user = self
            .users
            .update(id, patch)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;
        self.invalidate(id).await;
        info!(user_id = %id, "user updated");
        Ok(UserResponse::from(user))
    }

    /// Removes the user; their contacts go with them.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        if !self.users.delete(id).await? {
            return Err(AppError::not_found("User not found"));
        }
        self.invalidate(id).await;
        info!(user_id = %id, "user deleted");
        Ok(())
    }
}

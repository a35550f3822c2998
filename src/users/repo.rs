use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{NewUser, User, UserPatch};

const USER_COLUMNS: &str =
    "id, name, surname, email, hashed_password, role, is_verified, avatar, refresh_token, created_at";

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_all(&self, limit: i64, skip: i64) -> anyhow::Result<Vec<User>>;
    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn get_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn get_by_refresh_token(&self, token: &str) -> anyhow::Result<Option<User>>;
    /// `None` when the email is already registered.
    async fn create(&self, new: NewUser) -> anyhow::Result<Option<User>>;
    async fn update(&self, id: Uuid, patch: UserPatch) -> anyhow::Result<Option<User>>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
    async fn confirm_email(&self, email: &str) -> anyhow::Result<()>;
    async fn update_avatar_url(&self, email: &str, url: &str) -> anyhow::Result<Option<User>>;
    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> anyhow::Result<()>;
    async fn update_password(&self, id: Uuid, hashed_password: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn get_all(&self, limit: i64, skip: i64) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.db)
        .await
        .context("list users")?;
        Ok(rows)
    }

    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("get user by id")?;
        Ok(user)
    }

    async fn get_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("get user by email")?;
        Ok(user)
    }

    async fn get_by_refresh_token(&self, token: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE refresh_token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.db)
        .await
        .context("get user by refresh token")?;
        Ok(user)
    }

    async fn create(&self, new: NewUser) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, surname, email, hashed_password, role, avatar)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (email) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.name)
        .bind(&new.surname)
        .bind(&new.email)
        .bind(&new.hashed_password)
        .bind(new.role)
        .bind(&new.avatar)
        .fetch_optional(&self.db)
        .await
        .context("insert user")?;
        Ok(user)
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET name        = COALESCE($2, name),
                   surname     = COALESCE($3, surname),
                   role        = COALESCE($4, role),
                   is_verified = COALESCE($5, is_verified)
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.name)
        .bind(patch.surname)
        .bind(patch.role)
        .bind(patch.is_verified)
        .fetch_optional(&self.db)
        .await
        .context("update user")?;
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete user")?;
        Ok(res.rows_affected() > 0)
    }

    async fn confirm_email(&self, email: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET is_verified = TRUE WHERE email = $1")
            .bind(email)
            .execute(&self.db)
            .await
            .context("confirm email")?;
        Ok(())
    }

    async fn update_avatar_url(&self, email: &str, url: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET avatar = $2 WHERE email = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(url)
        .fetch_optional(&self.db)
        .await
        .context("update avatar url")?;
        Ok(user)
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET refresh_token = $2 WHERE id = $1")
            .bind(id)
            .bind(token)
            .execute(&self.db)
            .await
            .context("set refresh token")?;
        Ok(())
    }

    async fn update_password(&self, id: Uuid, hashed_password: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET hashed_password = $2, refresh_token = NULL WHERE id = $1")
            .bind(id)
            .bind(hashed_password)
            .execute(&self.db)
            .await
            .context("update password")?;
        Ok(())
    }
}

use std::sync::Arc;

use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::auth::jwt::JwtKeys;
use crate::cache::{Cache, RedisCache};
use crate::config::AppConfig;
use crate::contacts::repo::{ContactRepository, PgContactRepository};
use crate::mail::{LogMailer, Mailer};
use crate::storage::{Storage, StorageClient};
use crate::users::repo::{PgUserRepository, UserRepository};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub users: Arc<dyn UserRepository>,
    pub contacts: Arc<dyn ContactRepository>,
    pub cache: Arc<dyn Cache>,
    pub storage: Arc<dyn StorageClient>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    /// Connects Postgres, applies migrations and wires the production backends.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.database_url)
            .await?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }

        let cache = Arc::new(RedisCache::new(&config.redis.url())?) as Arc<dyn Cache>;
        let storage = Arc::new(Storage::new(&config.storage).await?) as Arc<dyn StorageClient>;

        Ok(Self::from_parts(
            config,
            db,
            cache,
            storage,
            Arc::new(LogMailer),
        ))
    }

    fn from_parts(
        config: AppConfig,
        db: PgPool,
        cache: Arc<dyn Cache>,
        storage: Arc<dyn StorageClient>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self::with_repositories(
            config,
            Arc::new(PgUserRepository::new(db.clone())),
            Arc::new(PgContactRepository::new(db)),
            cache,
            storage,
            mailer,
        )
    }

    pub fn with_repositories(
        config: AppConfig,
        users: Arc<dyn UserRepository>,
        contacts: Arc<dyn ContactRepository>,
        cache: Arc<dyn Cache>,
        storage: Arc<dyn StorageClient>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            jwt: JwtKeys::new(&config.jwt),
            config: Arc::new(config),
            users,
            contacts,
            cache,
            storage,
            mailer,
        }
    }
}

use anyhow::Context;
use serde::Deserialize;
use std::str::FromStr;

const DEFAULT_JWT_SECRET: &str = "your_jwt_secret";

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub verification_ttl_seconds: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub cache_ttl_seconds: u64,
}

impl RedisConfig {
    pub fn url(&self) -> String {
        match &self.password {
            Some(pw) => format!("redis://:{}@{}:{}", pw, self.host, self.port),
            None => format!("redis://{}:{}", self.host, self.port),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_env: String,
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL, used to build verification links.
    pub api_url: String,
    pub database_url: String,
    pub db_max_connections: u32,
    /// Whether signup may request the `admin` role.
    pub allow_admin_signup: bool,
    pub jwt: JwtConfig,
    pub redis: RedisConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Loads `.env` for `APP_ENV=prod`, `.env.dev` otherwise (falling back to `.env`).
    /// Variables already present in the process environment win.
    pub fn load_env_file() {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "dev".into());
        let env_file = if app_env == "prod" { ".env" } else { ".env.dev" };
        if dotenvy::from_filename(env_file).is_err() {
            dotenvy::dotenv().ok();
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let database_url = match lookup("DATABASE_URL") {
            Some(url) => url,
            None => format!(
                "postgres://{}:{}@{}:{}/{}",
                get("DB_USER", "postgres"),
                get("DB_PASSWORD", "postgres"),
                get("DB_HOST", "localhost"),
                get("DB_PORT", "5432"),
                get("DB_NAME", "postgres"),
            ),
        };

        let secret = get("JWT_SECRET", DEFAULT_JWT_SECRET);
        if secret == DEFAULT_JWT_SECRET {
            tracing::warn!("JWT_SECRET is not set; using the built-in development secret");
        }
        let jwt = JwtConfig {
            secret,
            issuer: get("JWT_ISSUER", "contacts-api"),
            audience: get("JWT_AUDIENCE", "contacts-api-users"),
            ttl_seconds: parse_or(&lookup, "JWT_EXPIRATION_SECONDS", 3600)?,
            refresh_ttl_seconds: parse_or(&lookup, "JWT_REFRESH_EXPIRATION_SECONDS", 7 * 24 * 3600)?,
            verification_ttl_seconds: parse_or(
                &lookup,
                "JWT_VERIFICATION_EXPIRATION_SECONDS",
                7 * 24 * 3600,
            )?,
        };

        let redis = RedisConfig {
            host: get("REDIS_HOST", "localhost"),
            port: parse_or(&lookup, "REDIS_PORT", 6379)?,
            password: lookup("REDIS_PASSWORD").filter(|p| !p.is_empty()),
            cache_ttl_seconds: parse_or(&lookup, "CACHE_TTL_SECONDS", 3600)?,
        };

        let endpoint = get("STORAGE_ENDPOINT", "http://localhost:9000");
        let bucket = get("STORAGE_BUCKET", "avatars");
        let public_url = lookup("STORAGE_PUBLIC_URL")
            .unwrap_or_else(|| format!("{}/{}", endpoint.trim_end_matches('/'), bucket));
        let storage = StorageConfig {
            endpoint,
            bucket,
            access_key: get("STORAGE_ACCESS_KEY", "minioadmin"),
            secret_key: get("STORAGE_SECRET_KEY", "minioadmin"),
            region: get("STORAGE_REGION", "us-east-1"),
            public_url,
        };

        let port = parse_or(&lookup, "API_PORT", 8005)?;
        Ok(Self {
            app_env: get("APP_ENV", "dev"),
            host: get("API_HOST", "0.0.0.0"),
            port,
            api_url: get("API_URL", &format!("http://localhost:{}", port)),
            database_url,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            allow_admin_signup: parse_or(&lookup, "ALLOW_ADMIN_SIGNUP", false)?,
            jwt,
            redis,
            storage,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

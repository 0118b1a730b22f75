use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub max_connections: u32,
    pub max_lifetime_secs: u64,
}

impl DbConfig {
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db: DbConfig,
    pub jwt: JwtConfig,
    pub server: ServerConfig,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Upper bound for token lifetimes, one year.
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

fn ttl_minutes(key: &str, default: i64) -> i64 {
    env_or(key, default).clamp(1, MAX_TTL_MINUTES)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let db = DbConfig {
            max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            max_lifetime_secs: env_or("DB_MAX_LIFETIME_SECS", 180),
        };
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "cardtrack".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "cardtrack-users".into()),
            ttl_minutes: ttl_minutes("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: ttl_minutes("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };
        let server = ServerConfig {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("APP_PORT", 8080),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 10),
        };
        Ok(Self {
            database_url,
            db,
            jwt,
            server,
        })
    }
}

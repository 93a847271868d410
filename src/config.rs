use anyhow::Context;
use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub database: DatabaseConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database = DatabaseConfig {
            url: std::env::var("DATABASE_URL").ok(),
            host: std::env::var("DB_HOST").unwrap_or_else(|_| "localhost".into()),
            port: parse_var("DB_PORT", 5432)?,
            username: std::env::var("DB_USERNAME").unwrap_or_else(|_| "postgres".into()),
            password: std::env::var("DB_PASSWORD").unwrap_or_default(),
            database: std::env::var("DB_DATABASE").unwrap_or_else(|_| "userdesk".into()),
            max_connections: parse_var("DB_MAX_CONNECTIONS", 10)?,
        };
        Ok(Self {
            env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_var("APP_PORT", 8080)?,
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", 30)?,
            database,
        })
    }

    pub fn is_development(&self) -> bool {
        self.env == "development"
    }
}

impl DatabaseConfig {
    /// Connection options for the pool. A full `DATABASE_URL` wins over the
    /// individual `DB_*` parts.
    pub fn connect_options(&self) -> anyhow::Result<PgConnectOptions> {
        if let Some(url) = &self.url {
            return url.parse().context("parse DATABASE_URL");
        }
        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
            .database(&self.database))
    }
}

fn parse_var<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {v:?}")),
        Err(_) => Ok(default),
    }
}

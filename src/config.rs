use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_attempts: u32,
    pub connect_backoff_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Argon2 cost parameters. Defaults match `argon2::Params::default()`.
#[derive(Debug, Clone, Deserialize)]
pub struct HashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub hash: HashConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests don't have to touch
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| non_empty(&lookup, key);

        let server = ServerConfig {
            host: value("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&lookup, "APP_PORT", 8080)?,
        };

        let url = match value("DATABASE_URL") {
            Some(url) => url,
            None => compose_database_url(&lookup)
                .context("DATABASE_URL or DB_HOST/DB_USER/DB_NAME must be set")?,
        };
        let database = DatabaseConfig {
            url,
            max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            connect_attempts: parse_or(&lookup, "DB_CONNECT_ATTEMPTS", 5)?,
            connect_backoff_secs: parse_or(&lookup, "DB_CONNECT_BACKOFF_SECS", 2)?,
        };

        let secret = value("JWT_SECRET")
            .or_else(|| value("SECRET_KEY"))
            .context("JWT_SECRET must be set")?;
        let jwt = JwtConfig {
            secret,
            issuer: value("JWT_ISSUER").unwrap_or_else(|| "account-service".into()),
            audience: value("JWT_AUDIENCE").unwrap_or_else(|| "account-service-users".into()),
            ttl_minutes: parse_or(&lookup, "JWT_TTL_MINUTES", 60)?,
        };
        anyhow::ensure!(jwt.ttl_minutes > 0, "JWT_TTL_MINUTES must be positive");

        let defaults = HashConfig::default();
        let hash = HashConfig {
            memory_kib: parse_or(&lookup, "PASSWORD_HASH_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parse_or(&lookup, "PASSWORD_HASH_ITERATIONS", defaults.iterations)?,
            parallelism: parse_or(&lookup, "PASSWORD_HASH_PARALLELISM", defaults.parallelism)?,
        };

        Ok(Self {
            server,
            database,
            jwt,
            hash,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(lookup, key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid value for {key}: {e}")),
        None => Ok(default),
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn compose_database_url<F>(lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let host = non_empty(lookup, "DB_HOST")?;
    let user = non_empty(lookup, "DB_USER")?;
    let name = non_empty(lookup, "DB_NAME")?;
    let port = non_empty(lookup, "DB_PORT").unwrap_or_else(|| "5432".into());
    let password = lookup("DB_PASSWORD").unwrap_or_default();
    Some(format!("postgres://{user}:{password}@{host}:{port}/{name}"))
}

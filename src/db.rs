use std::time::Duration;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

use crate::config::DatabaseConfig;

/// Connects to Postgres, retrying a bounded number of times with a fixed backoff.
pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let attempts = cfg.connect_attempts.max(1);
    let backoff = Duration::from_secs(cfg.connect_backoff_secs);

    let mut attempt = 1;
    loop {
        match PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .connect(&cfg.url)
            .await
        {
            Ok(pool) => {
                info!(attempt, "connected to database");
                return Ok(pool);
            }
            Err(e) if attempt < attempts => {
                warn!(error = %e, attempt, attempts, "database connection failed; retrying");
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("connect to database after {attempts} attempt(s)")
                })
            }
        }
    }
}

pub async fn migrate(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run database migrations")?;
    info!("database migrations applied");
    Ok(())
}


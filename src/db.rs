use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, ConnectOptions, PgPool};
use tracing::info;

use crate::config::AppConfig;

/// Opens the connection pool and proves it with a first connection.
pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let mut options = config.database.connect_options()?;
    if !config.is_development() {
        options = options.disable_statement_logging();
    }
    let db = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect_with(options)
        .await
        .context("connect to database")?;
    Ok(db)
}

pub async fn run_migrations(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run migrations")?;
    info!("migrations applied");
    Ok(())
}

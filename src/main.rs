use std::sync::Arc;

mod app;
mod config;
mod db;
mod error;
mod response;
mod state;
mod users;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{config::AppConfig, state::AppState};

const DEFAULT_LOG_FILTER: &str = "userdesk=debug,axum=info,tower_http=info";

/// `RUST_LOG` overrides the default filter; `LOG_FORMAT=json` switches to
/// one JSON object per line.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_target(false)))
        .with((!json).then(|| fmt::layer().compact()))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_tracing();

    let config = Arc::new(AppConfig::from_env()?);

    let db = match db::connect(&config).await {
        Ok(db) => {
            tracing::info!("database connected");
            db
        }
        Err(e) => {
            tracing::error!(error = ?e, "Database connection failed");
            std::process::exit(1);
        }
    };

    if config.is_development() {
        db::run_migrations(&db).await?;
    }

    let app = app::build_app(AppState::postgres(config.clone(), db));
    app::serve(app, &config).await
}

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::users::{PgUserRepository, UserRepository, UserService};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: UserService,
}

impl AppState {
    /// State backed by the Postgres `users` table.
    pub fn postgres(config: Arc<AppConfig>, db: PgPool) -> Self {
        Self::from_parts(config, Arc::new(PgUserRepository::new(db)))
    }

    pub fn from_parts(config: Arc<AppConfig>, repo: Arc<dyn UserRepository>) -> Self {
        Self {
            config,
            users: UserService::new(repo),
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::config::DatabaseConfig;
        use crate::users::InMemoryUserRepository;

        let config = Arc::new(AppConfig {
            env: "test".into(),
            host: "127.0.0.1".into(),
            port: 0,
            request_timeout_secs: 5,
            database: DatabaseConfig {
                url: None,
                host: "localhost".into(),
                port: 5432,
                username: "postgres".into(),
                password: "postgres".into(),
                database: "userdesk".into(),
                max_connections: 1,
            },
        });
        Self::from_parts(config, Arc::new(InMemoryUserRepository::new()))
    }
}

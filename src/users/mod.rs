use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;

pub use repo::{PgUserRepository, UserRepository};
#[cfg(test)]
pub use repo::InMemoryUserRepository;
pub use services::UserService;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::user_routes())
}

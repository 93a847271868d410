use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    response::ApiResponse,
    state::AppState,
    users::dto::{CreateUser, UpdateUser, UserResponse},
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user)
                .put(update_user)
                .patch(update_user)
                .delete(delete_user),
        )
}

/// An id that is not a UUID cannot name a stored user.
fn parse_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::not_found())
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
) -> ApiResult<ApiResponse<Vec<UserResponse>>> {
    let users = state.users.get_all_users().await?;
    Ok(ApiResponse::success(
        users,
        "Users retrieved successfully",
        StatusCode::OK,
    ))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<UserResponse>> {
    let user = state.users.get_user_by_id(parse_id(&id)?).await?;
    Ok(ApiResponse::success(
        user,
        "User retrieved successfully",
        StatusCode::OK,
    ))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUser>, JsonRejection>,
) -> ApiResult<ApiResponse<UserResponse>> {
    let Json(input) = payload?;
    let user = state.users.create_user(input).await?;
    info!(user_id = %user.id, "user registered");
    Ok(ApiResponse::success(
        user,
        "User created successfully",
        StatusCode::CREATED,
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUser>, JsonRejection>,
) -> ApiResult<ApiResponse<UserResponse>> {
    let id = parse_id(&id)?;
    let Json(input) = payload?;
    let user = state.users.update_user(id, input).await?;
    Ok(ApiResponse::success(
        user,
        "User updated successfully",
        StatusCode::OK,
    ))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    state.users.delete_user(parse_id(&id)?).await?;
    Ok(ApiResponse::success(
        (),
        "User deleted successfully",
        StatusCode::OK,
    ))
}

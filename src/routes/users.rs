use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::content::model::{Credentials, NewUser};
use crate::content::UserService;
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user).get(get_users))
        .route("/users/{id}", get(get_user))
        .route("/auth/login", post(login))
}

/// POST /users
/// Signup; the only unauthenticated write.
async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<NewUser>,
) -> AppResult<Response> {
    let users = UserService::from_state(&state);
    Ok(users.create_user(req).await?.into_response())
}

/// POST /auth/login
async fn login(
    State(state): State<AppState>,
    Json(req): Json<Credentials>,
) -> AppResult<Response> {
    let users = UserService::from_state(&state);
    Ok(users.login(req).await?.into_response())
}

/// GET /users
async fn get_users(State(state): State<AppState>, _user: CurrentUser) -> AppResult<Response> {
    let users = UserService::from_state(&state);
    Ok(users.get_users().await?.into_response())
}

/// GET /users/{id}
async fn get_user(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let users = UserService::from_state(&state);
    Ok(users.get_user_by_id(&id).await?.into_response())
}

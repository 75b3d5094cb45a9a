use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::content::model::{NewPost, PostPatch};
use crate::content::vote::VoteDirection;
use crate::content::PostService;
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", post(create_post).get(get_posts))
        .route(
            "/posts/{id}",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/posts/{id}/upvote", post(upvote))
        .route("/posts/{id}/downvote", post(downvote))
        .route("/users/{id}/posts", get(get_posts_by_user))
}

#[derive(Deserialize)]
struct PostsQuery {
    category: Option<String>,
}

/// POST /posts
async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<NewPost>,
) -> AppResult<Response> {
    let posts = PostService::from_state(&state);
    Ok(posts.create_post(&user.id, req).await?.into_response())
}

/// GET /posts?category=
async fn get_posts(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<PostsQuery>,
) -> AppResult<Response> {
    let posts = PostService::from_state(&state);
    Ok(posts
        .get_posts(query.category.as_deref())
        .await?
        .into_response())
}

/// GET /posts/{id}
async fn get_post(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let posts = PostService::from_state(&state);
    Ok(posts.get_post_by_id(&id).await?.into_response())
}

/// GET /users/{id}/posts
async fn get_posts_by_user(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let posts = PostService::from_state(&state);
    Ok(posts.get_posts_by_user(&id).await?.into_response())
}

/// PUT /posts/{id}
async fn update_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(patch): Json<PostPatch>,
) -> AppResult<Response> {
    let posts = PostService::from_state(&state);
    Ok(posts.update_post(&user.id, &id, patch).await?.into_response())
}

/// DELETE /posts/{id}
async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let posts = PostService::from_state(&state);
    Ok(posts.delete_post(&user.id, &id).await?.into_response())
}

/// POST /posts/{id}/upvote
async fn upvote(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let posts = PostService::from_state(&state);
    Ok(posts
        .vote(&user.id, &id, VoteDirection::Up)
        .await?
        .into_response())
}

/// POST /posts/{id}/downvote
async fn downvote(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let posts = PostService::from_state(&state);
    Ok(posts
        .vote(&user.id, &id, VoteDirection::Down)
        .await?
        .into_response())
}

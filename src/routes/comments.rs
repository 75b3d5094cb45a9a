use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::content::model::{CommentPatch, NewComment};
use crate::content::vote::VoteDirection;
use crate::content::CommentService;
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/posts/{id}/comments",
            post(create_comment).get(get_post_comments),
        )
        .route(
            "/comments/{id}",
            get(get_comment).put(update_comment).delete(delete_comment),
        )
        .route("/comments/{id}/upvote", post(upvote))
        .route("/comments/{id}/downvote", post(downvote))
}

/// POST /posts/{id}/comments
async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<String>,
    Json(req): Json<NewComment>,
) -> AppResult<Response> {
    let comments = CommentService::from_state(&state);
    Ok(comments
        .create_comment(&user.id, &post_id, req)
        .await?
        .into_response())
}

/// GET /posts/{id}/comments
async fn get_post_comments(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(post_id): Path<String>,
) -> AppResult<Response> {
    let comments = CommentService::from_state(&state);
    Ok(comments.get_comments_by_post(&post_id).await?.into_response())
}

/// GET /comments/{id}
async fn get_comment(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let comments = CommentService::from_state(&state);
    Ok(comments.get_comment_by_id(&id).await?.into_response())
}

/// PUT /comments/{id}
async fn update_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(patch): Json<CommentPatch>,
) -> AppResult<Response> {
    let comments = CommentService::from_state(&state);
    Ok(comments
        .update_comment(&user.id, &id, patch)
        .await?
        .into_response())
}

/// DELETE /comments/{id}
async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let comments = CommentService::from_state(&state);
    Ok(comments.delete_comment(&user.id, &id).await?.into_response())
}

/// POST /comments/{id}/upvote
async fn upvote(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let comments = CommentService::from_state(&state);
    Ok(comments
        .vote(&user.id, &id, VoteDirection::Up)
        .await?
        .into_response())
}

/// POST /comments/{id}/downvote
async fn downvote(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let comments = CommentService::from_state(&state);
    Ok(comments
        .vote(&user.id, &id, VoteDirection::Down)
        .await?
        .into_response())
}

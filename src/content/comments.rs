use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{self, keys, Cache};
use crate::content::authorize::authorize;
use crate::content::model::{Comment, CommentPatch, CommentView, NewComment};
use crate::content::vote::{apply_vote, VoteDirection};
use crate::error::{AppError, AppResult};
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::store::{Collection, DocumentUpdate, DynStore, Filter};

pub struct CommentService {
    store: DynStore,
    cache: Option<Arc<dyn Cache>>,
    comments_ttl: Duration,
}

impl CommentService {
    pub fn new(store: DynStore, cache: Option<Arc<dyn Cache>>, comments_ttl: Duration) -> Self {
        Self {
            store,
            cache,
            comments_ttl,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.store.clone(),
            state.cache.clone(),
            state.config.cache.comments_ttl(),
        )
    }

    /// Attach a comment to a post. The post id is not verified: references
    /// are not enforced and may dangle, exactly like `createdBy`.
    pub async fn create_comment(
        &self,
        actor_id: &str,
        post_id: &str,
        new_comment: NewComment,
    ) -> AppResult<ApiResponse> {
        let now = Utc::now();
        let comment = Comment {
            id: uuid::Uuid::now_v7().to_string(),
            description: new_comment.description,
            post_id: post_id.to_string(),
            created_by: actor_id.to_string(),
            vote_count: 0,
            users_vote: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        self.store
            .insert(
                Collection::Comments,
                &comment.id,
                &serde_json::to_value(&comment)?,
            )
            .await?;
        tracing::info!("Created comment {} on post {} by {}", comment.id, post_id, actor_id);

        Ok(ApiResponse::created("Comment created successfully!").data(json!({ "id": comment.id })))
    }

    /// Comments on a post, most-voted first. The sort runs after retrieval
    /// so cache hits come back ordered too, not just fresh loads.
    pub async fn get_comments_by_post(&self, post_id: &str) -> AppResult<ApiResponse> {
        let store = self.store.clone();
        let filter = Filter::Eq("postId", json!(post_id));
        let mut comments: Vec<CommentView> = cache::read_through(
            self.cache.as_ref(),
            &keys::comments_by_post(post_id),
            self.comments_ttl,
            || async move {
                let docs = store.find(Collection::Comments, &filter).await?;
                docs.into_iter()
                    .map(|(_, doc)| {
                        Ok(CommentView::from(serde_json::from_value::<Comment>(doc)?))
                    })
                    .collect()
            },
        )
        .await?;

        comments.sort_by(|a, b| b.vote_count.cmp(&a.vote_count));

        Ok(ApiResponse::ok("Comments retrieved successfully!")
            .data(serde_json::to_value(comments)?))
    }

    pub async fn get_comment_by_id(&self, comment_id: &str) -> AppResult<ApiResponse> {
        let comment = self.fetch(comment_id).await?;
        Ok(ApiResponse::ok("Comment retrieved successfully")
            .data(serde_json::to_value(CommentView::from(comment))?))
    }

    pub async fn update_comment(
        &self,
        actor_id: &str,
        comment_id: &str,
        patch: CommentPatch,
    ) -> AppResult<ApiResponse> {
        let comment = self.fetch(comment_id).await?;
        authorize(&self.store, actor_id, &comment.created_by).await?;

        let mut update = DocumentUpdate::new();
        if let Some(description) = &patch.description {
            update = update.set("description", json!(description));
        }
        update = update.set("updatedAt", json!(Utc::now()));

        if !self
            .store
            .apply(Collection::Comments, comment_id, &update)
            .await?
        {
            return Err(AppError::NotFound);
        }
        tracing::info!("Updated comment {} by {}", comment_id, actor_id);

        Ok(ApiResponse::ok("Comment updated"))
    }

    pub async fn delete_comment(&self, actor_id: &str, comment_id: &str) -> AppResult<ApiResponse> {
        let comment = self.fetch(comment_id).await?;
        authorize(&self.store, actor_id, &comment.created_by).await?;

        self.store.delete(Collection::Comments, comment_id).await?;
        tracing::info!("Deleted comment {} by {}", comment_id, actor_id);

        Ok(ApiResponse::ok("Comment deleted successfully"))
    }

    pub async fn vote(
        &self,
        actor_id: &str,
        comment_id: &str,
        direction: VoteDirection,
    ) -> AppResult<ApiResponse> {
        apply_vote::<Comment>(
            &self.store,
            Collection::Comments,
            comment_id,
            actor_id,
            direction,
        )
        .await?;
        Ok(ApiResponse::ok("Vote recorded"))
    }

    async fn fetch(&self, comment_id: &str) -> AppResult<Comment> {
        let doc = self
            .store
            .get(Collection::Comments, comment_id)
            .await?
            .ok_or(AppError::NotFound)?;
        Ok(serde_json::from_value(doc)?)
    }
}

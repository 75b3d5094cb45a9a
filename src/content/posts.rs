use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{self, keys, Cache};
use crate::content::authorize::authorize;
use crate::content::model::{NewPost, Post, PostPatch, PostView};
use crate::content::vote::{apply_vote, VoteDirection};
use crate::error::{AppError, AppResult};
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::store::{Collection, DocumentUpdate, DynStore, Filter};

pub struct PostService {
    store: DynStore,
    cache: Option<Arc<dyn Cache>>,
    posts_ttl: Duration,
}

impl PostService {
    pub fn new(store: DynStore, cache: Option<Arc<dyn Cache>>, posts_ttl: Duration) -> Self {
        Self {
            store,
            cache,
            posts_ttl,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.store.clone(),
            state.cache.clone(),
            state.config.cache.posts_ttl(),
        )
    }

    pub async fn create_post(&self, actor_id: &str, new_post: NewPost) -> AppResult<ApiResponse> {
        let now = Utc::now();
        let post = Post {
            id: uuid::Uuid::now_v7().to_string(),
            title: new_post.title,
            description: new_post.description,
            categories: new_post.categories,
            created_by: actor_id.to_string(),
            vote_count: 0,
            users_vote: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        self.store
            .insert(Collection::Posts, &post.id, &serde_json::to_value(&post)?)
            .await?;
        tracing::info!("Created post {} by {}", post.id, actor_id);

        Ok(ApiResponse::created("Post created successfully!").data(json!({ "id": post.id })))
    }

    /// All posts, optionally narrowed to one category. Each category gets its
    /// own cache key; the unfiltered listing uses the fixed `posts` key.
    pub async fn get_posts(&self, category: Option<&str>) -> AppResult<ApiResponse> {
        let (key, filter) = match category {
            Some(category) => (
                keys::posts_by_category(category),
                Filter::Contains("categories", json!(category)),
            ),
            None => (keys::ALL_POSTS.to_string(), Filter::All),
        };

        let posts = self.load_views(&key, filter).await?;
        Ok(ApiResponse::ok("Posts retrieved successfully!").data(serde_json::to_value(posts)?))
    }

    pub async fn get_posts_by_user(&self, user_id: &str) -> AppResult<ApiResponse> {
        let posts = self
            .load_views(
                &keys::posts_by_user(user_id),
                Filter::Eq("createdBy", json!(user_id)),
            )
            .await?;
        Ok(ApiResponse::ok("Posts retrieved successfully!").data(serde_json::to_value(posts)?))
    }

    pub async fn get_post_by_id(&self, post_id: &str) -> AppResult<ApiResponse> {
        let post = self.fetch(post_id).await?;
        Ok(ApiResponse::ok("Post retrieved successfully")
            .data(serde_json::to_value(PostView::from(post))?))
    }

    pub async fn update_post(
        &self,
        actor_id: &str,
        post_id: &str,
        patch: PostPatch,
    ) -> AppResult<ApiResponse> {
        let post = self.fetch(post_id).await?;
        authorize(&self.store, actor_id, &post.created_by).await?;

        let mut update = DocumentUpdate::new();
        if let Some(title) = &patch.title {
            update = update.set("title", json!(title));
        }
        if let Some(description) = &patch.description {
            update = update.set("description", json!(description));
        }
        if let Some(categories) = &patch.categories {
            update = update.set("categories", json!(categories));
        }
        update = update.set("updatedAt", json!(Utc::now()));

        if !self.store.apply(Collection::Posts, post_id, &update).await? {
            return Err(AppError::NotFound);
        }
        tracing::info!("Updated post {} by {}", post_id, actor_id);

        Ok(ApiResponse::ok("Post updated"))
    }

    pub async fn delete_post(&self, actor_id: &str, post_id: &str) -> AppResult<ApiResponse> {
        let post = self.fetch(post_id).await?;
        authorize(&self.store, actor_id, &post.created_by).await?;

        self.store.delete(Collection::Posts, post_id).await?;
        tracing::info!("Deleted post {} by {}", post_id, actor_id);

        Ok(ApiResponse::ok("Post deleted successfully"))
    }

    pub async fn vote(
        &self,
        actor_id: &str,
        post_id: &str,
        direction: VoteDirection,
    ) -> AppResult<ApiResponse> {
        apply_vote::<Post>(&self.store, Collection::Posts, post_id, actor_id, direction).await?;
        Ok(ApiResponse::ok("Vote recorded"))
    }

    async fn fetch(&self, post_id: &str) -> AppResult<Post> {
        let doc = self
            .store
            .get(Collection::Posts, post_id)
            .await?
            .ok_or(AppError::NotFound)?;
        Ok(serde_json::from_value(doc)?)
    }

    async fn load_views(&self, key: &str, filter: Filter) -> AppResult<Vec<PostView>> {
        let store = self.store.clone();
        cache::read_through(self.cache.as_ref(), key, self.posts_ttl, || async move {
            let docs = store.find(Collection::Posts, &filter).await?;
            docs.into_iter()
                .map(|(_, doc)| Ok(PostView::from(serde_json::from_value::<Post>(doc)?)))
                .collect()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::content::model::{Role, User};
    use crate::store::sqlite::{run_migrations, SqliteStore};
    use r2d2::Pool;
    use r2d2_sqlite::SqliteConnectionManager;

    fn test_store() -> DynStore {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).unwrap();
        run_migrations(&pool).unwrap();
        Arc::new(SqliteStore::new(pool))
    }

    async fn seed_user(store: &DynStore, id: &str, role: Role) {
        let now = Utc::now();
        let user = User {
            id: id.into(),
            email: format!("{}@x.com", id),
            username: id.into(),
            password: "hash".into(),
            role,
            created_at: now,
            updated_at: now,
        };
        store
            .insert(Collection::Users, id, &serde_json::to_value(&user).unwrap())
            .await
            .unwrap();
    }

    fn new_post(title: &str) -> NewPost {
        NewPost {
            title: title.into(),
            description: "D".into(),
            categories: vec!["c1".into()],
        }
    }

    async fn create(service: &PostService, actor: &str, title: &str) -> String {
        let resp = service.create_post(actor, new_post(title)).await.unwrap();
        resp.data.unwrap()["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn create_post_starts_with_zero_votes() {
        let store = test_store();
        let posts = PostService::new(store.clone(), None, Duration::from_secs(3600));

        let id = create(&posts, "u1", "T").await;

        let doc = store.get(Collection::Posts, &id).await.unwrap().unwrap();
        assert_eq!(doc["voteCount"], 0);
        assert_eq!(doc["usersVote"], json!([]));
        assert_eq!(doc["createdBy"], "u1");
    }

    #[tokio::test]
    async fn get_post_by_id_strips_internal_fields() {
        let posts = PostService::new(test_store(), None, Duration::from_secs(3600));
        let id = create(&posts, "u1", "T").await;

        let resp = posts.get_post_by_id(&id).await.unwrap();
        let data = resp.data.unwrap();
        assert_eq!(data["title"], "T");
        assert!(data.get("usersVote").is_none());
        assert!(data.get("createdAt").is_none());

        let err = posts.get_post_by_id("missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn get_posts_filters_by_category() {
        let posts = PostService::new(test_store(), None, Duration::from_secs(3600));
        create(&posts, "u1", "in").await;
        let other = NewPost {
            title: "out".into(),
            description: "D".into(),
            categories: vec!["c2".into()],
        };
        posts.create_post("u1", other).await.unwrap();

        let resp = posts.get_posts(Some("c1")).await.unwrap();
        let data = resp.data.unwrap();
        assert_eq!(data.as_array().unwrap().len(), 1);
        assert_eq!(data[0]["title"], "in");

        let resp = posts.get_posts(None).await.unwrap();
        assert_eq!(resp.data.unwrap().as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn get_posts_by_user_filters_by_creator() {
        let posts = PostService::new(test_store(), None, Duration::from_secs(3600));
        create(&posts, "u1", "mine").await;
        create(&posts, "u2", "theirs").await;

        let resp = posts.get_posts_by_user("u1").await.unwrap();
        let data = resp.data.unwrap();
        assert_eq!(data.as_array().unwrap().len(), 1);
        assert_eq!(data[0]["title"], "mine");
    }

    #[tokio::test]
    async fn owner_can_update_own_post() {
        let store = test_store();
        seed_user(&store, "u1", Role::Member).await;
        let posts = PostService::new(store.clone(), None, Duration::from_secs(3600));
        let id = create(&posts, "u1", "old").await;

        let patch = PostPatch {
            title: Some("new".into()),
            ..Default::default()
        };
        posts.update_post("u1", &id, patch).await.unwrap();

        let doc = store.get(Collection::Posts, &id).await.unwrap().unwrap();
        assert_eq!(doc["title"], "new");
        assert_eq!(doc["description"], "D");
    }

    #[tokio::test]
    async fn update_advances_updated_at() {
        let store = test_store();
        seed_user(&store, "u1", Role::Member).await;
        let posts = PostService::new(store.clone(), None, Duration::from_secs(3600));
        let id = create(&posts, "u1", "T").await;

        let before = store.get(Collection::Posts, &id).await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let patch = PostPatch {
            description: Some("D2".into()),
            ..Default::default()
        };
        posts.update_post("u1", &id, patch).await.unwrap();

        let after = store.get(Collection::Posts, &id).await.unwrap().unwrap();
        let before_ts: chrono::DateTime<Utc> =
            serde_json::from_value(before["updatedAt"].clone()).unwrap();
        let after_ts: chrono::DateTime<Utc> =
            serde_json::from_value(after["updatedAt"].clone()).unwrap();
        assert!(after_ts > before_ts);
        assert_eq!(after["createdAt"], before["createdAt"]);
    }

    #[tokio::test]
    async fn non_owner_member_cannot_update() {
        let store = test_store();
        seed_user(&store, "u1", Role::Member).await;
        seed_user(&store, "u2", Role::Member).await;
        let posts = PostService::new(store.clone(), None, Duration::from_secs(3600));
        let id = create(&posts, "u1", "old").await;

        let patch = PostPatch {
            title: Some("hijacked".into()),
            ..Default::default()
        };
        let err = posts.update_post("u2", &id, patch).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));

        // Nothing was applied
        let doc = store.get(Collection::Posts, &id).await.unwrap().unwrap();
        assert_eq!(doc["title"], "old");
    }

    #[tokio::test]
    async fn admin_can_update_and_delete_any_post() {
        let store = test_store();
        seed_user(&store, "u1", Role::Member).await;
        seed_user(&store, "root", Role::Admin).await;
        let posts = PostService::new(store.clone(), None, Duration::from_secs(3600));
        let id = create(&posts, "u1", "T").await;

        let patch = PostPatch {
            title: Some("moderated".into()),
            ..Default::default()
        };
        posts.update_post("root", &id, patch).await.unwrap();

        posts.delete_post("root", &id).await.unwrap();
        assert_eq!(store.get(Collection::Posts, &id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_nonexistent_is_not_found() {
        let posts = PostService::new(test_store(), None, Duration::from_secs(3600));
        let err = posts.delete_post("u1", "missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn delete_by_non_owner_leaves_post_in_place() {
        let store = test_store();
        seed_user(&store, "u1", Role::Member).await;
        seed_user(&store, "u2", Role::Member).await;
        let posts = PostService::new(store.clone(), None, Duration::from_secs(3600));
        let id = create(&posts, "u1", "T").await;

        let err = posts.delete_post("u2", &id).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
        assert!(store.get(Collection::Posts, &id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn vote_applies_once_per_actor() {
        let store = test_store();
        let posts = PostService::new(store.clone(), None, Duration::from_secs(3600));
        let id = create(&posts, "u1", "T").await;

        posts.vote("u2", &id, VoteDirection::Up).await.unwrap();
        let doc = store.get(Collection::Posts, &id).await.unwrap().unwrap();
        assert_eq!(doc["voteCount"], 1);
        assert_eq!(doc["usersVote"], json!(["u2"]));

        // Second vote in either direction is rejected and changes nothing
        let err = posts.vote("u2", &id, VoteDirection::Up).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyVoted));
        let err = posts.vote("u2", &id, VoteDirection::Down).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyVoted));

        let doc = store.get(Collection::Posts, &id).await.unwrap().unwrap();
        assert_eq!(doc["voteCount"], 1);
        assert_eq!(doc["usersVote"], json!(["u2"]));
    }

    #[tokio::test]
    async fn vote_count_is_up_minus_down() {
        let store = test_store();
        let posts = PostService::new(store.clone(), None, Duration::from_secs(3600));
        let id = create(&posts, "u1", "T").await;

        posts.vote("a", &id, VoteDirection::Up).await.unwrap();
        posts.vote("b", &id, VoteDirection::Up).await.unwrap();
        posts.vote("c", &id, VoteDirection::Down).await.unwrap();

        let doc = store.get(Collection::Posts, &id).await.unwrap().unwrap();
        assert_eq!(doc["voteCount"], 1);
        assert_eq!(doc["usersVote"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn vote_count_can_go_negative() {
        let store = test_store();
        let posts = PostService::new(store.clone(), None, Duration::from_secs(3600));
        let id = create(&posts, "u1", "T").await;

        posts.vote("a", &id, VoteDirection::Down).await.unwrap();
        posts.vote("b", &id, VoteDirection::Down).await.unwrap();

        let doc = store.get(Collection::Posts, &id).await.unwrap().unwrap();
        assert_eq!(doc["voteCount"], -2);
    }

    #[tokio::test]
    async fn vote_on_missing_post_is_not_found() {
        let posts = PostService::new(test_store(), None, Duration::from_secs(3600));
        let err = posts
            .vote("u1", "missing", VoteDirection::Up)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn cached_listing_goes_stale_until_expiry() {
        let store = test_store();
        seed_user(&store, "u1", Role::Member).await;
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
        let posts = PostService::new(store.clone(), Some(cache), Duration::from_secs(3600));
        let id = create(&posts, "u1", "before").await;

        // Populate the all-posts key
        let resp = posts.get_posts(None).await.unwrap();
        assert_eq!(resp.data.unwrap()[0]["title"], "before");

        // Mutate the post; no invalidation happens on write
        let patch = PostPatch {
            title: Some("after".into()),
            ..Default::default()
        };
        posts.update_post("u1", &id, patch).await.unwrap();

        // Cached read still serves the pre-mutation title
        let resp = posts.get_posts(None).await.unwrap();
        assert_eq!(resp.data.unwrap()[0]["title"], "before");

        // The store itself is current
        let resp = posts.get_post_by_id(&id).await.unwrap();
        assert_eq!(resp.data.unwrap()["title"], "after");
    }

    #[tokio::test]
    async fn cached_listing_refreshes_after_ttl() {
        let store = test_store();
        seed_user(&store, "u1", Role::Member).await;
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
        let posts = PostService::new(store.clone(), Some(cache), Duration::from_millis(20));
        let id = create(&posts, "u1", "before").await;

        posts.get_posts(None).await.unwrap();
        let patch = PostPatch {
            title: Some("after".into()),
            ..Default::default()
        };
        posts.update_post("u1", &id, patch).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        let resp = posts.get_posts(None).await.unwrap();
        assert_eq!(resp.data.unwrap()[0]["title"], "after");
    }

    #[tokio::test]
    async fn category_and_user_listings_use_separate_keys() {
        let store = test_store();
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
        let posts = PostService::new(store.clone(), Some(cache.clone()), Duration::from_secs(3600));
        create(&posts, "u1", "T").await;

        posts.get_posts(None).await.unwrap();
        posts.get_posts(Some("c1")).await.unwrap();
        posts.get_posts_by_user("u1").await.unwrap();

        assert!(cache.get("posts").await.is_some());
        assert!(cache.get("posts:category:c1").await.is_some());
        assert!(cache.get("posts:user:u1").await.is_some());
    }
}

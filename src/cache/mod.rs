pub mod memory;

pub use memory::MemoryCache;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::AppResult;

/// Expiring key-value cache capability. Implementations are expected to be
/// infallible; an unavailable backend should read as a miss.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Look up a key. Expired entries read as a miss.
    async fn get(&self, key: &str) -> Option<String>;

    /// Store a value under a key for the given lifetime.
    async fn set(&self, key: &str, value: String, ttl: Duration);
}

/// The cache key space. Writes never purge these keys: entries go stale
/// until their TTL runs out, which is the documented consistency trade-off.
pub mod keys {
    pub const ALL_POSTS: &str = "posts";
    pub const ALL_USERS: &str = "users";

    pub fn posts_by_category(category: &str) -> String {
        format!("posts:category:{}", category)
    }

    pub fn posts_by_user(user_id: &str) -> String {
        format!("posts:user:{}", user_id)
    }

    pub fn comments_by_post(post_id: &str) -> String {
        format!("comments:post:{}", post_id)
    }
}

/// Read-through: serve from cache when possible, otherwise run the loader
/// against the authoritative store and populate the cache with the result.
/// A `None` cache handle degrades to always calling the loader.
pub async fn read_through<T, F, Fut>(
    cache: Option<&Arc<dyn Cache>>,
    key: &str,
    ttl: Duration,
    loader: F,
) -> AppResult<Vec<T>>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = AppResult<Vec<T>>>,
{
    let Some(cache) = cache else {
        return loader().await;
    };

    if let Some(cached) = cache.get(key).await {
        match serde_json::from_str(&cached) {
            Ok(values) => return Ok(values),
            // Undecodable entries fall through to a fresh load that overwrites them.
            Err(e) => tracing::warn!("Discarding bad cache entry under {}: {}", key, e),
        }
    }

    let fresh = loader().await?;
    cache
        .set(key, serde_json::to_string(&fresh)?, ttl)
        .await;
    Ok(fresh)
}

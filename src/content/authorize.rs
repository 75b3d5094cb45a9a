use crate::content::model::{Role, User};
use crate::error::{AppError, AppResult};
use crate::store::{Collection, DynStore};

/// Ownership rule: admins may mutate anything, everyone else only what they
/// created.
pub fn can_mutate(role: Role, actor_id: &str, created_by: &str) -> bool {
    role == Role::Admin || actor_id == created_by
}

/// Look up the actor's role in the store and apply the ownership rule.
/// The role is read fresh on every call, never from cache, so a role change
/// takes effect immediately.
pub async fn authorize(store: &DynStore, actor_id: &str, created_by: &str) -> AppResult<()> {
    let role = match store.get(Collection::Users, actor_id).await? {
        Some(doc) => serde_json::from_value::<User>(doc)?.role,
        // Unknown actors hold no role; ownership can still match.
        None => Role::Member,
    };

    if can_mutate(role, actor_id, created_by) {
        Ok(())
    } else {
        tracing::warn!("Actor {} denied mutation of entity by {}", actor_id, created_by);
        Err(AppError::Unauthorized)
    }
}

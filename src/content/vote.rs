use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::content::model::Votable;
use crate::error::{AppError, AppResult};
use crate::store::{Collection, DocumentUpdate, DynStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub fn delta(self) -> i64 {
        match self {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
        }
    }
}

/// One vote per actor per entity, ever; there is no retraction or flip.
/// The count increment and the voter registration land in a single
/// per-document update; the duplicate check before it is best-effort, the
/// store's document atomicity is the real ordering primitive.
pub async fn apply_vote<E>(
    store: &DynStore,
    collection: Collection,
    id: &str,
    actor_id: &str,
    direction: VoteDirection,
) -> AppResult<()>
where
    E: Votable + DeserializeOwned,
{
    let doc = store
        .get(collection, id)
        .await?
        .ok_or(AppError::NotFound)?;
    let entity: E = serde_json::from_value(doc)?;

    if entity.users_vote().iter().any(|voter| voter == actor_id) {
        return Err(AppError::AlreadyVoted);
    }

    let update = DocumentUpdate::new()
        .increment("voteCount", direction.delta())
        .add_to_set("usersVote", json!(actor_id))
        .set("updatedAt", json!(Utc::now()));

    // Deleted between fetch and update: surface as not found.
    if !store.apply(collection, id, &update).await? {
        return Err(AppError::NotFound);
    }

    tracing::info!(
        "Recorded {:?} vote by {} on {} {}",
        direction,
        actor_id,
        collection.table(),
        id
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_are_unit_sized() {
        assert_eq!(VoteDirection::Up.delta(), 1);
        assert_eq!(VoteDirection::Down.delta(), -1);
    }
}

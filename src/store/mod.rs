// Document store capability - isolates all persistence side effects
pub mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The three document collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Users,
    Posts,
    Comments,
}

impl Collection {
    pub fn table(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Posts => "posts",
            Collection::Comments => "comments",
        }
    }
}

/// Query predicate for `find`. Matches against fields of the JSON document.
#[derive(Debug, Clone)]
pub enum Filter {
    All,
    /// Field equals value.
    Eq(&'static str, Value),
    /// Array field contains value.
    Contains(&'static str, Value),
}

impl Filter {
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, value) => doc.get(*field) == Some(value),
            Filter::Contains(field, value) => doc
                .get(*field)
                .and_then(Value::as_array)
                .map(|items| items.contains(value))
                .unwrap_or(false),
        }
    }
}

/// Partial update of one document. All parts apply atomically: `set`
/// overwrites fields, `increment` adds signed deltas to numeric fields,
/// `add_to_set` appends values to array fields unless already present.
#[derive(Debug, Clone, Default)]
pub struct DocumentUpdate {
    set: Vec<(String, Value)>,
    increment: Vec<(String, i64)>,
    add_to_set: Vec<(String, Value)>,
}

impl DocumentUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &str, value: Value) -> Self {
        self.set.push((field.to_string(), value));
        self
    }

    pub fn increment(mut self, field: &str, delta: i64) -> Self {
        self.increment.push((field.to_string(), delta));
        self
    }

    pub fn add_to_set(mut self, field: &str, value: Value) -> Self {
        self.add_to_set.push((field.to_string(), value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.increment.is_empty() && self.add_to_set.is_empty()
    }

    /// Apply this update to a document in place. Missing numeric fields count
    /// from zero; missing array fields start empty.
    pub fn apply_to(&self, doc: &mut Value) {
        let Some(map) = doc.as_object_mut() else {
            return;
        };

        for (field, value) in &self.set {
            map.insert(field.clone(), value.clone());
        }

        for (field, delta) in &self.increment {
            let current = map.get(field).and_then(Value::as_i64).unwrap_or(0);
            map.insert(field.clone(), Value::from(current + delta));
        }

        for (field, value) in &self.add_to_set {
            let entry = map
                .entry(field.clone())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Some(items) = entry.as_array_mut() {
                if !items.contains(value) {
                    items.push(value.clone());
                }
            }
        }
    }
}

/// Store trait - all document operations
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Load a document by id.
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError>;

    /// Load all documents matching the filter, in insertion order.
    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<(String, Value)>, StoreError>;

    /// Insert a new document under the given id.
    async fn insert(&self, collection: Collection, id: &str, doc: &Value)
        -> Result<(), StoreError>;

    /// Apply a partial update atomically. Returns false if the document
    /// does not exist.
    async fn apply(
        &self,
        collection: Collection,
        id: &str,
        update: &DocumentUpdate,
    ) -> Result<bool, StoreError>;

    /// Delete a document. Returns false if it did not exist.
    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError>;
}

/// Type alias for Arc-wrapped store (for AppState)
pub type DynStore = Arc<dyn DocumentStore>;

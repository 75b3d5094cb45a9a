use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use serde_json::Value;
use std::path::Path;

use super::{Collection, DocumentStore, DocumentUpdate, Filter, StoreError};

pub type DbPool = Pool<SqliteConnectionManager>;

const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial",
    include_str!("../../migrations/001_initial.sql"),
)];

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let manager = SqliteConnectionManager::file(db_path);
    let pool = Pool::builder().max_size(8).build(manager)?;

    // Configure SQLite for performance
    let conn = pool.get()?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    // Create migrations tracking table
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

/// SQLite implementation. Documents live as JSON text in one table per
/// collection; predicates evaluate against the parsed JSON.
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError> {
        let conn = self.pool.get()?;

        let result: Result<String, rusqlite::Error> = conn.query_row(
            &format!("SELECT doc FROM {} WHERE id = ?1", collection.table()),
            params![id],
            |row| row.get(0),
        );

        match result {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT id, doc FROM {} ORDER BY rowid",
            collection.table()
        ))?;
        let rows: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut docs = Vec::new();
        for (id, json) in rows {
            let doc: Value = serde_json::from_str(&json)?;
            if filter.matches(&doc) {
                docs.push((id, doc));
            }
        }

        Ok(docs)
    }

    async fn insert(
        &self,
        collection: Collection,
        id: &str,
        doc: &Value,
    ) -> Result<(), StoreError> {
        let conn = self.pool.get()?;

        conn.execute(
            &format!(
                "INSERT INTO {} (id, doc, updated_at) VALUES (?1, ?2, datetime('now'))",
                collection.table()
            ),
            params![id, serde_json::to_string(doc)?],
        )?;

        Ok(())
    }

    async fn apply(
        &self,
        collection: Collection,
        id: &str,
        update: &DocumentUpdate,
    ) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let table = collection.table();

        // Read-modify-write inside one transaction: this is the per-document
        // atomicity the vote counter relies on.
        conn.execute("BEGIN IMMEDIATE", [])?;

        let result: Result<bool, StoreError> = (|| {
            let row: Result<String, rusqlite::Error> = conn.query_row(
                &format!("SELECT doc FROM {} WHERE id = ?1", table),
                params![id],
                |row| row.get(0),
            );

            let json = match row {
                Ok(json) => json,
                Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(false),
                Err(e) => return Err(e.into()),
            };

            let mut doc: Value = serde_json::from_str(&json)?;
            update.apply_to(&mut doc);

            conn.execute(
                &format!(
                    "UPDATE {} SET doc = ?2, updated_at = datetime('now') WHERE id = ?1",
                    table
                ),
                params![id, serde_json::to_string(&doc)?],
            )?;

            Ok(true)
        })();

        match result {
            Ok(found) => {
                conn.execute("COMMIT", [])?;
                Ok(found)
            }
            Err(e) => {
                conn.execute("ROLLBACK", [])?;
                Err(e)
            }
        }
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;

        let rows = conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", collection.table()),
            params![id],
        )?;

        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_store() -> SqliteStore {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).unwrap();
        run_migrations(&pool).unwrap();
        SqliteStore::new(pool)
    }

    #[test]
    fn create_pool_creates_db_file() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("sub/dir/test.db");
        let pool = create_pool(&db_path).unwrap();
        assert!(db_path.exists());
        let conn = pool.get().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn migrations_are_idempotent() {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).unwrap();
        run_migrations(&pool).unwrap();
        run_migrations(&pool).unwrap(); // Should not error on second run

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn migrations_create_collection_tables() {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).unwrap();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .filter_map(|r| r.ok())
                .collect()
        };
        assert!(tables.contains(&"users".to_string()));
        assert!(tables.contains(&"posts".to_string()));
        assert!(tables.contains(&"comments".to_string()));
    }

    #[tokio::test]
    async fn insert_and_get_round_trip() {
        let store = test_store();
        let doc = json!({"id": "p1", "title": "T", "voteCount": 0});

        store.insert(Collection::Posts, "p1", &doc).await.unwrap();

        let loaded = store.get(Collection::Posts, "p1").await.unwrap();
        assert_eq!(loaded, Some(doc));
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let store = test_store();
        let loaded = store.get(Collection::Posts, "nope").await.unwrap();
        assert_eq!(loaded, None);
    }

    #[tokio::test]
    async fn find_filters_by_predicate() {
        let store = test_store();
        store
            .insert(
                Collection::Posts,
                "p1",
                &json!({"createdBy": "u1", "categories": ["rust"]}),
            )
            .await
            .unwrap();
        store
            .insert(
                Collection::Posts,
                "p2",
                &json!({"createdBy": "u2", "categories": ["news"]}),
            )
            .await
            .unwrap();

        let all = store.find(Collection::Posts, &Filter::All).await.unwrap();
        assert_eq!(all.len(), 2);

        let by_user = store
            .find(Collection::Posts, &Filter::Eq("createdBy", json!("u1")))
            .await
            .unwrap();
        assert_eq!(by_user.len(), 1);
        assert_eq!(by_user[0].0, "p1");

        let by_category = store
            .find(
                Collection::Posts,
                &Filter::Contains("categories", json!("news")),
            )
            .await
            .unwrap();
        assert_eq!(by_category.len(), 1);
        assert_eq!(by_category[0].0, "p2");
    }

    #[tokio::test]
    async fn find_preserves_insertion_order() {
        let store = test_store();
        for i in 0..5 {
            store
                .insert(Collection::Posts, &format!("p{}", i), &json!({"n": i}))
                .await
                .unwrap();
        }

        let all = store.find(Collection::Posts, &Filter::All).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["p0", "p1", "p2", "p3", "p4"]);
    }

    #[tokio::test]
    async fn apply_updates_document() {
        let store = test_store();
        store
            .insert(
                Collection::Posts,
                "p1",
                &json!({"title": "old", "voteCount": 0, "usersVote": []}),
            )
            .await
            .unwrap();

        let update = DocumentUpdate::new()
            .set("title", json!("new"))
            .increment("voteCount", 1)
            .add_to_set("usersVote", json!("u1"));
        let found = store.apply(Collection::Posts, "p1", &update).await.unwrap();
        assert!(found);

        let doc = store.get(Collection::Posts, "p1").await.unwrap().unwrap();
        assert_eq!(doc["title"], "new");
        assert_eq!(doc["voteCount"], 1);
        assert_eq!(doc["usersVote"], json!(["u1"]));
    }

    #[tokio::test]
    async fn apply_to_missing_returns_false() {
        let store = test_store();
        let update = DocumentUpdate::new().set("title", json!("new"));
        let found = store
            .apply(Collection::Posts, "nope", &update)
            .await
            .unwrap();
        assert!(!found);
    }

    #[tokio::test]
    async fn sequential_increments_accumulate() {
        let store = test_store();
        store
            .insert(Collection::Posts, "p1", &json!({"voteCount": 0}))
            .await
            .unwrap();

        for _ in 0..3 {
            let update = DocumentUpdate::new().increment("voteCount", 1);
            store.apply(Collection::Posts, "p1", &update).await.unwrap();
        }
        let update = DocumentUpdate::new().increment("voteCount", -1);
        store.apply(Collection::Posts, "p1", &update).await.unwrap();

        let doc = store.get(Collection::Posts, "p1").await.unwrap().unwrap();
        assert_eq!(doc["voteCount"], 2);
    }

    #[tokio::test]
    async fn delete_removes_document() {
        let store = test_store();
        store
            .insert(Collection::Comments, "c1", &json!({"description": "d"}))
            .await
            .unwrap();

        assert!(store.delete(Collection::Comments, "c1").await.unwrap());
        assert_eq!(store.get(Collection::Comments, "c1").await.unwrap(), None);

        // Delete again should return false
        assert!(!store.delete(Collection::Comments, "c1").await.unwrap());
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let store = test_store();
        store
            .insert(Collection::Posts, "x", &json!({"kind": "post"}))
            .await
            .unwrap();
        store
            .insert(Collection::Comments, "x", &json!({"kind": "comment"}))
            .await
            .unwrap();

        let post = store.get(Collection::Posts, "x").await.unwrap().unwrap();
        let comment = store.get(Collection::Comments, "x").await.unwrap().unwrap();
        assert_eq!(post["kind"], "post");
        assert_eq!(comment["kind"], "comment");
    }
}

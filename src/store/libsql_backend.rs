//! libSQL identity store — async `IdentityStore` implementation.
//!
//! Supports local file and in-memory databases. `create_mapping` relies on
//! `INSERT OR IGNORE` plus the affected-row count for its check-and-set, so
//! concurrent initiations for the same user resolve at the store, not in
//! application code.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database, params};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::store::migrations;
use crate::store::traits::{CreateMapping, IdentityStore};

/// libSQL-backed identity store.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<Database>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Open(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to open database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Identity store opened");

        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Create an in-memory store (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to create in-memory database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;

        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }
}

#[async_trait]
impl IdentityStore for LibSqlStore {
    async fn topic_for_user(&self, user_id: i64) -> Result<Option<i64>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT topic_id FROM user_topics WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("topic_for_user: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let topic_id: i64 = row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("topic_for_user row parse: {e}")))?;
                Ok(Some(topic_id))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("topic_for_user: {e}"))),
        }
    }

    async fn create_mapping(
        &self,
        user_id: i64,
        topic_id: i64,
    ) -> Result<CreateMapping, StoreError> {
        // Single atomic check-and-set: the insert is ignored when the user
        // is already mapped, and the affected-row count tells us which side
        // of the race we were on.
        let affected = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO user_topics (user_id, topic_id, created_at) VALUES (?1, ?2, ?3)",
                params![user_id, topic_id, Utc::now().to_rfc3339()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("create_mapping: {e}")))?;

        if affected == 0 {
            debug!(user_id, "Mapping already exists");
            Ok(CreateMapping::AlreadyExists)
        } else {
            debug!(user_id, topic_id, "Mapping created");
            Ok(CreateMapping::Created)
        }
    }

    async fn user_for_topic(&self, topic_id: i64) -> Result<Option<i64>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT user_id FROM user_topics WHERE topic_id = ?1",
                params![topic_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("user_for_topic: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let user_id: i64 = row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("user_for_topic row parse: {e}")))?;
                Ok(Some(user_id))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("user_for_topic: {e}"))),
        }
    }

    async fn is_banned(&self, user_id: i64) -> Result<bool, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT 1 FROM banned_users WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("is_banned: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("is_banned: {e}")))?;
        Ok(row.is_some())
    }

    async fn set_banned(&self, user_id: i64, banned: bool) -> Result<(), StoreError> {
        if banned {
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO banned_users (user_id, banned_at) VALUES (?1, ?2)",
                    params![user_id, Utc::now().to_rfc3339()],
                )
                .await
                .map_err(|e| StoreError::Query(format!("set_banned: {e}")))?;
        } else {
            self.conn
                .execute(
                    "DELETE FROM banned_users WHERE user_id = ?1",
                    params![user_id],
                )
                .await
                .map_err(|e| StoreError::Query(format!("set_banned: {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> LibSqlStore {
        LibSqlStore::new_memory().await.unwrap()
    }

    #[tokio::test]
    async fn mapping_roundtrip() {
        let store = test_store().await;

        assert_eq!(store.topic_for_user(42).await.unwrap(), None);

        let outcome = store.create_mapping(42, 1001).await.unwrap();
        assert_eq!(outcome, CreateMapping::Created);

        assert_eq!(store.topic_for_user(42).await.unwrap(), Some(1001));
        assert_eq!(store.user_for_topic(1001).await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn second_create_reports_already_exists() {
        let store = test_store().await;

        assert_eq!(
            store.create_mapping(42, 1001).await.unwrap(),
            CreateMapping::Created
        );
        assert_eq!(
            store.create_mapping(42, 2002).await.unwrap(),
            CreateMapping::AlreadyExists
        );

        // The original mapping is untouched
        assert_eq!(store.topic_for_user(42).await.unwrap(), Some(1001));
        assert_eq!(store.user_for_topic(2002).await.unwrap(), None);
    }

    #[tokio::test]
    async fn mappings_are_a_bijection() {
        let store = test_store().await;

        store.create_mapping(1, 1001).await.unwrap();
        store.create_mapping(2, 1002).await.unwrap();

        assert_ne!(
            store.topic_for_user(1).await.unwrap(),
            store.topic_for_user(2).await.unwrap()
        );
        assert_eq!(store.user_for_topic(1001).await.unwrap(), Some(1));
        assert_eq!(store.user_for_topic(1002).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn reverse_lookup_unknown_topic_is_absent() {
        let store = test_store().await;
        assert_eq!(store.user_for_topic(9999).await.unwrap(), None);
    }

    #[tokio::test]
    async fn ban_and_unban() {
        let store = test_store().await;

        assert!(!store.is_banned(42).await.unwrap());

        store.set_banned(42, true).await.unwrap();
        assert!(store.is_banned(42).await.unwrap());

        store.set_banned(42, false).await.unwrap();
        assert!(!store.is_banned(42).await.unwrap());
    }

    #[tokio::test]
    async fn ban_is_idempotent() {
        let store = test_store().await;

        store.set_banned(42, true).await.unwrap();
        store.set_banned(42, true).await.unwrap();
        assert!(store.is_banned(42).await.unwrap());

        store.set_banned(42, false).await.unwrap();
        store.set_banned(42, false).await.unwrap();
        assert!(!store.is_banned(42).await.unwrap());
    }

    #[tokio::test]
    async fn ban_keeps_mapping_intact() {
        let store = test_store().await;

        store.create_mapping(42, 1001).await.unwrap();
        store.set_banned(42, true).await.unwrap();

        // Un-banning resumes the same topic
        assert_eq!(store.topic_for_user(42).await.unwrap(), Some(1001));
        store.set_banned(42, false).await.unwrap();
        assert_eq!(store.topic_for_user(42).await.unwrap(), Some(1001));
    }

    #[tokio::test]
    async fn concurrent_creates_resolve_to_one_winner() {
        let store = Arc::new(test_store().await);

        let mut handles = Vec::new();
        for i in 0..8_i64 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.create_mapping(42, 1000 + i).await.unwrap()
            }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap() == CreateMapping::Created {
                created += 1;
            }
        }
        assert_eq!(created, 1);

        // The surviving topic is one of the candidates and reverse-maps back
        let topic = store.topic_for_user(42).await.unwrap().unwrap();
        assert!((1000..1008).contains(&topic));
        assert_eq!(store.user_for_topic(topic).await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn local_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.db");

        {
            let store = LibSqlStore::new_local(&path).await.unwrap();
            store.create_mapping(42, 1001).await.unwrap();
            store.set_banned(42, true).await.unwrap();
        }

        let store = LibSqlStore::new_local(&path).await.unwrap();
        assert_eq!(store.topic_for_user(42).await.unwrap(), Some(1001));
        assert!(store.is_banned(42).await.unwrap());
    }
}

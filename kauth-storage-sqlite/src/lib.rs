//! SQLite storage backend for kauth
//!
//! [`SqliteStore`] implements [`KeyValueStore`] over a single `kv_store`
//! table, so ledger state persists across processes.
//!
//! ```rust,no_run
//! use kauth_storage_sqlite::SqliteStore;
//!
//! # async fn run() -> Result<(), kauth_core::Error> {
//! let store = SqliteStore::connect("sqlite://kauth.db?mode=rwc").await?;
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

pub mod migrations;

use async_trait::async_trait;
use chrono::Utc;
use kauth_core::{
    Error,
    error::{StorageError, utilities::DatabaseResultExt},
    storage::KeyValueStore,
};
use sqlx::SqlitePool;

use migrations::{MigrationRecord, SqliteMigrationManager};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool for `database_url`, e.g. `sqlite::memory:` or
    /// `sqlite://kauth.db?mode=rwc`.
    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        let pool = SqlitePool::connect(database_url)
            .await
            .map_db_err_with_context("Failed to connect to SQLite")?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> Result<(), Error> {
        let manager = SqliteMigrationManager::new(self.pool.clone());
        manager.initialize().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to initialize migrations");
            StorageError::Migration("Failed to initialize migrations".to_string())
        })?;

        manager.up(&migrations::all()).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            StorageError::Migration("Failed to run migrations".to_string())
        })?;

        Ok(())
    }

    pub async fn applied_migrations(&self) -> Result<Vec<MigrationRecord>, Error> {
        SqliteMigrationManager::new(self.pool.clone())
            .applied_migrations()
            .await
            .map_err(|e| StorageError::Migration(e.to_string()).into())
    }

    /// Stored keys in lexical order.
    pub async fn keys(&self) -> Result<Vec<String>, Error> {
        sqlx::query_scalar::<_, String>("SELECT key FROM kv_store ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .map_db_err_with_context("Failed to list keys")
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        sqlx::query_scalar::<_, String>("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_db_err_with_context(&format!("Failed to read {key}"))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_db_err_with_context(&format!("Failed to write {key}"))?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_db_err_with_context(&format!("Failed to remove {key}"))?;

        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_db_err()?;
        Ok(())
    }
}

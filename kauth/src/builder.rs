//! Builder for [`Kauth`] instances
//!
//! Storage has to be chosen before the builder can build; the type state
//! enforces it at compile time.
//!
//! ```rust,no_run
//! use kauth::{AuthMethod, KauthBuilder, LedgerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let kauth = KauthBuilder::new()
//!         .with_sqlite("sqlite::memory:")
//!         .await?
//!         .with_config(LedgerConfig::default().auth_method(AuthMethod::Jwt))
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     kauth.ledger().login("demo@kauth.dev", "password123").await;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use kauth_core::{AuthLedger, KeyValueStore, LedgerConfig};
use kauth_storage_sqlite::SqliteStore;
use sqlx::SqlitePool;

use crate::Kauth;

/// Errors that can occur when building a [`Kauth`] instance.
#[derive(Debug, thiserror::Error)]
pub enum KauthBuilderError {
    #[error("Storage connection failed: {0}")]
    StorageConnection(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// No storage configured yet.
pub struct NoStorage;

/// Storage configured; ready to build.
pub struct WithStorage<S: KeyValueStore> {
    store: Arc<S>,
    /// Set when the store is SQLite-backed and has a schema to migrate.
    sqlite: Option<SqliteStore>,
}

pub struct KauthBuilder<Storage> {
    storage: Storage,
    config: LedgerConfig,
    apply_migrations: bool,
}

impl Default for KauthBuilder<NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl KauthBuilder<NoStorage> {
    /// Defaults: [`LedgerConfig::default`], migrations not applied.
    pub fn new() -> Self {
        Self {
            storage: NoStorage,
            config: LedgerConfig::default(),
            apply_migrations: false,
        }
    }

    /// Connect to SQLite at `url`, e.g. `sqlite::memory:` or `sqlite://kauth.db?mode=rwc`.
    pub async fn with_sqlite(
        self,
        url: &str,
    ) -> Result<KauthBuilder<WithStorage<SqliteStore>>, KauthBuilderError> {
        let pool = SqlitePool::connect(url)
            .await
            .map_err(|e| KauthBuilderError::StorageConnection(e.to_string()))?;
        Ok(self.with_sqlite_pool(pool))
    }

    /// Use an existing SQLite pool.
    pub fn with_sqlite_pool(self, pool: SqlitePool) -> KauthBuilder<WithStorage<SqliteStore>> {
        KauthBuilder {
            storage: WithStorage {
                store: Arc::new(SqliteStore::new(pool.clone())),
                sqlite: Some(SqliteStore::new(pool)),
            },
            config: self.config,
            apply_migrations: self.apply_migrations,
        }
    }

    /// Use any [`KeyValueStore`]. Migrations do not apply.
    pub fn with_store<S: KeyValueStore>(self, store: Arc<S>) -> KauthBuilder<WithStorage<S>> {
        KauthBuilder {
            storage: WithStorage {
                store,
                sqlite: None,
            },
            config: self.config,
            apply_migrations: self.apply_migrations,
        }
    }
}

impl<Storage> KauthBuilder<Storage> {
    pub fn with_config(mut self, config: LedgerConfig) -> Self {
        self.config = config;
        self
    }

    /// Run pending migrations during [`build`](KauthBuilder::build).
    pub fn apply_migrations(mut self, apply: bool) -> Self {
        self.apply_migrations = apply;
        self
    }
}

impl<S: KeyValueStore> KauthBuilder<WithStorage<S>> {
    pub async fn build(self) -> Result<Kauth<S>, KauthBuilderError> {
        if self.apply_migrations {
            if let Some(sqlite) = &self.storage.sqlite {
                sqlite
                    .migrate()
                    .await
                    .map_err(|e| KauthBuilderError::Migration(e.to_string()))?;
            }
        }

        let store = self.storage.store;
        let ledger = AuthLedger::open(store.clone(), self.config)
            .await
            .map_err(|e| KauthBuilderError::InvalidConfiguration(e.to_string()))?;

        Ok(Kauth {
            store,
            sqlite: self.storage.sqlite,
            ledger,
        })
    }
}

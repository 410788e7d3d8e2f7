//! kauth: an authentication ledger.
//!
//! kauth counts failed logins per source address, bans an address after three
//! consecutive failures, keeps a capped audit log of authentication events and
//! issues one credential artifact per successful login: a session record, an
//! HS256-signed JWT, or a token carried in the navigation URL.
//!
//! # Example
//!
//! ```rust,no_run
//! use kauth::{AuthMethod, KauthBuilder, LedgerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let kauth = KauthBuilder::new()
//!         .with_sqlite("sqlite://kauth.db?mode=rwc")
//!         .await?
//!         .with_config(LedgerConfig::default().auth_method(AuthMethod::Jwt))
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     let ledger = kauth.ledger();
//!     if !ledger.check_auth_state().await {
//!         ledger.login("demo@kauth.dev", "password123").await;
//!     }
//!     for entry in ledger.logs().await {
//!         println!("{} {} {}", entry.timestamp, entry.kind, entry.address);
//!     }
//!     Ok(())
//! }
//! ```

pub mod builder;

use std::sync::Arc;

pub use builder::{KauthBuilder, KauthBuilderError};
pub use kauth_core::{
    ArtifactState, AuditLog, AuthLedger, AuthMethod, Ban, ClientContext, Credentials,
    DemoAccount, Error, Event, EventBus, EventHandler, JwtConfig, KeyValueStore, LedgerConfig,
    LogEntry, LogKind, MemoryStore, Principal, PrincipalId, Role, SecurityTest, TokenClaims,
};
pub use kauth_core::{audit, auth};
pub use kauth_storage_sqlite::SqliteStore;

/// A ledger together with the store it persists to.
pub struct Kauth<S: KeyValueStore> {
    store: Arc<S>,
    sqlite: Option<SqliteStore>,
    ledger: AuthLedger<S>,
}

impl<S: KeyValueStore> Kauth<S> {
    pub fn ledger(&self) -> &AuthLedger<S> {
        &self.ledger
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn health_check(&self) -> Result<(), Error> {
        self.store.health_check().await
    }

    /// Apply pending migrations. A no-op for stores without a schema.
    pub async fn migrate(&self) -> Result<(), Error> {
        match &self.sqlite {
            Some(sqlite) => sqlite.migrate().await,
            None => {
                tracing::debug!("Store has no migrations");
                Ok(())
            }
        }
    }
}

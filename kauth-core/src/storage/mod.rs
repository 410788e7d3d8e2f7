//! Key-value storage
//!
//! Everything the ledger persists goes through [`KeyValueStore`]: string keys
//! mapped to string values, the same shape as browser local storage. Each call
//! is an independent write; there is no transactional grouping.

pub mod memory;

use async_trait::async_trait;

use crate::Error;

pub use memory::MemoryStore;

/// Storage keys used by the ledger and the artifact providers.
pub mod keys {
    /// Audit log, JSON array, newest first.
    pub const LOGS: &str = "kauth_logs";
    /// Ban records, JSON array.
    pub const BANNED_IPS: &str = "kauth_banned_ips";
    /// Failed attempts per address, JSON object.
    pub const FAILED_ATTEMPTS: &str = "kauth_failed_attempts";
    /// Session record artifact.
    pub const SESSION: &str = "kauth_session";
    /// Signed JWT artifact.
    pub const JWT: &str = "kauth_jwt";
    /// Hashed URL token record.
    pub const URL_TOKEN: &str = "kauth_url_token";
    /// Current navigation URL, which carries the URL token as a query parameter.
    pub const LOCATION: &str = "kauth_location";
    /// Hex-encoded HS256 secret, generated when none is configured.
    pub const JWT_SECRET: &str = "kauth_jwt_secret";
}

#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Read a value. Missing keys are `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Insert or replace a value.
    async fn set(&self, key: &str, value: &str) -> Result<(), Error>;

    /// Remove a key. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), Error>;

    /// Check the backend is reachable.
    async fn health_check(&self) -> Result<(), Error> {
        Ok(())
    }
}

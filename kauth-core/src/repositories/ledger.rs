//! Persistence of the ledger's three collections: the audit log, the ban set
//! and the failed-attempt counters.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::{
    Error,
    audit::AuditLog,
    ban::{AttemptCounter, BanList},
    error::StorageError,
    storage::{KeyValueStore, keys},
};

use super::{read_json, write_json};

/// Everything the ledger loads on start.
#[derive(Debug, Clone, Default)]
pub struct LedgerSnapshot {
    pub logs: AuditLog,
    pub bans: BanList,
    pub attempts: AttemptCounter,
    pub unsynced: Unsynced,
}

/// Collections that could not be read from the store. Their stored value is
/// unknown, so they must not be written until a later read succeeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unsynced {
    pub logs: bool,
    pub bans: bool,
    pub attempts: bool,
}

impl Unsynced {
    pub fn any(&self) -> bool {
        self.logs || self.bans || self.attempts
    }
}

/// Repository for ledger state stored in a [`KeyValueStore`].
pub struct LedgerRepository<S: KeyValueStore> {
    store: Arc<S>,
}

impl<S: KeyValueStore> LedgerRepository<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Stored audit log. A corrupt value loads as empty; only store failures
    /// are returned.
    pub async fn load_logs(&self) -> Result<AuditLog, Error> {
        let mut logs: AuditLog = self.load_or_empty(keys::LOGS).await?;
        logs.enforce_capacity();
        Ok(logs)
    }

    pub async fn save_logs(&self, logs: &AuditLog) -> Result<(), Error> {
        write_json(self.store.as_ref(), keys::LOGS, logs).await
    }

    pub async fn clear_logs(&self) -> Result<(), Error> {
        self.store.remove(keys::LOGS).await
    }

    pub async fn load_bans(&self) -> Result<BanList, Error> {
        self.load_or_empty(keys::BANNED_IPS).await
    }

    pub async fn save_bans(&self, bans: &BanList) -> Result<(), Error> {
        write_json(self.store.as_ref(), keys::BANNED_IPS, bans).await
    }

    pub async fn load_attempts(&self) -> Result<AttemptCounter, Error> {
        self.load_or_empty(keys::FAILED_ATTEMPTS).await
    }

    pub async fn save_attempts(&self, attempts: &AttemptCounter) -> Result<(), Error> {
        write_json(self.store.as_ref(), keys::FAILED_ATTEMPTS, attempts).await
    }

    async fn load_or_empty<T>(&self, key: &str) -> Result<T, Error>
    where
        T: DeserializeOwned + Default,
    {
        match read_json(self.store.as_ref(), key).await {
            Ok(value) => Ok(value.unwrap_or_default()),
            Err(Error::Storage(StorageError::Serialization(e))) => {
                tracing::warn!(key, error = %e, "Discarding unreadable collection");
                Ok(T::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Load all three collections. A collection the store could not return
    /// starts empty and is flagged in [`LedgerSnapshot::unsynced`].
    pub async fn load_snapshot(&self) -> LedgerSnapshot {
        let mut unsynced = Unsynced::default();

        let logs = self.load_logs().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Audit log unavailable");
            unsynced.logs = true;
            AuditLog::default()
        });
        let bans = self.load_bans().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Ban list unavailable");
            unsynced.bans = true;
            BanList::default()
        });
        let attempts = self.load_attempts().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Attempt counters unavailable");
            unsynced.attempts = true;
            AttemptCounter::default()
        });

        LedgerSnapshot {
            logs,
            bans,
            attempts,
            unsynced,
        }
    }
}

//! Session record provider
//!
//! Stores a server-side style session record under `kauth_session`. The record
//! carries the principal, so restoring it needs no other lookup.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    auth::{AuthMethod, ClientContext},
    error::{SessionError, StorageError},
    id::{generate_prefixed_id, validate_prefixed_id},
    principal::Principal,
    repositories::{read_json, write_json},
    storage::{KeyValueStore, keys},
};

use super::{ArtifactState, IssuedArtifact, RestoredArtifact, provider::ArtifactProvider};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub principal: Principal,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub ip_address: String,
    pub user_agent: String,
    pub active: bool,
}

pub struct SessionRecordProvider<S: KeyValueStore> {
    store: Arc<S>,
}

impl<S: KeyValueStore> SessionRecordProvider<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The stored record, if any, without evaluating expiry.
    pub async fn record(&self) -> Result<Option<SessionRecord>, Error> {
        read_json(self.store.as_ref(), keys::SESSION)
            .await
            .map_err(|e| match e {
                Error::Storage(StorageError::Serialization(msg)) => {
                    SessionError::InvalidToken(format!("Malformed session record: {msg}")).into()
                }
                other => other,
            })
    }
}

#[async_trait]
impl<S: KeyValueStore> ArtifactProvider for SessionRecordProvider<S> {
    fn method(&self) -> AuthMethod {
        AuthMethod::Session
    }

    async fn issue(
        &self,
        principal: &Principal,
        client: &ClientContext,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<IssuedArtifact, Error> {
        let record = SessionRecord {
            id: generate_prefixed_id("sess"),
            principal: principal.clone(),
            created_at: issued_at,
            expires_at: issued_at + ttl,
            ip_address: client.address.clone(),
            user_agent: client.user_agent.clone(),
            active: true,
        };

        write_json(self.store.as_ref(), keys::SESSION, &record).await?;

        Ok(IssuedArtifact {
            method: AuthMethod::Session,
            token: record.id,
            issued_at,
            expires_at: record.expires_at,
        })
    }

    async fn restore(&self, now: DateTime<Utc>) -> Result<ArtifactState, Error> {
        let Some(record) = self.record().await? else {
            return Ok(ArtifactState::Absent);
        };

        if !validate_prefixed_id(&record.id, "sess") {
            return Err(SessionError::InvalidToken(format!(
                "Unexpected session id format: {}",
                record.id
            ))
            .into());
        }

        if !record.active {
            return Ok(ArtifactState::Absent);
        }

        Ok(ArtifactState::from_expiry(
            RestoredArtifact {
                principal: record.principal,
                expires_at: record.expires_at,
            },
            now,
        ))
    }

    async fn discard(&self) -> Result<(), Error> {
        self.store.remove(keys::SESSION).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        principal::{PrincipalId, Role},
        storage::MemoryStore,
    };

    fn principal() -> Principal {
        Principal::builder()
            .id(PrincipalId::new("1"))
            .email("demo@kauth.dev")
            .role(Role::Admin)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_issue_and_restore() {
        let store = Arc::new(MemoryStore::new());
        let provider = SessionRecordProvider::new(store);
        let now = Utc::now();

        let issued = provider
            .issue(&principal(), &ClientContext::default(), now, Duration::hours(1))
            .await
            .unwrap();
        assert!(issued.token.starts_with("sess_"));
        assert_eq!(issued.expires_at, now + Duration::seconds(3600));

        let record = provider.record().await.unwrap().unwrap();
        assert_eq!(record.ip_address, "192.168.1.100");
        assert!(record.active);

        match provider.restore(now).await.unwrap() {
            ArtifactState::Valid(restored) => {
                assert_eq!(restored.principal, principal());
                assert_eq!(restored.expires_at, issued.expires_at);
            }
            other => panic!("Expected valid session, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_expired_record() {
        let provider = SessionRecordProvider::new(Arc::new(MemoryStore::new()));
        let now = Utc::now();
        let issued = provider
            .issue(&principal(), &ClientContext::default(), now, Duration::hours(1))
            .await
            .unwrap();

        let state = provider.restore(issued.expires_at).await.unwrap();
        assert!(matches!(state, ArtifactState::Expired(_)));
    }

    #[tokio::test]
    async fn test_malformed_record_is_invalid_token() {
        let store = Arc::new(MemoryStore::new());
        store.set(keys::SESSION, "{\"user\": 1}").await.unwrap();
        let provider = SessionRecordProvider::new(store);

        let result = provider.restore(Utc::now()).await;
        assert!(matches!(
            result,
            Err(Error::Session(SessionError::InvalidToken(_)))
        ));
    }

    #[tokio::test]
    async fn test_discard() {
        let store = Arc::new(MemoryStore::new());
        let provider = SessionRecordProvider::new(store.clone());
        provider
            .issue(&principal(), &ClientContext::default(), Utc::now(), Duration::hours(1))
            .await
            .unwrap();

        provider.discard().await.unwrap();
        assert!(store.get(keys::SESSION).await.unwrap().is_none());
        assert_eq!(
            provider.restore(Utc::now()).await.unwrap(),
            ArtifactState::Absent
        );
    }
}

//! URL token provider
//!
//! The token travels as the `token` query parameter of the current navigation
//! URL (stored under `kauth_location`). Only the SHA256 hash of the token is
//! persisted, next to the principal and expiry, under `kauth_url_token`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    Error,
    auth::{AuthMethod, ClientContext},
    crypto::{generate_secure_token, hash_token, verify_token_hash},
    error::{SessionError, StorageError, ValidationError},
    principal::Principal,
    repositories::{read_json, write_json},
    storage::{KeyValueStore, keys},
};

use super::{ArtifactState, IssuedArtifact, RestoredArtifact, provider::ArtifactProvider};

/// Query parameter carrying the token.
pub const TOKEN_PARAM: &str = "token";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlTokenRecord {
    pub token_hash: String,
    pub principal: Principal,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub struct UrlTokenProvider<S: KeyValueStore> {
    store: Arc<S>,
    base_url: Url,
}

impl<S: KeyValueStore> UrlTokenProvider<S> {
    pub fn new(store: Arc<S>, base_url: Url) -> Self {
        Self { store, base_url }
    }

    /// The current navigation URL, falling back to the configured base URL.
    pub async fn location(&self) -> Result<Url, Error> {
        match self.store.get(keys::LOCATION).await? {
            Some(raw) => Url::parse(&raw).map_err(|e| {
                ValidationError::InvalidField(format!("Stored location is not a URL: {e}")).into()
            }),
            None => Ok(self.base_url.clone()),
        }
    }

    async fn set_location(&self, url: &Url) -> Result<(), Error> {
        self.store.set(keys::LOCATION, url.as_str()).await
    }

    /// The token currently carried by the navigation URL.
    pub async fn current_token(&self) -> Result<Option<String>, Error> {
        let location = self.location().await?;
        Ok(location
            .query_pairs()
            .find(|(key, _)| key == TOKEN_PARAM)
            .map(|(_, value)| value.into_owned()))
    }

    async fn record(&self) -> Result<Option<UrlTokenRecord>, Error> {
        read_json(self.store.as_ref(), keys::URL_TOKEN)
            .await
            .map_err(|e| match e {
                Error::Storage(StorageError::Serialization(msg)) => {
                    SessionError::InvalidToken(format!("Malformed URL token record: {msg}")).into()
                }
                other => other,
            })
    }
}

/// Return `url` with `token` set as the only value of [`TOKEN_PARAM`].
/// `None` strips the parameter. Other query parameters are kept in order.
pub fn with_token_param(url: &Url, token: Option<&str>) -> Url {
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != TOKEN_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut updated = url.clone();
    updated.set_query(None);
    if !retained.is_empty() || token.is_some() {
        let mut pairs = updated.query_pairs_mut();
        pairs.extend_pairs(retained);
        if let Some(token) = token {
            pairs.append_pair(TOKEN_PARAM, token);
        }
    }
    updated
}

#[async_trait]
impl<S: KeyValueStore> ArtifactProvider for UrlTokenProvider<S> {
    fn method(&self) -> AuthMethod {
        AuthMethod::UrlToken
    }

    async fn issue(
        &self,
        principal: &Principal,
        _client: &ClientContext,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<IssuedArtifact, Error> {
        let token = generate_secure_token();
        let record = UrlTokenRecord {
            token_hash: hash_token(&token),
            principal: principal.clone(),
            issued_at,
            expires_at: issued_at + ttl,
        };

        write_json(self.store.as_ref(), keys::URL_TOKEN, &record).await?;

        let location = with_token_param(&self.location().await?, Some(&token));
        self.set_location(&location).await?;

        Ok(IssuedArtifact {
            method: AuthMethod::UrlToken,
            token,
            issued_at,
            expires_at: record.expires_at,
        })
    }

    async fn restore(&self, now: DateTime<Utc>) -> Result<ArtifactState, Error> {
        let Some(token) = self.current_token().await? else {
            return Ok(ArtifactState::Absent);
        };

        let record = self.record().await?.ok_or(SessionError::NotFound)?;

        if !verify_token_hash(&token, &record.token_hash) {
            return Err(SessionError::InvalidToken("URL token does not match".to_string()).into());
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
        self.store.remove(keys::URL_TOKEN).await?;

        let location = self.location().await?;
        self.set_location(&with_token_param(&location, None)).await
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

    fn provider(store: Arc<MemoryStore>) -> UrlTokenProvider<MemoryStore> {
        UrlTokenProvider::new(store, Url::parse("http://localhost:5173/").unwrap())
    }

    #[test]
    fn test_with_token_param_keeps_other_params() {
        let url = Url::parse("http://localhost:5173/dashboard?tab=logs&token=old").unwrap();

        let replaced = with_token_param(&url, Some("new"));
        assert_eq!(replaced.as_str(), "http://localhost:5173/dashboard?tab=logs&token=new");

        let stripped = with_token_param(&url, None);
        assert_eq!(stripped.as_str(), "http://localhost:5173/dashboard?tab=logs");

        let bare = Url::parse("http://localhost:5173/?token=abc").unwrap();
        assert_eq!(with_token_param(&bare, None).as_str(), "http://localhost:5173/");
    }

    #[tokio::test]
    async fn test_issue_puts_token_in_location() {
        let store = Arc::new(MemoryStore::new());
        let provider = provider(store.clone());

        let issued = provider
            .issue(&principal(), &ClientContext::default(), Utc::now(), Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(provider.current_token().await.unwrap(), Some(issued.token.clone()));

        let stored = store.get(keys::URL_TOKEN).await.unwrap().unwrap();
        assert!(!stored.contains(&issued.token));
    }

    #[tokio::test]
    async fn test_restore_valid() {
        let provider = provider(Arc::new(MemoryStore::new()));
        let now = Utc::now();
        provider
            .issue(&principal(), &ClientContext::default(), now, Duration::hours(1))
            .await
            .unwrap();

        match provider.restore(now).await.unwrap() {
            ArtifactState::Valid(restored) => assert_eq!(restored.principal, principal()),
            other => panic!("Expected valid token, got {other:?}"),
        }
        assert!(matches!(
            provider.restore(now + Duration::hours(2)).await.unwrap(),
            ArtifactState::Expired(_)
        ));
    }

    #[tokio::test]
    async fn test_forged_token_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let provider = provider(store.clone());
        provider
            .issue(&principal(), &ClientContext::default(), Utc::now(), Duration::hours(1))
            .await
            .unwrap();

        store
            .set(keys::LOCATION, "http://localhost:5173/?token=demo-token-123")
            .await
            .unwrap();

        assert!(matches!(
            provider.restore(Utc::now()).await,
            Err(Error::Session(SessionError::InvalidToken(_)))
        ));
    }

    #[tokio::test]
    async fn test_token_without_record_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(keys::LOCATION, "http://localhost:5173/?token=stale")
            .await
            .unwrap();

        assert!(matches!(
            provider(store).restore(Utc::now()).await,
            Err(Error::Session(SessionError::NotFound))
        ));
    }

    #[tokio::test]
    async fn test_discard_strips_param() {
        let store = Arc::new(MemoryStore::new());
        let provider = provider(store.clone());
        provider
            .issue(&principal(), &ClientContext::default(), Utc::now(), Duration::hours(1))
            .await
            .unwrap();

        provider.discard().await.unwrap();

        assert!(provider.current_token().await.unwrap().is_none());
        assert!(store.get(keys::URL_TOKEN).await.unwrap().is_none());
        assert_eq!(
            provider.restore(Utc::now()).await.unwrap(),
            ArtifactState::Absent
        );
    }
}

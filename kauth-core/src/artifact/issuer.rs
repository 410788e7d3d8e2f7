use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use url::Url;

use crate::{
    Error,
    auth::{AuthMethod, ClientContext},
    principal::Principal,
    storage::KeyValueStore,
};

use super::{
    ArtifactState, IssuedArtifact, JwtConfig, JwtProvider, SessionRecordProvider,
    UrlTokenProvider, provider::ArtifactProvider,
};

/// Owns one provider per [`AuthMethod`] over a shared store.
pub struct ArtifactIssuer<S: KeyValueStore> {
    session: SessionRecordProvider<S>,
    jwt: JwtProvider<S>,
    url_token: UrlTokenProvider<S>,
}

impl<S: KeyValueStore> ArtifactIssuer<S> {
    pub fn new(store: Arc<S>, jwt_config: JwtConfig, base_url: Url) -> Self {
        Self {
            session: SessionRecordProvider::new(store.clone()),
            jwt: JwtProvider::new(store.clone(), jwt_config),
            url_token: UrlTokenProvider::new(store, base_url),
        }
    }

    pub fn provider(&self, method: AuthMethod) -> &dyn ArtifactProvider {
        match method {
            AuthMethod::Session => &self.session,
            AuthMethod::Jwt => &self.jwt,
            AuthMethod::UrlToken => &self.url_token,
        }
    }

    pub fn session(&self) -> &SessionRecordProvider<S> {
        &self.session
    }

    pub fn jwt(&self) -> &JwtProvider<S> {
        &self.jwt
    }

    pub fn url_token(&self) -> &UrlTokenProvider<S> {
        &self.url_token
    }

    pub async fn issue(
        &self,
        method: AuthMethod,
        principal: &Principal,
        client: &ClientContext,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<IssuedArtifact, Error> {
        self.provider(method)
            .issue(principal, client, issued_at, ttl)
            .await
    }

    pub async fn restore(
        &self,
        method: AuthMethod,
        now: DateTime<Utc>,
    ) -> Result<ArtifactState, Error> {
        self.provider(method).restore(now).await
    }

    /// Discard the artifacts of every method.
    ///
    /// Every provider is attempted even if one fails; the first error is returned.
    pub async fn discard_all(&self) -> Result<(), Error> {
        let mut first_error = None;
        for method in AuthMethod::ALL {
            if let Err(e) = self.provider(method).discard().await {
                tracing::warn!(method = %method, error = %e, "Failed to discard artifact");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

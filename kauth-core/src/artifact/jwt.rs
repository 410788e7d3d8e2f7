//! JWT provider
//!
//! Issues HS256-signed bearer tokens and keeps the compact form under
//! `kauth_jwt`. Tokens are self-contained: restoring one only needs the
//! signing secret.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    auth::{AuthMethod, ClientContext},
    error::{CryptoError, SessionError, StorageError, ValidationError},
    principal::{Principal, PrincipalId, Role},
    storage::{KeyValueStore, keys},
};

use super::{ArtifactState, IssuedArtifact, RestoredArtifact, provider::ArtifactProvider};

/// Shortest HS256 secret accepted.
pub const MIN_SECRET_LEN: usize = 32;

/// JWT payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject - principal ID
    pub sub: String,
    pub email: String,
    pub role: Role,
    /// Issued at, seconds since the epoch
    pub iat: i64,
    /// Expiration, seconds since the epoch
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

impl TokenClaims {
    pub fn for_principal(
        principal: &Principal,
        issued_at: DateTime<Utc>,
        ttl: Duration,
        issuer: Option<String>,
    ) -> Self {
        let iat = issued_at.timestamp();
        Self {
            sub: principal.id.to_string(),
            email: principal.email.clone(),
            role: principal.role,
            iat,
            exp: iat + ttl.num_seconds(),
            iss: issuer,
        }
    }

    pub fn expires_at(&self) -> Result<DateTime<Utc>, SessionError> {
        DateTime::from_timestamp(self.exp, 0)
            .ok_or_else(|| SessionError::InvalidToken(format!("exp out of range: {}", self.exp)))
    }

    /// Rebuild the principal the token was issued to.
    pub fn to_principal(&self) -> Result<Principal, Error> {
        let created_at = DateTime::from_timestamp(self.iat, 0)
            .ok_or_else(|| SessionError::InvalidToken(format!("iat out of range: {}", self.iat)))?;

        Principal::builder()
            .id(PrincipalId::new(&self.sub))
            .email(self.email.clone())
            .role(self.role)
            .created_at(created_at)
            .build()
    }
}

/// Configuration for signed tokens
#[derive(Clone)]
pub struct JwtConfig {
    secret_key: Vec<u8>,
    /// Issuer claim, verified on decode when set
    pub issuer: Option<String>,
}

impl JwtConfig {
    pub fn new_hs256(secret_key: impl Into<Vec<u8>>) -> Self {
        Self {
            secret_key: secret_key.into(),
            issuer: None,
        }
    }

    /// Random 256-bit secret. Tokens will not survive a restart.
    pub fn new_random_hs256() -> Self {
        let mut secret_key = vec![0u8; 32];
        rand::rng().fill_bytes(&mut secret_key);
        Self::new_hs256(secret_key)
    }

    /// HS256 config whose secret is kept under `kauth_jwt_secret`, so tokens
    /// issued by one process verify in the next. The secret is generated on
    /// first use and replaced if the stored value is unusable.
    pub async fn persisted_hs256<S>(store: &S) -> Result<Self, Error>
    where
        S: KeyValueStore + ?Sized,
    {
        if let Some(encoded) = store.get(keys::JWT_SECRET).await? {
            match Self::decode_secret(&encoded) {
                Ok(config) => return Ok(config),
                Err(e) => tracing::warn!(error = %e, "Replacing unusable stored JWT secret"),
            }
        }

        let config = Self::new_random_hs256();
        store
            .set(keys::JWT_SECRET, &hex::encode(&config.secret_key))
            .await?;
        tracing::debug!("Generated JWT secret");
        Ok(config)
    }

    fn decode_secret(encoded: &str) -> Result<Self, Error> {
        let secret = hex::decode(encoded.trim())
            .map_err(|e| StorageError::Serialization(format!("{}: {e}", keys::JWT_SECRET)))?;
        let config = Self::new_hs256(secret);
        config.validate()?;
        Ok(config)
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.secret_key.len() < MIN_SECRET_LEN {
            return Err(ValidationError::InvalidField(format!(
                "JWT secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        Ok(())
    }

    pub fn encode(&self, claims: &TokenClaims) -> Result<String, Error> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(&self.secret_key),
        )
        .map_err(|e| CryptoError::JwtSigning(e.to_string()).into())
    }

    /// Verify the signature and issuer and return the claims.
    ///
    /// Expiry is deliberately left to the caller so that an expired token can
    /// still be attributed to its principal.
    pub fn decode(&self, token: &str) -> Result<TokenClaims, Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }

        decode::<TokenClaims>(token, &DecodingKey::from_secret(&self.secret_key), &validation)
            .map(|data| data.claims)
            .map_err(|e| SessionError::InvalidToken(format!("JWT validation failed: {e}")).into())
    }
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret_key", &"<redacted>")
            .field("issuer", &self.issuer)
            .finish()
    }
}

pub struct JwtProvider<S: KeyValueStore> {
    store: Arc<S>,
    config: JwtConfig,
}

impl<S: KeyValueStore> JwtProvider<S> {
    pub fn new(store: Arc<S>, config: JwtConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Decoded claims of the stored token, without evaluating expiry.
    pub async fn claims(&self) -> Result<Option<TokenClaims>, Error> {
        match self.store.get(keys::JWT).await? {
            Some(token) => Ok(Some(self.config.decode(&token)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl<S: KeyValueStore> ArtifactProvider for JwtProvider<S> {
    fn method(&self) -> AuthMethod {
        AuthMethod::Jwt
    }

    async fn issue(
        &self,
        principal: &Principal,
        _client: &ClientContext,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<IssuedArtifact, Error> {
        let claims =
            TokenClaims::for_principal(principal, issued_at, ttl, self.config.issuer.clone());
        let token = self.config.encode(&claims)?;
        let expires_at = claims.expires_at()?;

        self.store.set(keys::JWT, &token).await?;

        Ok(IssuedArtifact {
            method: AuthMethod::Jwt,
            token,
            issued_at,
            expires_at,
        })
    }

    async fn restore(&self, now: DateTime<Utc>) -> Result<ArtifactState, Error> {
        let Some(claims) = self.claims().await? else {
            return Ok(ArtifactState::Absent);
        };

        Ok(ArtifactState::from_expiry(
            RestoredArtifact {
                principal: claims.to_principal()?,
                expires_at: claims.expires_at()?,
            },
            now,
        ))
    }

    async fn discard(&self) -> Result<(), Error> {
        self.store.remove(keys::JWT).await
    }
}

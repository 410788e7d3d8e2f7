//! Credential artifacts
//!
//! A successful login issues exactly one artifact for the selected
//! [`AuthMethod`]; a later process can restore the principal from it until it
//! expires. Each method has its own provider:
//!
//! | Method      | Provider                | Storage slot                               |
//! | ----------- | ----------------------- | ------------------------------------------ |
//! | `session`   | [`SessionRecordProvider`] | `kauth_session` (JSON record)            |
//! | `jwt`       | [`JwtProvider`]           | `kauth_jwt` (HS256 compact JWT)          |
//! | `url_token` | [`UrlTokenProvider`]      | `?token=` on `kauth_location`, hashed record in `kauth_url_token` |
//!
//! [`ArtifactIssuer`] owns one provider of each kind and dispatches by method.

pub mod issuer;
pub mod jwt;
pub mod provider;
pub mod session;
pub mod url_token;

use chrono::{DateTime, Utc};

use crate::{auth::AuthMethod, principal::Principal};

pub use issuer::ArtifactIssuer;
pub use jwt::{JwtConfig, JwtProvider, TokenClaims};
pub use provider::ArtifactProvider;
pub use session::{SessionRecord, SessionRecordProvider};
pub use url_token::{UrlTokenProvider, UrlTokenRecord};

/// What a provider hands back after storing a new artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedArtifact {
    pub method: AuthMethod,
    /// The credential string itself: session id, compact JWT or URL token.
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A decoded artifact: who it belongs to and when it stops being valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredArtifact {
    pub principal: Principal,
    pub expires_at: DateTime<Utc>,
}

/// Result of inspecting an artifact slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactState {
    /// Nothing stored for this method.
    Absent,
    /// Decodable, but `expires_at` is not after the instant checked.
    Expired(RestoredArtifact),
    /// Decodable and still valid.
    Valid(RestoredArtifact),
}

impl ArtifactState {
    pub(crate) fn from_expiry(artifact: RestoredArtifact, now: DateTime<Utc>) -> Self {
        if artifact.expires_at > now {
            ArtifactState::Valid(artifact)
        } else {
            ArtifactState::Expired(artifact)
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ArtifactState::Valid(_))
    }
}

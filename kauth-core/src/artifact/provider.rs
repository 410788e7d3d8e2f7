//! Artifact provider trait
//!
//! Abstracts issuing, restoring and discarding the credential artifact of a
//! single [`AuthMethod`].

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::{
    Error,
    auth::{AuthMethod, ClientContext},
    principal::Principal,
};

use super::{ArtifactState, IssuedArtifact};

#[async_trait]
pub trait ArtifactProvider: Send + Sync {
    /// The method this provider implements.
    fn method(&self) -> AuthMethod;

    /// Create and store an artifact for `principal`, valid for `ttl` after `issued_at`.
    ///
    /// Replaces any artifact previously stored for this method.
    async fn issue(
        &self,
        principal: &Principal,
        client: &ClientContext,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<IssuedArtifact, Error>;

    /// Decode the stored artifact and evaluate its expiry at `now`.
    ///
    /// Returns an error when something is stored but cannot be decoded or
    /// verified.
    async fn restore(&self, now: DateTime<Utc>) -> Result<ArtifactState, Error>;

    /// Remove the stored artifact. Discarding an empty slot is not an error.
    async fn discard(&self) -> Result<(), Error>;
}

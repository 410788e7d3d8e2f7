//! Credential verification against the provisioned demo account.
use std::fmt;

use chrono::{DateTime, Utc};

use crate::{
    Error,
    auth::Credentials,
    crypto::constant_time_compare,
    error::{AuthError, CryptoError},
    principal::{Principal, PrincipalId, Role},
    validation::{validate_email, validate_password},
};

pub const DEMO_ACCOUNT_ID: &str = "1";
pub const DEMO_ACCOUNT_EMAIL: &str = "demo@kauth.dev";
pub const DEMO_ACCOUNT_PASSWORD: &str = "password123";

/// Checks presented credentials and yields the principal they belong to.
pub trait CredentialVerifier: Send + Sync + 'static {
    /// Returns [`AuthError::InvalidCredentials`] on any mismatch, without
    /// revealing which field was wrong.
    fn verify(&self, credentials: &Credentials, now: DateTime<Utc>) -> Result<Principal, Error>;
}

/// The single account the ledger accepts. Only the Argon2 hash of the
/// password is kept.
#[derive(Clone)]
pub struct DemoAccount {
    id: PrincipalId,
    email: String,
    role: Role,
    password_hash: String,
}

impl DemoAccount {
    pub fn new(
        id: impl Into<PrincipalId>,
        email: impl Into<String>,
        password: &str,
        role: Role,
    ) -> Result<Self, Error> {
        validate_password(password)?;
        Self::with_password_hash(id, email, password_auth::generate_hash(password), role)
    }

    /// Build from an existing PHC-format hash.
    pub fn with_password_hash(
        id: impl Into<PrincipalId>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        role: Role,
    ) -> Result<Self, Error> {
        let email = email.into();
        validate_email(&email)?;

        let password_hash = password_hash.into();
        if !password_hash.starts_with('$') {
            return Err(CryptoError::PasswordHash("Expected a PHC string".to_string()).into());
        }

        Ok(Self {
            id: id.into(),
            email,
            role,
            password_hash,
        })
    }

    /// `demo@kauth.dev` / `password123`, admin.
    pub fn demo() -> Result<Self, Error> {
        Self::new(DEMO_ACCOUNT_ID, DEMO_ACCOUNT_EMAIL, DEMO_ACCOUNT_PASSWORD, Role::Admin)
    }

    pub fn id(&self) -> &PrincipalId {
        &self.id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

impl CredentialVerifier for DemoAccount {
    fn verify(&self, credentials: &Credentials, now: DateTime<Utc>) -> Result<Principal, Error> {
        let email_matches =
            constant_time_compare(credentials.email.as_bytes(), self.email.as_bytes());
        // Always run the hash check so a wrong email costs the same as a wrong password.
        let password_matches =
            password_auth::verify_password(&credentials.password, &self.password_hash).is_ok();

        if !(email_matches && password_matches) {
            return Err(AuthError::InvalidCredentials.into());
        }

        Principal::builder()
            .id(self.id.clone())
            .email(self.email.clone())
            .role(self.role)
            .created_at(now)
            .last_login(Some(now))
            .build()
    }
}

impl fmt::Debug for DemoAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DemoAccount")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

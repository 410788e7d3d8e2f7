use chrono::Duration;
use url::Url;

use crate::{
    Error,
    artifact::JwtConfig,
    auth::{AuthMethod, ClientContext},
    credentials::DemoAccount,
    error::ValidationError,
};

/// Navigation URL the URL token is attached to when nothing is stored yet.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5173/";

/// Configuration for an [`AuthLedger`](crate::services::AuthLedger).
///
/// ```rust
/// use chrono::Duration;
/// use kauth_core::{AuthMethod, LedgerConfig};
///
/// let config = LedgerConfig::default()
///     .auth_method(AuthMethod::Jwt)
///     .ban_duration(Duration::minutes(5));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Account accepted by login. `None` provisions the built-in demo account
    /// when the ledger opens.
    pub account: Option<DemoAccount>,
    /// Caller the plain (non-`_from`) operations are attributed to.
    pub client: ClientContext,
    /// Method selected when the ledger opens.
    /// Default: session
    pub auth_method: AuthMethod,
    /// How long a ban lasts.
    /// Default: 30 minutes
    pub ban_duration: Duration,
    /// Lifetime of an issued artifact.
    /// Default: 1 hour
    pub artifact_ttl: Duration,
    /// Signing settings for the JWT provider. `None` uses a secret generated
    /// once and kept in the store.
    /// Default: None
    pub jwt: Option<JwtConfig>,
    pub base_url: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            account: None,
            client: ClientContext::default(),
            auth_method: AuthMethod::default(),
            ban_duration: Duration::minutes(30),
            artifact_ttl: Duration::hours(1),
            jwt: None,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl LedgerConfig {
    pub fn account(mut self, account: DemoAccount) -> Self {
        self.account = Some(account);
        self
    }

    pub fn client(mut self, client: ClientContext) -> Self {
        self.client = client;
        self
    }

    pub fn auth_method(mut self, method: AuthMethod) -> Self {
        self.auth_method = method;
        self
    }

    pub fn ban_duration(mut self, duration: Duration) -> Self {
        self.ban_duration = duration;
        self
    }

    pub fn artifact_ttl(mut self, ttl: Duration) -> Self {
        self.artifact_ttl = ttl;
        self
    }

    pub fn jwt(mut self, jwt: JwtConfig) -> Self {
        self.jwt = Some(jwt);
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn parsed_base_url(&self) -> Result<Url, ValidationError> {
        Url::parse(&self.base_url)
            .map_err(|e| ValidationError::InvalidField(format!("base_url: {e}")))
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.ban_duration <= Duration::zero() {
            return Err(ValidationError::InvalidField(
                "ban_duration must be positive".to_string(),
            )
            .into());
        }
        if self.artifact_ttl <= Duration::zero() {
            return Err(ValidationError::InvalidField(
                "artifact_ttl must be positive".to_string(),
            )
            .into());
        }
        if self.client.address.trim().is_empty() {
            return Err(ValidationError::MissingField("client address".to_string()).into());
        }
        if let Some(jwt) = &self.jwt {
            jwt.validate()?;
        }
        self.parsed_base_url()?;
        Ok(())
    }
}

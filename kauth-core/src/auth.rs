//! Caller-facing authentication vocabulary: credentials, transport methods,
//! caller identity and the simulated security tests.
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Address the demo caller is attributed to when no explicit context is given.
pub const DEFAULT_CLIENT_ADDRESS: &str = "192.168.1.100";

/// User agent of the demo caller.
pub const DEFAULT_USER_AGENT: &str = concat!("kauth/", env!("CARGO_PKG_VERSION"));

/// The credentials presented to a login.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn email_password(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Which credential-carrying mechanism a successful login issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Server-side session record.
    #[default]
    Session,
    /// Signed bearer token kept in storage.
    Jwt,
    /// Token carried as a query parameter of the navigation URL.
    UrlToken,
}

impl AuthMethod {
    pub const ALL: [AuthMethod; 3] = [AuthMethod::Session, AuthMethod::Jwt, AuthMethod::UrlToken];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Session => "session",
            AuthMethod::Jwt => "jwt",
            AuthMethod::UrlToken => "url_token",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for AuthMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "session" => Ok(AuthMethod::Session),
            "jwt" => Ok(AuthMethod::Jwt),
            "url_token" | "url-token" => Ok(AuthMethod::UrlToken),
            other => Err(ValidationError::UnknownAuthMethod(other.to_string())),
        }
    }
}

/// Identity every ledger operation is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContext {
    pub address: String,
    pub user_agent: String,
}

impl ClientContext {
    pub fn new(address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            user_agent: user_agent.into(),
        }
    }
}

impl Default for ClientContext {
    fn default() -> Self {
        Self::new(DEFAULT_CLIENT_ADDRESS, DEFAULT_USER_AGENT)
    }
}

/// Attack simulations that only produce audit log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityTest {
    BruteForce,
    Csrf,
    Xss,
    TokenTheft,
    SessionHijacking,
}

impl SecurityTest {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityTest::BruteForce => "brute_force",
            SecurityTest::Csrf => "csrf",
            SecurityTest::Xss => "xss",
            SecurityTest::TokenTheft => "token_theft",
            SecurityTest::SessionHijacking => "session_hijacking",
        }
    }
}

impl fmt::Display for SecurityTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SecurityTest {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('-', "_").as_str() {
            "brute_force" => Ok(SecurityTest::BruteForce),
            "csrf" => Ok(SecurityTest::Csrf),
            "xss" => Ok(SecurityTest::Xss),
            "token_theft" => Ok(SecurityTest::TokenTheft),
            "session_hijacking" => Ok(SecurityTest::SessionHijacking),
            _ => Err(ValidationError::UnknownSecurityTest(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_method_parse() {
        assert_eq!("jwt".parse::<AuthMethod>().unwrap(), AuthMethod::Jwt);
        assert_eq!(
            "url-token".parse::<AuthMethod>().unwrap(),
            AuthMethod::UrlToken
        );
        assert!(matches!(
            "cookie".parse::<AuthMethod>(),
            Err(ValidationError::UnknownAuthMethod(_))
        ));
        assert_eq!(AuthMethod::default(), AuthMethod::Session);
    }

    #[test]
    fn test_auth_method_serde_matches_display() {
        for method in AuthMethod::ALL {
            let json = serde_json::to_string(&method).unwrap();
            assert_eq!(json, format!("\"{method}\""));
        }
    }

    #[test]
    fn test_security_test_parse() {
        assert_eq!(
            "brute-force".parse::<SecurityTest>().unwrap(),
            SecurityTest::BruteForce
        );
        assert_eq!("xss".parse::<SecurityTest>().unwrap(), SecurityTest::Xss);
        assert!("sql_injection".parse::<SecurityTest>().is_err());
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let credentials = Credentials::email_password("demo@kauth.dev", "password123");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("demo@kauth.dev"));
        assert!(!debug.contains("password123"));
    }

    #[test]
    fn test_default_client_context() {
        let client = ClientContext::default();
        assert_eq!(client.address, DEFAULT_CLIENT_ADDRESS);
        assert!(client.user_agent.starts_with("kauth/"));
    }
}

//! Authenticated principals
//!
//! A principal is created on successful login and rebuilt from a stored
//! artifact when a session is restored.
//!
//! | Field        | Type               | Description                                |
//! | ------------ | ------------------ | ------------------------------------------ |
//! | `id`         | `PrincipalId`      | Stable identifier of the account.          |
//! | `email`      | `String`           | The email the account logs in with.        |
//! | `role`       | `Role`             | `user` or `admin`.                         |
//! | `created_at` | `DateTime`         | When this principal value was created.     |
//! | `last_login` | `Option<DateTime>` | Refreshed on each successful login.        |
use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    error::{ValidationError, utilities::RequiredFieldExt},
};

/// Identifier of an account. Opaque; the demo account uses `"1"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct PrincipalId(String);

impl PrincipalId {
    pub fn new(id: &str) -> Self {
        PrincipalId(id.to_string())
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PrincipalId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PrincipalId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(ValidationError::InvalidField(format!(
                "Unknown role: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: PrincipalId,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

impl Principal {
    pub fn builder() -> PrincipalBuilder {
        PrincipalBuilder::default()
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Returns a copy with `last_login` refreshed to `at`.
    pub fn touch(mut self, at: DateTime<Utc>) -> Self {
        self.last_login = Some(at);
        self
    }
}

#[derive(Default)]
pub struct PrincipalBuilder {
    id: Option<PrincipalId>,
    email: Option<String>,
    role: Option<Role>,
    created_at: Option<DateTime<Utc>>,
    last_login: Option<DateTime<Utc>>,
}

impl PrincipalBuilder {
    pub fn id(mut self, id: PrincipalId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn last_login(mut self, last_login: Option<DateTime<Utc>>) -> Self {
        self.last_login = last_login;
        self
    }

    pub fn build(self) -> Result<Principal, Error> {
        Ok(Principal {
            id: self.id.require_field("Principal ID")?,
            email: self.email.require_field("Email")?,
            role: self.role.unwrap_or(Role::User),
            created_at: self.created_at.unwrap_or_else(Utc::now),
            last_login: self.last_login,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_builder_defaults() {
        let principal = Principal::builder()
            .id(PrincipalId::new("1"))
            .email("demo@kauth.dev")
            .build()
            .unwrap();

        assert_eq!(principal.role, Role::User);
        assert!(principal.last_login.is_none());
        assert!(!principal.is_admin());
    }

    #[test]
    fn test_principal_builder_requires_email() {
        let result = Principal::builder().id(PrincipalId::new("1")).build();
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::MissingField(_)))
        ));
    }

    #[test]
    fn test_touch_refreshes_last_login() {
        let now = Utc::now();
        let principal = Principal::builder()
            .id(PrincipalId::new("1"))
            .email("demo@kauth.dev")
            .role(Role::Admin)
            .build()
            .unwrap()
            .touch(now);

        assert_eq!(principal.last_login, Some(now));
        assert!(principal.is_admin());
    }

    #[test]
    fn test_role_round_trips_through_str() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(Role::User.to_string(), "user");
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_principal_serializes_camel_case() {
        let principal = Principal::builder()
            .id(PrincipalId::new("1"))
            .email("demo@kauth.dev")
            .role(Role::Admin)
            .build()
            .unwrap();

        let json = serde_json::to_value(&principal).unwrap();
        assert_eq!(json["role"], "admin");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("lastLogin").is_none());
    }
}

//! Audit log entries and the capped, newest-first log that holds them.
//!
//! | Field         | Type                  | Description                                      |
//! | ------------- | --------------------- | ------------------------------------------------ |
//! | `id`          | `String`              | `log_` prefixed identifier.                      |
//! | `timestamp`   | `DateTime`            | When the entry was appended.                     |
//! | `kind`        | `LogKind`             | What happened.                                   |
//! | `user_id`     | `Option<PrincipalId>` | Set for login success and logout.                |
//! | `email`       | `Option<String>`      | Email presented or of the principal.             |
//! | `address`     | `String`              | Source address the action is attributed to.      |
//! | `user_agent`  | `String`              | User agent of the caller.                        |
//! | `auth_method` | `AuthMethod`          | Method selected when the entry was written.      |
//! | `details`     | `Option<String>`      | Free-form reason, e.g. `Failed attempt 2`.       |
use std::{collections::VecDeque, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{AuthMethod, ClientContext},
    id::generate_prefixed_id,
    principal::{Principal, PrincipalId},
};

/// Maximum number of entries the audit log retains.
pub const LOG_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    LoginSuccess,
    LoginFailed,
    Logout,
    TokenCreated,
    TokenExpired,
    IpBanned,
    CsrfAttempt,
    XssAttempt,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::LoginSuccess => "login_success",
            LogKind::LoginFailed => "login_failed",
            LogKind::Logout => "logout",
            LogKind::TokenCreated => "token_created",
            LogKind::TokenExpired => "token_expired",
            LogKind::IpBanned => "ip_banned",
            LogKind::CsrfAttempt => "csrf_attempt",
            LogKind::XssAttempt => "xss_attempt",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: LogKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<PrincipalId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub address: String,
    pub user_agent: String,
    pub auth_method: AuthMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    fn base(kind: LogKind, client: &ClientContext, method: AuthMethod) -> Self {
        Self {
            id: generate_prefixed_id("log"),
            timestamp: Utc::now(),
            kind,
            user_id: None,
            email: None,
            address: client.address.clone(),
            user_agent: client.user_agent.clone(),
            auth_method: method,
            details: None,
        }
    }

    pub fn login_success(principal: &Principal, client: &ClientContext, method: AuthMethod) -> Self {
        Self {
            user_id: Some(principal.id.clone()),
            email: Some(principal.email.clone()),
            ..Self::base(LogKind::LoginSuccess, client, method)
        }
    }

    pub fn login_failed(
        email: &str,
        client: &ClientContext,
        method: AuthMethod,
        details: impl Into<String>,
    ) -> Self {
        Self {
            email: Some(email.to_string()),
            details: Some(details.into()),
            ..Self::base(LogKind::LoginFailed, client, method)
        }
    }

    pub fn logout(principal: &Principal, client: &ClientContext, method: AuthMethod) -> Self {
        Self {
            user_id: Some(principal.id.clone()),
            email: Some(principal.email.clone()),
            ..Self::base(LogKind::Logout, client, method)
        }
    }

    pub fn token_expired(principal: &Principal, client: &ClientContext, method: AuthMethod) -> Self {
        Self {
            user_id: Some(principal.id.clone()),
            email: Some(principal.email.clone()),
            details: Some(format!("{method} artifact expired")),
            ..Self::base(LogKind::TokenExpired, client, method)
        }
    }

    pub fn ip_banned(client: &ClientContext, method: AuthMethod, reason: &str) -> Self {
        Self {
            details: Some(reason.to_string()),
            ..Self::base(LogKind::IpBanned, client, method)
        }
    }

    pub fn csrf_attempt(client: &ClientContext, method: AuthMethod) -> Self {
        Self {
            details: Some("CSRF attack simulation".to_string()),
            ..Self::base(LogKind::CsrfAttempt, client, method)
        }
    }

    pub fn xss_attempt(client: &ClientContext, method: AuthMethod) -> Self {
        Self {
            details: Some("XSS attack simulation".to_string()),
            ..Self::base(LogKind::XssAttempt, client, method)
        }
    }
}

/// Newest-first log bounded to [`LOG_CAPACITY`] entries.
///
/// Appending at capacity evicts the oldest entry. Eviction follows insertion
/// order, which matches timestamp order because entries are stamped when built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditLog {
    entries: VecDeque<LogEntry>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend an entry, returning the entry evicted to stay within capacity.
    pub fn push(&mut self, entry: LogEntry) -> Option<LogEntry> {
        self.entries.push_front(entry);
        if self.entries.len() > LOG_CAPACITY {
            self.entries.pop_back()
        } else {
            None
        }
    }

    /// Push every entry of `newer`, all of which postdate this log's entries.
    pub fn extend_newer(&mut self, newer: AuditLog) {
        for entry in newer.entries.into_iter().rev() {
            self.push(entry);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Drops anything past capacity; persisted logs written by other tools may be longer.
    pub fn enforce_capacity(&mut self) {
        self.entries.truncate(LOG_CAPACITY);
    }
}

impl From<Vec<LogEntry>> for AuditLog {
    fn from(entries: Vec<LogEntry>) -> Self {
        let mut log = Self {
            entries: entries.into(),
        };
        log.enforce_capacity();
        log
    }
}

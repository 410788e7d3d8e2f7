//! Core of the kauth authentication ledger.
//!
//! [`AuthLedger`] counts failed logins per source address, bans an address
//! after [`ban::BAN_THRESHOLD`] consecutive failures, keeps a capped audit log
//! and issues one credential artifact per successful login for the selected
//! [`AuthMethod`]. Everything is persisted through a [`KeyValueStore`];
//! [`MemoryStore`] is provided here and an SQLite store lives in
//! `kauth-storage-sqlite`.
//!
//! The storage backends and the `kauth` facade depend on this crate; it is not
//! usually used directly by applications.
pub mod artifact;
pub mod audit;
pub mod auth;
pub mod ban;
pub mod config;
pub mod credentials;
pub mod crypto;
pub mod error;
pub mod events;
pub mod id;
pub mod principal;
pub mod repositories;
pub mod services;
pub mod storage;
pub mod validation;

pub use artifact::{ArtifactIssuer, ArtifactProvider, ArtifactState, JwtConfig, TokenClaims};
pub use audit::{AuditLog, LogEntry, LogKind};
pub use auth::{AuthMethod, ClientContext, Credentials, SecurityTest};
pub use ban::{Ban, BanList};
pub use config::LedgerConfig;
pub use credentials::{CredentialVerifier, DemoAccount};
pub use error::Error;
pub use events::{Event, EventBus, EventHandler};
pub use principal::{Principal, PrincipalId, Role};
pub use services::AuthLedger;
pub use storage::{KeyValueStore, MemoryStore};

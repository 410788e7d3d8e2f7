//! The authentication ledger.
//!
//! [`AuthLedger`] owns the failed-attempt counters, the ban list, the capped
//! audit log and the authenticated principal. State is loaded from the
//! [`KeyValueStore`] when the ledger opens and written through after every
//! mutation; the in-memory copy is a cache of what is persisted.
//!
//! Public operations never fail. Storage and artifact errors are logged and
//! the ledger fails closed: unreadable state starts empty, an artifact that
//! cannot be restored leaves the caller unauthenticated, and a failed write
//! keeps the in-memory change.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use kauth_core::{AuthLedger, LedgerConfig, MemoryStore};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let ledger = AuthLedger::open(Arc::new(MemoryStore::new()), LedgerConfig::default())
//!     .await
//!     .unwrap();
//!
//! assert!(!ledger.login("demo@kauth.dev", "wrong").await);
//! assert_eq!(ledger.failed_attempts_for("192.168.1.100").await, 1);
//! assert!(ledger.login("demo@kauth.dev", "password123").await);
//! assert!(ledger.is_authenticated().await);
//! # }
//! ```

use std::{collections::HashMap, sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Utc};
use tokio::{
    sync::{Mutex, MutexGuard},
    task::JoinHandle,
};

use crate::{
    Error,
    artifact::{ArtifactIssuer, ArtifactProvider, ArtifactState, JwtConfig},
    audit::{AuditLog, LogEntry},
    auth::{AuthMethod, ClientContext, Credentials, SecurityTest},
    ban::{AttemptCounter, BAN_REASON_TOO_MANY_ATTEMPTS, BAN_THRESHOLD, Ban, BanList},
    config::LedgerConfig,
    credentials::{CredentialVerifier, DemoAccount},
    events::{Event, EventBus, EventHandler},
    principal::Principal,
    repositories::{LedgerRepository, ledger::Unsynced},
    storage::KeyValueStore,
};

/// Number of entries the brute force simulation emits.
pub const BRUTE_FORCE_ATTEMPTS: u32 = 5;
/// Delay between simulated brute force attempts.
pub const BRUTE_FORCE_INTERVAL: StdDuration = StdDuration::from_millis(100);
pub const ATTACKER_EMAIL: &str = "attacker@evil.com";
pub const ATTACKER_ADDRESS: &str = "192.168.1.999";
pub const ATTACKER_USER_AGENT: &str = "AttackBot/1.0";

const DETAIL_ADDRESS_BANNED: &str = "IP banned";

struct LedgerState {
    logs: AuditLog,
    bans: BanList,
    attempts: AttemptCounter,
    principal: Option<Principal>,
    auth_method: AuthMethod,
    unsynced: Unsynced,
}

struct LedgerInner<S: KeyValueStore> {
    repository: LedgerRepository<S>,
    artifacts: ArtifactIssuer<S>,
    verifier: Box<dyn CredentialVerifier>,
    config: LedgerConfig,
    events: EventBus,
    state: Mutex<LedgerState>,
    scheduled: Mutex<Vec<JoinHandle<()>>>,
}

/// Login attempt counting, address bans and the audit log.
///
/// Cloning is cheap and every clone shares the same state. Operations are
/// serialized on one lock.
pub struct AuthLedger<S: KeyValueStore> {
    inner: Arc<LedgerInner<S>>,
}

impl<S: KeyValueStore> Clone for AuthLedger<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: KeyValueStore> AuthLedger<S> {
    /// Open a ledger over `store`, provisioning the configured account (or
    /// the demo account) as the only accepted credentials.
    pub async fn open(store: Arc<S>, config: LedgerConfig) -> Result<Self, Error> {
        let account = match &config.account {
            Some(account) => account.clone(),
            None => DemoAccount::demo()?,
        };
        Self::open_with_verifier(store, config, Box::new(account)).await
    }

    /// Open a ledger that checks credentials with `verifier`.
    pub async fn open_with_verifier(
        store: Arc<S>,
        config: LedgerConfig,
        verifier: Box<dyn CredentialVerifier>,
    ) -> Result<Self, Error> {
        config.validate()?;
        let base_url = config.parsed_base_url()?;

        let jwt = match &config.jwt {
            Some(jwt) => jwt.clone(),
            None => JwtConfig::persisted_hs256(store.as_ref())
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Using an unpersisted JWT secret");
                    JwtConfig::new_random_hs256()
                }),
        };

        let repository = LedgerRepository::new(store.clone());
        let artifacts = ArtifactIssuer::new(store, jwt, base_url);
        let snapshot = repository.load_snapshot().await;

        tracing::debug!(
            logs = snapshot.logs.len(),
            bans = snapshot.bans.len(),
            method = %config.auth_method,
            "Opened auth ledger"
        );

        let state = LedgerState {
            logs: snapshot.logs,
            bans: snapshot.bans,
            attempts: snapshot.attempts,
            principal: None,
            auth_method: config.auth_method,
            unsynced: snapshot.unsynced,
        };

        Ok(Self {
            inner: Arc::new(LedgerInner {
                repository,
                artifacts,
                verifier,
                config,
                events: EventBus::new(),
                state: Mutex::new(state),
                scheduled: Mutex::new(Vec::new()),
            }),
        })
    }

    /// The caller the plain operations are attributed to.
    pub fn client(&self) -> &ClientContext {
        &self.inner.config.client
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.inner.config
    }

    pub fn artifacts(&self) -> &ArtifactIssuer<S> {
        &self.inner.artifacts
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Register a read-only observer of ledger changes.
    pub async fn subscribe(&self, handler: Arc<dyn EventHandler>) {
        self.inner.events.register(handler).await;
    }

    pub async fn is_banned(&self, address: &str) -> bool {
        self.is_banned_at(address, Utc::now()).await
    }

    /// Whether any stored ban for `address` is still active at `at`.
    pub async fn is_banned_at(&self, address: &str, at: DateTime<Utc>) -> bool {
        self.lock_state().await.bans.is_banned_at(address, at)
    }

    /// The active ban for `address` that lasts longest, if any.
    pub async fn active_ban(&self, address: &str) -> Option<Ban> {
        self.lock_state()
            .await
            .bans
            .active_ban(address, Utc::now())
            .cloned()
    }

    pub async fn login(&self, email: &str, password: &str) -> bool {
        let client = self.inner.config.client.clone();
        self.login_from(&client, email, password).await
    }

    /// Attempt a login attributed to `client`. Returns whether it succeeded.
    pub async fn login_from(&self, client: &ClientContext, email: &str, password: &str) -> bool {
        let now = Utc::now();
        let mut events = Vec::new();
        let mut state = self.lock_state().await;
        let method = state.auth_method;

        if state.bans.is_banned_at(&client.address, now) {
            tracing::info!(address = %client.address, "Rejected login from banned address");
            let entry = LogEntry::login_failed(email, client, method, DETAIL_ADDRESS_BANNED);
            self.append_locked(&mut state, entry, &mut events).await;
            drop(state);
            self.emit_all(events).await;
            return false;
        }

        let credentials = Credentials::email_password(email, password);
        let succeeded = match self.inner.verifier.verify(&credentials, now) {
            Ok(principal) => {
                self.complete_login(&mut state, client, principal, now, &mut events)
                    .await;
                true
            }
            Err(e) => {
                let attempts = state.attempts.increment(&client.address);
                self.persist_attempts(&state).await;
                tracing::warn!(address = %client.address, attempts, error = %e, "Failed login attempt");

                let entry = LogEntry::login_failed(
                    email,
                    client,
                    method,
                    format!("Failed attempt {attempts}"),
                );
                self.append_locked(&mut state, entry, &mut events).await;

                if attempts >= BAN_THRESHOLD {
                    self.issue_ban_locked(
                        &mut state,
                        client,
                        BAN_REASON_TOO_MANY_ATTEMPTS,
                        now,
                        &mut events,
                    )
                    .await;
                }
                false
            }
        };

        drop(state);
        self.emit_all(events).await;
        succeeded
    }

    async fn complete_login(
        &self,
        state: &mut LedgerState,
        client: &ClientContext,
        principal: Principal,
        now: DateTime<Utc>,
        events: &mut Vec<Event>,
    ) {
        let method = state.auth_method;

        if state.attempts.reset(&client.address) {
            self.persist_attempts(state).await;
        }

        match self
            .inner
            .artifacts
            .issue(method, &principal, client, now, self.inner.config.artifact_ttl)
            .await
        {
            Ok(artifact) => {
                tracing::debug!(method = %method, expires_at = %artifact.expires_at, "Issued artifact");
            }
            Err(e) => {
                tracing::warn!(method = %method, error = %e, "Failed to store artifact");
            }
        }

        tracing::info!(address = %client.address, user_id = %principal.id, method = %method, "Login succeeded");
        state.principal = Some(principal.clone());
        let entry = LogEntry::login_success(&principal, client, method);
        self.append_locked(state, entry, events).await;
        events.push(Event::Authenticated(principal));
    }

    async fn issue_ban_locked(
        &self,
        state: &mut LedgerState,
        client: &ClientContext,
        reason: &str,
        now: DateTime<Utc>,
        events: &mut Vec<Event>,
    ) {
        let attempts = state.attempts.get(&client.address);
        let ban = Ban::new(
            client.address.clone(),
            attempts,
            reason,
            now,
            self.inner.config.ban_duration,
        );
        state.bans.push(ban.clone());
        self.persist_bans(state).await;

        tracing::warn!(
            address = %client.address,
            attempts,
            expires_at = %ban.expires_at,
            "Address banned"
        );

        let entry = LogEntry::ip_banned(client, state.auth_method, reason);
        self.append_locked(state, entry, events).await;
        events.push(Event::BanIssued(ban));
    }

    pub async fn logout(&self) {
        let client = self.inner.config.client.clone();
        self.logout_from(&client).await;
    }

    /// End the authenticated state and discard every stored artifact.
    pub async fn logout_from(&self, client: &ClientContext) {
        let mut events = Vec::new();
        let mut state = self.lock_state().await;

        if let Some(principal) = state.principal.take() {
            let entry = LogEntry::logout(&principal, client, state.auth_method);
            self.append_locked(&mut state, entry, &mut events).await;
            events.push(Event::LoggedOut);
        }

        if let Err(e) = self.inner.artifacts.discard_all().await {
            tracing::warn!(error = %e, "Failed to discard artifacts on logout");
        }

        drop(state);
        self.emit_all(events).await;
    }

    /// Remove every ban for `address`, active or not. Returns how many were
    /// removed. Not recorded in the audit log.
    pub async fn unban(&self, address: &str) -> usize {
        let mut state = self.lock_state().await;
        let count = state.bans.remove_address(address);
        self.persist_bans(&state).await;
        drop(state);

        tracing::info!(address, count, "Lifted bans");
        self.emit(Event::BansLifted {
            address: address.to_string(),
            count,
        })
        .await;
        count
    }

    /// Empty the audit log. Not itself recorded.
    pub async fn clear_log(&self) {
        let mut state = self.lock_state().await;
        state.logs.clear();
        match self.inner.repository.clear_logs().await {
            Ok(()) => state.unsynced.logs = false,
            Err(e) => tracing::warn!(error = %e, "Failed to clear persisted audit log"),
        }
        drop(state);

        self.emit(Event::LogCleared).await;
    }

    /// Record a simulated attack. Brute force entries are written by
    /// background tasks; see [`wait_for_scheduled`](Self::wait_for_scheduled).
    pub async fn simulate_security_test(&self, test: SecurityTest) {
        match test {
            SecurityTest::Csrf | SecurityTest::Xss => {
                let method = self.auth_method().await;
                let client = &self.inner.config.client;
                let entry = if test == SecurityTest::Csrf {
                    LogEntry::csrf_attempt(client, method)
                } else {
                    LogEntry::xss_attempt(client, method)
                };
                self.append(entry).await;
            }
            SecurityTest::BruteForce => self.schedule_brute_force().await,
            SecurityTest::TokenTheft | SecurityTest::SessionHijacking => {
                tracing::debug!(test = %test, "Security test has no simulation");
            }
        }
    }

    async fn schedule_brute_force(&self) {
        let method = self.auth_method().await;
        let mut scheduled = self.inner.scheduled.lock().await;
        scheduled.retain(|handle| !handle.is_finished());

        for attempt in 0..BRUTE_FORCE_ATTEMPTS {
            let ledger = self.clone();
            scheduled.push(tokio::spawn(async move {
                tokio::time::sleep(BRUTE_FORCE_INTERVAL * attempt).await;
                let attacker = ClientContext::new(ATTACKER_ADDRESS, ATTACKER_USER_AGENT);
                let entry = LogEntry::login_failed(
                    ATTACKER_EMAIL,
                    &attacker,
                    method,
                    format!("Brute force attempt {}", attempt + 1),
                );
                ledger.append(entry).await;
            }));
        }
        tracing::debug!(attempts = BRUTE_FORCE_ATTEMPTS, "Scheduled brute force simulation");
    }

    /// Wait until every scheduled simulation entry has been written.
    pub async fn wait_for_scheduled(&self) {
        let handles = std::mem::take(&mut *self.inner.scheduled.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Scheduled simulation task failed");
            }
        }
    }

    /// Restore the principal from the artifact of the current method.
    ///
    /// An expired artifact is recorded as `token_expired` and discarded. With
    /// no artifact for the method, an in-process login is kept. An artifact
    /// that cannot be read clears it. Returns whether the ledger is
    /// authenticated afterwards.
    pub async fn check_auth_state(&self) -> bool {
        let now = Utc::now();
        let mut events = Vec::new();
        let mut state = self.lock_state().await;
        let method = state.auth_method;

        let authenticated = match self.inner.artifacts.restore(method, now).await {
            Ok(ArtifactState::Valid(restored)) => {
                tracing::debug!(method = %method, user_id = %restored.principal.id, "Restored principal");
                state.principal = Some(restored.principal.clone());
                events.push(Event::Authenticated(restored.principal));
                true
            }
            Ok(ArtifactState::Expired(restored)) => {
                tracing::info!(method = %method, expired_at = %restored.expires_at, "Artifact expired");
                state.principal = None;
                let entry =
                    LogEntry::token_expired(&restored.principal, &self.inner.config.client, method);
                self.append_locked(&mut state, entry, &mut events).await;
                if let Err(e) = self.inner.artifacts.provider(method).discard().await {
                    tracing::warn!(method = %method, error = %e, "Failed to discard expired artifact");
                }
                false
            }
            Ok(ArtifactState::Absent) => state.principal.is_some(),
            Err(e) => {
                tracing::warn!(method = %method, error = %e, "Could not restore artifact");
                state.principal = None;
                false
            }
        };

        drop(state);
        self.emit_all(events).await;
        authenticated
    }

    /// Audit log entries, newest first.
    pub async fn logs(&self) -> Vec<LogEntry> {
        self.lock_state().await.logs.to_vec()
    }

    /// Every stored ban, including expired ones.
    pub async fn bans(&self) -> Vec<Ban> {
        self.lock_state().await.bans.to_vec()
    }

    pub async fn failed_attempts(&self) -> HashMap<String, u32> {
        self.lock_state().await.attempts.to_map()
    }

    pub async fn failed_attempts_for(&self, address: &str) -> u32 {
        self.lock_state().await.attempts.get(address)
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.state.lock().await.principal.is_some()
    }

    pub async fn principal(&self) -> Option<Principal> {
        self.inner.state.lock().await.principal.clone()
    }

    pub async fn auth_method(&self) -> AuthMethod {
        self.inner.state.lock().await.auth_method
    }

    /// Select the method later logins issue artifacts for. Existing
    /// artifacts and the authenticated state are left alone.
    pub async fn set_auth_method(&self, method: AuthMethod) {
        let previous = std::mem::replace(&mut self.inner.state.lock().await.auth_method, method);
        if previous != method {
            tracing::debug!(from = %previous, to = %method, "Changed auth method");
            self.emit(Event::AuthMethodChanged(method)).await;
        }
    }

    async fn append(&self, entry: LogEntry) {
        let mut events = Vec::new();
        let mut state = self.lock_state().await;
        self.append_locked(&mut state, entry, &mut events).await;
        drop(state);
        self.emit_all(events).await;
    }

    async fn append_locked(&self, state: &mut LedgerState, entry: LogEntry, events: &mut Vec<Event>) {
        tracing::debug!(kind = %entry.kind, address = %entry.address, "Audit log entry");
        if let Some(evicted) = state.logs.push(entry.clone()) {
            tracing::trace!(id = %evicted.id, "Evicted oldest audit log entry");
        }
        self.persist_logs(state).await;
        events.push(Event::LogAppended(entry));
    }

    /// Lock the state, first merging in any collection the store could not
    /// return earlier.
    async fn lock_state(&self) -> MutexGuard<'_, LedgerState> {
        let mut state = self.inner.state.lock().await;
        if state.unsynced.any() {
            self.resync_locked(&mut state).await;
        }
        state
    }

    /// Re-read unsynced collections. Entries recorded since open are newer
    /// than anything stored, so they are layered on top and written back.
    async fn resync_locked(&self, state: &mut LedgerState) {
        let repository = &self.inner.repository;

        if state.unsynced.logs {
            if let Ok(mut stored) = repository.load_logs().await {
                stored.extend_newer(std::mem::take(&mut state.logs));
                state.logs = stored;
                state.unsynced.logs = false;
                tracing::info!(entries = state.logs.len(), "Audit log resynced");
                self.persist_logs(state).await;
            }
        }

        if state.unsynced.bans {
            if let Ok(mut stored) = repository.load_bans().await {
                stored.extend(std::mem::take(&mut state.bans));
                state.bans = stored;
                state.unsynced.bans = false;
                tracing::info!(bans = state.bans.len(), "Ban list resynced");
                self.persist_bans(state).await;
            }
        }

        if state.unsynced.attempts {
            if let Ok(mut stored) = repository.load_attempts().await {
                stored.merge(&state.attempts);
                state.attempts = stored;
                state.unsynced.attempts = false;
                tracing::info!("Attempt counters resynced");
                self.persist_attempts(state).await;
            }
        }
    }

    async fn persist_logs(&self, state: &LedgerState) {
        if state.unsynced.logs {
            tracing::debug!("Audit log not yet read from store; write skipped");
            return;
        }
        if let Err(e) = self.inner.repository.save_logs(&state.logs).await {
            tracing::warn!(error = %e, "Failed to persist audit log");
        }
    }

    async fn persist_bans(&self, state: &LedgerState) {
        if state.unsynced.bans {
            tracing::debug!("Ban list not yet read from store; write skipped");
            return;
        }
        if let Err(e) = self.inner.repository.save_bans(&state.bans).await {
            tracing::warn!(error = %e, "Failed to persist ban list");
        }
    }

    async fn persist_attempts(&self, state: &LedgerState) {
        if state.unsynced.attempts {
            tracing::debug!("Attempt counters not yet read from store; write skipped");
            return;
        }
        if let Err(e) = self.inner.repository.save_attempts(&state.attempts).await {
            tracing::warn!(error = %e, "Failed to persist failed attempt counters");
        }
    }

    async fn emit(&self, event: Event) {
        if let Err(e) = self.inner.events.emit(&event).await {
            tracing::warn!(error = %e, "Event handler failed");
        }
    }

    async fn emit_all(&self, events: Vec<Event>) {
        for event in events {
            self.emit(event).await;
        }
    }
}

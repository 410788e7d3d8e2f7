//! Failed-attempt counters and address bans.
//!
//! Ban expiry is evaluated lazily: nothing sweeps expired bans, a ban simply
//! stops counting once `expires_at` is no longer after the instant checked.
use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Consecutive failures from one address that trigger a ban.
pub const BAN_THRESHOLD: u32 = 3;

/// Reason recorded on bans issued by the attempt counter.
pub const BAN_REASON_TOO_MANY_ATTEMPTS: &str = "Too many failed login attempts";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ban {
    pub address: String,
    pub attempts_at_ban_time: u32,
    pub banned_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub reason: String,
}

impl Ban {
    pub fn new(
        address: impl Into<String>,
        attempts: u32,
        reason: impl Into<String>,
        banned_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            address: address.into(),
            attempts_at_ban_time: attempts,
            banned_at,
            expires_at: banned_at + duration,
            reason: reason.into(),
        }
    }

    /// A ban is active strictly before its expiry instant.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// Seconds until expiry, `None` once expired.
    pub fn retry_after_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        self.is_active_at(now)
            .then(|| (self.expires_at - now).num_seconds().max(0))
    }
}

/// Stored bans. Re-banning an address appends another record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BanList {
    bans: Vec<Ban>,
}

impl BanList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, ban: Ban) {
        self.bans.push(ban);
    }

    pub fn is_banned_at(&self, address: &str, now: DateTime<Utc>) -> bool {
        self.bans
            .iter()
            .any(|ban| ban.address == address && ban.is_active_at(now))
    }

    /// The active ban for `address` that expires last.
    pub fn active_ban(&self, address: &str, now: DateTime<Utc>) -> Option<&Ban> {
        self.bans
            .iter()
            .filter(|ban| ban.address == address && ban.is_active_at(now))
            .max_by_key(|ban| ban.expires_at)
    }

    /// Remove every ban for `address`, active or not. Returns how many were removed.
    pub fn remove_address(&mut self, address: &str) -> usize {
        let before = self.bans.len();
        self.bans.retain(|ban| ban.address != address);
        before - self.bans.len()
    }

    /// Add bans issued after this list was read, keeping their order.
    pub fn extend(&mut self, later: BanList) {
        self.bans.extend(later.bans);
    }

    pub fn len(&self) -> usize {
        self.bans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bans.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ban> {
        self.bans.iter()
    }

    pub fn to_vec(&self) -> Vec<Ban> {
        self.bans.clone()
    }
}

impl From<Vec<Ban>> for BanList {
    fn from(bans: Vec<Ban>) -> Self {
        Self { bans }
    }
}

/// Consecutive failed attempts per source address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptCounter {
    counts: HashMap<String, u32>,
}

impl AttemptCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one more failure and return the running count.
    pub fn increment(&mut self, address: &str) -> u32 {
        let count = self.counts.entry(address.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Forget the address entirely. Returns whether a count was present.
    pub fn reset(&mut self, address: &str) -> bool {
        self.counts.remove(address).is_some()
    }

    pub fn get(&self, address: &str) -> u32 {
        self.counts.get(address).copied().unwrap_or(0)
    }

    /// Add every count of `other` to this counter.
    pub fn merge(&mut self, other: &AttemptCounter) {
        for (address, count) in &other.counts {
            let total = self.counts.entry(address.clone()).or_insert(0);
            *total = total.saturating_add(*count);
        }
    }

    pub fn to_map(&self) -> HashMap<String, u32> {
        self.counts.clone()
    }
}

impl From<HashMap<String, u32>> for AttemptCounter {
    fn from(counts: HashMap<String, u32>) -> Self {
        Self { counts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "192.168.1.100";

    fn ban_at(now: DateTime<Utc>) -> Ban {
        Ban::new(
            ADDR,
            BAN_THRESHOLD,
            BAN_REASON_TOO_MANY_ATTEMPTS,
            now,
            Duration::minutes(30),
        )
    }

    #[test]
    fn test_ban_expiry_is_strict() {
        let now = Utc::now();
        let ban = ban_at(now);

        assert_eq!(ban.expires_at, now + Duration::seconds(1800));
        assert!(ban.is_active_at(now));
        assert!(ban.is_active_at(ban.expires_at - Duration::milliseconds(1)));
        assert!(!ban.is_active_at(ban.expires_at));
        assert!(!ban.is_active_at(ban.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn test_retry_after_seconds() {
        let now = Utc::now();
        let ban = ban_at(now);
        assert_eq!(ban.retry_after_seconds(now), Some(1800));
        assert_eq!(ban.retry_after_seconds(ban.expires_at), None);
    }

    #[test]
    fn test_any_active_ban_counts() {
        let now = Utc::now();
        let mut bans = BanList::new();
        bans.push(Ban::new(ADDR, 3, "old", now - Duration::hours(2), Duration::minutes(30)));
        assert!(!bans.is_banned_at(ADDR, now));

        bans.push(ban_at(now));
        assert!(bans.is_banned_at(ADDR, now));
        assert!(!bans.is_banned_at("10.0.0.1", now));
        assert_eq!(bans.len(), 2);
    }

    #[test]
    fn test_active_ban_picks_latest_expiry() {
        let now = Utc::now();
        let mut bans = BanList::new();
        bans.push(ban_at(now - Duration::minutes(10)));
        bans.push(ban_at(now));

        let active = bans.active_ban(ADDR, now).unwrap();
        assert_eq!(active.banned_at, now);
    }

    #[test]
    fn test_remove_address_removes_expired_and_active() {
        let now = Utc::now();
        let mut bans = BanList::new();
        bans.push(Ban::new(ADDR, 3, "old", now - Duration::hours(2), Duration::minutes(30)));
        bans.push(ban_at(now));
        bans.push(Ban::new("10.0.0.1", 3, "other", now, Duration::minutes(30)));

        assert_eq!(bans.remove_address(ADDR), 2);
        assert_eq!(bans.len(), 1);
        assert!(bans.is_banned_at("10.0.0.1", now));
    }

    #[test]
    fn test_attempt_counter() {
        let mut attempts = AttemptCounter::new();
        assert_eq!(attempts.increment(ADDR), 1);
        assert_eq!(attempts.increment(ADDR), 2);
        assert_eq!(attempts.get("10.0.0.1"), 0);

        assert!(attempts.reset(ADDR));
        assert_eq!(attempts.get(ADDR), 0);
        assert!(!attempts.reset(ADDR));
        assert_eq!(attempts.increment(ADDR), 1);
    }

    #[test]
    fn test_merge_adds_counts() {
        let mut stored = AttemptCounter::new();
        stored.increment(ADDR);
        stored.increment("10.0.0.1");

        let mut recent = AttemptCounter::new();
        recent.increment(ADDR);
        recent.increment(ADDR);

        stored.merge(&recent);
        assert_eq!(stored.get(ADDR), 3);
        assert_eq!(stored.get("10.0.0.1"), 1);
    }

    #[test]
    fn test_extend_keeps_existing_bans() {
        let now = Utc::now();
        let mut stored = BanList::new();
        stored.push(ban_at(now));

        let mut later = BanList::new();
        later.push(Ban::new("10.0.0.1", 3, "test", now, Duration::minutes(30)));
        stored.extend(later);

        assert_eq!(stored.len(), 2);
        assert!(stored.is_banned_at(ADDR, now));
        assert!(stored.is_banned_at("10.0.0.1", now));
    }

    #[test]
    fn test_ban_serializes_camel_case() {
        let json = serde_json::to_value(ban_at(Utc::now())).unwrap();
        assert_eq!(json["attemptsAtBanTime"], 3);
        assert!(json.get("expiresAt").is_some());
    }
}

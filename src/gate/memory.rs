//! In-process backends for the store traits.
//!
//! These carry the TTL semantics of the external KV/cache the gateway was
//! designed against: self-expiring rate-limit markers and last-writer-wins
//! allowlist entries. Expiry is lazy; an entry is dropped when observed past
//! its deadline. Timekeeping uses `tokio::time::Instant` so tests can pause
//! and advance the clock.

use crate::gate::store::{
    AllowlistStore, RateLimitDecision, RateLimiter, SecretStore, UserSecret,
};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Map size past which an insert first sweeps out expired entries.
///
/// Keys derive from attacker-controlled request data (client address, Host),
/// so without a sweep an unauthenticated client rotating headers could grow
/// the maps without bound; live entries alone bound the size.
const SWEEP_THRESHOLD: usize = 1024;

/// Fixed registry seeded from configuration at startup.
#[derive(Clone, Debug, Default)]
pub struct MemorySecrets {
    users: Vec<UserSecret>,
}

impl MemorySecrets {
    #[must_use]
    pub fn new(users: Vec<UserSecret>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl SecretStore for MemorySecrets {
    async fn list(&self) -> Result<Vec<UserSecret>> {
        Ok(self.users.clone())
    }
}

#[derive(Debug)]
struct Expiring {
    value: String,
    deadline: Instant,
}

impl Expiring {
    fn live(&self, now: Instant) -> bool {
        now < self.deadline
    }
}

/// Client address → admitted username with TTL.
#[derive(Debug, Default)]
pub struct MemoryAllowlist {
    entries: Mutex<HashMap<String, Expiring>>,
}

impl MemoryAllowlist {
    /// Current admitted username for `client_addr`, if unexpired.
    ///
    /// Not part of [`AllowlistStore`]: the gateway only writes; this read is
    /// for the downstream consumer and for tests.
    #[must_use]
    pub fn admitted(&self, client_addr: &str) -> Option<String> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(client_addr) {
            Some(entry) if entry.live(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(client_addr);
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl AllowlistStore for MemoryAllowlist {
    async fn admit(&self, client_addr: &str, username: &str, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let deadline = now + ttl;
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() >= SWEEP_THRESHOLD {
            entries.retain(|_, entry| entry.live(now));
        }
        // Overwrites any prior entry for this address.
        entries.insert(
            client_addr.to_string(),
            Expiring {
                value: username.to_string(),
                deadline,
            },
        );
        Ok(())
    }
}

/// Presence-with-TTL marker store keyed by opaque string.
#[derive(Debug, Default)]
pub struct MemoryRateLimiter {
    markers: Mutex<HashMap<String, Instant>>,
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn check_and_mark(&self, key: &str, ttl: Duration) -> Result<RateLimitDecision> {
        let now = Instant::now();
        let mut markers = self.markers.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(deadline) = markers.get(key)
            && now < *deadline
        {
            return Ok(RateLimitDecision::Limited);
        }
        if markers.len() >= SWEEP_THRESHOLD {
            markers.retain(|_, deadline| now < *deadline);
        }
        markers.insert(key.to_string(), now + ttl);
        Ok(RateLimitDecision::Allowed)
    }
}

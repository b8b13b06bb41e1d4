//! Backend capabilities the admission pipeline is written against.
//!
//! All mutable state (rate-limit markers, allowlist entries) lives behind
//! these traits so the pipeline is a pure function of its inputs plus
//! injected backends. Production can bind a distributed KV/cache; tests and
//! the default deployment bind the in-process backends in [`crate::gate::memory`].

use anyhow::Result;
use async_trait::async_trait;
use secrecy::SecretString;
use std::fmt;
use std::time::Duration;

/// One registry entry: a username and the knock material hashed by clients.
///
/// The original deployment uses the username itself as the knock; a
/// server-held token can be configured instead (`name=knock`).
#[derive(Clone)]
pub struct UserSecret {
    pub username: String,
    pub knock: SecretString,
}

impl UserSecret {
    #[must_use]
    pub fn new(username: impl Into<String>, knock: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            knock: SecretString::from(knock.into()),
        }
    }

    /// Entry whose knock material is the username, the registry's default.
    #[must_use]
    pub fn from_username(username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            knock: SecretString::from(username.clone()),
            username,
        }
    }
}

impl fmt::Debug for UserSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserSecret")
            .field("username", &self.username)
            .field("knock", &"REDACTED")
            .finish()
    }
}

/// Read-only registry of per-user knock secrets.
///
/// Enumerable only; digests are computed on demand, never stored.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn list(&self) -> Result<Vec<UserSecret>>;
}

/// Client address → admitted username, with a fixed time-to-live.
///
/// Write-only from the gateway's point of view; the VPN concentrator is the
/// reader. A later successful knock from the same address overwrites.
#[async_trait]
pub trait AllowlistStore: Send + Sync {
    async fn admit(&self, client_addr: &str, username: &str, ttl: Duration) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

/// Presence check with TTL used as a per-(client, host) abuse throttle.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Look up `key`; if an unexpired marker exists return `Limited` without
    /// mutation, otherwise write a marker with `ttl` and return `Allowed`.
    async fn check_and_mark(&self, key: &str, ttl: Duration) -> Result<RateLimitDecision>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn user_secret_defaults_knock_to_username() {
        let user = UserSecret::from_username("alice");
        assert_eq!(user.username, "alice");
        assert_eq!(user.knock.expose_secret(), "alice");
    }

    #[test]
    fn user_secret_debug_redacts_knock() {
        let user = UserSecret::new("alice", "hunter2");
        let rendered = format!("{user:?}");
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("REDACTED"));
    }
}
